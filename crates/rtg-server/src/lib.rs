//! # rtg-server
//!
//! FHIR RTG: a protocol-translation reverse proxy that serves the FHIR
//! REST surface in front of an upstream server that speaks only GraphQL.
//!
//! At startup the gateway introspects the upstream schema into an
//! immutable type dictionary. Each REST request is then classified by
//! path shape, translated into a GraphQL document (via `rtg-graphql`),
//! sent upstream, and the response reshaped into a searchset bundle, a
//! single resource, or an OperationOutcome (`rtg-api` shapes). Paths that
//! do not address a known resource type are proxied upstream verbatim.
//!
//! ## Modules
//!
//! - [`config`] - Environment-driven configuration (`RTG_*`)
//! - [`upstream`] - Shared HTTP client: introspection, GraphQL calls, proxy
//! - [`reshape`] - GraphQL response → FHIR REST response translation
//! - [`handlers`] - REST dispatcher and verb handlers
//! - [`middleware`] - Request-id middleware
//! - [`server`] - State, router assembly, bootstrap, graceful shutdown

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod reshape;
pub mod server;
pub mod upstream;

pub use config::GatewayConfig;
pub use observability::init_tracing;
pub use server::{AppState, GatewayServer, ServerBuilder, build_app, build_state};
