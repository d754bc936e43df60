//! # rtg-graphql
//!
//! GraphQL document synthesis for the FHIR RTG gateway.
//!
//! The gateway never executes GraphQL itself; it *writes* GraphQL for an
//! upstream server that speaks nothing else. This crate holds everything
//! needed to do that:
//!
//! - An AST for variables, arguments, fields, fragments and operations,
//!   with deterministic wire-form rendering ([`ast`])
//! - The introspection document and response model, and the type
//!   dictionary distilled from it ([`introspection`], [`dictionary`])
//! - A bounded fragment builder that turns a dictionary entry into a
//!   reusable selection set ([`fragment`])
//! - `_include` / `_revinclude` parameter parsing and union resolution
//!   ([`include`])
//! - Composition of complete search / read / create documents ([`compose`])
//!
//! The type dictionary is built once at startup from a live introspection
//! call and is immutable afterwards; everything else in this crate is
//! per-request and pure.

pub mod ast;
pub mod compose;
pub mod dictionary;
pub mod error;
pub mod fragment;
pub mod include;
pub mod introspection;

pub use ast::{ArgumentValue, Arguments, Field, Fragment, OperationKind, Query, Variable};
pub use dictionary::{FieldDef, PossibleType, SchemaType, TypeDictionary, TypeKind};
pub use error::GraphError;
pub use fragment::{FRAGMENT_DEPTH_LIMIT, fragment_for, fragment_name};
pub use include::{IncludeParam, kebab_to_lower_camel, parse_include_param};
pub use introspection::{IntrospectionResponse, OF_TYPE_DEPTH, build_dictionary, introspection_query};

/// Result type for document synthesis operations.
pub type Result<T> = std::result::Result<T, GraphError>;
