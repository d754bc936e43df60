//! The REST dispatcher and verb handlers.
//!
//! The dispatcher is the router's fallback: it classifies requests by
//! method and path shape, validates the resource type against the type
//! dictionary, and routes to search, read, create or the pass-through
//! proxy. A resource type the dictionary does not know is not an error;
//! the request simply is not part of the translated surface and goes
//! upstream verbatim.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{debug, info, warn};

use rtg_api::GatewayError;
use rtg_graphql::ast::{ArgumentValue, Arguments};
use rtg_graphql::{IncludeParam, compose, parse_include_param};

use crate::reshape::{self, RequestContext};
use crate::server::AppState;
use crate::upstream::Forwarded;

/// Largest request body the gateway will buffer.
const MAX_BODY_BYTES: usize = 10_000_000;

/// Liveness probe; never contacts the upstream.
pub async fn healthcheck() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Fallback handler: every request that is not the healthcheck lands here.
pub async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<Body>,
) -> Response {
    match route(&state, peer, req).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn route(
    state: &AppState,
    peer: SocketAddr,
    req: Request<Body>,
) -> Result<Response, GatewayError> {
    let path = req.uri().path().to_string();
    let segments = path_segments(&path);
    let method = req.method().clone();

    if method == Method::GET {
        match segments.as_slice() {
            [] => proxy(state, peer, req).await,
            [resource_type] => {
                if state.dictionary.contains(resource_type) {
                    let resource_type = resource_type.to_string();
                    search(state, peer, req, &resource_type).await
                } else {
                    debug!(resource_type, "unknown resource type, proxying");
                    proxy(state, peer, req).await
                }
            }
            [resource_type, id] => {
                if state.dictionary.contains(resource_type) {
                    let (resource_type, id) = (resource_type.to_string(), id.to_string());
                    read(state, peer, req, &resource_type, &id).await
                } else {
                    debug!(resource_type, "unknown resource type, proxying");
                    proxy(state, peer, req).await
                }
            }
            [compartment, id, resource_type] => {
                info!(compartment, id, resource_type, "compartment search requested");
                Err(GatewayError::bad_request("compartment search is not supported"))
            }
            _ => {
                warn!(path, "unrecognized request path");
                Err(GatewayError::bad_request("Bad Request"))
            }
        }
    } else if method == Method::POST {
        match segments.as_slice() {
            [resource_type] => {
                if state.dictionary.contains(resource_type) {
                    let resource_type = resource_type.to_string();
                    create(state, peer, req, &resource_type).await
                } else {
                    debug!(resource_type, "unknown resource type, proxying");
                    proxy(state, peer, req).await
                }
            }
            [resource_type, id] => {
                info!(resource_type, id, "update requested");
                Err(GatewayError::bad_request("update is not supported"))
            }
            _ => {
                warn!(path, "unrecognized request path");
                Err(GatewayError::bad_request("Bad Request"))
            }
        }
    } else {
        Err(GatewayError::bad_request("Bad Request"))
    }
}

/// Path segments after the leading slash; the root path has none.
fn path_segments(path: &str) -> Vec<&str> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

fn query_pairs(req: &Request<Body>) -> Vec<(String, String)> {
    url::form_urlencoded::parse(req.uri().query().unwrap_or_default().as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

fn first_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

fn parse_includes(
    state: &AppState,
    pairs: &[(String, String)],
    key: &str,
) -> Result<Vec<IncludeParam>, GatewayError> {
    pairs
        .iter()
        .filter(|(name, _)| name == key)
        .map(|(_, value)| {
            parse_include_param(&state.dictionary, value)
                .map_err(|err| GatewayError::bad_request(err.to_string()))
        })
        .collect()
}

/// Every query parameter that does not start with `_` becomes a search
/// argument; `_id` is the one underscore parameter that is forwarded.
/// Only the first occurrence of a repeated key counts.
fn search_arguments(pairs: &[(String, String)]) -> Arguments {
    let mut arguments = Arguments::new();
    for (key, value) in pairs {
        if key.starts_with('_') && key != "_id" {
            continue;
        }
        arguments
            .entry(key.clone())
            .or_insert_with(|| ArgumentValue::scalar(value.clone()));
    }
    arguments
}

fn request_context(req: &Request<Body>) -> RequestContext {
    let scheme = req
        .headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .filter(|proto| *proto == "https")
        .unwrap_or("http")
        .to_string();
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let request_uri = req
        .uri()
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    RequestContext {
        scheme,
        host,
        request_uri,
    }
}

async fn search(
    state: &AppState,
    peer: SocketAddr,
    req: Request<Body>,
    resource_type: &str,
) -> Result<Response, GatewayError> {
    let ctx = request_context(&req);
    let pairs = query_pairs(&req);
    let profile = first_value(&pairs, "_profile").unwrap_or_default().to_string();

    let includes = parse_includes(state, &pairs, "_include")?;
    let revincludes = parse_includes(state, &pairs, "_revinclude")?;
    let search_params = search_arguments(&pairs);

    let document = compose::search_document(
        &state.dictionary,
        resource_type,
        &search_params,
        &includes,
        &revincludes,
    );
    debug!(%document, "composed search document");

    let forwarded = Forwarded {
        headers: req.headers(),
        peer,
    };
    let upstream = state.upstream.graphql(&document, &profile, Some(forwarded)).await?;

    Ok(reshape::searchset_response(&upstream.body, upstream.status, &ctx))
}

async fn read(
    state: &AppState,
    peer: SocketAddr,
    req: Request<Body>,
    resource_type: &str,
    id: &str,
) -> Result<Response, GatewayError> {
    let pairs = query_pairs(&req);
    let profile = first_value(&pairs, "_profile").unwrap_or_default().to_string();

    let document = compose::read_document(&state.dictionary, resource_type, id);
    debug!(%document, "composed read document");

    let forwarded = Forwarded {
        headers: req.headers(),
        peer,
    };
    let upstream = state.upstream.graphql(&document, &profile, Some(forwarded)).await?;

    Ok(reshape::read_response(&upstream.body, upstream.status))
}

async fn create(
    state: &AppState,
    peer: SocketAddr,
    req: Request<Body>,
    resource_type: &str,
) -> Result<Response, GatewayError> {
    let ctx = request_context(&req);
    let pairs = query_pairs(&req);
    let profile = first_value(&pairs, "_profile").unwrap_or_default().to_string();

    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|err| GatewayError::bad_request(format!("failed to read request body: {err}")))?;
    let resource: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|err| GatewayError::bad_request(format!("invalid JSON body: {err}")))?;

    let document = compose::create_document(&state.dictionary, resource_type, &resource)
        .map_err(|err| GatewayError::internal(err.to_string()))?;
    debug!(%document, "composed create mutation");

    let forwarded = Forwarded {
        headers: &parts.headers,
        peer,
    };
    let upstream = state.upstream.graphql(&document, &profile, Some(forwarded)).await?;

    Ok(reshape::create_response(&upstream.body, upstream.status, &ctx))
}

async fn proxy(
    state: &AppState,
    peer: SocketAddr,
    req: Request<Body>,
) -> Result<Response, GatewayError> {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|err| GatewayError::bad_request(format!("failed to read request body: {err}")))?;

    let forwarded = Forwarded {
        headers: &parts.headers,
        peer,
    };
    state
        .upstream
        .proxy(parts.method, &parts.uri, forwarded, bytes)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        assert!(path_segments("/").is_empty());
        assert_eq!(path_segments("/Patient"), ["Patient"]);
        assert_eq!(path_segments("/Patient/42"), ["Patient", "42"]);
        assert_eq!(
            path_segments("/Patient/42/Observation"),
            ["Patient", "42", "Observation"]
        );
    }

    #[test]
    fn test_search_arguments_filter_underscore_params() {
        let pairs = vec![
            ("name".to_string(), "Smith".to_string()),
            ("_id".to_string(), "123".to_string()),
            ("_profile".to_string(), "core".to_string()),
            ("_include".to_string(), "Patient:link".to_string()),
        ];
        let arguments = search_arguments(&pairs);
        let keys: Vec<&str> = arguments.keys().map(String::as_str).collect();
        assert_eq!(keys, ["_id", "name"]);
    }

    #[test]
    fn test_search_arguments_keep_first_occurrence() {
        let pairs = vec![
            ("name".to_string(), "Smith".to_string()),
            ("name".to_string(), "Jones".to_string()),
        ];
        let arguments = search_arguments(&pairs);
        assert_eq!(arguments.get("name").unwrap().value, "Smith");
    }
}
