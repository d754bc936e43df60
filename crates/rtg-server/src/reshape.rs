//! Reshaping GraphQL responses into FHIR REST responses.
//!
//! Three shapes come out of here: searchset bundles (every `node` object
//! in the response tree becomes a `match` entry, every `resource` object
//! an `include` entry), bare resources for reads, and OperationOutcomes
//! for GraphQL error envelopes. When the upstream body cannot even be
//! parsed, it is passed through untouched rather than hidden behind a
//! synthetic error.

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use rtg_api::{
    Bundle, BundleEntry, BundleEntryResponse, BundleEntrySearch, BundleLink, OperationOutcome,
    fhir_json_response, raw_fhir_response,
};

/// What the reshaper needs to know about the inbound REST request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub scheme: String,
    pub host: String,
    /// Path and query of the inbound request, used for self links.
    pub request_uri: String,
}

impl RequestContext {
    pub fn full_host(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

/// Reshapes a search response into a searchset bundle.
pub fn searchset_response(body: &[u8], upstream_status: StatusCode, ctx: &RequestContext) -> Response {
    let Ok(root) = serde_json::from_slice::<Value>(body) else {
        return raw_fhir_response(upstream_status, body.to_vec());
    };
    if let Some(errors) = graph_errors(&root) {
        return outcome_response(errors, upstream_status);
    }
    if !upstream_status.is_success() {
        return raw_fhir_response(upstream_status, body.to_vec());
    }

    let mut collected = Vec::new();
    collect_entries(&root, &mut collected);
    debug!(entries = collected.len(), "collected searchset entries");

    let total = collected.len() as u64;
    let entries = collected
        .into_iter()
        .map(|(resource, mode)| searchset_entry(resource, mode, ctx))
        .collect();
    let bundle = Bundle::searchset(
        total,
        entries,
        vec![BundleLink::self_link(&ctx.request_uri)],
        timestamp(),
    );

    match serde_json::to_vec(&bundle) {
        Ok(encoded) => raw_fhir_response(StatusCode::OK, encoded),
        Err(_) => raw_fhir_response(upstream_status, body.to_vec()),
    }
}

/// Reshapes a read response into the bare resource: the first object
/// value under `data`, pruned of empties.
pub fn read_response(body: &[u8], upstream_status: StatusCode) -> Response {
    let Ok(root) = serde_json::from_slice::<Value>(body) else {
        return raw_fhir_response(upstream_status, body.to_vec());
    };
    if let Some(errors) = graph_errors(&root) {
        return outcome_response(errors, upstream_status);
    }
    let Some(mut resource) = first_data_object(&root) else {
        return raw_fhir_response(upstream_status, body.to_vec());
    };

    remove_empties(&mut resource);

    match serde_json::to_vec(&resource) {
        Ok(encoded) => raw_fhir_response(StatusCode::OK, encoded),
        Err(_) => raw_fhir_response(upstream_status, body.to_vec()),
    }
}

/// Reshapes a create-mutation response into a transaction-response
/// bundle carrying the created resource.
pub fn create_response(body: &[u8], upstream_status: StatusCode, ctx: &RequestContext) -> Response {
    let Ok(root) = serde_json::from_slice::<Value>(body) else {
        return raw_fhir_response(upstream_status, body.to_vec());
    };
    if let Some(errors) = graph_errors(&root) {
        return outcome_response(errors, upstream_status);
    }
    let Some(mut resource) = first_data_object(&root) else {
        return raw_fhir_response(upstream_status, body.to_vec());
    };

    remove_empties(&mut resource);

    let resource_type = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let id = resource.get("id").and_then(Value::as_str).unwrap_or_default();
    let location = if resource_type.is_empty() || id.is_empty() {
        None
    } else {
        Some(format!("{resource_type}/{id}"))
    };

    let entry = BundleEntry {
        full_url: None,
        resource: Some(resource),
        search: None,
        response: Some(BundleEntryResponse {
            status: "201 Created".into(),
            location,
        }),
    };
    let meta = timestamp().map(|stamp| serde_json::json!({ "lastUpdated": stamp }));
    let bundle = Bundle::transaction_response(
        vec![entry],
        vec![BundleLink::self_link(&ctx.request_uri)],
        meta,
    );

    match serde_json::to_vec(&bundle) {
        Ok(encoded) => raw_fhir_response(StatusCode::CREATED, encoded),
        Err(_) => raw_fhir_response(upstream_status, body.to_vec()),
    }
}

/// Translates a GraphQL error envelope into an OperationOutcome response.
///
/// The issue code comes from `errors[0].extensions.code`, the text from
/// `errors[0].message`, and the raw envelope rides along as diagnostics.
/// A three-digit numeric code doubles as the HTTP status; otherwise the
/// caller's status stands.
pub fn outcome_response(errors: &Value, fallback_status: StatusCode) -> Response {
    let first = errors.get(0);
    let message = first
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown error");
    let code = first
        .and_then(|error| error.pointer("/extensions/code"))
        .and_then(Value::as_str)
        .unwrap_or("exception");

    let status = numeric_status(code).unwrap_or(fallback_status);
    let diagnostics = serde_json::to_string(errors).unwrap_or_default();
    let outcome = OperationOutcome::error(code, message).with_diagnostics(diagnostics);

    fhir_json_response(status, &outcome)
}

fn numeric_status(code: &str) -> Option<StatusCode> {
    if code.len() != 3 {
        return None;
    }
    code.parse::<u16>()
        .ok()
        .filter(|status| (100..=599).contains(status))
        .and_then(|status| StatusCode::from_u16(status).ok())
}

/// A non-null `errors` key marks a GraphQL error envelope.
pub fn graph_errors(root: &Value) -> Option<&Value> {
    root.get("errors").filter(|errors| !errors.is_null())
}

/// The first object value under `data`; reads and creates select exactly
/// one top-level field, so this is the resource.
fn first_data_object(root: &Value) -> Option<Value> {
    root.get("data")?
        .as_object()?
        .values()
        .find(|value| value.is_object())
        .cloned()
}

/// Depth-first collection of searchset entries: object values under a
/// `node` key are matches, object values under a `resource` key are
/// includes. Recursion continues into collected objects, so nested
/// includes inside a match are found too.
fn collect_entries(value: &Value, out: &mut Vec<(Value, &'static str)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if child.is_object() {
                    match key.as_str() {
                        "node" => out.push((child.clone(), "match")),
                        "resource" => out.push((child.clone(), "include")),
                        _ => {}
                    }
                }
                collect_entries(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_entries(item, out);
            }
        }
        _ => {}
    }
}

fn searchset_entry(mut resource: Value, mode: &str, ctx: &RequestContext) -> BundleEntry {
    let resource_type = resource
        .get("resourceType")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let id = resource
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let full_url = if resource_type.is_empty() || id.is_empty() {
        String::new()
    } else {
        format!("{}/{resource_type}/{id}", ctx.full_host())
    };

    remove_empties(&mut resource);

    BundleEntry {
        full_url: Some(full_url),
        resource: Some(resource),
        search: Some(BundleEntrySearch {
            mode: mode.into(),
            score: None,
        }),
        response: None,
    }
}

/// Prunes a resource tree in place: removes keys whose value is null or
/// an empty array, and keys literally named `resource` (their content was
/// already lifted into its own entry). The root itself is never removed,
/// only keys inside it.
pub fn remove_empties(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, child| {
                !(child.is_null()
                    || child.as_array().is_some_and(|items| items.is_empty())
                    || key == "resource")
            });
            for child in map.values_mut() {
                remove_empties(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                remove_empties(item);
            }
        }
        _ => {}
    }
}

fn timestamp() -> Option<String> {
    OffsetDateTime::now_utc().format(&Rfc3339).ok()
}
