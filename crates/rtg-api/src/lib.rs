//! FHIR REST envelope types shared across the gateway.
//!
//! Everything the gateway writes back to a REST caller is one of three
//! shapes: a `Bundle` (searchset or transaction-response), a bare
//! resource, or an `OperationOutcome`. This crate owns those shapes plus
//! the gateway's error enum and its mapping to HTTP responses.

use axum::body::Body;
use axum::http::{HeaderValue, Response, StatusCode, header};
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Content type of every translated REST response.
pub const FHIR_JSON: &str = "application/fhir+json; charset=utf-8";

// -------------------------
// OperationOutcome
// -------------------------

/// FHIR OperationOutcome, the REST error envelope.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    #[serde(rename = "resourceType")]
    pub resource_type: &'static str,
    pub issue: Vec<OperationOutcomeIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcomeIssue {
    pub severity: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<IssueDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueDetails {
    pub text: String,
}

impl OperationOutcome {
    /// A single error-severity issue with a details text.
    pub fn error(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            resource_type: "OperationOutcome",
            issue: vec![OperationOutcomeIssue {
                severity: "error".into(),
                code: code.into(),
                details: Some(IssueDetails { text: text.into() }),
                diagnostics: None,
            }],
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        let diagnostics = diagnostics.into();
        if !diagnostics.is_empty() {
            if let Some(issue) = self.issue.first_mut() {
                issue.diagnostics = Some(diagnostics);
            }
        }
        self
    }
}

// -------------------------
// Bundle
// -------------------------

#[derive(Debug, Clone, Serialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

impl BundleLink {
    pub fn self_link(url: impl Into<String>) -> Self {
        Self {
            relation: "self".into(),
            url: url.into(),
        }
    }
}

/// Search component of a searchset entry: `match` for primary results,
/// `include` for resources pulled in by `_include` / `_revinclude`.
#[derive(Debug, Clone, Serialize)]
pub struct BundleEntrySearch {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Response component of a transaction-response entry.
#[derive(Debug, Clone, Serialize)]
pub struct BundleEntryResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleEntry {
    /// Always serialized for searchset entries, empty when the resource
    /// is missing its type or id.
    #[serde(rename = "fullUrl", skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<BundleEntrySearch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<BundleEntryResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bundle {
    #[serde(rename = "resourceType")]
    pub resource_type: &'static str,
    #[serde(rename = "type")]
    pub bundle_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub link: Vec<BundleLink>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    pub fn searchset(
        total: u64,
        entries: Vec<BundleEntry>,
        links: Vec<BundleLink>,
        timestamp: Option<String>,
    ) -> Self {
        Self {
            resource_type: "Bundle",
            bundle_type: "searchset".into(),
            timestamp,
            total: Some(total),
            meta: None,
            link: links,
            entry: entries,
        }
    }

    pub fn transaction_response(
        entries: Vec<BundleEntry>,
        links: Vec<BundleLink>,
        meta: Option<Value>,
    ) -> Self {
        Self {
            resource_type: "Bundle",
            bundle_type: "transaction-response".into(),
            timestamp: None,
            total: None,
            meta,
            link: links,
            entry: entries,
        }
    }
}

// -------------------------
// Gateway errors
// -------------------------

/// Errors the gateway reports to REST callers as OperationOutcomes.
///
/// Upstream responses that *arrived* are never errors here, whatever
/// their status; those flow through the reshaper so a GraphQL error
/// envelope can be translated faithfully.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The outcome's issue code carries the numeric HTTP status, matching
    /// what the REST surface has always reported for gateway-level errors.
    pub fn to_operation_outcome(&self) -> OperationOutcome {
        OperationOutcome::error(self.status_code().as_u16().to_string(), self.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        fhir_json_response(self.status_code(), &self.to_operation_outcome())
    }
}

/// Serializes `body` as a `application/fhir+json` response. Falls back to
/// a minimal outcome when serialization itself fails.
pub fn fhir_json_response<T: Serialize>(status: StatusCode, body: &T) -> axum::response::Response {
    let encoded = match serde_json::to_vec(body) {
        Ok(encoded) => encoded,
        Err(_) => {
            let fallback = OperationOutcome::error("500", "Serialization failure");
            return raw_fhir_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::to_vec(&fallback).unwrap_or_else(|_| b"{}".to_vec()),
            );
        }
    };
    raw_fhir_response(status, encoded)
}

/// Wraps pre-encoded bytes in a `application/fhir+json` response.
pub fn raw_fhir_response(status: StatusCode, body: Vec<u8>) -> axum::response::Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON))
        .body(Body::from(body))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("{}"))
                .expect("build fallback response")
        })
}
