//! The shared upstream HTTP client.
//!
//! One `reqwest::Client` is built at startup with the configured timeout
//! and TLS-verification toggle, and is cloned into every handler. It
//! serves three jobs: the startup introspection call, per-request GraphQL
//! calls, and verbatim pass-through proxying for paths that do not match
//! the REST surface.

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::Response;
use tracing::{debug, warn};

use rtg_api::GatewayError;
use rtg_graphql::introspection::{build_dictionary, introspection_query};
use rtg_graphql::TypeDictionary;

use crate::config::GatewayConfig;

/// A fully-read upstream GraphQL response.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Inbound-request context forwarded with every upstream call.
#[derive(Debug, Clone, Copy)]
pub struct Forwarded<'a> {
    pub headers: &'a HeaderMap,
    pub peer: SocketAddr,
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    accept_header: HeaderValue,
}

impl UpstreamClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .danger_accept_invalid_certs(config.skip_tls_verify)
            .build()
            .map_err(|e| GatewayError::internal(format!("failed to build http client: {e}")))?;

        let accept_header = HeaderValue::from_str(&config.gql_accept_header)
            .map_err(|e| GatewayError::internal(format!("invalid graphql accept header: {e}")))?;

        Ok(Self {
            client,
            base_url: config.upstream_base().to_string(),
            accept_header,
        })
    }

    /// Fetches and distills the upstream type dictionary. Any transport,
    /// HTTP-status or decode failure here is startup-fatal for the caller.
    pub async fn introspect(&self) -> Result<TypeDictionary, GatewayError> {
        let response = self.graphql(&introspection_query(), "", None).await?;
        if response.status.is_client_error() || response.status.is_server_error() {
            return Err(GatewayError::UpstreamUnavailable(format!(
                "introspection request failed with status {}",
                response.status
            )));
        }
        let parsed = serde_json::from_slice(&response.body).map_err(|e| {
            GatewayError::UpstreamUnavailable(format!(
                "introspection response could not be decoded: {e}"
            ))
        })?;
        Ok(build_dictionary(parsed))
    }

    /// POSTs a composed GraphQL document to `{upstream}/$graphql`.
    ///
    /// Inbound headers are copied (minus hop-by-hop headers), then the
    /// JSON content type, the configured Accept header and the client IP
    /// are applied. Responses are returned whatever their status; only
    /// transport failures are errors.
    pub async fn graphql(
        &self,
        document: &str,
        profile: &str,
        forwarded: Option<Forwarded<'_>>,
    ) -> Result<UpstreamResponse, GatewayError> {
        let url = format!("{}/$graphql", self.base_url);
        let payload = serde_json::json!({ "query": document });

        let mut headers = match forwarded {
            Some(forwarded) => forwardable_headers(forwarded.headers),
            None => HeaderMap::new(),
        };
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, self.accept_header.clone());
        if let Some(forwarded) = forwarded {
            append_forwarded_for(&mut headers, forwarded);
        }

        debug!(%url, "sending graphql request upstream");

        let response = self
            .client
            .post(url)
            .query(&[("_profile", profile)])
            .headers(headers)
            .body(payload.to_string())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            warn!(%status, "upstream graphql call returned an error status");
        }
        let body = response.bytes().await.map_err(transport_error)?;

        Ok(UpstreamResponse { status, body })
    }

    /// Forwards a request verbatim to `{upstream}{path}` and streams the
    /// response back, headers and status included.
    pub async fn proxy(
        &self,
        method: Method,
        uri: &Uri,
        forwarded: Forwarded<'_>,
        body: Bytes,
    ) -> Result<Response, GatewayError> {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        let url = format!("{}{}", self.base_url, path_and_query);

        let mut headers = forwardable_headers(forwarded.headers);
        append_forwarded_for(&mut headers, forwarded);

        debug!(%url, %method, "proxying request upstream");

        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let mut builder = Response::builder().status(response.status());
        for (name, value) in response.headers() {
            if !is_hop_by_hop_header(name.as_str()) {
                builder = builder.header(name, value);
            }
        }

        builder
            .body(Body::from_stream(response.bytes_stream()))
            .map_err(|e| GatewayError::internal(format!("failed to build proxy response: {e}")))
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    let message = if err.is_timeout() {
        format!("upstream request timed out: {err}")
    } else if err.is_connect() {
        format!("failed to connect to upstream: {err}")
    } else {
        format!("upstream request failed: {err}")
    };
    GatewayError::UpstreamUnavailable(message)
}

/// Copies inbound headers, dropping hop-by-hop headers and the stale
/// body-framing ones the outbound call recomputes.
fn forwardable_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in inbound {
        if is_hop_by_hop_header(name.as_str()) || name.as_str() == "content-length" {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Hop-by-hop headers per RFC 2616 section 13.5.1. Host is excluded too:
/// it must name the upstream, not the gateway.
fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
            | "host"
    )
}

fn append_forwarded_for(headers: &mut HeaderMap, forwarded: Forwarded<'_>) {
    let ip = client_ip(forwarded.headers, forwarded.peer);
    if let Ok(value) = HeaderValue::from_str(&ip) {
        headers.append("x-forwarded-for", value);
    }
}

/// The immediate client IP: first `X-Forwarded-For` entry, else
/// `X-Real-IP`, else the peer address.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|value| value.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    peer.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "10.1.2.3:40000".parse().unwrap()
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, peer()), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, peer()), "198.51.100.2");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        assert_eq!(client_ip(&HeaderMap::new(), peer()), "10.1.2.3");
    }

    #[test]
    fn test_is_hop_by_hop_header() {
        assert!(is_hop_by_hop_header("Connection"));
        assert!(is_hop_by_hop_header("transfer-encoding"));
        assert!(is_hop_by_hop_header("host"));
        assert!(!is_hop_by_hop_header("content-type"));
        assert!(!is_hop_by_hop_header("authorization"));
    }

    #[test]
    fn test_forwardable_headers_filters() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        inbound.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer token"),
        );
        let headers = forwardable_headers(&inbound);
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(
            headers.get(header::AUTHORIZATION).unwrap(),
            "Bearer token"
        );
    }
}
