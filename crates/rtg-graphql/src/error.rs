//! Error types for GraphQL document synthesis.

use thiserror::Error;

/// Errors that can occur while synthesizing a GraphQL document.
#[derive(Debug, Error)]
pub enum GraphError {
    /// An `_include` / `_revinclude` value did not match `source:field[:target]`.
    #[error("invalid _include/_revinclude parameter: {0}")]
    InvalidIncludeParameter(String),

    /// A resource body could not be re-encoded for embedding in a mutation.
    #[error("failed to encode resource body: {0}")]
    Encode(#[from] serde_json::Error),
}
