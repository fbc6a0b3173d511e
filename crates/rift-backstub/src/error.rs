//! Error types for mounting, fetching and serving stubs.
//!
//! Mount-time errors are fatal and abort startup. Fetch and compute errors
//! are values consumed by the dispatcher, which always answers the client.

use std::path::PathBuf;

/// Errors raised while registering stubs or mounting a stub directory.
#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("unknown verb '{0}'")]
    UnknownVerb(String),
    #[error("'{0}' is not a valid HTTP status code")]
    InvalidStatus(String),
    #[error("'service' is required for status code specific stubs")]
    MissingService,
    #[error("route {verb} {path} is already registered")]
    DuplicateRoute { verb: String, path: String },
    #[error("missing '{0}' argument")]
    MissingArgument(&'static str),
    #[error("invalid route '{path}': {reason}")]
    InvalidRoute { path: String, reason: String },
    #[error("invalid service URL '{url}': {reason}")]
    InvalidService { url: String, reason: String },
    #[error("failed to load stub {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
    #[error("failed to read stub directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while turning a stub file into a [`crate::stub::Stub`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to compile script: {0}")]
    Script(String),
    #[error("unsupported stub file extension '{0}'")]
    UnsupportedExtension(String),
}

/// A status spec that does not describe a 3-position pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status pattern '{0}'")]
pub struct InvalidPatternError(pub String);

/// Network-level failures talking to an upstream service.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build upstream client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid upstream URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("upstream request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read upstream response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// The inbound request could not be turned into a request context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

/// A computed stub leaf failed while being evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("computed stub value failed: {0}")]
pub struct ComputeError(pub String);

impl ComputeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
