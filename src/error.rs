/// Errors raised synchronously by the request surface.
///
/// None of these leave a partial mutation behind: the request is exactly as
/// it was before the failing call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XhrError {
    /// `open` was asked for a synchronous request.
    #[error("synchronous mode is not supported")]
    UnsupportedMode,

    /// The call is not allowed in the request's current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The target could not be resolved to an absolute URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Errors produced while building a [`RelayConfig`](crate::RelayConfig).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("relay endpoint is not configured (set {0})")]
    MissingEndpoint(&'static str),

    #[error("invalid url in {name}: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("invalid timeout {0:?}, expected milliseconds")]
    InvalidTimeout(String),
}
