use thiserror::Error;

/// Failure of a single Graph request.
///
/// `Status` carries the upstream HTTP status and, for throttled responses,
/// the server-provided `Retry-After` delay in seconds. The app-inventory
/// retry loop branches on exactly this shape.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: u16,
        retry_after: Option<u64>,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("parsing response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("refusing to follow {url}: outside {base_url}")]
    ForeignLink { url: String, base_url: String },
}

impl GraphError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
