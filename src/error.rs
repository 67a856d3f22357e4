use thiserror::Error;

/// Everything that can go wrong between the engine and the land service.
///
/// `Status` and `Decode` are reported separately for logging, but every caller
/// handles them exactly like `Network`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("network request failed: {0}")]
    Network(String),
    #[error("land service responded with status {0}")]
    Status(u16),
    #[error("malformed response body: {0}")]
    Decode(String),
    #[error("malformed geometry: {0}")]
    MalformedGeometry(&'static str),
}

impl SyncError {
    /// True for any failure of the transport collaborator (timeouts included).
    pub fn is_network(&self) -> bool {
        !matches!(self, SyncError::MalformedGeometry(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::Status(status.as_u16())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Transient, user-visible messages. Informational notices are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The main viewport fetch failed; the previous parcels stay on screen.
    FetchFailed,
    /// The last fetch or search produced zero matches.
    EmptyResult,
    /// The result count reached the requested limit, so there may be more.
    LimitReached { count: usize, limit: usize },
    SearchFound(usize),
    SearchFailed,
    DetailFailed,
}

impl Notice {
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Notice::FetchFailed | Notice::LimitReached { .. } | Notice::SearchFailed | Notice::DetailFailed
        )
    }
}
