use crate::platform::Platform;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("blocked by an anti-bot challenge")]
    Challenge,

    #[error("headless render failed: {0}")]
    Render(String),
}

impl FetchError {
    /// Access was refused, a rendered attempt might get through.
    pub fn is_access_denied(&self) -> bool {
        match self {
            FetchError::Status(code) => matches!(code, 401 | 403 | 429 | 503),
            FetchError::Challenge => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout;
        }
        if let Some(status) = err.status() {
            return FetchError::Status(status.as_u16());
        }
        FetchError::Transport(crate::fetch::plain::get_error(&err))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    IO(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum CollectError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("a collection run for {0} is already active")]
    AlreadyRunning(Platform),

    #[error("failed to start worker: {0}")]
    Worker(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denied_statuses() {
        assert!(FetchError::Status(403).is_access_denied());
        assert!(FetchError::Status(401).is_access_denied());
        assert!(FetchError::Challenge.is_access_denied());
        assert!(!FetchError::Status(404).is_access_denied());
        assert!(!FetchError::Timeout.is_access_denied());
    }
}
