// src/error.rs
//
// Error taxonomy.
//
// `BackendError` is what the REST port returns. `LoadError` is what the
// loader turns it into; it never escapes as `Err`, only inside a `LoadEvent`
// or `LoadOutcome::Failed`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Http(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unauthorized: log in again")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Maps an HTTP status to the matching variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => BackendError::Unauthorized,
            404 => BackendError::NotFound(body),
            _ => BackendError::Status { status, body },
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Http(e.to_string())
        }
    }
}

/// Failures the loader surfaces to the view. Both kinds are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Page 0 of a criteria generation failed; the list is empty until retry.
    #[error("Failed to load catalog: {reason}")]
    InitialLoad { reason: String },

    /// A fetch-more failed; state is unchanged and the next trigger retries.
    #[error("Failed to load page {page}: {reason}")]
    IncrementalLoad { page: usize, reason: String },
}

impl LoadError {
    pub fn is_initial(&self) -> bool {
        matches!(self, LoadError::InitialLoad { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_variants() {
        assert!(matches!(BackendError::from_status(401, String::new()), BackendError::Unauthorized));
        assert!(matches!(BackendError::from_status(403, "forbidden".into()), BackendError::Unauthorized));
        assert!(matches!(
            BackendError::from_status(404, "no product 9".into()),
            BackendError::NotFound(body) if body == "no product 9"
        ));
        assert!(matches!(
            BackendError::from_status(503, "maintenance".into()),
            BackendError::Status { status: 503, ref body } if body == "maintenance"
        ));
    }

    #[test]
    fn load_errors_read_as_user_messages() {
        let initial = LoadError::InitialLoad {
            reason: BackendError::Unauthorized.to_string(),
        };
        assert_eq!(initial.to_string(), "Failed to load catalog: unauthorized: log in again");
        assert!(initial.is_initial());

        let page = LoadError::IncrementalLoad {
            page: 3,
            reason: "request failed: timeout".into(),
        };
        assert_eq!(page.to_string(), "Failed to load page 3: request failed: timeout");
        assert!(!page.is_initial());
    }
}
