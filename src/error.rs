use std::path::PathBuf;

use thiserror::Error;

use crate::notifier::TransportError;
use crate::tgtg::TgtgError;

/// Reasons a run ends in `Aborted`.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("missing required configuration: {0}")]
    ConfigMissing(String),

    #[error("failed to read alert history from {path:?}: {source}")]
    HistoryReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("alert history at {path:?} is corrupt: {reason}")]
    HistoryCorrupt { path: PathBuf, reason: String },

    #[error("failed to write alert history to {path:?}: {source}")]
    HistoryWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("marketplace rejected credentials: {0}")]
    AuthFailure(#[source] TgtgError),

    #[error("failed to fetch favorites: {0}")]
    FetchFailure(#[source] TgtgError),

    #[error("failed to process listing {listing}: {source}")]
    ProcessingError {
        listing: String,
        #[source]
        source: EntryError,
    },

    #[error("unexpected error: {0}")]
    UnclassifiedError(String),
}

/// Per-listing failures. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("record is missing required field `{field}`")]
    MalformedRecord { field: &'static str },

    #[error("delivery failed: {0}")]
    DeliveryError(#[from] TransportError),
}

impl RunError {
    /// Process exit status for this abort reason.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::AuthFailure(_) => 1,
            RunError::FetchFailure(_)
            | RunError::ProcessingError {
                source: EntryError::MalformedRecord { .. },
                ..
            } => 2,
            RunError::ConfigMissing(_)
            | RunError::HistoryReadError { .. }
            | RunError::HistoryCorrupt { .. }
            | RunError::HistoryWriteError { .. }
            | RunError::ProcessingError { .. }
            | RunError::UnclassifiedError(_) => 3,
        }
    }

    pub fn reason(&self) -> AbortReason {
        match self {
            RunError::ConfigMissing(_) => AbortReason::ConfigMissing,
            RunError::HistoryReadError { .. } => AbortReason::HistoryReadError,
            RunError::HistoryCorrupt { .. } => AbortReason::HistoryCorrupt,
            RunError::HistoryWriteError { .. } => AbortReason::HistoryWriteError,
            RunError::AuthFailure(_) => AbortReason::AuthFailure,
            RunError::FetchFailure(_) => AbortReason::FetchFailure,
            RunError::ProcessingError {
                source: EntryError::MalformedRecord { .. },
                ..
            } => AbortReason::MalformedRecord,
            RunError::ProcessingError {
                source: EntryError::DeliveryError(_),
                ..
            } => AbortReason::DeliveryError,
            RunError::UnclassifiedError(_) => AbortReason::UnclassifiedError,
        }
    }
}

/// Payload-free tag of a [`RunError`], carried by the terminal run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    ConfigMissing,
    HistoryReadError,
    HistoryCorrupt,
    HistoryWriteError,
    AuthFailure,
    FetchFailure,
    MalformedRecord,
    DeliveryError,
    UnclassifiedError,
}

/// Exit status when the process fails before a run can start.
pub const EXIT_STARTUP_FAILURE: u8 = 4;

#[cfg(test)]
mod tests {
    use super::{AbortReason, EntryError, RunError};
    use crate::notifier::TransportError;
    use crate::tgtg::TgtgError;

    #[test]
    fn auth_failure_maps_to_one() {
        let err = RunError::AuthFailure(TgtgError::Api {
            status: 401,
            body: "Unauthorized".to_string(),
        });
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn marketplace_failures_map_to_two() {
        let fetch = RunError::FetchFailure(TgtgError::Api {
            status: 500,
            body: "oops".to_string(),
        });
        let malformed = RunError::ProcessingError {
            listing: "<unknown>".to_string(),
            source: EntryError::MalformedRecord { field: "item_id" },
        };
        assert_eq!(fetch.exit_code(), 2);
        assert_eq!(malformed.exit_code(), 2);
    }

    #[test]
    fn local_failures_map_to_three() {
        let delivery = RunError::ProcessingError {
            listing: "42".to_string(),
            source: EntryError::DeliveryError(TransportError::Rejected {
                method: "sendMessage",
                status: 400,
                body: "chat not found".to_string(),
            }),
        };
        assert_eq!(delivery.exit_code(), 3);
        assert_eq!(RunError::ConfigMissing("TELEGRAM_CHAT_ID".into()).exit_code(), 3);
        assert_eq!(RunError::UnclassifiedError("boom".into()).exit_code(), 3);
        assert_eq!(
            RunError::HistoryCorrupt {
                path: "alert_history.json".into(),
                reason: "expected value".into(),
            }
            .exit_code(),
            3
        );
        assert_eq!(
            RunError::HistoryReadError {
                path: "alert_history.json".into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            }
            .exit_code(),
            3
        );
        let write = RunError::HistoryWriteError {
            path: "alert_history.json".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(write.exit_code(), 3);
        assert_eq!(write.reason(), AbortReason::HistoryWriteError);
    }

    #[test]
    fn processing_errors_keep_their_cause_in_the_reason() {
        let malformed = RunError::ProcessingError {
            listing: "42".into(),
            source: EntryError::MalformedRecord { field: "item_id" },
        };
        let delivery = RunError::ProcessingError {
            listing: "42".into(),
            source: EntryError::DeliveryError(TransportError::Rejected {
                method: "sendLocation",
                status: 500,
                body: String::new(),
            }),
        };
        assert_eq!(malformed.reason(), AbortReason::MalformedRecord);
        assert_eq!(delivery.reason(), AbortReason::DeliveryError);
    }
}
