use warp::http::StatusCode;

/// Why a heartbeat request did not end in admission.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("failed to look up user: {0:#}")]
    UserLookup(anyhow::Error),

    #[error("{0}")]
    MalformedBatch(String),

    #[error("invalid heartbeat object")]
    InvalidHeartBeat,

    #[error("failed to batch-insert heartbeats: {0:#}")]
    Persistence(anyhow::Error),

    #[error("failed to update user {user_id}: {error:#}")]
    UserUpdate {
        user_id: String,
        error: anyhow::Error,
    },
}

pub const INTERNAL_SERVER_ERROR: &str = "internal server error";

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::Unauthorized => StatusCode::UNAUTHORIZED,
            IngestError::MalformedBatch(_) | IngestError::InvalidHeartBeat => {
                StatusCode::BAD_REQUEST
            }
            IngestError::UserLookup(_)
            | IngestError::Persistence(_)
            | IngestError::UserUpdate { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text sent to the client. Store failures never leak their detail.
    pub fn public_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => INTERNAL_SERVER_ERROR.to_string(),
            _ => self.to_string(),
        }
    }
}
