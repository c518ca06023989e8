use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chiacchiera_client::ClientError;
use chiacchiera_core::{ActionFailure, ConversationError};
use thiserror::Error;
use tracing::error;

/// Errore di una action, mostrato all'utente nel form come `{"error": ...}`.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Invalid message")]
    InvalidMessage,

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Invalid message id")]
    InvalidMessageId,

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error("Error occured when uploading image")]
    UploadFailed,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidSignup(&'static str),

    /// Rifiuto del backend con un messaggio già adatto all'utente
    #[error("{0}")]
    Rejected(String),

    #[error("Unknown error occurred, please try again later")]
    Upstream(#[from] ClientError),
}

impl ActionError {
    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        if let ActionError::Upstream(e) = &self {
            error!("backend request failed: {e}");
        }

        let body = ActionFailure {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
