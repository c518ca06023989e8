use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Corpo di errore restituito dal backend (`{ code, message, data }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Codice HTTP ripetuto nel corpo
    #[serde(default)]
    pub code: u16,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub data: serde_json::Value,
}

/// Errori delle regole sulla lista messaggi.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Message not found")]
    MessageNotFound,

    #[error("User does not have the permission to remove this message")]
    PermissionDenied,
}
