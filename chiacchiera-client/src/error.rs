use chiacchiera_core::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Risposta non 2xx del backend, con il corpo `{code, message, data}` decodificato.
    #[error("backend responded {status}: {}", .error.message)]
    Api { status: u16, error: ApiError },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid backend url: {0}")]
    InvalidUrl(String),

    #[error("realtime error: {0}")]
    Realtime(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Il record non esiste oppure le regole della collection non lo rendono visibile:
    /// il backend risponde 404 in entrambi i casi.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
