use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Message;
/*
    dto per le richieste http: da una parte le chiamate REST verso il backend,
    dall'altra i form inviati dal browser alle nostre action
*/

// Auth con password (collection auth oppure admin)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordAuthRequest {
    pub identity: String,
    pub password: String,
}

/// Risposta di auth-with-password / auth-refresh.
/// Le collection auth rispondono con `record`, l'endpoint admin con `admin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(default, alias = "admin")]
    pub record: Value,
}

// Creazione utente (signup)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Pagina di record (`GET /api/collections/{c}/records`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub page: u32,
    pub per_page: u32,
    /// -1 quando la richiesta usa `skipTotal`
    #[serde(default)]
    pub total_items: i64,
    #[serde(default)]
    pub total_pages: i64,
    pub items: Vec<T>,
}

/// Corpo della PATCH sui messaggi di una conversazione.
/// `message_photos-` è il modificatore del backend che toglie file da un campo multiplo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationPatch<'a> {
    pub messages: &'a [Message],
    #[serde(rename = "message_photos-", skip_serializing_if = "Vec::is_empty")]
    pub removed_photos: Vec<String>,
}

impl<'a> ConversationPatch<'a> {
    pub fn messages(messages: &'a [Message]) -> Self {
        Self {
            messages,
            removed_photos: Vec::new(),
        }
    }

    pub fn remove_photo(mut self, file_name: impl Into<String>) -> Self {
        self.removed_photos.push(file_name.into());
        self
    }
}

// Form delle action. I campi sono opzionali: un campo mancante è un errore di validazione
// con messaggio per l'utente, non un rifiuto dell'estrattore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SendMessageForm {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoveMessageForm {
    #[serde(default, rename = "message-id")]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_confirm: Option<String>,
}

/// Risultato di una action fallita, rimostrato dal form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    pub error: String,
}
