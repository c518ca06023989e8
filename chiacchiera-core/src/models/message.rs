use serde::{Deserialize, Serialize};

use crate::utils::{new_message_id, now_timestamp};

/// Tipo di contenuto di un messaggio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[serde(rename = "message")]
    Message,
    /// `content` contiene il nome del file salvato in `message_photos`.
    #[serde(rename = "image")]
    Image,
}

/// Messaggio conservato nel campo json `messages` della conversazione.
/// Una volta creato non cambia più, può solo essere rimosso.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub content: String,
    #[serde(rename = "contentType")]
    pub content_type: ContentType,
    pub created: String, // RFC3339 UTC
}

impl Message {
    /// Nuovo messaggio di testo scritto da `user_id`.
    pub fn text(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(user_id.into(), content.into(), ContentType::Message)
    }

    /// Nuovo messaggio immagine; `file_name` è il nome assegnato dal backend al file caricato.
    pub fn image(user_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self::new(user_id.into(), file_name.into(), ContentType::Image)
    }

    fn new(user_id: String, content: String, content_type: ContentType) -> Self {
        Self {
            id: new_message_id(),
            user_id,
            content,
            content_type,
            created: now_timestamp(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type == ContentType::Image
    }
}
