use serde::{Deserialize, Serialize};

use super::{message::Message, null_as_default, skip_malformed};
use crate::error::ConversationError;

/// Numero massimo di messaggi conservati in una conversazione.
pub const MAX_MESSAGES: usize = 50;

/// Record della collection `conversations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub members: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub admins: Vec<String>,
    /// Dal più recente al più vecchio, al massimo [`MAX_MESSAGES`].
    #[serde(default, deserialize_with = "skip_malformed")]
    pub messages: Vec<Message>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_photos: Vec<String>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
}

impl Conversation {
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|admin| admin == user_id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|member| member == user_id)
    }

    /// Inserisce in testa; oltre [`MAX_MESSAGES`] il più vecchio viene scartato.
    pub fn push_message(&mut self, message: Message) {
        self.messages.insert(0, message);
        self.messages.truncate(MAX_MESSAGES);
    }

    /// Rimuove il messaggio `message_id` per conto di `user_id`.
    ///
    /// Può rimuovere un admin della conversazione oppure l'autore del messaggio. In caso di
    /// errore la lista dei messaggi resta invariata.
    pub fn remove_message(
        &mut self,
        user_id: &str,
        message_id: &str,
    ) -> Result<Message, ConversationError> {
        let position = self.messages.iter().position(|msg| msg.id == message_id);
        let is_author = position.is_some_and(|index| self.messages[index].user_id == user_id);

        if !self.is_admin(user_id) && !is_author {
            return Err(ConversationError::PermissionDenied);
        }

        match position {
            Some(index) => Ok(self.messages.remove(index)),
            None => Err(ConversationError::MessageNotFound),
        }
    }

    /// Nome del file aggiunto da un upload: il primo presente in `updated` ma non in `self`.
    /// Se non si riesce a distinguerlo si usa l'ultimo, come fa il backend quando accoda.
    pub fn added_photo<'a>(&self, updated: &'a Conversation) -> Option<&'a str> {
        updated
            .message_photos
            .iter()
            .find(|photo| !self.message_photos.contains(photo))
            .or_else(|| updated.message_photos.last())
            .map(String::as_str)
    }
}
