pub mod conversation;
pub mod message;
pub mod user;

// Re-export per comodità
pub use conversation::Conversation;
pub use message::{ContentType, Message};
pub use user::User;

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

/// Nomi delle collection sul backend.
pub const USERS: &str = "users";
pub const CONVERSATIONS: &str = "conversations";

/// PocketBase serializza i campi json/relation vuoti come `null`: li trattiamo come default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Lista json in cui gli elementi illeggibili (es. un `contentType` sconosciuto) vengono
/// scartati invece di far fallire tutto il record. `null` vale lista vuota.
pub(crate) fn skip_malformed<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}
