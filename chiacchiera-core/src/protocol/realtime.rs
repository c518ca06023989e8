/* Questo file definisce cosa viaggia sul canale realtime (SSE) del backend:
    PB_CONNECT -> primo evento, porta il clientId della connessione
    SubscriptionRequest -> POST che dichiara i topic a cui il client è iscritto
    RecordEvent -> evento create/update/delete, il nome dell'evento SSE è il topic
*/
use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// Nome dell'evento SSE di handshake.
pub const CONNECT_EVENT: &str = "PB_CONNECT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectEvent {
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub client_id: String,
    pub subscriptions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    Create,
    Update,
    Delete,
}

/// Evento su un record. Di default il record resta json grezzo, [`RecordEvent::decode`]
/// lo converte nel modello.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEvent<T = Value> {
    pub action: RecordAction,
    pub record: T,
}

impl RecordEvent<Value> {
    pub fn decode<T: DeserializeOwned>(self) -> Result<RecordEvent<T>, serde_json::Error> {
        Ok(RecordEvent {
            action: self.action,
            record: serde_json::from_value(self.record)?,
        })
    }

    /// Id del record, se presente.
    pub fn record_id(&self) -> Option<&str> {
        self.record.get("id").and_then(Value::as_str)
    }
}

/// Topic di iscrizione: un singolo record oppure tutta la collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Record { collection: String, id: String },
    Collection(String),
}

impl Topic {
    pub fn record(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Topic::Record {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(collection: impl Into<String>) -> Self {
        Topic::Collection(collection.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Record { collection, id } => write!(f, "{collection}/{id}"),
            Topic::Collection(collection) => write!(f, "{collection}/*"),
        }
    }
}
