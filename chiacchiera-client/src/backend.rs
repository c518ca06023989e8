use async_trait::async_trait;
use chiacchiera_core::{Conversation, Filter, RecordEvent, Topic};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{auth_store::AuthStore, error::ClientError};

/// Quello che gli store reattivi usano del backend.
///
/// `PocketBase` è l'implementazione reale; i test ne usano una in memoria.
#[async_trait]
pub trait Backend: Send + Sync {
    fn auth_store(&self) -> &AuthStore;

    /// Tutte le conversazioni visibili, dalla più recente.
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ClientError>;

    /// Record grezzi della collection utenti che soddisfano `filter`.
    async fn list_users(&self, filter: &Filter) -> Result<Vec<Value>, ClientError>;

    async fn subscribe(&self, topic: Topic) -> Result<Subscription, ClientError>;
}

/// Iscrizione attiva a un topic realtime.
///
/// La disiscrizione avviene una sola volta: esplicitamente con [`Subscription::unsubscribe`]
/// oppure quando la `Subscription` viene droppata.
pub struct Subscription {
    topic: String,
    events: mpsc::UnboundedReceiver<RecordEvent>,
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(
        topic: impl Into<String>,
        events: mpsc::UnboundedReceiver<RecordEvent>,
        teardown: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            topic: topic.into(),
            events,
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Prossimo evento nell'ordine di consegna; `None` quando il canale è chiuso.
    pub async fn next(&mut self) -> Option<RecordEvent> {
        self.events.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            self.events.close();
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("active", &self.teardown.is_some())
            .finish()
    }
}
