//! Canale realtime del backend.
//!
//! Una sola connessione SSE per handle, aperta alla prima iscrizione e chiusa quando
//! l'ultimo listener se ne va. Il backend identifica la connessione con il `clientId`
//! ricevuto nell'evento `PB_CONNECT`; l'elenco dei topic viene ridichiarato con una POST
//! a ogni cambio e a ogni riconnessione.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chiacchiera_core::{
    protocol::realtime::CONNECT_EVENT, ConnectEvent, RecordEvent, SubscriptionRequest,
};
use dashmap::DashMap;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use parking_lot::Mutex;
use reqwest::{header::ACCEPT, Url};
use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{sleep, timeout},
};
use tracing::{debug, info, warn};

use super::{authorized, check, endpoint};
use crate::{auth_store::AuthStore, backend::Subscription, error::ClientError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct Realtime {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: Url,
    http: reqwest::Client,
    auth: AuthStore,
    /// topic -> listener iscritti
    listeners: DashMap<String, Vec<Listener>>,
    /// `clientId` dell'ultima connessione; `None` mentre ci si (ri)connette.
    client_id: watch::Sender<Option<String>>,
    connection: Mutex<Option<JoinHandle<()>>>,
    next_listener: AtomicU64,
}

struct Listener {
    id: u64,
    tx: mpsc::UnboundedSender<RecordEvent>,
}

impl Realtime {
    pub(crate) fn new(base_url: Url, http: reqwest::Client, auth: AuthStore) -> Self {
        let (client_id, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                base_url,
                http,
                auth,
                listeners: DashMap::new(),
                client_id,
                connection: Mutex::new(None),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// Topic con almeno un listener.
    pub fn topics(&self) -> Vec<String> {
        self.inner.topics()
    }

    pub async fn subscribe(&self, topic: &str) -> Result<Subscription, ClientError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .entry(topic.to_string())
            .or_default()
            .push(Listener { id, tx });

        // se la connessione fallisce il drop della subscription toglie anche il listener
        let inner = Arc::clone(&self.inner);
        let owned_topic = topic.to_string();
        let subscription =
            Subscription::new(topic, rx, move || inner.remove_listener(&owned_topic, id));

        let client_id = self.inner.connect().await?;
        self.inner.submit(&client_id).await?;
        debug!("subscribed to {topic}");
        Ok(subscription)
    }
}

impl fmt::Debug for Realtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realtime")
            .field("base_url", &self.inner.base_url.as_str())
            .field("topics", &self.topics())
            .finish()
    }
}

impl Inner {
    fn topics(&self) -> Vec<String> {
        self.listeners.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Avvia la connessione se non è attiva e aspetta il `clientId`.
    async fn connect(self: &Arc<Self>) -> Result<String, ClientError> {
        {
            let mut connection = self.connection.lock();
            let running = connection.as_ref().is_some_and(|task| !task.is_finished());
            if !running {
                info!("opening realtime connection to {}", self.base_url);
                *connection = Some(tokio::spawn(Arc::clone(self).run()));
            }
        }

        let mut client_id = self.client_id.subscribe();
        let ready = match timeout(CONNECT_TIMEOUT, client_id.wait_for(Option::is_some)).await {
            Ok(Ok(id)) => id.clone(),
            Ok(Err(_)) => None,
            Err(_) => {
                return Err(ClientError::Realtime(
                    "timed out waiting for PB_CONNECT".to_string(),
                ))
            }
        };
        ready.ok_or_else(|| ClientError::Realtime("realtime connection dropped".to_string()))
    }

    async fn run(self: Arc<Self>) {
        loop {
            self.client_id.send_replace(None);
            match self.read_stream().await {
                Ok(()) => debug!("realtime stream ended"),
                Err(e) => warn!("realtime stream failed: {e}"),
            }
            if self.listeners.is_empty() {
                break;
            }
            sleep(RECONNECT_DELAY).await;
        }
        info!("realtime connection closed");
    }

    async fn read_stream(self: &Arc<Self>) -> Result<(), ClientError> {
        let request = self
            .http
            .get(endpoint(&self.base_url, &["api", "realtime"]))
            .header(ACCEPT, "text/event-stream");
        let response = check(request.send().await?).await?;

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| ClientError::Realtime(e.to_string()))?;

            if event.event == CONNECT_EVENT {
                let connect: ConnectEvent = serde_json::from_str(&event.data)?;
                debug!("realtime connected as {}", connect.client_id);
                // dopo una riconnessione il backend non ricorda più i topic
                if !self.listeners.is_empty() {
                    self.submit(&connect.client_id).await?;
                }
                self.client_id.send_replace(Some(connect.client_id));
                continue;
            }

            self.dispatch(&event.event, &event.data);
        }
        Ok(())
    }

    fn dispatch(&self, topic: &str, data: &str) {
        let event: RecordEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                warn!("skipping malformed realtime event on {topic}: {e}");
                return;
            }
        };

        if let Some(mut listeners) = self.listeners.get_mut(topic) {
            listeners.retain(|listener| listener.tx.send(event.clone()).is_ok());
        }
    }

    /// Dichiara al backend l'elenco corrente dei topic.
    async fn submit(&self, client_id: &str) -> Result<(), ClientError> {
        let body = SubscriptionRequest {
            client_id: client_id.to_string(),
            subscriptions: self.topics(),
        };
        let request = self
            .http
            .post(endpoint(&self.base_url, &["api", "realtime"]))
            .json(&body);
        check(authorized(request, &self.auth).send().await?).await?;
        Ok(())
    }

    fn remove_listener(self: &Arc<Self>, topic: &str, id: u64) {
        if let Some(mut listeners) = self.listeners.get_mut(topic) {
            listeners.retain(|listener| listener.id != id);
        }
        self.listeners.remove_if(topic, |_, listeners| listeners.is_empty());
        debug!("unsubscribed from {topic}");

        if self.listeners.is_empty() {
            self.disconnect();
            return;
        }

        let client_id = self.client_id.borrow().clone();
        if let (Some(client_id), Ok(runtime)) = (client_id, Handle::try_current()) {
            let inner = Arc::clone(self);
            runtime.spawn(async move {
                if let Err(e) = inner.submit(&client_id).await {
                    warn!("failed to update realtime subscriptions: {e}");
                }
            });
        }
    }

    fn disconnect(&self) {
        let mut connection = self.connection.lock();
        // un subscribe concorrente potrebbe aver già aggiunto un listener
        if !self.listeners.is_empty() {
            return;
        }
        if let Some(task) = connection.take() {
            task.abort();
        }
        self.client_id.send_replace(None);
    }
}
