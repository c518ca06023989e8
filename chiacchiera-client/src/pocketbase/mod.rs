//! Client HTTP del backend (PocketBase): record REST, auth, realtime.

pub mod realtime;
pub mod records;

use async_trait::async_trait;
use chiacchiera_core::{
    ApiError, AuthResponse, Conversation, Filter, PasswordAuthRequest, Topic, CONVERSATIONS, USERS,
};
use reqwest::{header::AUTHORIZATION, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::{
    auth_store::AuthStore,
    backend::{Backend, Subscription},
    error::ClientError,
};
pub use realtime::Realtime;
pub use records::{ListOptions, RecordService};

/// Handle verso un'istanza del backend. I cloni condividono auth store e connessione realtime.
#[derive(Debug, Clone)]
pub struct PocketBase {
    base_url: Url,
    http: reqwest::Client,
    auth: AuthStore,
    realtime: Realtime,
}

impl PocketBase {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_http(base_url, reqwest::Client::new())
    }

    /// Come [`PocketBase::new`] ma riusando un client HTTP (e il suo pool di connessioni).
    pub fn with_http(base_url: &str, http: reqwest::Client) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        let auth = AuthStore::new();
        let realtime = Realtime::new(base_url.clone(), http.clone(), auth.clone());
        Ok(Self {
            base_url,
            http,
            auth,
            realtime,
        })
    }

    pub fn auth_store(&self) -> &AuthStore {
        &self.auth
    }

    pub fn realtime(&self) -> &Realtime {
        &self.realtime
    }

    pub fn collection<'a>(&'a self, name: &'a str) -> RecordService<'a> {
        RecordService::new(self, name)
    }

    /// Autenticazione come amministratore: le scritture fatte con questo handle ignorano
    /// le regole delle collection.
    pub async fn admin_auth_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ClientError> {
        let body = PasswordAuthRequest {
            identity: email.to_string(),
            password: password.to_string(),
        };
        let request = self
            .request(Method::POST, &["api", "admins", "auth-with-password"])
            .json(&body);
        let auth: AuthResponse = send_json(request).await?;
        self.auth.save(auth.token.clone(), auth.record.clone());
        Ok(auth)
    }

    pub(crate) fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        authorized(self.http.request(method, endpoint(&self.base_url, segments)), &self.auth)
    }
}

/// Url dell'endpoint: ogni segmento viene codificato, quindi un id non può uscire dal suo path.
pub(crate) fn endpoint(base_url: &Url, segments: &[&str]) -> Url {
    let mut url = base_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

pub(crate) fn authorized(request: RequestBuilder, auth: &AuthStore) -> RequestBuilder {
    match auth.token() {
        Some(token) => request.header(AUTHORIZATION, token),
        None => request,
    }
}

/// Fallisce con [`ClientError::Api`] se lo status non è 2xx.
pub(crate) async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error = serde_json::from_str::<ApiError>(&body).unwrap_or_else(|_| ApiError {
        code: status.as_u16(),
        message: body,
        data: Value::Null,
    });
    Err(ClientError::Api {
        status: status.as_u16(),
        error,
    })
}

pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, ClientError> {
    let response = check(request.send().await?).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl Backend for PocketBase {
    fn auth_store(&self) -> &AuthStore {
        &self.auth
    }

    /// I record che non si leggono come conversazione vengono saltati.
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ClientError> {
        let records: Vec<Value> = self
            .collection(CONVERSATIONS)
            .get_full_list(&ListOptions::sorted("-created"))
            .await?;

        Ok(records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<Conversation>(record) {
                Ok(conversation) => Some(conversation),
                Err(e) => {
                    warn!("skipping conversation record: {e}");
                    None
                }
            })
            .collect())
    }

    async fn list_users(&self, filter: &Filter) -> Result<Vec<Value>, ClientError> {
        self.collection(USERS)
            .get_full_list(&ListOptions::default().filter(filter.clone()))
            .await
    }

    async fn subscribe(&self, topic: Topic) -> Result<Subscription, ClientError> {
        self.realtime.subscribe(&topic.to_string()).await
    }
}
