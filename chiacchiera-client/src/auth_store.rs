//! Stato di autenticazione di un handle verso il backend.
//!
//! `AuthStore` è l'unico proprietario di token e record utente: chi deve cambiarli
//! (login, refresh, store reattivi) passa da `save`, `save_record` e `clear`.
//! I cloni condividono lo stesso stato.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chiacchiera_core::User;
use cookie::{Cookie, SameSite};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Nome del cookie che trasporta la sessione.
pub const COOKIE_NAME: &str = "pb_auth";

/// Oltre questa dimensione i browser scartano il cookie.
const MAX_COOKIE_SIZE: usize = 4096;

/// Campi del record tenuti nel cookie quando quello completo non ci sta.
const REDUCED_MODEL_FIELDS: [&str; 6] = [
    "id",
    "email",
    "username",
    "verified",
    "collectionId",
    "collectionName",
];

/// Attributi del cookie di sessione.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            secure: true,
            http_only: true,
            same_site: SameSite::Strict,
            path: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthState {
    #[serde(default)]
    token: String,
    #[serde(default)]
    model: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthStore {
    state: Arc<RwLock<AuthState>>,
}

impl AuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<String> {
        let state = self.state.read();
        (!state.token.is_empty()).then(|| state.token.clone())
    }

    /// Record grezzo dell'utente (o dell'admin) autenticato.
    pub fn model(&self) -> Option<Value> {
        self.state.read().model.clone()
    }

    /// Record autenticato passato dal controllo di forma.
    pub fn user(&self) -> Option<User> {
        self.state.read().model.as_ref().and_then(User::validate)
    }

    /// Token presente e non scaduto.
    pub fn is_valid(&self) -> bool {
        let state = self.state.read();
        !state.token.is_empty() && !is_token_expired(&state.token)
    }

    pub fn save(&self, token: impl Into<String>, model: Value) {
        *self.state.write() = AuthState {
            token: token.into(),
            model: (!model.is_null()).then_some(model),
        };
    }

    /// Sostituisce il record mantenendo il token.
    pub fn save_record(&self, model: Value) {
        self.state.write().model = (!model.is_null()).then_some(model);
    }

    pub fn clear(&self) {
        *self.state.write() = AuthState::default();
    }

    /// Carica la sessione dall'header `Cookie`. Un cookie assente o illeggibile svuota lo store.
    pub fn load_from_cookie(&self, header: &str) {
        let state = Cookie::split_parse_encoded(header)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == COOKIE_NAME)
            .and_then(|cookie| serde_json::from_str::<AuthState>(cookie.value()).ok())
            .unwrap_or_default();

        *self.state.write() = state;
    }

    /// Valore per `Set-Cookie`. Lo store vuoto produce un cookie già scaduto, così il
    /// browser dimentica la sessione.
    pub fn export_to_cookie(&self, options: &CookieOptions) -> String {
        let state = self.state.read().clone();
        let expires = token_expiry(&state.token).unwrap_or(OffsetDateTime::UNIX_EPOCH);

        let cookie = build_cookie(&state, expires, options);
        if cookie.len() <= MAX_COOKIE_SIZE {
            return cookie;
        }

        let reduced = AuthState {
            token: state.token.clone(),
            model: state.model.as_ref().map(reduce_model),
        };
        build_cookie(&reduced, expires, options)
    }
}

fn build_cookie(state: &AuthState, expires: OffsetDateTime, options: &CookieOptions) -> String {
    let value = serde_json::to_string(state).unwrap_or_default();

    Cookie::build((COOKIE_NAME, value))
        .path(options.path.clone())
        .secure(options.secure)
        .http_only(options.http_only)
        .same_site(options.same_site)
        .expires(expires)
        .build()
        .encoded()
        .to_string()
}

fn reduce_model(model: &Value) -> Value {
    let reduced: Map<String, Value> = REDUCED_MODEL_FIELDS
        .iter()
        .filter_map(|field| model.get(*field).map(|v| (field.to_string(), v.clone())))
        .collect();
    Value::Object(reduced)
}

/// Payload (claims) del JWT, senza verifica della firma: serve solo a leggere `exp`.
fn token_payload(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn token_expiry(token: &str) -> Option<OffsetDateTime> {
    let exp = token_payload(token)?.get("exp")?.as_i64()?;
    OffsetDateTime::from_unix_timestamp(exp).ok()
}

/// Un token senza `exp` leggibile è considerato scaduto.
pub fn is_token_expired(token: &str) -> bool {
    match token_expiry(token) {
        Some(exp) => exp <= OffsetDateTime::now_utc(),
        None => true,
    }
}
