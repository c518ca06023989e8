use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use chiacchiera_client::PocketBase;
use chiacchiera_core::{User, USERS};
use tracing::{debug, error, warn};

use crate::AppState;

/// Handle del backend legati alla richiesta corrente.
#[derive(Clone)]
pub struct RequestSession {
    /// Credenziali dell'utente: letture soggette alle regole delle collection.
    pub user: PocketBase,
    /// Credenziali amministrative: scritture privilegiate.
    pub admin: PocketBase,
}

/// Middleware di sessione: carica il cookie, rinnova il token, prepara l'handle admin
/// e alla fine riscrive il cookie con lo stato aggiornato.
pub async fn load_session(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match state.user_client() {
        Ok(user) => user,
        Err(e) => {
            error!("cannot create backend client: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cookies = request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    user.auth_store().load_from_cookie(&cookies);
    refresh(&user).await;

    // senza sessione admin nessuna action può scrivere: la richiesta si ferma qui
    let admin = match state.admin.client().await {
        Ok(admin) => admin,
        Err(e) => {
            error!("admin session unavailable: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let auth = user.auth_store().clone();
    request.extensions_mut().insert(RequestSession { user, admin });

    let mut response = next.run(request).await;

    let cookie = auth.export_to_cookie(&state.config.cookie);
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => warn!("cannot set session cookie: {e}"),
    }
    response
}

async fn refresh(user: &PocketBase) {
    let auth = user.auth_store();
    if auth.token().is_none() {
        return;
    }
    if !auth.is_valid() {
        debug!("session token expired");
        auth.clear();
        return;
    }

    if let Err(e) = user.collection(USERS).auth_refresh().await {
        warn!("session refresh failed: {e}");
        auth.clear();
    }
}

/// Utente autenticato della richiesta; senza utente valido si va al login.
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestSession>()
            .and_then(|session| session.user.auth_store().user())
            .map(CurrentUser)
            .ok_or_else(|| Redirect::to("/login"))
    }
}
