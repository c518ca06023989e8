//! chiacchiera-server: action dei form della chat sopra il backend.
//!
//! Ogni richiesta ottiene due handle: quello dell'utente, ricostruito dal cookie
//! `pb_auth`, usato per leggere con i suoi permessi, e quello amministrativo condiviso,
//! usato per le scritture.

use std::sync::Arc;

use anyhow::Context;
use chiacchiera_client::{ClientError, PocketBase};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub mod config;
pub mod controllers;
pub mod error;
pub mod routes;
pub mod session;

use config::Config;

pub struct AppState {
    pub config: Config,
    /// Pool di connessioni condiviso da tutti gli handle
    pub http: reqwest::Client,
    pub admin: AdminSession,
}

impl AppState {
    /// Crea lo stato e autentica la sessione amministrativa: senza di essa il server
    /// non può scrivere nulla, quindi un errore qui interrompe l'avvio.
    pub async fn connect(config: Config) -> anyhow::Result<Arc<Self>> {
        let http = reqwest::Client::new();
        let admin = AdminSession::new(&config, http.clone()).context("create admin client")?;
        admin
            .authenticate()
            .await
            .context("authenticate admin session")?;
        info!("admin session ready on {}", config.pocketbase_url);

        Ok(Arc::new(Self {
            config,
            http,
            admin,
        }))
    }

    /// Handle per una singola richiesta, ancora senza credenziali.
    pub fn user_client(&self) -> Result<PocketBase, ClientError> {
        PocketBase::with_http(&self.config.pocketbase_url, self.http.clone())
    }
}

/// Handle amministrativo condiviso, riautenticato quando il token scade.
pub struct AdminSession {
    client: PocketBase,
    email: String,
    password: String,
    login: Mutex<()>,
}

impl AdminSession {
    fn new(config: &Config, http: reqwest::Client) -> Result<Self, ClientError> {
        Ok(Self {
            client: PocketBase::with_http(&config.pocketbase_url, http)?,
            email: config.admin_email.clone(),
            password: config.admin_password.clone(),
            login: Mutex::new(()),
        })
    }

    async fn authenticate(&self) -> Result<(), ClientError> {
        self.client
            .admin_auth_with_password(&self.email, &self.password)
            .await?;
        Ok(())
    }

    pub async fn client(&self) -> Result<PocketBase, ClientError> {
        if !self.client.auth_store().is_valid() {
            let _login = self.login.lock().await;
            // un'altra richiesta può aver già rifatto il login mentre aspettavamo
            if !self.client.auth_store().is_valid() {
                warn!("admin token expired, authenticating again");
                self.authenticate().await?;
            }
        }
        Ok(self.client.clone())
    }
}
