use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::{backend::Backend, error::ClientError, pocketbase::PocketBase};

/// Handle autenticato condiviso dagli store.
pub type SessionHandle = Arc<dyn Backend>;

/// Dove gira il codice: solo lato client gli store si collegano al realtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    Client,
    Server,
}

impl ExecutionContext {
    pub fn is_client(self) -> bool {
        self == ExecutionContext::Client
    }
}

/// Tiene l'handle corrente verso il backend e lo pubblica agli store derivati.
pub struct SessionHolder {
    context: ExecutionContext,
    handle: watch::Sender<Option<SessionHandle>>,
}

impl SessionHolder {
    pub fn new(context: ExecutionContext) -> Self {
        let (handle, _) = watch::channel(None);
        Self { context, handle }
    }

    /// Crea l'handle leggendo la sessione persistita nel cookie. Lato server non fa nulla.
    pub fn connect(
        context: ExecutionContext,
        base_url: &str,
        cookie_header: &str,
    ) -> Result<Self, ClientError> {
        let holder = Self::new(context);
        if context.is_client() {
            let client = PocketBase::new(base_url)?;
            client.auth_store().load_from_cookie(cookie_header);
            info!(
                "session loaded from cookie (authenticated: {})",
                client.auth_store().is_valid()
            );
            holder.replace(Some(Arc::new(client)));
        }
        Ok(holder)
    }

    pub fn with_backend(context: ExecutionContext, backend: SessionHandle) -> Self {
        let holder = Self::new(context);
        holder.replace(Some(backend));
        holder
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    pub fn current(&self) -> Option<SessionHandle> {
        self.handle.borrow().clone()
    }

    /// Nuovo handle dopo login/logout; `None` toglie la sessione.
    pub fn replace(&self, handle: Option<SessionHandle>) {
        if !self.context.is_client() {
            debug!("ignoring session handle outside the client context");
            return;
        }
        self.handle.send_replace(handle);
    }

    pub fn watch(&self) -> watch::Receiver<Option<SessionHandle>> {
        self.handle.subscribe()
    }
}

/// Stesso handle (stessa istanza), a prescindere dal tipo concreto.
pub(crate) fn same_handle(a: &Option<SessionHandle>, b: &Option<SessionHandle>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        (None, None) => true,
        _ => false,
    }
}
