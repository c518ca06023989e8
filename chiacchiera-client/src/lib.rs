//! chiacchiera-client: client del backend (record REST, auth con cookie, canale realtime)
//! e store reattivi che tengono sincronizzati utente, conversazioni e profili dei membri.

pub mod auth_store;
pub mod backend;
pub mod error;
pub mod pocketbase;
pub mod stores;

pub use auth_store::{AuthStore, CookieOptions, COOKIE_NAME};
pub use backend::{Backend, Subscription};
pub use error::ClientError;
pub use pocketbase::{ListOptions, PocketBase};
pub use stores::{
    ChatStores, ConversationList, ExecutionContext, ProfileCache, SessionHolder, UserProjection,
};
