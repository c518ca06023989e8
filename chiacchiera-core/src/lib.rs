//! chiacchiera-core: tipi condivisi tra client e server
//! (modelli, filtri, DTO HTTP e realtime, errori).
//! Niente I/O: qui vivono solo le regole sui dati.

pub mod error;
pub mod filter;
pub mod models;
pub mod protocol;
pub mod utils;

// Re-export utili per ridurre i percorsi nei crate client/server
pub use error::{ApiError, ConversationError};
pub use filter::Filter;
pub use models::{
    conversation::{Conversation, MAX_MESSAGES},
    message::{ContentType, Message},
    user::User,
    CONVERSATIONS, USERS,
};
pub use protocol::http::{
    ActionFailure, AuthResponse, ConversationPatch, CreateUserRequest, ListResult, LoginForm,
    PasswordAuthRequest, RemoveMessageForm, SendMessageForm, SignupForm,
};
pub use protocol::realtime::{ConnectEvent, RecordAction, RecordEvent, SubscriptionRequest, Topic};
pub use utils::{new_message_id, now_timestamp};
