pub mod http;
pub mod realtime;

// Re-export comodi
pub use http::{
    ActionFailure, AuthResponse, ConversationPatch, CreateUserRequest, ListResult, LoginForm,
    PasswordAuthRequest, RemoveMessageForm, SendMessageForm, SignupForm,
};
pub use realtime::{ConnectEvent, RecordAction, RecordEvent, SubscriptionRequest, Topic};
