//! Store reattivi lato client.
//!
//! Catena di dipendenze: [`SessionHolder`] → [`UserProjection`], [`ConversationList`]
//! → [`ProfileCache`]. Ogni store è un task con il proprio ultimo valore in un canale
//! `watch`; gli eventi realtime arrivano sulle `Subscription` possedute dal task.

pub mod conversations;
pub mod derived;
pub mod profiles;
pub mod session;
pub mod user;

pub use conversations::ConversationList;
pub use derived::Derived;
pub use profiles::{ProfileCache, Profiles};
pub use session::{ExecutionContext, SessionHandle, SessionHolder};
pub use user::UserProjection;

/// Tutti gli store della chat, collegati allo stesso Session Holder.
pub struct ChatStores {
    pub user: UserProjection,
    pub conversations: ConversationList,
    pub profiles: ProfileCache,
}

impl ChatStores {
    pub fn spawn(session: &SessionHolder) -> Self {
        let user = UserProjection::spawn(session);
        let conversations = ConversationList::spawn(session);
        let profiles = ProfileCache::spawn(session, &conversations);
        Self {
            user,
            conversations,
            profiles,
        }
    }
}
