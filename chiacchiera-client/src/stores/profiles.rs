use std::collections::HashMap;

use chiacchiera_core::{Conversation, Filter, User};
use tokio::sync::watch;
use tracing::{debug, error};

use super::{
    conversations::ConversationList,
    derived::{derived_newtype, Derived},
    session::{same_handle, SessionHandle, SessionHolder},
};

pub type Profiles = HashMap<String, User>;

/// Profili degli utenti che compaiono come membri nelle conversazioni visibili.
///
/// Cresce soltanto: i profili scaricati restano finché dura l'handle di sessione.
pub struct ProfileCache(Derived<Profiles>);

derived_newtype!(ProfileCache, Profiles);

impl ProfileCache {
    pub fn spawn(session: &SessionHolder, conversations: &ConversationList) -> Self {
        let mut sessions = session.watch();
        let mut conversations = conversations.watch();

        Self(Derived::spawn(Profiles::new(), move |tx| async move {
            let mut state = CacheState::default();
            let mut handle = sessions.borrow_and_update().clone();
            let mut visible = conversations.borrow_and_update().clone();
            loop {
                state.recompute(handle.clone(), visible.clone(), &tx).await;

                tokio::select! {
                    biased;
                    changed = sessions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        handle = sessions.borrow_and_update().clone();
                        // la lista corrente è ancora quella del vecchio handle
                        visible = None;
                    }
                    changed = conversations.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        visible = conversations.borrow_and_update().clone();
                    }
                }
            }
        }))
    }
}

#[derive(Default)]
struct CacheState {
    handle: Option<SessionHandle>,
    /// Id mancanti calcolati l'ultima volta: se non cambiano non si rifà la richiesta.
    previous: Option<Vec<String>>,
}

impl CacheState {
    async fn recompute(
        &mut self,
        handle: Option<SessionHandle>,
        conversations: Option<Vec<Conversation>>,
        tx: &watch::Sender<Profiles>,
    ) {
        if !same_handle(&self.handle, &handle) {
            self.handle = handle.clone();
            self.previous = None;
            tx.send_if_modified(clear);
        }

        let (Some(handle), Some(conversations)) = (handle, conversations) else {
            return;
        };
        let Some(own_id) = handle
            .auth_store()
            .model()
            .and_then(|model| model.get("id")?.as_str().map(str::to_string))
        else {
            tx.send_if_modified(clear);
            return;
        };

        let missing = missing_members(&tx.borrow(), &conversations, &own_id);
        if missing.is_empty() || self.previous.as_ref() == Some(&missing) {
            return;
        }
        self.previous = Some(missing.clone());

        let ids = missing.iter().map(|id| Filter::eq("id", id.as_str()));
        let Some(filter) = Filter::any(ids) else {
            return;
        };
        debug!("fetching {} member profiles", missing.len());

        match handle.list_users(&filter).await {
            Ok(records) => {
                let users: Vec<User> = records.iter().filter_map(User::validate).collect();
                tx.send_modify(|profiles| {
                    for user in users {
                        profiles.insert(user.id.clone(), user);
                    }
                });
            }
            Err(e) => {
                error!("member profiles fetch failed: {e}");
                // al prossimo ricalcolo si riprova
                self.previous = None;
            }
        }
    }
}

fn clear(profiles: &mut Profiles) -> bool {
    if profiles.is_empty() {
        return false;
    }
    profiles.clear();
    true
}

/// Membri delle conversazioni ancora da scaricare, in ordine di apparizione e senza
/// duplicati; esclude l'utente corrente e chi è già in cache.
pub fn missing_members(
    cached: &Profiles,
    conversations: &[Conversation],
    own_id: &str,
) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for member in conversations.iter().flat_map(|c| c.members.iter()) {
        if member != own_id && !cached.contains_key(member) && !missing.contains(member) {
            missing.push(member.clone());
        }
    }
    missing
}
