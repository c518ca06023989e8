use chiacchiera_core::{Conversation, RecordAction, RecordEvent, Topic, CONVERSATIONS};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::{
    derived::{derived_newtype, for_each_session, Derived},
    session::{ExecutionContext, SessionHandle, SessionHolder},
};
use crate::backend::Subscription;

/// Conversazioni visibili all'utente, dalla più recente. `None` finché non c'è un utente
/// valido o il primo fetch non è arrivato.
pub struct ConversationList(Derived<Option<Vec<Conversation>>>);

derived_newtype!(ConversationList, Option<Vec<Conversation>>);

impl ConversationList {
    pub fn spawn(session: &SessionHolder) -> Self {
        let context = session.context();
        let sessions = session.watch();

        Self(Derived::spawn(None, move |tx| async move {
            let tx = &tx;
            for_each_session(sessions, |handle| follow_conversations(context, handle, tx)).await;
        }))
    }
}

/// Applica un evento realtime alla lista.
///
/// `create` mette in testa, `delete` toglie ogni record con quell'id, `update` sostituisce
/// sul posto solo se il record è già in lista.
pub fn apply_event(conversations: &mut Vec<Conversation>, event: RecordEvent) {
    let action = event.action;
    if action == RecordAction::Delete {
        if let Some(id) = event.record_id() {
            conversations.retain(|conversation| conversation.id != id);
        }
        return;
    }

    let record = match event.decode::<Conversation>() {
        Ok(event) => event.record,
        Err(e) => {
            warn!("skipping conversation event: {e}");
            return;
        }
    };

    if action == RecordAction::Create {
        conversations.insert(0, record);
    } else if let Some(existing) = conversations.iter_mut().find(|c| c.id == record.id) {
        *existing = record;
    }
}

async fn follow_conversations(
    context: ExecutionContext,
    handle: Option<SessionHandle>,
    tx: &watch::Sender<Option<Vec<Conversation>>>,
) {
    tx.send_replace(None);
    let Some(handle) = handle.filter(|_| context.is_client()) else {
        return;
    };
    if handle.auth_store().user().is_none() {
        return;
    }

    // prima l'iscrizione e poi il fetch, così nessun evento va perso: quelli che arrivano
    // prima del fetch vengono accodati e riapplicati sopra il suo risultato
    let mut subscription = match handle.subscribe(Topic::collection(CONVERSATIONS)).await {
        Ok(subscription) => Some(subscription),
        Err(e) => {
            warn!("cannot follow conversations: {e}");
            None
        }
    };

    let fetch = handle.list_conversations();
    tokio::pin!(fetch);
    let mut buffered: Vec<RecordEvent> = Vec::new();
    let mut fetched = false;

    loop {
        tokio::select! {
            result = &mut fetch, if !fetched => {
                fetched = true;
                let mut conversations = result.unwrap_or_else(|e| {
                    error!("initial conversations fetch failed: {e}");
                    Vec::new()
                });
                debug!(
                    "fetched {} conversations, replaying {} buffered events",
                    conversations.len(),
                    buffered.len()
                );
                for event in buffered.drain(..) {
                    apply_event(&mut conversations, event);
                }
                tx.send_replace(Some(conversations));
            }
            event = next_event(&mut subscription) => match event {
                Some(event) if fetched => {
                    tx.send_modify(|conversations| {
                        if let Some(conversations) = conversations {
                            apply_event(conversations, event);
                        }
                    });
                }
                Some(event) => buffered.push(event),
                None => {
                    subscription = None;
                    if fetched {
                        return;
                    }
                }
            },
        }
    }
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<RecordEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}
