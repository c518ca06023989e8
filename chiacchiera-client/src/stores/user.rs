use chiacchiera_core::{RecordAction, Topic, User, USERS};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{
    derived::{derived_newtype, for_each_session, Derived},
    session::{ExecutionContext, SessionHandle, SessionHolder},
};

/// Profilo dell'utente autenticato, aggiornato dagli eventi sul suo record.
pub struct UserProjection(Derived<Option<User>>);

derived_newtype!(UserProjection, Option<User>);

impl UserProjection {
    pub fn spawn(session: &SessionHolder) -> Self {
        let context = session.context();
        let sessions = session.watch();

        Self(Derived::spawn(None, move |tx| async move {
            let tx = &tx;
            for_each_session(sessions, |handle| follow_user(context, handle, tx)).await;
        }))
    }
}

async fn follow_user(
    context: ExecutionContext,
    handle: Option<SessionHandle>,
    tx: &watch::Sender<Option<User>>,
) {
    let Some(handle) = handle.filter(|_| context.is_client()) else {
        tx.send_replace(None);
        return;
    };
    let auth = handle.auth_store();
    let Some(user) = auth.user() else {
        tx.send_replace(None);
        return;
    };

    let topic = Topic::record(USERS, &user.id);
    tx.send_replace(Some(user));

    let mut subscription = match handle.subscribe(topic.clone()).await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!("cannot follow {topic}: {e}");
            return;
        }
    };
    debug!("following {topic}");

    while let Some(event) = subscription.next().await {
        match event.action {
            RecordAction::Delete => {
                auth.clear();
                tx.send_replace(None);
            }
            RecordAction::Create | RecordAction::Update => {
                auth.save_record(event.record);
                tx.send_replace(auth.user());
            }
        }
    }
}
