use std::future::Future;

use tokio::{sync::watch, task::JoinHandle};

use super::session::SessionHandle;

/// Valore derivato, ricalcolato da un task quando cambiano i suoi input.
///
/// L'ultimo valore resta leggibile con [`Derived::get`]; [`Derived::watch`] permette di
/// osservarne i cambi. Il drop ferma il task e con lui tutte le iscrizioni che possiede.
pub struct Derived<T> {
    value: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn spawn<F, Fut>(initial: T, run: F) -> Self
    where
        F: FnOnce(watch::Sender<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, value) = watch::channel(initial);
        let task = tokio::spawn(run(tx));
        Self { value, task }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<T> {
        self.value.clone()
    }
}

impl<T> Drop for Derived<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Implementa `Deref<Target = Derived<T>>` per i newtype degli store.
macro_rules! derived_newtype {
    ($name:ident, $value:ty) => {
        impl std::ops::Deref for $name {
            type Target = $crate::stores::derived::Derived<$value>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}
pub(crate) use derived_newtype;

/// Esegue `activate` per ogni handle pubblicato dal Session Holder.
///
/// Il future di un'attivazione possiede le sue iscrizioni: quando l'handle cambia viene
/// droppato (teardown) prima di partire con l'attivazione successiva.
pub(crate) async fn for_each_session<F, Fut>(
    mut sessions: watch::Receiver<Option<SessionHandle>>,
    mut activate: F,
) where
    F: FnMut(Option<SessionHandle>) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let handle = sessions.borrow_and_update().clone();
        let activation = activate(handle);

        let session_changed = tokio::select! {
            _ = activation => false,
            changed = sessions.changed() => {
                if changed.is_err() {
                    return;
                }
                true
            }
        };

        if !session_changed && sessions.changed().await.is_err() {
            return;
        }
    }
}
