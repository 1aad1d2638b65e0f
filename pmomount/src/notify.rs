//! Notifications de changement de contenu.
//!
//! Un [`ChangeNotifier`] est détenu par un backend volatil. Les abonnés
//! reçoivent un [`Subscription`] : l'abandonner (ou appeler
//! [`Subscription::cancel`]) retire le callback de façon déterministe.

use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};
use tracing::error;

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, Callback)>>,
}

/// Côté publication des changements de contenu.
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: Arc<Listeners>,
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un callback appelé à chaque [`notify`](Self::notify).
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.callbacks.lock().push((id, Arc::new(callback)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Appelle tous les abonnés vivants.
    ///
    /// Un abonné qui panique est journalisé et n'empêche ni les autres
    /// abonnés ni l'appelant de continuer.
    pub fn notify(&self) {
        // Copie de la liste : un callback peut s'abonner ou se désabonner
        let callbacks: Vec<Callback> = self
            .listeners
            .callbacks
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                error!("Change listener panicked");
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.callbacks.lock().len()
    }
}

/// Abonnement annulable à un [`ChangeNotifier`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    /// Retire le callback. Équivalent à abandonner l'abonnement.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.callbacks.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
