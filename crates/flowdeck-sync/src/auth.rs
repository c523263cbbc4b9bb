//! Application-owned auth state.
//!
//! The root of the app constructs one [`AuthState`] and hands it down;
//! consumers read the current identity or subscribe to changes. The
//! refresher task is started explicitly and torn down on drop.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub id_token: String,
}

#[derive(Debug)]
pub struct AuthState {
    current: watch::Receiver<Option<Identity>>,
    refresher: Option<JoinHandle<()>>,
}

impl AuthState {
    /// Fixed identity (CLI flag or environment token); no refresh stream.
    pub fn fixed(identity: Option<Identity>) -> Self {
        let (tx, rx) = watch::channel(identity);
        // Keep the sender alive so late subscribers still observe the value.
        let refresher = tokio::spawn(async move {
            tx.closed().await;
        });
        Self {
            current: rx,
            refresher: Some(refresher),
        }
    }

    /// Subscribe to an identity-provider refresh stream. Each delivered
    /// value replaces the current identity; `None` means signed out.
    pub fn from_stream(mut stream: mpsc::Receiver<Option<Identity>>) -> Self {
        let (tx, rx) = watch::channel(None);
        let refresher = tokio::spawn(async move {
            while let Some(identity) = stream.recv().await {
                if tx.send(identity).is_err() {
                    break;
                }
            }
        });
        Self {
            current: rx,
            refresher: Some(refresher),
        }
    }

    pub fn identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    pub fn id_token(&self) -> Option<String> {
        self.identity().map(|identity| identity.id_token)
    }

    pub fn user_id(&self) -> Option<String> {
        self.identity().map(|identity| identity.user_id)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.clone()
    }
}

impl Drop for AuthState {
    fn drop(&mut self) {
        if let Some(task) = self.refresher.take() {
            task.abort();
        }
    }
}
