//! Core domain logic for InviteBoard.
//!
//! This crate ties the classifier, CSV ingest, dataset store, and
//! authentication together. [`Workspace`] opens the database and hands out
//! the services every command needs.

pub mod auth;
pub mod classifier;
pub mod ingest;
pub mod session;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use inviteboard_shared::Result;
use inviteboard_storage::Storage;

pub use auth::Authenticator;
pub use classifier::{classify, classify_all};
pub use session::Session;
pub use store::DatasetStore;

/// Open database plus the services built on it.
pub struct Workspace {
    pub auth: Authenticator,
    pub datasets: DatasetStore,
}

impl Workspace {
    /// Open (or create) the database at `db_path` and make sure the
    /// bootstrap admin account exists.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let storage = Arc::new(Storage::open(db_path).await?);
        let auth = Authenticator::new(storage.clone());
        auth.bootstrap().await?;
        Ok(Self {
            auth,
            datasets: DatasetStore::new(storage),
        })
    }

    /// Log in and load whatever dataset is already stored.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let mut session = self.auth.login(username, password).await?;
        self.datasets.restore(&mut session).await?;
        Ok(session)
    }
}
