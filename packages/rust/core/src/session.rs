//! Per-session context.
//!
//! Every operation that reads or replaces the active dataset takes a
//! [`Session`] explicitly; nothing about the logged-in user or their data
//! lives in process-wide state.

use inviteboard_shared::Dataset;

/// An authenticated user and the dataset they are working with.
#[derive(Debug, Clone)]
pub struct Session {
    username: String,
    is_admin: bool,
    email: Option<String>,
    dataset: Option<Dataset>,
}

impl Session {
    pub(crate) fn new(username: String, is_admin: bool, email: Option<String>) -> Self {
        Self {
            username,
            is_admin,
            email,
            dataset: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub(crate) fn set_email(&mut self, email: Option<String>) {
        self.email = email;
    }

    /// The active dataset, if one has been uploaded or reloaded.
    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub(crate) fn activate(&mut self, dataset: Dataset) -> &Dataset {
        self.dataset.insert(dataset)
    }
}
