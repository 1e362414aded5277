//! Username/password authentication against the credentials table.
//!
//! Passwords are stored as hex SHA-256 digests. A bootstrap `admin` account
//! with the well-known password `admin` is created on first open and should
//! be changed.

use std::sync::Arc;

use inviteboard_shared::{InviteBoardError, Result};
use inviteboard_storage::Storage;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::session::Session;

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Hex SHA-256 digest of a password.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Login and credential maintenance.
pub struct Authenticator {
    storage: Arc<Storage>,
}

impl Authenticator {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Create the bootstrap admin account if it does not exist yet.
    pub async fn bootstrap(&self) -> Result<()> {
        let created = self
            .storage
            .insert_user_if_absent(
                DEFAULT_ADMIN_USERNAME,
                &hash_password(DEFAULT_ADMIN_PASSWORD),
                true,
            )
            .await?;
        if created {
            info!(username = DEFAULT_ADMIN_USERNAME, "created bootstrap admin account");
        }
        Ok(())
    }

    /// Verify credentials and open a session.
    ///
    /// Unknown user and wrong password fail identically.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let user = self
            .storage
            .find_user(username)
            .await?
            .filter(|u| u.password_hash == hash_password(password))
            .ok_or_else(|| {
                warn!("login rejected");
                InviteBoardError::InvalidCredentials
            })?;

        if user.username == DEFAULT_ADMIN_USERNAME
            && user.password_hash == hash_password(DEFAULT_ADMIN_PASSWORD)
        {
            warn!("bootstrap admin account still uses the default password");
        }

        info!(is_admin = user.is_admin, "login succeeded");
        Ok(Session::new(user.username, user.is_admin, user.email))
    }

    /// Change the session user's password after re-verifying the current one.
    #[instrument(skip_all, fields(user = %session.username()))]
    pub async fn change_password(
        &self,
        session: &Session,
        current: &str,
        new_password: &str,
    ) -> Result<()> {
        if new_password.is_empty() {
            return Err(InviteBoardError::validation("new password must not be empty"));
        }

        let verified = self
            .storage
            .find_user(session.username())
            .await?
            .is_some_and(|u| u.password_hash == hash_password(current));
        if !verified {
            return Err(InviteBoardError::InvalidCredentials);
        }

        if !self
            .storage
            .update_password(session.username(), &hash_password(new_password))
            .await?
        {
            return Err(InviteBoardError::InvalidCredentials);
        }
        info!("password changed");
        Ok(())
    }

    /// Set the session user's email address. Session identity is enough;
    /// no password is asked for.
    #[instrument(skip_all, fields(user = %session.username()))]
    pub async fn update_email(&self, session: &mut Session, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(InviteBoardError::validation(format!(
                "'{email}' is not an email address"
            )));
        }

        if !self.storage.update_email(session.username(), Some(email)).await? {
            return Err(InviteBoardError::InvalidCredentials);
        }
        session.set_email(Some(email.to_string()));
        info!("email updated");
        Ok(())
    }
}
