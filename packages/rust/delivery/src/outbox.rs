//! Offline delivery: each envelope becomes a JSON file in a directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use inviteboard_shared::{InviteBoardError, Result};
use tracing::debug;
use uuid::Uuid;

use crate::{DeliveryGateway, DeliveryOutcome, Envelope};

/// Writes messages to `<dir>/<timestamp>_<id>.json`.
#[derive(Debug, Clone)]
pub struct OutboxGateway {
    dir: PathBuf,
}

impl OutboxGateway {
    /// Open the outbox, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| InviteBoardError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write(&self, envelope: &Envelope<'_>) -> std::result::Result<PathBuf, String> {
        let name = format!(
            "{}_{}.json",
            Utc::now().format("%Y%m%dT%H%M%S"),
            Uuid::now_v7().simple()
        );
        let path = self.dir.join(name);
        let json = serde_json::to_vec_pretty(&envelope.to_wire()).map_err(|e| e.to_string())?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| format!("{}: {e}", path.display()))?;
        Ok(path)
    }
}

#[async_trait]
impl DeliveryGateway for OutboxGateway {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn deliver(&self, envelope: &Envelope<'_>) -> DeliveryOutcome {
        match self.write(envelope).await {
            Ok(path) => {
                debug!(to = envelope.to, path = %path.display(), "queued in outbox");
                DeliveryOutcome::sent(format!(
                    "Email for {} written to {}",
                    envelope.to,
                    path.display()
                ))
            }
            Err(e) => DeliveryOutcome::failed(format!("could not write outbox file: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{attachment, message};
    use crate::{SilentDeliveryProgress, parse_recipients, send_report};

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("inviteboard_outbox_{}", Uuid::now_v7()))
    }

    #[tokio::test]
    async fn one_file_per_recipient_entry() {
        let dir = temp_dir();
        let outbox = OutboxGateway::open(&dir).await.unwrap();
        let recipients = parse_recipients("a@x.org; a@x.org\nb@x.org").unwrap();

        let summary = send_report(
            &outbox,
            &recipients,
            &message(),
            &attachment(),
            &SilentDeliveryProgress,
        )
        .await
        .unwrap();
        assert_eq!((summary.succeeded, summary.attempted), (3, 3));

        let written: Vec<serde_json::Value> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| serde_json::from_slice(&std::fs::read(e.unwrap().path()).unwrap()).unwrap())
            .collect();
        assert_eq!(written.len(), 3);
        assert_eq!(written.iter().filter(|m| m["to"] == "a@x.org").count(), 2);
        assert!(written.iter().all(|m| m["from"] == "reports@example.org"));
        assert!(written[0]["attachment"]["content_base64"].is_string());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unwritable_outbox_fails_per_recipient() {
        let dir = temp_dir();
        let outbox = OutboxGateway::open(&dir).await.unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let message = message();
        let attachment = attachment();
        let envelope = Envelope {
            to: "a@x.org",
            message: &message,
            attachment: &attachment,
        };
        let outcome = outbox.deliver(&envelope).await;
        assert!(!outcome.success);
    }
}
