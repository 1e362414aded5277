//! The dataset store: replace-all upload and reload of the classified table.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use inviteboard_shared::{
    Dataset, DatasetOrigin, Field, InviteBoardError, Record, Result, display_field_name,
    storage_field_name,
};
use inviteboard_storage::{RecordBatch, Storage};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::ingest;
use crate::session::Session;

/// Owns persistence of the canonical table.
///
/// `upload` and `reload` are serialized through a write gate so concurrent
/// sessions never observe a half-replaced table.
pub struct DatasetStore {
    storage: Arc<Storage>,
    write_gate: Mutex<()>,
}

impl DatasetStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            write_gate: Mutex::new(()),
        }
    }

    /// Validate, classify, and persist an uploaded CSV, replacing every
    /// stored record, then make it the session's active dataset.
    ///
    /// On any error the session keeps its previous dataset and storage is
    /// left as it was.
    #[instrument(skip_all, fields(user = %session.username(), bytes = input.len()))]
    pub async fn upload<'s>(&self, session: &'s mut Session, input: &[u8]) -> Result<&'s Dataset> {
        let dataset = match ingest::build_dataset(input, Utc::now()) {
            Ok(ds) => ds,
            Err(e) => {
                warn!(error = %e, "upload rejected");
                return Err(e);
            }
        };

        let batch = to_batch(&dataset);
        let required: Vec<String> = Field::REQUIRED.iter().map(|f| f.storage_name()).collect();

        {
            let _guard = self.write_gate.lock().await;
            self.storage.replace_records(&batch, &required).await?;
        }

        info!(
            records = dataset.len(),
            fields = dataset.fields().len(),
            "dataset uploaded"
        );
        Ok(session.activate(dataset))
    }

    /// Read a CSV file from disk and [`upload`](Self::upload) it.
    pub async fn upload_file<'s>(&self, session: &'s mut Session, path: &Path) -> Result<&'s Dataset> {
        let input = std::fs::read(path).map_err(|e| InviteBoardError::io(path, e))?;
        self.upload(session, &input).await
    }

    /// Rebuild the dataset from storage. `None` if nothing is stored.
    /// Does not touch storage or any session.
    #[instrument(skip_all)]
    pub async fn reload(&self) -> Result<Option<Dataset>> {
        let table = {
            let _guard = self.write_gate.lock().await;
            self.storage.load_records().await?
        };
        let Some(table) = table else {
            return Ok(None);
        };

        let fields: Vec<String> = table
            .columns
            .iter()
            .map(|c| display_field_name(c))
            .collect();
        let records = table
            .rows
            .into_iter()
            .map(|row| Record::from_cells(fields.iter().cloned().zip(row)))
            .collect();
        let uploaded_at = table.uploaded_at.unwrap_or_else(Utc::now);

        let dataset = Dataset::new(fields, records, uploaded_at, DatasetOrigin::Reloaded)?;
        info!(records = dataset.len(), "dataset reloaded from storage");
        Ok(Some(dataset))
    }

    /// Load stored data into a session that has no active dataset yet.
    /// Returns whether the session now has one.
    pub async fn restore(&self, session: &mut Session) -> Result<bool> {
        if session.dataset().is_some() {
            return Ok(true);
        }
        match self.reload().await? {
            Some(dataset) => {
                session.activate(dataset);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn to_batch(dataset: &Dataset) -> RecordBatch {
    RecordBatch {
        columns: dataset.fields().iter().map(|f| storage_field_name(f)).collect(),
        rows: dataset
            .records()
            .iter()
            .map(|r| r.cells().iter().map(|(_, v)| v.clone()).collect())
            .collect(),
        uploaded_at: dataset.uploaded_at(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authenticator;
    use inviteboard_shared::OrgLabel;
    use uuid::Uuid;

    const SAMPLE: &str = "\
First name,Last name,Email,Description,User role,Invited by email,Accepted site invitation
Ann,Lee,ann@example.org,Stake Relief Society,Member,x@example.org,Yes
Bob,Ray,bob@example.org,Ward2 clerk,Adminstrator,x@example.org,No
Cy,Dee,cy@example.org,,Member,x@example.org,
";

    fn temp_db() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ib_test_{}.db", Uuid::now_v7()))
    }

    async fn setup() -> (DatasetStore, Session, Arc<Storage>) {
        setup_at(&temp_db()).await
    }

    async fn setup_at(path: &Path) -> (DatasetStore, Session, Arc<Storage>) {
        let storage = Arc::new(Storage::open(path).await.expect("open test db"));
        let auth = Authenticator::new(storage.clone());
        auth.bootstrap().await.unwrap();
        let session = auth.login("admin", "admin").await.unwrap();
        (DatasetStore::new(storage.clone()), session, storage)
    }

    #[tokio::test]
    async fn upload_classifies_and_activates() {
        let (store, mut session, _) = setup().await;
        let ds = store.upload(&mut session, SAMPLE.as_bytes()).await.expect("upload");
        assert_eq!(ds.len(), 3);
        let orgs: Vec<_> = ds.records().iter().map(Record::org).collect();
        assert_eq!(orgs, vec![OrgLabel::Stake, OrgLabel::Fm, OrgLabel::Blank]);
        assert!(session.dataset().is_some());
    }

    #[tokio::test]
    async fn reload_restores_display_casing() {
        let (store, mut session, _) = setup().await;
        store.upload(&mut session, SAMPLE.as_bytes()).await.unwrap();

        let ds = store.reload().await.unwrap().expect("stored data");
        assert_eq!(ds.origin(), DatasetOrigin::Reloaded);
        assert_eq!(ds.len(), 3);
        assert!(ds.fields().iter().any(|f| f == "First Name"));
        assert!(ds.fields().iter().any(|f| f == "Has Used"));
        assert!(ds.fields().iter().any(|f| f == "Org"));
        assert_eq!(ds.records()[1].org(), OrgLabel::Fm);
        assert_eq!(ds.records()[0].field(Field::AcceptedSiteInvitation), Some("Yes"));
        assert_eq!(ds.records()[2].field(Field::Description), None);
    }

    #[tokio::test]
    async fn reload_is_idempotent() {
        let (store, mut session, storage) = setup().await;
        store.upload(&mut session, SAMPLE.as_bytes()).await.unwrap();
        let a = store.reload().await.unwrap().unwrap();
        let b = store.reload().await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(storage.count_records().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reload_of_empty_store_is_none() {
        let (store, mut session, _) = setup().await;
        assert!(store.reload().await.unwrap().is_none());
        assert!(!store.restore(&mut session).await.unwrap());
    }

    #[tokio::test]
    async fn upload_replaces_everything() {
        let (store, mut session, storage) = setup().await;
        store.upload(&mut session, SAMPLE.as_bytes()).await.unwrap();
        store
            .upload(&mut session, b"Description,Phone\nWard8 y,555\n")
            .await
            .unwrap();
        assert_eq!(storage.count_records().await.unwrap(), 1);

        let ds = store.reload().await.unwrap().unwrap();
        assert_eq!(ds.records()[0].org(), OrgLabel::Prefix("Ward8".into()));
        // Columns from the earlier upload stay in the schema, empty.
        assert_eq!(ds.records()[0].field(Field::FirstName), None);
        assert_eq!(ds.records()[0].get("Phone"), Some("555"));
    }

    #[tokio::test]
    async fn required_columns_added_when_missing() {
        let (store, mut session, storage) = setup().await;
        store.upload(&mut session, b"Description\nWard1 a\n").await.unwrap();
        let columns = storage.record_columns().await.unwrap();
        for field in Field::REQUIRED {
            assert!(columns.contains(&field.storage_name()), "{field:?}");
        }
    }

    #[tokio::test]
    async fn empty_upload_leaves_previous_dataset() {
        let (store, mut session, storage) = setup().await;
        store.upload(&mut session, SAMPLE.as_bytes()).await.unwrap();

        let err = store.upload(&mut session, b"").await.unwrap_err();
        assert!(err.is_input_error());
        assert_eq!(session.dataset().map(Dataset::len), Some(3));
        assert_eq!(storage.count_records().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn rejected_columns_leave_previous_dataset() {
        let (store, mut session, storage) = setup().await;
        store.upload(&mut session, SAMPLE.as_bytes()).await.unwrap();

        // `id` collides with the table's own key column.
        let err = store.upload(&mut session, b"ID,Description\n1,Ward1\n").await.unwrap_err();
        assert!(err.to_string().contains("reserved"));
        assert_eq!(session.dataset().map(Dataset::len), Some(3));
        assert_eq!(storage.count_records().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_insert_leaves_previous_dataset() {
        let path = temp_db();
        let (store, mut session, storage) = setup_at(&path).await;
        store.upload(&mut session, SAMPLE.as_bytes()).await.unwrap();

        let db = libsql::Builder::new_local(&path).build().await.unwrap();
        db.connect()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_dan BEFORE INSERT ON users_data \
                 WHEN NEW.email = 'dan@example.org' \
                 BEGIN SELECT RAISE(ABORT, 'insert rejected'); END;",
            )
            .await
            .unwrap();

        let replacement = "\
First name,Email,Description,Calling
Eve,eve@example.org,Ward1,Clerk
Dan,dan@example.org,Ward1,Clerk
";
        let err = store
            .upload(&mut session, replacement.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, InviteBoardError::Storage(_)));

        let active = session.dataset().expect("previous dataset kept");
        assert_eq!(active.len(), 3);
        assert_eq!(active.records()[0].org(), OrgLabel::Stake);

        let stored = store.reload().await.unwrap().unwrap();
        assert_eq!(stored.len(), 3);
        assert!(!stored.fields().iter().any(|f| f == "Calling"));
        assert_eq!(storage.count_records().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn upload_file_reports_missing_path() {
        let (store, mut session, _) = setup().await;
        let err = store
            .upload_file(&mut session, Path::new("/nonexistent/ib/upload.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, InviteBoardError::Io { .. }));
    }

    #[tokio::test]
    async fn restore_keeps_active_dataset() {
        let (store, mut session, _) = setup().await;
        store.upload(&mut session, SAMPLE.as_bytes()).await.unwrap();
        assert!(store.restore(&mut session).await.unwrap());
        assert_eq!(session.dataset().unwrap().origin(), DatasetOrigin::Uploaded);
    }
}
