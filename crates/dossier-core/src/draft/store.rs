//! Draft persistence.
//!
//! Defines the `BlobStore` medium trait and `DraftStore`, which keeps one
//! serialized `ConsolidatedDraft` per user under `<namespace>:<identity>`.
//! Implementations of the medium live in `draft::memory` (tests, CLI dry
//! runs) and dossier-infra (SQLite).

use std::future::Future;

use tracing::{debug, warn};

use dossier_types::error::StorageError;
use dossier_types::identity::UserIdentity;
use dossier_types::record::ConsolidatedDraft;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// String blob storage keyed by string.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait BlobStore: Send + Sync {
    /// Read a blob. Returns `None` if the key does not exist.
    fn read(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Write a blob, replacing any previous one.
    fn write(&self, key: &str, blob: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Remove a blob. No-op if the key does not exist.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// All keys starting with `prefix`.
    fn keys(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;
}

// ---------------------------------------------------------------------------
// DraftStore
// ---------------------------------------------------------------------------

/// User-scoped draft persistence over a blob medium.
#[derive(Debug, Clone)]
pub struct DraftStore<B> {
    blobs: B,
    namespace: String,
}

impl<B: BlobStore> DraftStore<B> {
    pub fn new(blobs: B, namespace: impl Into<String>) -> Self {
        Self {
            blobs,
            namespace: namespace.into(),
        }
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Storage key for a user's draft.
    pub fn key(&self, identity: &UserIdentity) -> String {
        format!("{}:{}", self.namespace, identity)
    }

    /// Load a user's draft.
    ///
    /// A missing or unreadable blob yields an empty draft. Only failures of
    /// the medium itself are returned as errors.
    pub async fn load(&self, identity: &UserIdentity) -> Result<ConsolidatedDraft, StorageError> {
        let key = self.key(identity);
        let Some(blob) = self.blobs.read(&key).await? else {
            debug!(key = %key, "no saved draft");
            return Ok(ConsolidatedDraft::new());
        };

        match serde_json::from_str::<ConsolidatedDraft>(&blob) {
            Ok(draft) => {
                debug!(key = %key, sections = draft.len(), "loaded draft");
                Ok(draft)
            }
            Err(err) => {
                warn!(key = %key, error = %err, "saved draft is corrupt, starting empty");
                Ok(ConsolidatedDraft::new())
            }
        }
    }

    /// Replace the whole saved draft of a user.
    pub async fn save(
        &self,
        identity: &UserIdentity,
        draft: &ConsolidatedDraft,
    ) -> Result<(), StorageError> {
        let key = self.key(identity);
        let blob =
            serde_json::to_string(draft).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.blobs.write(&key, &blob).await?;
        debug!(key = %key, bytes = blob.len(), sections = draft.len(), "saved draft");
        Ok(())
    }

    /// Drop a user's saved draft.
    pub async fn clear(&self, identity: &UserIdentity) -> Result<(), StorageError> {
        let key = self.key(identity);
        self.blobs.remove(&key).await?;
        debug!(key = %key, "cleared draft");
        Ok(())
    }

    /// Identities with a saved draft in this namespace.
    pub async fn identities(&self) -> Result<Vec<UserIdentity>, StorageError> {
        let prefix = format!("{}:", self.namespace);
        let keys = self.blobs.keys(&prefix).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(UserIdentity::new))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::memory::MemoryBlobStore;
    use dossier_types::record::{FieldValue, SectionRecord};
    use dossier_types::section::SectionKey;

    fn sample_draft() -> ConsolidatedDraft {
        let mut record = SectionRecord::new();
        record.set_field("applicant_name", FieldValue::text("Jane"));
        let mut draft = ConsolidatedDraft::new();
        draft.replace_section(SectionKey::new("applicant_details").unwrap(), record);
        draft
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = DraftStore::new(MemoryBlobStore::new(), "draft");
        let user = UserIdentity::new("U1");
        store.save(&user, &sample_draft()).await.unwrap();

        assert!(store.blobs().contains("draft:U1"));
        assert_eq!(store.load(&user).await.unwrap(), sample_draft());
    }

    #[tokio::test]
    async fn test_missing_draft_is_empty() {
        let store = DraftStore::new(MemoryBlobStore::new(), "draft");
        assert!(store.load(&UserIdentity::new("nobody")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_draft_is_empty() {
        let blobs = MemoryBlobStore::new();
        blobs.write("draft:U1", "{not json").await.unwrap();
        blobs.write("draft:U2", r#"{"applicant_details": 42}"#).await.unwrap();
        let store = DraftStore::new(blobs, "draft");

        assert!(store.load(&UserIdentity::new("U1")).await.unwrap().is_empty());
        assert!(store.load(&UserIdentity::new("U2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drafts_are_user_scoped_and_clearable() {
        let store = DraftStore::new(MemoryBlobStore::new(), "draft");
        let a = UserIdentity::new("a");
        let b = UserIdentity::new("b");
        store.save(&a, &sample_draft()).await.unwrap();

        assert!(store.load(&b).await.unwrap().is_empty());
        assert_eq!(store.identities().await.unwrap(), vec![a.clone()]);

        store.clear(&a).await.unwrap();
        assert!(store.load(&a).await.unwrap().is_empty());
        store.clear(&a).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_write_is_reported() {
        let blobs = MemoryBlobStore::new();
        blobs.set_fail_writes(true);
        let store = DraftStore::new(blobs, "draft");
        let err = store
            .save(&UserIdentity::new("U1"), &sample_draft())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::WriteRejected(_)));
    }
}
