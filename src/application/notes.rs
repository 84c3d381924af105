use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use utoipa::ToSchema;

/// Search results never carry full note content; snippets are capped so a
/// crowded store cannot blow up the prompt fed back to the model.
const SNIPPET_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Note {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct NoteSummary {
    pub id: u64,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteStoreError {
    #[error("Note not found")]
    NotFound { note_id: u64 },
}

#[derive(Debug)]
struct Inner {
    notes: BTreeMap<u64, Note>,
    next_id: u64,
}

/// In-memory note store. Every operation takes the single lock once, so a
/// tool call either commits fully or leaves nothing behind.
#[derive(Debug)]
pub struct NoteStore {
    inner: Mutex<Inner>,
}

impl Default for NoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                notes: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    pub async fn create(&self, title: impl Into<String>, content: impl Into<String>) -> Note {
        let mut inner = self.inner.lock().await;
        let note = Note {
            id: inner.next_id,
            title: title.into(),
            content: content.into(),
            created_at: Utc::now(),
        };
        inner.notes.insert(note.id, note.clone());
        inner.next_id += 1;
        debug!(note_id = note.id, "Note created");
        note
    }

    pub async fn list(&self) -> Vec<Note> {
        let inner = self.inner.lock().await;
        inner.notes.values().cloned().collect()
    }

    pub async fn get(&self, note_id: u64) -> Result<Note, NoteStoreError> {
        let inner = self.inner.lock().await;
        inner
            .notes
            .get(&note_id)
            .cloned()
            .ok_or(NoteStoreError::NotFound { note_id })
    }

    /// Full replacement, preserving the original creation time.
    pub async fn replace(
        &self,
        note_id: u64,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Note, NoteStoreError> {
        let mut inner = self.inner.lock().await;
        let existing = inner
            .notes
            .get_mut(&note_id)
            .ok_or(NoteStoreError::NotFound { note_id })?;
        existing.title = title.into();
        existing.content = content.into();
        Ok(existing.clone())
    }

    /// Partial update: only the fields provided change.
    pub async fn patch(
        &self,
        note_id: u64,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Note, NoteStoreError> {
        let mut inner = self.inner.lock().await;
        let existing = inner
            .notes
            .get_mut(&note_id)
            .ok_or(NoteStoreError::NotFound { note_id })?;
        if let Some(title) = title {
            existing.title = title;
        }
        if let Some(content) = content {
            existing.content = content;
        }
        Ok(existing.clone())
    }

    pub async fn delete(&self, note_id: u64) -> Result<(), NoteStoreError> {
        let mut inner = self.inner.lock().await;
        if inner.notes.remove(&note_id).is_none() {
            return Err(NoteStoreError::NotFound { note_id });
        }
        debug!(note_id, "Note deleted");
        Ok(())
    }

    /// Keyword search over title and content, newest first. Results carry
    /// id/title/snippet only.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<NoteSummary> {
        let query = query.trim();
        let inner = self.inner.lock().await;
        let mut hits: Vec<&Note> = inner
            .notes
            .values()
            .filter(|n| n.title.contains(query) || n.content.contains(query))
            .collect();
        hits.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        hits.into_iter()
            .take(limit)
            .map(|n| NoteSummary {
                id: n.id,
                title: n.title.clone(),
                snippet: n.content.chars().take(SNIPPET_CHARS).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_monotonic_ids() {
        let store = NoteStore::new();
        let a = store.create("first", "alpha").await;
        let b = store.create("second", "beta").await;
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.list().await.len(), 2);
    }

    #[tokio::test]
    async fn get_and_delete_report_missing_notes() {
        let store = NoteStore::new();
        assert_eq!(
            store.get(7).await,
            Err(NoteStoreError::NotFound { note_id: 7 })
        );
        let note = store.create("t", "c").await;
        store.delete(note.id).await.expect("delete succeeds");
        assert!(store.get(note.id).await.is_err());
    }

    #[tokio::test]
    async fn replace_keeps_created_at() {
        let store = NoteStore::new();
        let note = store.create("t", "c").await;
        let updated = store
            .replace(note.id, "t2", "c2")
            .await
            .expect("replace succeeds");
        assert_eq!(updated.created_at, note.created_at);
        assert_eq!(updated.title, "t2");
    }

    #[tokio::test]
    async fn patch_touches_only_given_fields() {
        let store = NoteStore::new();
        let note = store.create("t", "c").await;
        let updated = store
            .patch(note.id, None, Some("new content".into()))
            .await
            .expect("patch succeeds");
        assert_eq!(updated.title, "t");
        assert_eq!(updated.content, "new content");
    }

    #[tokio::test]
    async fn search_matches_title_or_content_and_caps_snippets() {
        let store = NoteStore::new();
        store.create("meeting abc", "notes about planning").await;
        store.create("journal", "today abc happened").await;
        store.create("unrelated", "nothing here").await;

        let hits = store.search("abc", 5).await;
        assert_eq!(hits.len(), 2);

        let long = "x".repeat(500);
        let big = store.create("big", long).await;
        let hits = store.search("x", 5).await;
        let hit = hits.iter().find(|h| h.id == big.id).expect("found");
        assert_eq!(hit.snippet.chars().count(), 120);
    }

    #[tokio::test]
    async fn search_orders_newest_first_and_respects_limit() {
        let store = NoteStore::new();
        for i in 0..4 {
            store.create(format!("note {i}"), "shared token").await;
        }
        let hits = store.search("shared", 2).await;
        assert_eq!(hits.len(), 2);
        // Same timestamp resolution collapses to id ordering, newest id first.
        assert!(hits[0].id > hits[1].id);
    }
}
