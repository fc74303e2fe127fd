// ── Write-through credential store ──
//
// Local mirror of one credential collection. Every mutation computes the
// full next collection, persists it wholesale, and only then replaces the
// mirror. Writes to one store are serialised by an async lock held across
// compute, persist and commit.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::backend::ConfigStore;
use crate::error::{BackendError, CoreError};
use crate::model::{CredentialRecord, ModelEntry, OpenAiCompatProvider};
use crate::notify::Notifier;
use crate::stream::SnapshotStream;

/// Working copy of one record being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct EditBuffer<R> {
    pub index: usize,
    pub draft: R,
}

pub struct CredentialStore<R: CredentialRecord> {
    backend: Arc<dyn ConfigStore>,
    records: watch::Sender<Arc<Vec<R>>>,
    write_lock: tokio::sync::Mutex<()>,
    edit: Mutex<Option<EditBuffer<R>>>,
    notifier: Notifier,
}

impl<R: CredentialRecord> CredentialStore<R> {
    pub(crate) fn new(backend: Arc<dyn ConfigStore>, notifier: Notifier) -> Self {
        let (records, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            backend,
            records,
            write_lock: tokio::sync::Mutex::new(()),
            edit: Mutex::new(None),
            notifier,
        }
    }

    /// Current mirror, in priority order.
    pub fn list(&self) -> Arc<Vec<R>> {
        self.records.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotStream<Arc<Vec<R>>> {
        SnapshotStream::new(self.records.subscribe())
    }

    /// Re-read the collection from the store and replace the mirror.
    pub async fn reload(&self) -> Result<Arc<Vec<R>>, CoreError> {
        let _writer = self.write_lock.lock().await;
        match self.fetch().await {
            Ok(records) => Ok(self.replace(records)),
            Err(e) => {
                warn!(kind = %R::KIND, error = %e, "credential load failed");
                let err = CoreError::remote(format!("Load {}s", R::KIND.label()), &e);
                self.notifier.error("Failed to load API keys", err.to_string());
                Err(err)
            }
        }
    }

    pub(crate) async fn fetch(&self) -> Result<Vec<R>, BackendError> {
        let set = self.backend.load(R::KIND).await?;
        R::from_set(set).ok_or_else(|| BackendError::InvalidResponse {
            message: format!("store returned a different kind than {}", R::KIND),
        })
    }

    pub(crate) fn replace(&self, records: Vec<R>) -> Arc<Vec<R>> {
        let snapshot = Arc::new(records);
        self.records.send_replace(Arc::clone(&snapshot));
        snapshot
    }

    /// Append `record` at the lowest priority.
    pub async fn add(&self, record: R) -> Result<Arc<Vec<R>>, CoreError> {
        let label = R::KIND.label();
        self.write_through("add", Some(format!("{label} added")), move |current| {
            record.validate()?;
            let mut next = current.to_vec();
            next.push(record);
            Ok(Some(next))
        })
        .await
    }

    pub async fn remove(&self, index: usize) -> Result<Arc<Vec<R>>, CoreError> {
        let label = R::KIND.label();
        self.write_through("delete", Some(format!("{label} deleted")), move |current| {
            check_index(current, index, label)?;
            let mut next = current.to_vec();
            next.remove(index);
            Ok(Some(next))
        })
        .await
    }

    /// Persist the current mirror unchanged.
    pub async fn save_all(&self) -> Result<Arc<Vec<R>>, CoreError> {
        let label = R::KIND.label();
        self.write_through("save", Some(format!("{label}s saved")), |current| {
            Ok(Some(current.to_vec()))
        })
        .await
    }

    pub fn editing(&self) -> Option<EditBuffer<R>> {
        self.edit_slot().clone()
    }

    /// Discard the edit buffer without any remote call.
    pub fn cancel_edit(&self) -> bool {
        self.edit_slot().take().is_some()
    }

    fn edit_slot(&self) -> std::sync::MutexGuard<'_, Option<EditBuffer<R>>> {
        self.edit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Core write path. `mutate` sees the mirror under the write lock and
    /// returns the next collection, `None` for a no-op, or a validation
    /// error. Only a successful store call replaces the mirror.
    async fn write_through<F>(
        &self,
        action: &str,
        success: Option<String>,
        mutate: F,
    ) -> Result<Arc<Vec<R>>, CoreError>
    where
        F: FnOnce(&[R]) -> Result<Option<Vec<R>>, CoreError> + Send,
    {
        let _writer = self.write_lock.lock().await;
        let current = self.list();

        let next = match mutate(current.as_slice()) {
            Ok(Some(next)) => next,
            Ok(None) => return Ok(current),
            Err(e) => {
                self.reject(&e);
                return Err(e);
            }
        };

        let set = R::into_set(next.clone());
        debug!(kind = %R::KIND, action, records = next.len(), "persisting collection");
        match self.backend.store(&set).await {
            Ok(()) => {
                let snapshot = self.replace(next);
                if let Some(message) = success {
                    self.notifier.success(message, format!("{} total", snapshot.len()));
                }
                Ok(snapshot)
            }
            Err(e) => {
                warn!(kind = %R::KIND, action, error = %e, "credential write failed");
                let err = CoreError::remote(format!("{action} {}", R::KIND.label()), &e);
                self.notifier
                    .error(format!("Failed to {action} {}", R::KIND.label()), err.to_string());
                Err(err)
            }
        }
    }

    fn reject(&self, err: &CoreError) {
        self.notifier.warning(err.to_string(), None);
    }
}

fn check_index<T>(records: &[T], index: usize, label: &str) -> Result<(), CoreError> {
    if index < records.len() {
        Ok(())
    } else {
        Err(CoreError::validation(format!("No {label} at index {index}")))
    }
}

// ── OpenAI-compatible providers ──────────────────────────────────────

impl CredentialStore<OpenAiCompatProvider> {
    /// Replace the provider at `index`.
    pub async fn update(
        &self,
        index: usize,
        provider: OpenAiCompatProvider,
    ) -> Result<Arc<Vec<OpenAiCompatProvider>>, CoreError> {
        self.write_through("update", Some("Provider updated".into()), move |current| {
            check_index(current, index, "provider")?;
            provider.validate()?;
            let mut next = current.to_vec();
            next[index] = provider;
            Ok(Some(next))
        })
        .await
    }

    /// Append a model to a provider's list. Blank names and names that
    /// already match a model's name or alias are silent no-ops.
    pub async fn add_model(
        &self,
        provider_index: usize,
        name: &str,
    ) -> Result<Arc<Vec<OpenAiCompatProvider>>, CoreError> {
        let name = name.trim().to_owned();
        self.write_through("add model to", None, move |current| {
            check_index(current, provider_index, "provider")?;
            if name.is_empty() || current[provider_index].has_model(&name) {
                return Ok(None);
            }
            let mut next = current.to_vec();
            next[provider_index].models.push(ModelEntry::named(name));
            Ok(Some(next))
        })
        .await
    }

    pub async fn remove_model(
        &self,
        provider_index: usize,
        model_index: usize,
    ) -> Result<Arc<Vec<OpenAiCompatProvider>>, CoreError> {
        self.write_through("remove model from", None, move |current| {
            check_index(current, provider_index, "provider")?;
            check_index(&current[provider_index].models, model_index, "model")?;
            let mut next = current.to_vec();
            next[provider_index].models.remove(model_index);
            Ok(Some(next))
        })
        .await
    }

    /// Snapshot the provider at `index` into the edit buffer, replacing
    /// any previous buffer.
    pub fn begin_edit(&self, index: usize) -> Result<OpenAiCompatProvider, CoreError> {
        let current = self.list();
        if let Err(e) = check_index(&current, index, "provider") {
            self.reject(&e);
            return Err(e);
        }
        let draft = current[index].clone();
        *self.edit_slot() = Some(EditBuffer {
            index,
            draft: draft.clone(),
        });
        Ok(draft)
    }

    pub fn edit(&self, f: impl FnOnce(&mut OpenAiCompatProvider)) -> Result<(), CoreError> {
        let mut slot = self.edit_slot();
        let buffer = slot.as_mut().ok_or(CoreError::NoActiveEdit)?;
        f(&mut buffer.draft);
        Ok(())
    }

    /// Validate and persist the edit buffer. A validation failure keeps
    /// the buffer for correction; a remote failure discards it.
    pub async fn commit_edit(&self) -> Result<Arc<Vec<OpenAiCompatProvider>>, CoreError> {
        let Some(buffer) = self.editing() else {
            return Err(CoreError::NoActiveEdit);
        };
        let result = self.update(buffer.index, buffer.draft.clone()).await;
        match &result {
            Err(e) if e.is_validation() => {}
            _ => self.clear_edit_if(&buffer),
        }
        result
    }

    /// Drop the edit buffer only if it is still the one that was
    /// committed; an edit begun while the write was in flight survives.
    fn clear_edit_if(&self, committed: &EditBuffer<OpenAiCompatProvider>) {
        let mut slot = self.edit_slot();
        if slot.as_ref() == Some(committed) {
            *slot = None;
        }
    }
}
