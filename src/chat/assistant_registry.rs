//! Shared assistant handles
//!
//! The analysis assistant is a provider-side resource shared by every chat job.
//! Resolution is single-flight per display name: concurrent jobs asking for the same
//! name wait on one lock, so the list-then-create sequence runs at most once at a time
//! and never produces duplicate named assistants from this process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::llm::provider::{Assistant, AssistantSpec, AssistantsApi};
use crate::types::AppResult;

type Slot = Arc<Mutex<Option<Assistant>>>;

#[derive(Clone, Default)]
pub struct AssistantRegistry {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl AssistantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, name: &str) -> Slot {
        let mut slots = self.slots.lock().await;
        slots.entry(name.to_string()).or_default().clone()
    }

    /// Resolve the assistant named `spec.name`, creating or updating it remotely as needed
    pub async fn get_or_create<A>(&self, api: &A, spec: &AssistantSpec) -> AppResult<Assistant>
    where
        A: AssistantsApi + ?Sized,
    {
        let slot = self.slot(&spec.name).await;
        let mut cached = slot.lock().await;

        if let Some(assistant) = cached.as_ref() {
            if !assistant.differs_from(spec) {
                return Ok(assistant.clone());
            }
        }

        let existing = match cached.as_ref() {
            Some(assistant) => Some(assistant.clone()),
            None => api
                .list_assistants()
                .await?
                .into_iter()
                .find(|a| a.name.as_deref() == Some(spec.name.as_str())),
        };

        let assistant = match existing {
            Some(assistant) if assistant.differs_from(spec) => {
                info!(assistant_id = %assistant.id, name = %spec.name, "Updating assistant configuration");
                api.update_assistant(&assistant.id, spec).await?
            }
            Some(assistant) => assistant,
            None => {
                let created = api.create_assistant(spec).await?;
                info!(assistant_id = %created.id, name = %spec.name, "Created assistant");
                created
            }
        };

        *cached = Some(assistant.clone());
        Ok(assistant)
    }

    /// Forget the cached handle so the next job looks the assistant up again
    pub async fn invalidate(&self, name: &str) {
        let slot = self.slot(name).await;
        *slot.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{Run, Thread, ThreadMessage, UploadedFile};
    use crate::types::AppError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeAssistants {
        remote: std::sync::Mutex<Vec<Assistant>>,
        lists: AtomicUsize,
        creates: AtomicUsize,
        updates: AtomicUsize,
    }

    #[async_trait]
    impl AssistantsApi for FakeAssistants {
        async fn list_assistants(&self) -> AppResult<Vec<Assistant>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            // Widen the list-then-create window
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(self.remote.lock().unwrap().clone())
        }

        async fn create_assistant(&self, spec: &AssistantSpec) -> AppResult<Assistant> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst);
            let assistant = Assistant {
                id: format!("asst_{}", n),
                name: Some(spec.name.clone()),
                instructions: Some(spec.instructions.clone()),
                model: spec.model.clone(),
            };
            self.remote.lock().unwrap().push(assistant.clone());
            Ok(assistant)
        }

        async fn update_assistant(&self, assistant_id: &str, spec: &AssistantSpec) -> AppResult<Assistant> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            let mut remote = self.remote.lock().unwrap();
            let assistant = remote
                .iter_mut()
                .find(|a| a.id == assistant_id)
                .ok_or_else(|| AppError::LLMApi("no such assistant".to_string()))?;
            assistant.instructions = Some(spec.instructions.clone());
            assistant.model = spec.model.clone();
            Ok(assistant.clone())
        }

        async fn upload_file(&self, _path: &Path) -> AppResult<UploadedFile> {
            unreachable!()
        }

        async fn delete_file(&self, _file_id: &str) -> AppResult<()> {
            unreachable!()
        }

        async fn create_thread(&self) -> AppResult<Thread> {
            unreachable!()
        }

        async fn create_message(&self, _thread_id: &str, _content: &str, _file_id: &str) -> AppResult<()> {
            unreachable!()
        }

        async fn create_run(&self, _thread_id: &str, _assistant_id: &str) -> AppResult<Run> {
            unreachable!()
        }

        async fn retrieve_run(&self, _thread_id: &str, _run_id: &str) -> AppResult<Run> {
            unreachable!()
        }

        async fn list_messages(&self, _thread_id: &str) -> AppResult<Vec<ThreadMessage>> {
            unreachable!()
        }
    }

    fn spec(instructions: &str) -> AssistantSpec {
        AssistantSpec {
            name: "analyst".to_string(),
            instructions: instructions.to_string(),
            model: "gpt-4".to_string(),
        }
    }

    #[tokio::test]
    async fn test_concurrent_resolution_creates_once() {
        let api = Arc::new(FakeAssistants::default());
        let registry = AssistantRegistry::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let api = api.clone();
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.get_or_create(api.as_ref(), &spec("v1")).await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().id);
        }

        assert!(ids.iter().all(|id| id == "asst_0"));
        assert_eq!(api.creates.load(Ordering::SeqCst), 1);
        assert_eq!(api.lists.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_existing_assistant_is_reused_and_updated() {
        let api = FakeAssistants::default();
        api.remote.lock().unwrap().push(Assistant {
            id: "asst_remote".to_string(),
            name: Some("analyst".to_string()),
            instructions: Some("old".to_string()),
            model: "gpt-4".to_string(),
        });
        let registry = AssistantRegistry::new();

        let assistant = registry.get_or_create(&api, &spec("new")).await.unwrap();
        assert_eq!(assistant.id, "asst_remote");
        assert_eq!(assistant.instructions.as_deref(), Some("new"));
        assert_eq!(api.creates.load(Ordering::SeqCst), 0);
        assert_eq!(api.updates.load(Ordering::SeqCst), 1);

        // Unchanged spec: served from the cached handle
        registry.get_or_create(&api, &spec("new")).await.unwrap();
        assert_eq!(api.lists.load(Ordering::SeqCst), 1);
        assert_eq!(api.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_changed_instructions_update_cached_handle() {
        let api = FakeAssistants::default();
        let registry = AssistantRegistry::new();

        registry.get_or_create(&api, &spec("v1")).await.unwrap();
        let updated = registry.get_or_create(&api, &spec("v2")).await.unwrap();

        assert_eq!(updated.id, "asst_0");
        assert_eq!(updated.instructions.as_deref(), Some("v2"));
        assert_eq!(api.creates.load(Ordering::SeqCst), 1);
        assert_eq!(api.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_lookup() {
        let api = FakeAssistants::default();
        let registry = AssistantRegistry::new();

        registry.get_or_create(&api, &spec("v1")).await.unwrap();
        registry.invalidate("analyst").await;
        registry.get_or_create(&api, &spec("v1")).await.unwrap();

        assert_eq!(api.lists.load(Ordering::SeqCst), 2);
        assert_eq!(api.creates.load(Ordering::SeqCst), 1);
    }
}
