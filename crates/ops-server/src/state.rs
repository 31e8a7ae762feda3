use std::sync::Arc;

use ops_core::Store;
use ops_llm::LlmProcessor;

use crate::chat::ChatService;
use crate::error::AppError;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(store: Store, llm: Option<LlmProcessor>) -> Self {
        let chat = Arc::new(ChatService::new(store.clone(), llm));
        Self { store, chat }
    }

    /// Run a synchronous store operation on the blocking pool.
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Store) -> ops_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(AppError::join)??;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocking_maps_domain_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(Store::open(dir.path().join("s.db")).unwrap(), None);
        assert!(!state.chat.llm_available());

        let err = state
            .blocking(|s| s.get_tenant(7))
            .await
            .unwrap_err();
        assert!(err.0.to_string().contains("not found"));

        let tenants = state.blocking(|s| s.list_tenants()).await.unwrap();
        assert!(tenants.is_empty());
    }
}
