//! Estado compartido del servidor web. Se construye una vez en el
//! arranque y se clona barato en cada handler.

use std::sync::Arc;

use crate::{config::AppConfig, llm::LlmManager, vector_store::Collection};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub llm_manager: LlmManager,
    pub collection: Arc<Collection>,
}
