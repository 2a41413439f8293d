//! Carga y gestión de configuración de la aplicación (LLM + superficies).

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::vector_store::DocumentPolicy;

/// Fichero JSONL que produce el constructor del corpus, y del que leen
/// todas las superficies de consulta.
pub const DEFAULT_CORPUS_FILE: &str = "processed_workflows.jsonl";

#[derive(Clone, Debug)]
pub enum LlmProvider {
    OpenAI,
    Gemini,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }
}

/// Configuración completa de las superficies de consulta (web, CLI, bot).
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Credencial del proveedor de embeddings/generación. Se valida aquí
    /// para fallar en el arranque; Rig la vuelve a leer del entorno.
    pub openai_api_key: String,
    /// Credencial del bot de Discord; sólo la exige ese binario.
    pub discord_token: Option<String>,
    pub server_addr: String,

    pub llm_provider: LlmProvider,
    pub llm_embedding_model: String,
    pub llm_chat_model: String,

    pub corpus_path: PathBuf,
    pub collection_name: String,
    /// Política de composición del documento indexable. `None` deja que
    /// cada superficie aplique su variante de despliegue.
    pub document_policy: Option<DocumentPolicy>,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("Falta OPENAI_API_KEY en el entorno"))?;
        let discord_token = env::var("DISCORD_BOT_TOKEN").ok();

        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());

        let llm_provider_str =
            env::var("LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider = LlmProvider::from_str(&llm_provider_str)?;

        let llm_embedding_model = env::var("LLM_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let llm_chat_model =
            env::var("LLM_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let corpus_path = PathBuf::from(
            env::var("CORPUS_FILE").unwrap_or_else(|_| DEFAULT_CORPUS_FILE.to_string()),
        );
        let collection_name =
            env::var("COLLECTION_NAME").unwrap_or_else(|_| "workflows".to_string());
        let document_policy = match env::var("SEARCH_DOCUMENT_POLICY") {
            Ok(value) => Some(DocumentPolicy::from_str(&value)?),
            Err(_) => None,
        };

        Ok(Self {
            openai_api_key,
            discord_token,
            server_addr,
            llm_provider,
            llm_embedding_model,
            llm_chat_model,
            corpus_path,
            collection_name,
            document_policy,
        })
    }
}

/// Configuración del constructor del corpus. No necesita credenciales:
/// la preparación de datos es puramente local.
#[derive(Clone, Debug)]
pub struct CorpusConfig {
    pub output_path: PathBuf,
    /// URL base pública donde se sirven los ficheros de workflow saneados.
    pub download_base_url: String,
}

impl CorpusConfig {
    pub fn from_env() -> Result<Self> {
        let output_path = PathBuf::from(
            env::var("CORPUS_FILE").unwrap_or_else(|_| DEFAULT_CORPUS_FILE.to_string()),
        );
        let download_base_url = env::var("WORKFLOW_DOWNLOAD_BASE_URL")
            .unwrap_or_else(|_| "https://pub-2f7370fd7b2c4f79969d428dc6910b02.r2.dev".to_string());

        Ok(Self {
            output_path,
            download_base_url,
        })
    }
}
