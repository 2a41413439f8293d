//! Consulta RAG sobre el índice de workflows.
//!
//! Flujo:
//!   1. Embedding de la pregunta y búsqueda de los `top_k` registros más
//!      afines en la colección.
//!   2. Render determinista de los registros recuperados como bloque de
//!      contexto numerado.
//!   3. Llamada al LLM con una instrucción fija que lo restringe al
//!      contexto suministrado; la respuesta se devuelve tal cual.
//!
//! Nada valida que la respuesta generada se haya quedado realmente dentro
//! del contexto; es una limitación conocida del diseño, no un bug.

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::llm::{Embedder, Generator};
use crate::vector_store::{Collection, SearchHit};

/// Número de workflows recuperados por consulta.
pub const TOP_K: usize = 5;

const SYSTEM_PROMPT: &str = "You are 'AutomationFlow AI', a helpful assistant that helps users \
find the perfect automation workflow from a private library. Be friendly, concise, and helpful. \
Base your answer STRICTLY on the context provided.";

/// Recupera los `top_k` registros más afines a la pregunta.
pub async fn retrieve_workflows(
    embedder: &dyn Embedder,
    collection: &Collection,
    question: &str,
    top_k: usize,
) -> Result<Vec<SearchHit>> {
    let embeddings = embedder.embed_texts(&[question.to_string()]).await?;
    let query_vec = embeddings
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No se pudo generar el embedding de la consulta"))?;
    Ok(collection.query(&query_vec, top_k))
}

/// Render determinista del contexto: bloque numerado con nombre, fichero
/// (sólo el nombre base de la ruta) y descripción de cada workflow.
pub fn render_context(hits: &[SearchHit]) -> String {
    let mut context =
        String::from("Here are the most relevant workflows found in the library:\n\n");
    for (index, hit) in hits.iter().enumerate() {
        let file = Path::new(&hit.record.source_path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| hit.record.source_path.clone());

        context.push_str(&format!("--- Workflow {} ---\n", index + 1));
        context.push_str(&format!("Name: {}\n", hit.record.name));
        context.push_str(&format!("File: {}\n", file));
        context.push_str(&format!("Description: {}\n\n", hit.record.description));
    }
    context
}

/// Responde una pregunta en lenguaje natural a partir del índice.
pub async fn rag_query<L>(
    llm: &L,
    collection: &Collection,
    question: &str,
    top_k: usize,
) -> Result<String>
where
    L: Embedder + Generator,
{
    let hits = retrieve_workflows(llm, collection, question, top_k).await?;

    if hits.is_empty() {
        return Ok(
            "No relevant workflows were found in the library for this question.".to_string(),
        );
    }

    let context = render_context(&hits);
    let user_prompt = format!(
        "{context}Based on the workflows provided above, please answer my question: '{question}'"
    );

    llm.generate(SYSTEM_PROMPT, &user_prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkflowRecord;
    use crate::vector_store::{ensure_populated, DocumentPolicy, VectorStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Doble del LLM: el embedding cuenta apariciones de dos palabras clave
    /// y la generación devuelve el turno de usuario recibido, para poder
    /// inspeccionar el contexto renderizado.
    struct FakeLlm {
        generate_calls: AtomicUsize,
    }

    impl FakeLlm {
        fn new() -> Self {
            Self {
                generate_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeLlm {
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
            Ok(texts
                .iter()
                .map(|text| {
                    let lowered = text.to_lowercase();
                    vec![
                        lowered.matches("invoice").count() as f64,
                        lowered.matches("report").count() as f64,
                        1e-3,
                    ]
                })
                .collect())
        }
    }

    #[async_trait]
    impl Generator for FakeLlm {
        async fn generate(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(user_prompt.to_string())
        }
    }

    fn invoice_record() -> WorkflowRecord {
        WorkflowRecord {
            source_path: "flows/finanzas/invoice_sync.json".into(),
            name: "Invoice Sync".into(),
            description: "Syncs invoices.".into(),
            nodes: vec!["Gmail".into(), "Sheets".into()],
            download_url: "https://assets.example/invoice_sync.json".into(),
        }
    }

    fn report_record() -> WorkflowRecord {
        WorkflowRecord {
            source_path: "flows/informes/daily_report.json".into(),
            name: "Daily Report".into(),
            description: "Builds the daily report.".into(),
            nodes: vec!["Cron".into(), "Slack".into()],
            download_url: "https://assets.example/daily_report.json".into(),
        }
    }

    #[test]
    fn context_renders_numbered_blocks_with_basename_only() {
        let hits = vec![SearchHit {
            score: 1.0,
            id: "0".into(),
            document: "Invoice Sync".into(),
            record: invoice_record(),
        }];

        let context = render_context(&hits);
        assert!(context.starts_with("Here are the most relevant workflows found in the library:"));
        assert!(context.contains("--- Workflow 1 ---"));
        assert!(context.contains("Name: Invoice Sync\n"));
        assert!(context.contains("File: invoice_sync.json\n"));
        assert!(context.contains("Description: Syncs invoices.\n"));
        assert!(!context.contains("flows/finanzas"));
    }

    #[tokio::test]
    async fn answers_are_grounded_in_the_top_retrieved_workflow() {
        let store = VectorStore::new();
        let collection = store.get_or_create("workflows");
        let llm = FakeLlm::new();
        let records = vec![report_record(), invoice_record()];

        ensure_populated(&collection, &llm, &records, DocumentPolicy::FullText)
            .await
            .unwrap();

        let question = "how do I sync invoices";
        let hits = retrieve_workflows(&llm, &collection, question, TOP_K)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.name, "Invoice Sync");

        let answer = rag_query(&llm, &collection, question, TOP_K).await.unwrap();
        assert!(answer.contains("Name: Invoice Sync"));
        assert!(answer.contains("Description: Syncs invoices."));
        assert!(answer.contains("please answer my question: 'how do I sync invoices'"));
    }

    #[tokio::test]
    async fn empty_index_short_circuits_without_calling_the_generator() {
        let store = VectorStore::new();
        let collection = store.get_or_create("vacia");
        let llm = FakeLlm::new();

        ensure_populated(&collection, &llm, &[], DocumentPolicy::FullText)
            .await
            .unwrap();

        let answer = rag_query(&llm, &collection, "anything", TOP_K).await.unwrap();
        assert_eq!(
            answer,
            "No relevant workflows were found in the library for this question."
        );
        assert_eq!(llm.generate_calls.load(Ordering::SeqCst), 0);
    }
}
