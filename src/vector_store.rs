//! Índice de similitud en memoria para los registros del corpus.
//!
//! API pública:
//!   - `VectorStore::get_or_create(name)`
//!   - `Collection::{count, add, query, is_populated}`
//!   - `ensure_populated(&Collection, &dyn Embedder, &[WorkflowRecord], DocumentPolicy)`
//!
//! La población es todo-o-nada: un marcador explícito (`PopulationMarker`)
//! se fija únicamente cuando el último lote ha quedado insertado, y un
//! fallo intermedio vacía la colección antes de propagar el error. El
//! propio marcador, protegido por un mutex asíncrono, actúa de barrera
//! single-flight frente a poblaciones concurrentes sobre un índice vacío.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::llm::Embedder;
use crate::models::WorkflowRecord;

/// Tamaño de lote impuesto por el límite de petición del proveedor de
/// embeddings. La partición en lotes cubre el corpus exactamente una vez.
pub const EMBEDDING_BATCH_SIZE: usize = 1000;

/// Política de composición del documento indexable de cada registro.
///
/// Las dos variantes corresponden a despliegues distintos del mismo
/// corpus: el asistente conversacional indexa el texto completo y la API
/// web indexa sólo el nombre. Se deja como política intercambiable en vez
/// de fijar una de las dos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentPolicy {
    FullText,
    NameOnly,
}

impl DocumentPolicy {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "full" | "full_text" => Ok(Self::FullText),
            "name" | "name_only" => Ok(Self::NameOnly),
            other => Err(anyhow!("Política de documento no soportada: {other}")),
        }
    }

    /// Texto sobre el que se calcula el embedding del registro.
    pub fn compose(&self, record: &WorkflowRecord) -> String {
        match self {
            Self::FullText => format!(
                "Workflow Name: {}\nDescription: {}\nNodes: {}",
                record.name,
                record.description,
                record.nodes.join(", ")
            ),
            Self::NameOnly => record.name.clone(),
        }
    }
}

/// Entrada del índice: embedding + texto indexado + registro completo.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub id: String,
    pub embedding: Vec<f64>,
    pub document: String,
    pub record: WorkflowRecord,
}

/// Resultado de una búsqueda por similitud, de mayor a menor afinidad.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub score: f64,
    pub id: String,
    pub document: String,
    pub record: WorkflowRecord,
}

/// Marcador de población de una colección. Sustituye al proxy frágil
/// "count > 0": sólo se fija tras confirmar el último lote.
#[derive(Debug, Clone, Default)]
pub struct PopulationMarker {
    pub populated: bool,
    pub build_id: Option<String>,
    pub populated_at: Option<String>,
}

/// Colección con nombre dentro del almacén vectorial.
pub struct Collection {
    name: String,
    entries: RwLock<Vec<VectorEntry>>,
    marker: RwLock<PopulationMarker>,
    // Barrera single-flight de la población inicial.
    populate_guard: tokio::sync::Mutex<()>,
}

impl Collection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(Vec::new()),
            marker: RwLock::new(PopulationMarker::default()),
            populate_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_populated(&self) -> bool {
        self.marker.read().unwrap().populated
    }

    pub fn population_marker(&self) -> PopulationMarker {
        self.marker.read().unwrap().clone()
    }

    /// Inserta un lote. Las cuatro listas van en paralelo posición a posición.
    pub fn add(
        &self,
        ids: Vec<String>,
        embeddings: Vec<Vec<f64>>,
        documents: Vec<String>,
        records: Vec<WorkflowRecord>,
    ) -> Result<()> {
        if ids.len() != embeddings.len()
            || ids.len() != documents.len()
            || ids.len() != records.len()
        {
            return Err(anyhow!(
                "Lote desalineado: {} ids, {} embeddings, {} documentos, {} registros",
                ids.len(),
                embeddings.len(),
                documents.len(),
                records.len()
            ));
        }

        let mut entries = self.entries.write().unwrap();
        for (((id, embedding), document), record) in ids
            .into_iter()
            .zip(embeddings)
            .zip(documents)
            .zip(records)
        {
            entries.push(VectorEntry {
                id,
                embedding,
                document,
                record,
            });
        }
        Ok(())
    }

    /// Devuelve hasta `n_results` entradas ordenadas por similitud coseno
    /// descendente respecto al embedding de la consulta. Con menos entradas
    /// que `n_results` devuelve todas sin error.
    pub fn query(&self, query_embedding: &[f64], n_results: usize) -> Vec<SearchHit> {
        let entries = self.entries.read().unwrap();
        let mut hits: Vec<SearchHit> = entries
            .iter()
            .map(|entry| SearchHit {
                score: cosine_similarity(query_embedding, &entry.embedding),
                id: entry.id.clone(),
                document: entry.document.clone(),
                record: entry.record.clone(),
            })
            .collect();

        hits.sort_by(|left, right| {
            right
                .score
                .partial_cmp(&left.score)
                .unwrap_or(Ordering::Equal)
        });
        hits.truncate(n_results);
        hits
    }

    fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    fn commit_population(&self) {
        let mut marker = self.marker.write().unwrap();
        marker.populated = true;
        marker.build_id = Some(Uuid::new_v4().to_string());
        marker.populated_at = Some(Utc::now().to_rfc3339());
    }
}

/// Registro de colecciones con nombre. Se construye una vez en el arranque
/// y se comparte vía `Arc`; no hay estado global de proceso.
pub struct VectorStore {
    collections: Mutex<HashMap<String, Arc<Collection>>>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<Collection> {
        let mut collections = self.collections.lock().unwrap();
        collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Collection::new(name)))
            .clone()
    }
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Garantiza que la colección esté poblada con el corpus, exactamente una vez.
///
/// Si el marcador ya está fijado la llamada es un no-op. En caso contrario
/// compone el documento indexable de cada registro según la política,
/// calcula los embeddings en lotes secuenciales de `EMBEDDING_BATCH_SIZE`
/// e inserta cada lote con su id secuencial global. Un fallo del proveedor
/// vacía la colección y propaga el error sin reintentos.
pub async fn ensure_populated(
    collection: &Collection,
    embedder: &dyn Embedder,
    records: &[WorkflowRecord],
    policy: DocumentPolicy,
) -> Result<()> {
    let _guard = collection.populate_guard.lock().await;

    if collection.is_populated() {
        info!(
            "La colección '{}' ya está poblada con {} entradas. Se omite la carga.",
            collection.name(),
            collection.count()
        );
        return Ok(());
    }

    info!(
        "Poblando la colección '{}' con {} registros...",
        collection.name(),
        records.len()
    );

    let total_batches = records.len().div_ceil(EMBEDDING_BATCH_SIZE);
    for (batch_index, batch) in records.chunks(EMBEDDING_BATCH_SIZE).enumerate() {
        let start = batch_index * EMBEDDING_BATCH_SIZE;
        let documents: Vec<String> = batch.iter().map(|r| policy.compose(r)).collect();
        let ids: Vec<String> = (start..start + batch.len()).map(|i| i.to_string()).collect();

        info!(
            "Calculando embeddings del lote {}/{total_batches}...",
            batch_index + 1
        );
        let embeddings = match embedder.embed_texts(&documents).await {
            Ok(embeddings) => embeddings,
            Err(err) => {
                // Población todo-o-nada: sin marcador no puede quedar
                // una colección a medio cargar.
                collection.clear();
                return Err(err);
            }
        };

        collection.add(ids, embeddings, documents, batch.to_vec())?;
    }

    collection.commit_population();
    info!(
        "Población completada. Total de entradas: {}",
        collection.count()
    );
    Ok(())
}

/// Similitud coseno entre dos vectores. Devuelve 0.0 para vectores
/// degenerados (vacíos, de longitud distinta o de norma nula).
pub fn cosine_similarity(query: &[f64], candidate: &[f64]) -> f64 {
    if query.is_empty() || query.len() != candidate.len() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut query_norm = 0.0;
    let mut candidate_norm = 0.0;
    for (q, c) in query.iter().zip(candidate) {
        dot += q * c;
        query_norm += q * q;
        candidate_norm += c * c;
    }

    let denom = query_norm.sqrt() * candidate_norm.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn approx_eq(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    fn make_record(index: usize) -> WorkflowRecord {
        WorkflowRecord {
            source_path: format!("flows/wf_{index}.json"),
            name: format!("Workflow {index}"),
            description: format!("Workflow de prueba número {index}."),
            nodes: vec!["Gmail".to_string(), "Sheets".to_string()],
            download_url: format!("https://assets.example/wf_{index}.json"),
        }
    }

    /// Embedder determinista que registra el tamaño de cada lote recibido.
    struct RecordingEmbedder {
        calls: Mutex<Vec<usize>>,
        fail_on_call: Option<usize>,
        invocations: AtomicUsize,
    }

    impl RecordingEmbedder {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on_call: None,
                invocations: AtomicUsize::new(0),
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Self::new()
            }
        }

        fn batch_sizes(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
            let call = self.invocations.fetch_add(1, AtomicOrdering::SeqCst) + 1;
            if self.fail_on_call == Some(call) {
                return Err(anyhow!("fallo simulado del proveedor"));
            }
            self.calls.lock().unwrap().push(texts.len());
            Ok(texts
                .iter()
                .map(|text| vec![text.len() as f64, 1.0])
                .collect())
        }
    }

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let vec = [1.0, 2.0, 3.0, 4.0];
        assert!(approx_eq(cosine_similarity(&vec, &vec), 1.0));
    }

    #[test]
    fn cosine_is_zero_for_orthogonal_or_degenerate_vectors() {
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0));
        assert!(approx_eq(cosine_similarity(&[], &[]), 0.0));
        assert!(approx_eq(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0));
    }

    #[test]
    fn query_returns_all_entries_when_index_is_smaller_than_k() {
        let collection = Collection::new("test");
        let records: Vec<WorkflowRecord> = (0..3).map(make_record).collect();
        collection
            .add(
                vec!["0".into(), "1".into(), "2".into()],
                vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]],
                records.iter().map(|r| r.name.clone()).collect(),
                records,
            )
            .unwrap();

        let hits = collection.query(&[1.0, 0.0], 5);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, "0");
        assert_eq!(hits[2].id, "2");
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[test]
    fn add_rejects_misaligned_batches() {
        let collection = Collection::new("test");
        let result = collection.add(
            vec!["0".into()],
            vec![],
            vec!["doc".into()],
            vec![make_record(0)],
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn populates_in_exact_batches_of_one_thousand() {
        let collection = Collection::new("test");
        let embedder = RecordingEmbedder::new();
        let records: Vec<WorkflowRecord> = (0..2500).map(make_record).collect();

        ensure_populated(&collection, &embedder, &records, DocumentPolicy::NameOnly)
            .await
            .unwrap();

        assert_eq!(embedder.batch_sizes(), vec![1000, 1000, 500]);
        assert_eq!(collection.count(), 2500);
        assert!(collection.is_populated());

        // Cobertura exacta: cada id secuencial aparece una única vez.
        let entries = collection.entries.read().unwrap();
        let mut ids: Vec<usize> = entries.iter().map(|e| e.id.parse().unwrap()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..2500).collect::<Vec<usize>>());
    }

    #[tokio::test]
    async fn second_population_is_a_no_op() {
        let collection = Collection::new("test");
        let embedder = RecordingEmbedder::new();
        let records: Vec<WorkflowRecord> = (0..3).map(make_record).collect();

        ensure_populated(&collection, &embedder, &records, DocumentPolicy::FullText)
            .await
            .unwrap();
        let marker_before = collection.population_marker();
        ensure_populated(&collection, &embedder, &records, DocumentPolicy::FullText)
            .await
            .unwrap();

        assert_eq!(embedder.batch_sizes(), vec![3]);
        assert_eq!(collection.count(), 3);
        assert_eq!(
            collection.population_marker().build_id,
            marker_before.build_id
        );
    }

    #[tokio::test]
    async fn failed_population_rolls_back_to_empty() {
        let collection = Collection::new("test");
        let embedder = RecordingEmbedder::failing_on(2);
        let records: Vec<WorkflowRecord> = (0..1500).map(make_record).collect();

        let result =
            ensure_populated(&collection, &embedder, &records, DocumentPolicy::NameOnly).await;

        assert!(result.is_err());
        assert_eq!(collection.count(), 0);
        assert!(!collection.is_populated());
    }

    #[test]
    fn document_policy_composes_expected_texts() {
        let record = WorkflowRecord {
            source_path: "flows/invoice_sync.json".into(),
            name: "Invoice Sync".into(),
            description: "Syncs invoices.".into(),
            nodes: vec!["Gmail".into(), "Sheets".into()],
            download_url: "https://assets.example/invoice_sync.json".into(),
        };

        assert_eq!(
            DocumentPolicy::FullText.compose(&record),
            "Workflow Name: Invoice Sync\nDescription: Syncs invoices.\nNodes: Gmail, Sheets"
        );
        assert_eq!(DocumentPolicy::NameOnly.compose(&record), "Invoice Sync");
    }

    #[test]
    fn store_returns_same_collection_for_same_name() {
        let store = VectorStore::new();
        let first = store.get_or_create("workflows");
        let second = store.get_or_create("workflows");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "workflows");
    }
}
