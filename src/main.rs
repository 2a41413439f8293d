//! Servidor web de búsqueda. Carga el corpus, puebla el índice vectorial
//! una única vez antes de aceptar peticiones y expone la API de búsqueda.

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use workflow_rag_assistant::{
    api,
    app_state::AppState,
    config::AppConfig,
    corpus,
    llm::LlmManager,
    vector_store::{self, DocumentPolicy, VectorStore},
};

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración (falla rápido si falta la credencial)
    let cfg = AppConfig::from_env().expect("Error al cargar la configuración");

    // 3. Inicializar gestor de LLMs y leer el corpus
    let llm_manager = LlmManager::from_config(&cfg).expect("Error inicializando LLM Manager");
    let records = corpus::load_corpus(&cfg.corpus_path).expect(
        "Error al leer el corpus. Ejecuta primero el binario prepare_data para generarlo",
    );

    // 4. Poblar el índice antes de servir ninguna consulta.
    //    La API web indexa sólo el nombre, salvo que la política venga
    //    fijada por configuración.
    let store = VectorStore::new();
    let collection = store.get_or_create(&cfg.collection_name);
    let policy = cfg.document_policy.unwrap_or(DocumentPolicy::NameOnly);
    vector_store::ensure_populated(&collection, &llm_manager, &records, policy)
        .await
        .expect("Error al poblar el índice vectorial");

    // 5. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        llm_manager,
        collection,
    };

    // 6. Configurar el router de la API con CORS permisivo
    let app = Router::new()
        .merge(api::create_router(app_state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 7. Iniciar el servidor
    let server_addr = &cfg.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .expect("No se pudo abrir el puerto del servidor");
    info!("🚀 Servidor de búsqueda escuchando en http://{}", server_addr);

    axum::serve(listener, app).await.unwrap();
}
