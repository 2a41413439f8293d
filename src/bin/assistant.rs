//! Asistente interactivo de consola: puebla el índice una vez y entra en
//! el bucle de preguntas. `exit` termina sin más salida.

use std::io::{self, BufRead, Write};

use tracing_subscriber::EnvFilter;

use workflow_rag_assistant::{
    config::AppConfig,
    corpus,
    llm::LlmManager,
    rag,
    vector_store::{self, DocumentPolicy, VectorStore},
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env().expect("Error al cargar la configuración");
    let llm_manager = LlmManager::from_config(&cfg).expect("Error inicializando LLM Manager");
    let records = corpus::load_corpus(&cfg.corpus_path).expect(
        "Error al leer el corpus. Ejecuta primero el binario prepare_data para generarlo",
    );

    // El asistente indexa el texto completo de cada registro, salvo que
    // la política venga fijada por configuración.
    let store = VectorStore::new();
    let collection = store.get_or_create(&cfg.collection_name);
    let policy = cfg.document_policy.unwrap_or(DocumentPolicy::FullText);
    vector_store::ensure_populated(&collection, &llm_manager, &records, policy)
        .await
        .expect("Error al poblar el índice vectorial");

    println!("\n--- El asistente de workflows está listo ---");
    println!("Pregunta lo que quieras sobre los workflows (o escribe 'exit' para salir).");

    let stdin = io::stdin();
    loop {
        print!("\n> ");
        io::stdout().flush().expect("No se pudo escribir en stdout");

        let mut line = String::new();
        let bytes_read = stdin
            .lock()
            .read_line(&mut line)
            .expect("No se pudo leer de stdin");
        if bytes_read == 0 {
            break; // EOF
        }

        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        match rag::rag_query(&llm_manager, &collection, question, rag::TOP_K).await {
            Ok(answer) => println!("\nAssistant: {answer}"),
            // Sin reintentos: el fallo se muestra y el bucle continúa.
            Err(err) => eprintln!("Error al responder la consulta: {err}"),
        }
    }
}
