//! Construcción del corpus desde la línea de comandos. No necesita
//! credenciales: recorre el directorio raíz indicado (o el actual),
//! normaliza los ficheros de workflow y escribe el JSONL canónico.

use std::env;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use workflow_rag_assistant::{config::CorpusConfig, corpus};

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = CorpusConfig::from_env().expect("Error al cargar la configuración");
    let root = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    println!("Iniciando la preparación de datos...");
    let summary = corpus::build_corpus(&root, &cfg).expect("Error construyendo el corpus");

    println!("\n--- HECHO ---");
    println!("{summary}");
    println!(
        "La base de conocimiento consolidada está en: {}",
        cfg.output_path.display()
    );
}
