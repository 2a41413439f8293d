//! Pipeline RAG sobre una biblioteca de workflows de automatización:
//! normalización de ficheros de workflow a un corpus canónico (JSONL),
//! indexado vectorial en memoria y respuesta a preguntas en lenguaje
//! natural basada en los workflows recuperados.

pub mod api;
pub mod app_state;
pub mod config;
pub mod corpus;
pub mod llm;
pub mod models;
pub mod rag;
pub mod sanitize;
pub mod vector_store;
