//! Modelos de dominio (registros del corpus y metadatos extraídos de los
//! ficheros de workflow).

use serde::{Deserialize, Serialize};

/// Registro canónico de un workflow dentro del corpus.
///
/// Se crea una única vez por fichero fuente durante la construcción del
/// corpus y es inmutable a partir de ese momento. Su identificador externo
/// es el índice secuencial (base cero) de su línea en el fichero JSONL;
/// sólo es estable dentro de una misma construcción.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub source_path: String,
    pub name: String,
    pub description: String,
    pub nodes: Vec<String>,
    pub download_url: String,
}

/// Información estructural extraída de un único fichero de workflow.
///
/// `node_names` va ordenado alfabéticamente y sin duplicados. Ojo: ese
/// orden descarta el orden de ejecución original de los nodos; es una
/// transformación con pérdida asumida por el formato del corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowInfo {
    pub workflow_name: String,
    pub node_names: Vec<String>,
}
