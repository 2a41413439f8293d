//! Construcción del corpus: recorre un árbol de directorios con ficheros
//! de workflow, extrae sus metadatos, resuelve la descripción de cada uno
//! y persiste el resultado como JSONL canónico (un registro por línea).

use std::collections::BTreeSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::models::{WorkflowInfo, WorkflowRecord};
use crate::sanitize::sanitize_filename;

/// Fichero descriptor opcional: su texto completo (recortado) es la
/// descripción compartida de todos los workflows de su carpeta.
pub const DESCRIPTOR_FILE: &str = "README.txt";

const DEFAULT_WORKFLOW_NAME: &str = "Unnamed Workflow";

/// Resumen de los resultados de una construcción del corpus.
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub files_scanned: u32,
    pub records_written: u32,
    pub files_skipped: u32,
}

impl std::fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} ficheros escaneados, {} registros escritos, {} omitidos.",
            self.files_scanned, self.records_written, self.files_skipped
        )
    }
}

/// Extrae los metadatos estructurales de un documento de workflow.
///
/// El campo `name` es opcional (se aplica un nombre por defecto) y de la
/// lista `nodes` se recogen los nombres no vacíos, ordenados y sin
/// duplicados.
pub fn extract_workflow_info(content: &str) -> Result<WorkflowInfo> {
    let data: Value = serde_json::from_str(content)?;

    let workflow_name = data
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_WORKFLOW_NAME)
        .to_string();

    let mut node_names = BTreeSet::new();
    if let Some(nodes) = data.get("nodes").and_then(Value::as_array) {
        for node in nodes {
            if let Some(name) = node.get("name").and_then(Value::as_str) {
                if !name.is_empty() {
                    node_names.insert(name.to_string());
                }
            }
        }
    }

    Ok(WorkflowInfo {
        workflow_name,
        node_names: node_names.into_iter().collect(),
    })
}

/// Descripción sintetizada a partir de la estructura extraída. Se usa
/// únicamente cuando la carpeta no aporta un descriptor propio.
pub fn templated_description(info: &WorkflowInfo) -> String {
    let mut description = format!(
        "This is an automated workflow named '{}'.",
        info.workflow_name
    );
    if info.node_names.is_empty() {
        description.push_str(" It does not have any named nodes defined.");
    } else {
        description.push_str(&format!(
            " It connects and automates the following tools or steps: {}.",
            info.node_names.join(", ")
        ));
    }
    description
}

/// Lee el descriptor de una carpeta, si existe y tiene contenido útil.
/// Se consulta una vez por carpeta; la misma descripción vale para todos
/// los workflows que contenga (relación uno-a-muchos explícita).
pub fn folder_description(dir: &Path) -> Option<String> {
    let descriptor_path = dir.join(DESCRIPTOR_FILE);
    if !descriptor_path.is_file() {
        return None;
    }
    match fs::read_to_string(&descriptor_path) {
        Ok(content) => {
            let trimmed = content.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(err) => {
            warn!(
                "No se pudo leer {}: {}. Se ignora el descriptor.",
                descriptor_path.display(),
                err
            );
            None
        }
    }
}

/// El contenido redactado a mano siempre gana sobre el generado.
pub fn resolve_description(folder_desc: Option<&str>, info: &WorkflowInfo) -> String {
    match folder_desc {
        Some(text) => text.to_string(),
        None => templated_description(info),
    }
}

/// Recorre el árbol bajo `root` y produce los registros del corpus en
/// orden determinista: directorios y ficheros se visitan en orden
/// lexicográfico de nombre, de modo que dos construcciones sobre la misma
/// entrada generan exactamente el mismo fichero.
pub fn collect_records(
    root: &Path,
    output_name: &str,
    download_base: &str,
) -> Result<(Vec<WorkflowRecord>, BuildSummary)> {
    if !root.is_dir() {
        return Err(anyhow!("La ruta no es un directorio: {}", root.display()));
    }

    let base_url = Url::parse(download_base)
        .with_context(|| format!("URL base de descarga inválida: {download_base}"))?;

    let mut records = Vec::new();
    let mut summary = BuildSummary::default();

    let directories = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir());

    for dir_entry in directories {
        let dir = dir_entry.path();

        let mut workflow_files: Vec<String> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| {
                name != output_name
                    && Path::new(name)
                        .extension()
                        .map(|ext| ext.eq_ignore_ascii_case("json"))
                        .unwrap_or(false)
            })
            .collect();

        if workflow_files.is_empty() {
            continue;
        }
        workflow_files.sort();

        info!("Escaneando carpeta: {}", dir.display());

        let shared_description = folder_description(dir);
        if shared_description.is_some() {
            info!("  - Descriptor {DESCRIPTOR_FILE} encontrado");
        }

        for filename in workflow_files {
            summary.files_scanned += 1;
            let path = dir.join(&filename);

            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    warn!("No se pudo leer {}: {}. Se omite.", path.display(), err);
                    summary.files_skipped += 1;
                    continue;
                }
            };

            let info = match extract_workflow_info(&content) {
                Ok(info) => info,
                Err(err) => {
                    warn!("No se pudo parsear {}: {}. Se omite.", path.display(), err);
                    summary.files_skipped += 1;
                    continue;
                }
            };

            let description = resolve_description(shared_description.as_deref(), &info);

            let mut download_url = base_url.clone();
            download_url
                .path_segments_mut()
                .map_err(|_| anyhow!("URL base de descarga sin ruta: {download_base}"))?
                .pop_if_empty()
                .push(&sanitize_filename(&filename));

            records.push(WorkflowRecord {
                source_path: path.display().to_string(),
                name: info.workflow_name.clone(),
                description,
                nodes: info.node_names,
                download_url: download_url.to_string(),
            });
            summary.records_written += 1;
        }
    }

    Ok((records, summary))
}

/// Escribe el corpus como JSONL (UTF-8, un objeto por línea), machacando
/// cualquier fichero anterior. El id secuencial de cada registro es el
/// índice de su línea.
pub fn write_corpus(records: &[WorkflowRecord], path: &Path) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("No se pudo crear {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Construye el corpus completo de un directorio raíz y lo persiste.
pub fn build_corpus(root: &Path, cfg: &CorpusConfig) -> Result<BuildSummary> {
    let output_name = cfg
        .output_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let (records, summary) = collect_records(root, &output_name, &cfg.download_base_url)?;
    write_corpus(&records, &cfg.output_path)?;

    info!(
        "Corpus listo en {}. {}",
        cfg.output_path.display(),
        summary
    );
    Ok(summary)
}

/// Carga un corpus JSONL previamente construido.
pub fn load_corpus(path: &Path) -> Result<Vec<WorkflowRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("No se pudo leer el corpus {}", path.display()))?;

    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: WorkflowRecord = serde_json::from_str(line)
            .with_context(|| format!("Línea {} inválida en {}", index + 1, path.display()))?;
        records.push(record);
    }
    Ok(records)
}
