//! Normalización de nombres de fichero a una forma canónica apta para URLs.
//!
//! El nombre saneado se usa para componer la URL de descarga del workflow,
//! que debe coincidir con el nombre del asset saneado de forma independiente
//! en el almacén externo. Es un contrato entre sistemas: el algoritmo tiene
//! que ser determinista e idempotente en ambos lados.

/// Sanea un nombre de fichero: separa base y extensión por el último punto,
/// colapsa cada secuencia de espacios, `_`, `+` o `&` de la base en un único
/// `_`, elimina de la base todo carácter fuera de `[a-zA-Z0-9_-]` y pasa
/// base y extensión a minúsculas.
///
/// `sanitize_filename(sanitize_filename(x)) == sanitize_filename(x)`.
pub fn sanitize_filename(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((base, ext)) => {
            let clean_ext: String = ext
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .map(|c| c.to_ascii_lowercase())
                .collect();
            format!("{}.{}", sanitize_base(base), clean_ext)
        }
        None => sanitize_base(filename),
    }
}

fn sanitize_base(base: &str) -> String {
    // 1) Colapsar separadores en un único '_'
    let mut collapsed = String::with_capacity(base.len());
    let mut in_run = false;
    for ch in base.chars() {
        if ch.is_whitespace() || matches!(ch, '_' | '+' | '&') {
            if !in_run {
                collapsed.push('_');
                in_run = true;
            }
        } else {
            collapsed.push(ch);
            in_run = false;
        }
    }

    // 2) Eliminar caracteres fuera de [a-zA-Z0-9_-] y pasar a minúsculas
    collapsed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_separator_runs_and_lowercases() {
        assert_eq!(
            sanitize_filename("My Workflow + V2 & Final.JSON"),
            "my_workflow_v2_final.json"
        );
    }

    #[test]
    fn strips_characters_outside_allowed_set() {
        assert_eq!(sanitize_filename("café (copy)!.json"), "caf_copy.json");
        assert_eq!(sanitize_filename("a-b_c.d.json"), "a-b_cd.json");
    }

    #[test]
    fn is_idempotent() {
        let inputs = [
            "My Workflow + V2 & Final.JSON",
            "ya_saneado.json",
            "  espacios  .TXT",
            "sin_extension",
            "trailing_ .json",
        ];
        for input in inputs {
            let once = sanitize_filename(input);
            assert_eq!(sanitize_filename(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn output_stays_within_url_safe_charset() {
        let sanitized = sanitize_filename("Üñïçø∂é & Co. Workflow.Json");
        let (base, ext) = sanitized.rsplit_once('.').expect("debe conservar extensión");
        assert!(!base.is_empty());
        assert!(base
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-')));
        assert!(ext.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn keeps_name_without_extension_as_bare_base() {
        assert_eq!(sanitize_filename("Mi Workflow"), "mi_workflow");
    }
}
