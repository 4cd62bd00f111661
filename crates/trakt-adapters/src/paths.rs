//! Resolución de rutas de input y output.
//!
//! Un `uri` de input es una lista separada por comas de specs relativas al
//! directorio de inputs. Cada spec es un glob (`*`, `?`, `[`), un
//! directorio (se expanden sus archivos) o un archivo existente.
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::AdapterError;

fn has_glob_token(spec: &str) -> bool {
    spec.contains(['*', '?', '['])
}

fn matches_extension(path: &Path, extension: &str) -> bool {
    if extension.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| format!(".{}", e.to_ascii_lowercase()) == extension.to_ascii_lowercase())
}

fn supported_files<I>(paths: I, extension: &str) -> Vec<PathBuf>
    where I: IntoIterator<Item = PathBuf>
{
    let mut files: Vec<PathBuf> = paths.into_iter()
                                       .filter(|p| p.is_file() && matches_extension(p, extension))
                                       .collect();
    files.sort();
    files
}

fn expand_spec(spec: &str, base_dir: &Path, extension: &str) -> Result<Vec<PathBuf>, AdapterError> {
    let path = Path::new(spec);
    let candidate = if path.is_absolute() { path.to_path_buf() } else { base_dir.join(path) };

    if has_glob_token(spec) {
        let pattern = candidate.to_string_lossy().to_string();
        let entries = glob::glob(&pattern).map_err(|e| AdapterError::Pattern { pattern: pattern.clone(),
                                                                                 message: e.to_string() })?;
        let mut matches = Vec::new();
        for entry in entries {
            match entry {
                Ok(p) => matches.push(p),
                Err(e) => log::warn!("glob '{pattern}': {e}"),
            }
        }
        return Ok(supported_files(matches, extension));
    }

    if candidate.is_dir() {
        let entries = fs::read_dir(&candidate).map_err(|e| AdapterError::io(&candidate, e))?;
        let mut children = Vec::new();
        for entry in entries {
            children.push(entry.map_err(|e| AdapterError::io(&candidate, e))?.path());
        }
        return Ok(supported_files(children, extension));
    }

    if candidate.exists() {
        if !matches_extension(&candidate, extension) {
            return Err(AdapterError::Extension { spec: spec.to_string(),
                                                 extension: extension.to_string() });
        }
        return Ok(vec![candidate]);
    }

    Ok(Vec::new())
}

/// Resuelve `source` a una lista ordenada y sin duplicados de archivos.
/// Sin coincidencias es un error.
pub fn resolve_input_paths(artifact: &str, source: &str, base_dir: &Path, extension: &str) -> Result<Vec<PathBuf>, AdapterError> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();
    for spec in source.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        for path in expand_spec(spec, base_dir, extension)? {
            let normalized = fs::canonicalize(&path).unwrap_or(path);
            if seen.insert(normalized.clone()) {
                resolved.push(normalized);
            }
        }
    }
    if resolved.is_empty() {
        return Err(AdapterError::NoInputFiles { artifact: artifact.to_string(),
                                                source_spec: source.to_string() });
    }
    log::debug!("input '{artifact}': {} archivo(s) desde '{source}'", resolved.len());
    Ok(resolved)
}

/// `uri` del dataset (relativa al directorio de outputs) o
/// `<output_dir>/<name><extension>`.
pub fn output_target_path(name: &str, uri: Option<&str>, output_dir: &Path, extension: &str) -> PathBuf {
    match uri.filter(|u| !u.trim().is_empty()) {
        Some(uri) => {
            let configured = Path::new(uri);
            if configured.is_absolute() {
                configured.to_path_buf()
            } else {
                output_dir.join(configured)
            }
        }
        None => output_dir.join(format!("{name}{extension}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "id\n1\n").unwrap();
    }

    #[test]
    fn resolves_globs_dirs_and_lists() {
        let tmp = tempfile::tempdir().unwrap();
        let parts = tmp.path().join("parts");
        fs::create_dir(&parts).unwrap();
        touch(&parts, "b.csv");
        touch(&parts, "a.csv");
        touch(&parts, "notes.txt");
        touch(tmp.path(), "extra.CSV");

        let from_dir = resolve_input_paths("raw", "parts", tmp.path(), ".csv").unwrap();
        let names: Vec<_> = from_dir.iter().map(|p| p.file_name().unwrap().to_string_lossy().to_string()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);

        let listed = resolve_input_paths("raw", "parts/*.csv, extra.CSV, parts/a.csv", tmp.path(), ".csv").unwrap();
        assert_eq!(listed.len(), 3);
    }

    #[test]
    fn wrong_extension_and_no_match_fail() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "notes.txt");
        assert!(matches!(resolve_input_paths("raw", "notes.txt", tmp.path(), ".csv"),
                         Err(AdapterError::Extension { .. })));
        let err = resolve_input_paths("raw", "missing/*.csv", tmp.path(), ".csv").unwrap_err();
        assert_eq!(err.to_string(), "No input files found for 'raw' using source 'missing/*.csv'.");
    }

    #[test]
    fn output_paths_default_to_name_and_extension() {
        let dir = Path::new("/out");
        assert_eq!(output_target_path("final", None, dir, ".csv"), PathBuf::from("/out/final.csv"));
        assert_eq!(output_target_path("final", Some("sub/x.csv"), dir, ".csv"), PathBuf::from("/out/sub/x.csv"));
    }
}
