//! Configuración del runner desde variables de entorno.
//! Convención `TRAKT_*`; el archivo `.env` se carga una sola vez.

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use trakt_core::constants::{DEFAULT_ARTIFACT_KIND, DEFAULT_STREAM_CHUNK_SIZE};

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_kind: String,
    pub stream_chunk_size: usize,
    pub manifest_path: Option<PathBuf>,
    pub telemetry_enabled: bool,
    pub service_name: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { input_dir: PathBuf::from("."),
               output_dir: PathBuf::from("outputs"),
               output_kind: DEFAULT_ARTIFACT_KIND.to_string(),
               stream_chunk_size: DEFAULT_STREAM_CHUNK_SIZE,
               manifest_path: None,
               telemetry_enabled: false,
               service_name: "trakt".to_string() }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        let defaults = Self::default();
        let stream_chunk_size = non_empty("TRAKT_STREAM_CHUNK_SIZE").and_then(|v| v.parse().ok())
                                                                    .filter(|n: &usize| *n > 0)
                                                                    .unwrap_or(defaults.stream_chunk_size);
        let telemetry_enabled = non_empty("TRAKT_TELEMETRY_ENABLED").and_then(|v| parse_bool(&v))
                                                                    .unwrap_or(defaults.telemetry_enabled);
        Self { input_dir: non_empty("TRAKT_INPUT_DIR").map(PathBuf::from).unwrap_or(defaults.input_dir),
               output_dir: non_empty("TRAKT_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
               output_kind: non_empty("TRAKT_OUTPUT_KIND").unwrap_or(defaults.output_kind),
               stream_chunk_size,
               manifest_path: non_empty("TRAKT_MANIFEST_PATH").map(PathBuf::from),
               telemetry_enabled,
               service_name: non_empty("TRAKT_SERVICE_NAME").unwrap_or(defaults.service_name) }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
