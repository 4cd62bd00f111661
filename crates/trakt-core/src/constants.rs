//! Constantes del motor.
//!
//! Valores compartidos entre core, adapters y runtime. `ENGINE_VERSION`
//! participa en el hash de definición, por lo que cambiarlo invalida los
//! hashes registrados en manifests previos.

/// Versión lógica del motor incluida en `definition_hash`.
pub const ENGINE_VERSION: &str = "trakt/0.1";

/// Kind por defecto de inputs y outputs.
pub const DEFAULT_ARTIFACT_KIND: &str = "csv";

/// Filas por chunk al leer en modo stream.
pub const DEFAULT_STREAM_CHUNK_SIZE: usize = 50_000;

/// Nombre del manifest dentro del directorio de salida.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Owner registrado para los nombres que provienen de inputs del pipeline.
pub const PIPELINE_INPUT_OWNER: &str = "pipeline input";

/// Kinds de lectura de una sola pasada; en modo stream sólo admiten `concat`.
pub const SINGLE_PASS_KINDS: &[&str] = &["csv"];

/// Marcadores que convierten un evento en diagnóstico.
pub const DIAGNOSTIC_MARKERS: &[&str] = &["warning", "coercion", "missing_column"];
