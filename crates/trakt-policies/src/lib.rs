//! trakt-policies: políticas declarativas sobre tablas.
//!
//! Combine y schema se aplican al cargar inputs; join, dedupe, rename y
//! quality gates se exponen como funciones y como steps incorporados
//! (`register_builtins`). Todas comparten el contrato warn/fail de
//! `decision`.

pub mod combine;
pub mod decision;
pub mod dedupe;
pub mod errors;
pub mod join;
pub mod quality;
pub mod rename;
pub mod schema;
pub mod steps;

pub use combine::combine_tables;
pub use decision::{emit_policy_event, PolicyMode};
pub use dedupe::{apply_dedupe_policy, DedupePolicy, Winner};
pub use errors::PolicyError;
pub use join::{apply_join_policy, CollisionMode, JoinHow, JoinPolicy, JoinStats, UnmatchedMode};
pub use quality::{evaluate_quality_gates, QualityGate, QualityGatePolicy, QualityMetrics, RowCountBounds};
pub use rename::{apply_rename_policy, RenamePolicy};
pub use schema::validate_table_schema;
pub use steps::{register_builtins, DedupeStep, JoinStep, QualityGateStep, RenameStep};
