//! Steps.
//!
//! - `StepHandler`: contrato que implementa cada transformación.
//! - `StepOutput`: resultado etiquetado (datos + métricas).
//! - `Step`: handler + bindings validados, tal como vive en un `Pipeline`.

pub mod definition;
pub mod handler;

pub use definition::Step;
pub use handler::{Capabilities, FnStep, StepHandler, StepInputs, StepOutput};
