use std::collections::HashSet;

use indexmap::IndexMap;

use super::Pipeline;
use crate::constants::{PIPELINE_INPUT_OWNER, SINGLE_PASS_KINDS};
use crate::errors::PipelineValidationError;
use crate::model::{CombineStrategy, ExecutionMode};

/// Valida el cableado completo del pipeline acumulando todas las
/// violaciones en un único error.
pub fn validate(pipeline: &Pipeline) -> Result<(), PipelineValidationError> {
    let mut report = PipelineValidationError::new(pipeline.name.clone());

    // nombre -> productor
    let mut produced: IndexMap<&str, &str> = pipeline.inputs.keys().map(|k| (k.as_str(), PIPELINE_INPUT_OWNER)).collect();
    let mut used: HashSet<&str> = HashSet::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();

    for step in &pipeline.steps {
        if !seen_ids.insert(step.id.as_str()) && !report.duplicate_steps.contains(&step.id) {
            report.duplicate_steps.push(step.id.clone());
        }

        let compatible = match pipeline.execution_mode {
            ExecutionMode::Batch => step.supports_batch(),
            ExecutionMode::Stream => step.supports_stream(),
        };
        if !compatible {
            report.incompatible_steps.push((step.id.clone(), pipeline.execution_mode));
        }

        for name in step.input_references() {
            if produced.contains_key(name) {
                used.insert(name);
            } else {
                report.missing_inputs.push((step.id.clone(), name.to_string()));
            }
        }

        for name in step.output_targets() {
            match produced.get(name) {
                Some(owner) => report.output_collisions.push((step.id.clone(), name.to_string(), owner.to_string())),
                None => {
                    produced.insert(name, step.id.as_str());
                }
            }
        }
    }

    // Publicar un input como output no cuenta como consumo.
    for dataset in pipeline.outputs.values() {
        if !produced.contains_key(dataset.source.as_str()) {
            report.unknown_outputs.push((dataset.name.clone(), dataset.source.clone()));
        }
    }

    for (name, artifact) in &pipeline.inputs {
        if !used.contains(name.as_str()) && artifact.is_required() {
            report.unused_inputs.push(name.clone());
        }
    }

    if pipeline.execution_mode == ExecutionMode::Stream {
        for (name, artifact) in &pipeline.inputs {
            let single_pass = SINGLE_PASS_KINDS.contains(&artifact.normalized_kind().as_str());
            if single_pass && artifact.combine_strategy != CombineStrategy::Concat {
                report.stream_combine_violations.push((name.clone(), artifact.combine_strategy));
            }
        }
    }

    if report.is_empty() {
        Ok(())
    } else {
        log::debug!("pipeline '{}' failed validation: {}", pipeline.name, report);
        Err(report)
    }
}
