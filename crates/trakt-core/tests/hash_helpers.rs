use std::sync::Arc;

use serde_json::json;
use trakt_core::hashing::hash_value;
use trakt_core::{Artifact, Binding, Context, FnStep, OutputDataset, Pipeline, Step, StepError, StepHandler, StepInputs, StepOutput};

#[test]
fn hash_value_produces_hex_64() {
    let v = json!({"b":2, "a":1});
    let h = hash_value(&v);
    // blake3 hex length is 64
    assert_eq!(h.len(), 64);
    // deterministic: same value with different key order yields same hash
    let v2 = json!({"a":1, "b":2});
    assert_eq!(h, hash_value(&v2));
}

fn pipeline(factor: i64) -> Pipeline {
    let handler: Arc<dyn StepHandler> = Arc::new(FnStep::new(&["input", "factor"], &["output"], |_ctx: &Context, _i: StepInputs| {
                                            Ok::<_, StepError>(StepOutput::new())
                                        }));
    let bindings = [("input".to_string(), Binding::reference("raw")),
                    ("factor".to_string(), Binding::constant(factor)),
                    ("output".to_string(), Binding::reference("scaled"))].into_iter()
                                                                          .collect();
    Pipeline::new("hashing").add_input(Artifact::csv("raw", "raw.csv"))
                            .add_step(Step::from_handler("scale", "scale", handler, bindings, true).unwrap())
                            .add_output(OutputDataset::new("final", "scaled"))
}

#[test]
fn definition_hash_tracks_const_params() {
    assert_eq!(pipeline(2).definition_hash(), pipeline(2).definition_hash());
    assert_ne!(pipeline(2).definition_hash(), pipeline(3).definition_hash());
}
