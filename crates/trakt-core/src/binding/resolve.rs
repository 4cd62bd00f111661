use indexmap::IndexMap;

use super::Binding;
use crate::errors::BindingError;
use crate::model::Payload;
use crate::step::{Step, StepOutput};

/// Namespace de artifacts de un run: nombre -> payload.
pub type Namespace = IndexMap<String, Payload>;

/// Resuelve un binding de input contra el namespace.
pub fn resolve_binding(binding: &Binding, namespace: &Namespace, step_id: &str) -> Result<Payload, BindingError> {
    match binding {
        Binding::Const(v) | Binding::Literal(v) => Ok(Payload::Value(v.clone())),
        Binding::Ref(name) => namespace.get(name)
                                       .cloned()
                                       .ok_or_else(|| BindingError::UnknownArtifact { step_id: step_id.to_string(),
                                                                                      name: name.clone() }),
        Binding::List(items) => items.iter()
                                     .map(|b| resolve_binding(b, namespace, step_id))
                                     .collect::<Result<Vec<_>, _>>()
                                     .map(Payload::List),
        Binding::Map(items) => items.iter()
                                    .map(|(k, b)| resolve_binding(b, namespace, step_id).map(|p| (k.clone(), p)))
                                    .collect::<Result<IndexMap<_, _>, _>>()
                                    .map(Payload::Map),
    }
}

/// Distribuye los datos devueltos por un step en los nombres publicados
/// según sus bindings de output.
pub fn materialize_outputs(step: &Step, output: StepOutput) -> Result<Namespace, BindingError> {
    let StepOutput { mut data, .. } = output;
    let mut produced = Namespace::new();
    for key in step.output_names() {
        let shape_err = |message: String| BindingError::OutputShape { step_id: step.id.clone(),
                                                                     key: key.clone(),
                                                                     message };
        let binding = step.bindings
                          .get(key)
                          .ok_or_else(|| shape_err("output has no binding".to_string()))?;
        let value = data.shift_remove(key)
                        .ok_or_else(|| BindingError::MissingOutputKey { step_id: step.id.clone(),
                                                                        key: key.clone() })?;
        match binding {
            Binding::Ref(target) => {
                produced.insert(target.clone(), value);
            }
            Binding::List(targets) => {
                let kind = value.kind_name();
                let items = value.into_list()
                                 .ok_or_else(|| shape_err(format!("expected a list, got {kind}")))?;
                if items.len() != targets.len() {
                    return Err(shape_err(format!("expected {} values, got {}", targets.len(), items.len())));
                }
                for (target, item) in targets.iter().zip(items) {
                    match target {
                        Binding::Ref(name) => {
                            produced.insert(name.clone(), item);
                        }
                        other => return Err(shape_err(format!("list entries must be artifact names, got {}", other.to_json()))),
                    }
                }
            }
            Binding::Map(targets) => {
                let kind = value.kind_name();
                let mut items = value.into_map()
                                     .ok_or_else(|| shape_err(format!("expected a mapping, got {kind}")))?;
                for (source_key, target) in targets {
                    let item = items.shift_remove(source_key)
                                    .ok_or_else(|| shape_err(format!("missing key '{source_key}' in returned mapping")))?;
                    match target {
                        Binding::Ref(name) => {
                            produced.insert(name.clone(), item);
                        }
                        other => return Err(shape_err(format!("mapping values must be artifact names, got {}", other.to_json()))),
                    }
                }
            }
            Binding::Const(_) | Binding::Literal(_) => {
                return Err(shape_err("output bindings cannot be literals".to_string()));
            }
        }
    }
    Ok(produced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StepError;
    use crate::model::{Context, Table};
    use crate::step::{FnStep, StepHandler, StepInputs};
    use serde_json::json;
    use std::sync::Arc;

    fn table(id: i64) -> Payload {
        Table::from_records(&[json!({ "id": id })]).unwrap().into()
    }

    fn namespace() -> Namespace {
        let mut ns = Namespace::new();
        ns.insert("a".into(), table(1));
        ns.insert("b".into(), table(2));
        ns
    }

    #[test]
    fn resolves_list_bindings_in_order() {
        let resolved = resolve_binding(&Binding::list(["b", "a"]), &namespace(), "s").unwrap();
        let Payload::List(items) = resolved else { panic!("expected list") };
        let ids: Vec<i64> = items.iter()
                                 .map(|p| p.as_table().unwrap().get(0, "id").unwrap().as_i64().unwrap())
                                 .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn unknown_reference_suggests_const() {
        let err = resolve_binding(&Binding::reference("missing"), &namespace(), "s").unwrap_err();
        assert!(err.to_string().contains("{const: ...}"), "{err}");
        let literal = resolve_binding(&Binding::constant("missing"), &namespace(), "s").unwrap();
        assert_eq!(literal.as_str(), Some("missing"));
    }

    fn split_step(binding: Binding) -> Step {
        let handler: Arc<dyn StepHandler> =
            Arc::new(FnStep::new(&["source"], &["parts"], |_ctx: &Context, _i: StepInputs| Ok::<_, StepError>(StepOutput::new())));
        let bindings = [("source".to_string(), Binding::reference("a")), ("parts".to_string(), binding)].into_iter().collect();
        Step::from_handler("split", "split", handler, bindings, true).unwrap()
    }

    #[test]
    fn scatters_list_and_mapping_outputs() {
        let step = split_step(Binding::list(["x", "y"]));
        let out = StepOutput::single("parts", Payload::List(vec![table(1), table(2)]));
        let produced = materialize_outputs(&step, out).unwrap();
        assert_eq!(produced.keys().collect::<Vec<_>>(), vec!["x", "y"]);

        let step = split_step(Binding::map([("left", "l"), ("right", "r")]));
        let out = StepOutput::single("parts", json!({"left": 1, "right": 2}));
        let produced = materialize_outputs(&step, out).unwrap();
        assert_eq!(produced["r"].as_value(), Some(&json!(2)));
    }

    #[test]
    fn rejects_mismatched_outputs() {
        let step = split_step(Binding::list(["x", "y"]));
        let err = materialize_outputs(&step, StepOutput::single("parts", Payload::List(vec![table(1)]))).unwrap_err();
        assert!(matches!(err, BindingError::OutputShape { .. }));

        let err = materialize_outputs(&step, StepOutput::new()).unwrap_err();
        assert!(matches!(err, BindingError::MissingOutputKey { .. }));
    }
}
