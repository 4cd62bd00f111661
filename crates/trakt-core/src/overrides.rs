//! Overrides de ejecución.
//!
//! - Parámetros: `STEP_ID.PARAM=VALUE` reemplaza el literal de un binding
//!   `const` existente. `VALUE` se interpreta como escalar YAML.
//! - Inputs: `NAME=URI` reemplaza la `uri` de un input del pipeline.
use indexmap::IndexMap;
use serde_json::Value;

use crate::binding::Binding;
use crate::errors::DefinitionError;
use crate::pipeline::Pipeline;
use crate::suggest;

#[derive(Debug, Clone, PartialEq)]
pub struct ParamOverride {
    pub step_id: String,
    pub param: String,
    pub value: Value,
}

pub fn parse_param_override(raw: &str) -> Result<ParamOverride, DefinitionError> {
    let invalid = || DefinitionError::Invalid(format!("invalid param override '{raw}' (expected STEP_ID.PARAM=VALUE)"));
    let (target, value) = raw.split_once('=').ok_or_else(invalid)?;
    let (step_id, param) = target.trim().split_once('.').ok_or_else(invalid)?;
    if step_id.is_empty() || param.is_empty() {
        return Err(invalid());
    }
    let value = serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok(ParamOverride { step_id: step_id.to_string(),
                       param: param.to_string(),
                       value })
}

pub fn parse_param_overrides<S>(raw: &[S]) -> Result<Vec<ParamOverride>, DefinitionError>
    where S: AsRef<str>
{
    raw.iter().map(|r| parse_param_override(r.as_ref())).collect()
}

/// Aplica overrides sobre bindings `const`. Steps o parámetros desconocidos y
/// bindings que no son literales son errores.
pub fn apply_const_overrides(pipeline: &mut Pipeline, overrides: &[ParamOverride]) -> Result<(), DefinitionError> {
    for ov in overrides {
        let step_ids: Vec<String> = pipeline.steps.iter().map(|s| s.id.clone()).collect();
        let step = pipeline.step_mut(&ov.step_id).ok_or_else(|| {
                                                     let hint = suggest::hint(&ov.step_id, step_ids.iter().map(String::as_str));
                                                     DefinitionError::Invalid(format!("param override targets unknown step '{}'{hint}",
                                                                                      ov.step_id))
                                                 })?;
        let params: Vec<String> = step.bindings.keys().cloned().collect();
        let binding = step.bindings.get_mut(&ov.param).ok_or_else(|| {
                                                           let hint = suggest::hint(&ov.param, params.iter().map(String::as_str));
                                                           DefinitionError::Invalid(format!("step '{}' has no param '{}'{hint}",
                                                                                            ov.step_id, ov.param))
                                                       })?;
        if !binding.is_const() {
            return Err(DefinitionError::Invalid(format!("step '{}' param '{}' is not a const binding and cannot be overridden",
                                                        ov.step_id, ov.param)));
        }
        log::debug!("override {}.{} = {}", ov.step_id, ov.param, ov.value);
        *binding = Binding::Const(ov.value.clone());
    }
    Ok(())
}

/// Parsea `NAME=URI`.
pub fn parse_input_overrides<S>(raw: &[S]) -> Result<IndexMap<String, String>, DefinitionError>
    where S: AsRef<str>
{
    let mut out = IndexMap::new();
    for item in raw {
        let item = item.as_ref();
        match item.split_once('=') {
            Some((name, uri)) if !name.trim().is_empty() && !uri.trim().is_empty() => {
                out.insert(name.trim().to_string(), uri.trim().to_string());
            }
            _ => return Err(DefinitionError::Invalid(format!("invalid input override '{item}' (expected NAME=URI)"))),
        }
    }
    Ok(out)
}

pub fn apply_input_overrides(pipeline: &mut Pipeline, overrides: &IndexMap<String, String>) -> Result<(), DefinitionError> {
    for (name, uri) in overrides {
        let names: Vec<String> = pipeline.inputs.keys().cloned().collect();
        let artifact = pipeline.inputs.get_mut(name).ok_or_else(|| {
                                                        let hint = suggest::hint(name, names.iter().map(String::as_str));
                                                        DefinitionError::Invalid(format!("input override targets unknown input '{name}'{hint}"))
                                                    })?;
        artifact.uri = uri.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_yaml_values() {
        let ov = parse_param_override("gate.policy={mode: warn}").unwrap();
        assert_eq!(ov.step_id, "gate");
        assert_eq!(ov.param, "policy");
        assert_eq!(ov.value, json!({"mode": "warn"}));
        assert_eq!(parse_param_override("a.b=3").unwrap().value, json!(3));
        assert_eq!(parse_param_override("a.b=x=y").unwrap().value, json!("x=y"));
        assert!(parse_param_override("nodot=1").is_err());
        assert!(parse_param_override("a.b").is_err());
    }

    #[test]
    fn input_overrides_require_name_and_uri() {
        let parsed = parse_input_overrides(&["raw=data/*.csv"]).unwrap();
        assert_eq!(parsed["raw"], "data/*.csv");
        assert!(parse_input_overrides(&["raw="]).is_err());
    }
}
