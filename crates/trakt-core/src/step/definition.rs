use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::handler::{Capabilities, StepHandler};
use crate::binding::Binding;
use crate::errors::BindingError;
use crate::suggest;

/// Claves convencionales para handlers que no declaran nombres.
const FALLBACK_INPUTS: [&str; 2] = ["input", "inputs"];
const FALLBACK_OUTPUTS: [&str; 2] = ["output", "outputs"];

/// Step resuelto: handler + bindings validados contra sus nombres declarados.
#[derive(Clone)]
pub struct Step {
    pub id: String,
    pub uses: String,
    pub bindings: IndexMap<String, Binding>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    capabilities: Capabilities,
    handler: Arc<dyn StepHandler>,
}

impl Step {
    /// Construye el step validando:
    /// - inputs y outputs declarados disjuntos;
    /// - todo nombre declarado tiene binding;
    /// - outputs ligados a referencias (nunca literales);
    /// - en modo estricto, ningún binding fuera de lo declarado.
    pub fn from_handler(id: impl Into<String>,
                        uses: impl Into<String>,
                        handler: Arc<dyn StepHandler>,
                        bindings: IndexMap<String, Binding>,
                        strict: bool)
                        -> Result<Self, BindingError> {
        let id = id.into();
        let invalid = |message: String| BindingError::Invalid { step_id: id.clone(),
                                                                message };

        let mut inputs = handler.declared_inputs();
        let mut outputs = handler.declared_outputs();
        if inputs.is_empty() && outputs.is_empty() {
            inputs = FALLBACK_INPUTS.iter().filter(|k| bindings.contains_key(**k)).map(|k| k.to_string()).collect();
            outputs = FALLBACK_OUTPUTS.iter().filter(|k| bindings.contains_key(**k)).map(|k| k.to_string()).collect();
        }

        if let Some(both) = inputs.iter().find(|n| outputs.contains(n)) {
            return Err(invalid(format!("'{both}' is declared as both input and output")));
        }

        let missing_in: Vec<&String> = inputs.iter().filter(|n| !bindings.contains_key(*n)).collect();
        let missing_out: Vec<&String> = outputs.iter().filter(|n| !bindings.contains_key(*n)).collect();
        if !missing_in.is_empty() || !missing_out.is_empty() {
            return Err(invalid(format!("missing input bindings={missing_in:?}; missing output bindings={missing_out:?}")));
        }

        for name in &outputs {
            if let Some(binding) = bindings.get(name) {
                if !binding.is_output_shape() {
                    return Err(invalid(format!("output '{name}' must bind to an artifact name, a list of names or a mapping of names")));
                }
            }
        }

        if strict {
            let declared: Vec<&str> = inputs.iter().chain(outputs.iter()).map(String::as_str).collect();
            if let Some(unknown) = bindings.keys().find(|k| !declared.contains(&k.as_str())) {
                let hint = suggest::hint(unknown, declared.iter().copied());
                return Err(invalid(format!("unknown binding '{unknown}'{hint}")));
            }
        }

        let capabilities = handler.capabilities();
        Ok(Self { id,
                  uses: uses.into(),
                  bindings,
                  inputs,
                  outputs,
                  capabilities,
                  handler })
    }

    pub fn input_names(&self) -> &[String] {
        &self.inputs
    }

    pub fn output_names(&self) -> &[String] {
        &self.outputs
    }

    pub fn supports_batch(&self) -> bool {
        self.capabilities.batch
    }

    pub fn supports_stream(&self) -> bool {
        self.capabilities.stream
    }

    pub fn handler(&self) -> &Arc<dyn StepHandler> {
        &self.handler
    }

    /// Bindings que no son inputs ni outputs declarados (sólo posibles fuera
    /// del modo estricto). Se entregan al handler como literales.
    pub fn extra_bindings(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.bindings
            .iter()
            .filter(|(k, _)| !self.inputs.contains(k) && !self.outputs.contains(k))
    }

    /// Artifacts consumidos por los inputs declarados, en orden.
    pub fn input_references(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .filter_map(|n| self.bindings.get(n))
            .flat_map(Binding::references)
            .collect()
    }

    /// Nombres publicados por los outputs declarados, en orden.
    pub fn output_targets(&self) -> Vec<&str> {
        self.outputs
            .iter()
            .filter_map(|n| self.bindings.get(n))
            .flat_map(Binding::references)
            .collect()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
         .field("id", &self.id)
         .field("uses", &self.uses)
         .field("inputs", &self.inputs)
         .field("outputs", &self.outputs)
         .field("bindings", &self.bindings)
         .field("capabilities", &self.capabilities)
         .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StepError;
    use crate::model::Context;
    use crate::step::{FnStep, StepInputs, StepOutput};

    fn noop(_ctx: &Context, _inputs: StepInputs) -> Result<StepOutput, StepError> {
        Ok(StepOutput::new())
    }

    fn handler() -> Arc<dyn StepHandler> {
        Arc::new(FnStep::new(&["source"], &["result"], noop))
    }

    fn bindings(items: &[(&str, Binding)]) -> IndexMap<String, Binding> {
        items.iter().map(|(k, b)| (k.to_string(), b.clone())).collect()
    }

    #[test]
    fn reports_missing_bindings() {
        let err = Step::from_handler("s", "x", handler(), bindings(&[("source", "raw".into())]), true).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Step 's' binding error"), "{msg}");
        assert!(msg.contains("missing output bindings=[\"result\"]"), "{msg}");
    }

    #[test]
    fn strict_mode_rejects_unknown_bindings_with_hint() {
        let b = bindings(&[("source", "raw".into()), ("result", "out".into()), ("resutl", "x".into())]);
        let err = Step::from_handler("s", "x", handler(), b.clone(), true).unwrap_err();
        assert!(err.to_string().contains("did you mean 'result'"), "{err}");
        let step = Step::from_handler("s", "x", handler(), b, false).unwrap();
        assert_eq!(step.extra_bindings().count(), 1);
    }

    #[test]
    fn outputs_cannot_be_literals() {
        let b = bindings(&[("source", "raw".into()), ("result", Binding::constant("out"))]);
        assert!(Step::from_handler("s", "x", handler(), b, true).is_err());
    }

    #[test]
    fn undeclared_handler_uses_conventional_keys() {
        struct Bare;
        impl StepHandler for Bare {
            fn run(&self, _ctx: &Context, _inputs: StepInputs) -> Result<StepOutput, StepError> {
                Ok(StepOutput::new())
            }
        }
        let b = bindings(&[("inputs", Binding::list(["a", "b"])), ("output", "c".into())]);
        let step = Step::from_handler("s", "bare", Arc::new(Bare), b, true).unwrap();
        assert_eq!(step.input_references(), vec!["a", "b"]);
        assert_eq!(step.output_targets(), vec!["c"]);
        assert!(step.supports_batch() && !step.supports_stream());
    }
}
