//! CEL expression checks.
//!
//! Expressions compile once, when an instance is built, and evaluate on every
//! probe. Aggregate checks see the variables the provider binds (`response`,
//! `records`, …) plus `items` when the probe produced any; each-mode checks
//! see a single item as `resource` (and `item` as an alias). A runtime error
//! or a non-boolean result counts as a failure, never as a load error.

use cel_interpreter::{Context, Program, Value};
use miette::miette;
use platform_health_config::raw::{CheckMode, RawCheck};

#[derive(Debug)]
pub struct CompiledCheck {
    program: Program,
    source: String,
    message: Option<String>,
    mode: CheckMode,
}

#[derive(Default, Debug)]
pub struct CheckSet {
    checks: Vec<CompiledCheck>,
}

impl CheckSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn compile(raw: &[RawCheck]) -> miette::Result<Self> {
        let checks = raw
            .iter()
            .map(|check| {
                let program = Program::compile(&check.check)
                    .map_err(|e| miette!("bad check expression '{}': {e}", check.check))?;
                Ok(CompiledCheck {
                    program,
                    source: check.check.clone(),
                    message: check.message.clone(),
                    mode: check.mode,
                })
            })
            .collect::<miette::Result<Vec<_>>>()?;

        Ok(Self { checks })
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn has_each(&self) -> bool {
        self.checks.iter().any(|c| c.mode == CheckMode::Each)
    }

    /// Failure messages from every aggregate-mode check. Empty means pass.
    pub fn evaluate_aggregate(
        &self,
        bindings: &serde_json::Map<String, serde_json::Value>,
    ) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| c.mode == CheckMode::Aggregate)
            .filter_map(|check| {
                let mut context = Context::default();
                for (name, value) in bindings {
                    if let Err(e) = context.add_variable(name.as_str(), value) {
                        return Some(format!("expression error: {e}"));
                    }
                }
                check.run(&context)
            })
            .collect()
    }

    /// Failure messages from every each-mode check, for a single item bound
    /// as `resource`.
    pub fn evaluate_each(&self, item: &serde_json::Value) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| c.mode == CheckMode::Each)
            .filter_map(|check| {
                let mut context = Context::default();
                for name in ["resource", "item"] {
                    if let Err(e) = context.add_variable(name, item) {
                        return Some(format!("expression error: {e}"));
                    }
                }
                check.run(&context)
            })
            .collect()
    }
}

impl CompiledCheck {
    /// `None` on pass, the failure message otherwise.
    fn run(&self, context: &Context) -> Option<String> {
        match self.program.execute(context) {
            Ok(Value::Bool(true)) => None,
            Ok(Value::Bool(false)) => Some(
                self.message
                    .clone()
                    .unwrap_or_else(|| self.source.clone()),
            ),
            Ok(other) => Some(format!(
                "expression error: '{}' evaluated to a non-boolean ({other:?})",
                self.source
            )),
            Err(e) => Some(format!("expression error: {e}")),
        }
    }
}
