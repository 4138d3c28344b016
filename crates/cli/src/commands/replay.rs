use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use epicerie_agent::tools::{dispatch, ToolSettings};
use epicerie_core::catalog::Catalog;
use epicerie_core::scoring::PerfectCart;
use epicerie_core::session::Surface;
use epicerie_core::storefront::{CheckoutSummary, Storefront};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{load_config_and_catalog, CommandResult, EXIT_REPLAY_INPUT};

/// One scripted shopper action.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayStep {
    Visit { surface: Surface },
    Tool {
        name: String,
        #[serde(default)]
        input: Value,
    },
    Checkout,
    Reset,
}

#[derive(Debug, Serialize)]
struct StepRecord {
    index: usize,
    step: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    steps: Vec<StepRecord>,
    cart: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkout: Option<CheckoutSummary>,
}

pub fn run(path: &Path) -> CommandResult {
    let steps = match read_steps(path) {
        Ok(steps) => steps,
        Err(error) => {
            return CommandResult::failure(
                "replay",
                "replay_input",
                format!("{error:#}"),
                EXIT_REPLAY_INPUT,
            )
        }
    };

    let (config, catalog) = match load_config_and_catalog("replay") {
        Ok(loaded) => loaded,
        Err(failure) => return failure,
    };

    let settings = ToolSettings::from(&config.assistant);
    let report = replay(catalog, config.perfect_cart(), &settings, steps);
    let message = format!("replayed {} steps", report.steps.len());
    CommandResult::success_with_data("replay", message, serde_json::to_value(&report).ok())
}

fn read_steps(path: &Path) -> anyhow::Result<Vec<ReplayStep>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read replay file `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("could not parse replay file `{}`", path.display()))
}

/// Runs `steps` against a fresh storefront. Tool failures are recorded on the
/// step and do not stop the replay.
pub fn replay(
    catalog: Arc<Catalog>,
    perfect_cart: PerfectCart,
    settings: &ToolSettings,
    steps: Vec<ReplayStep>,
) -> ReplayReport {
    let mut storefront = Storefront::with_system_clock(catalog, perfect_cart);
    let mut records = Vec::with_capacity(steps.len());
    let mut checkout = None;

    for (index, step) in steps.into_iter().enumerate() {
        let record = match step {
            ReplayStep::Visit { surface } => {
                let outcome = storefront.visit(surface);
                StepRecord::output(index, "visit", serde_json::to_value(outcome).ok())
            }
            ReplayStep::Tool { name, input } => {
                match dispatch(storefront.cart_mut(), &name, input, settings) {
                    Ok(output) => StepRecord::output(index, "tool", Some(output.to_value())),
                    Err(error) => StepRecord {
                        index,
                        step: "tool",
                        output: None,
                        error: Some(error.to_string()),
                    },
                }
            }
            ReplayStep::Checkout => {
                let summary = storefront.checkout();
                let record =
                    StepRecord::output(index, "checkout", serde_json::to_value(&summary).ok());
                checkout = Some(summary);
                record
            }
            ReplayStep::Reset => {
                storefront.start_over();
                checkout = None;
                let session = json!({ "session": storefront.session().state() });
                StepRecord::output(index, "reset", Some(session))
            }
        };
        records.push(record);
    }

    ReplayReport {
        steps: records,
        cart: serde_json::to_value(storefront.cart().summary()).unwrap_or(Value::Null),
        checkout,
    }
}

impl StepRecord {
    fn output(index: usize, step: &'static str, output: Option<Value>) -> Self {
        Self { index, step, output, error: None }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use epicerie_agent::tools::ToolSettings;
    use epicerie_core::catalog::Catalog;
    use epicerie_core::scoring::PerfectCart;
    use serde_json::json;

    use super::{replay, ReplayStep};

    fn steps(raw: serde_json::Value) -> Vec<ReplayStep> {
        serde_json::from_value(raw).expect("replay steps")
    }

    #[test]
    fn scripted_session_scores_the_cart_at_checkout() {
        let catalog = Arc::new(Catalog::builtin().expect("builtin catalog"));
        let report = replay(
            catalog,
            PerfectCart::default(),
            &ToolSettings::default(),
            steps(json!([
                {"type": "visit", "surface": "chat"},
                {"type": "tool", "name": "addToCart", "input": {"itemId": 1, "quantity": 2}},
                {"type": "tool", "name": "addToCart", "input": {"itemId": 4}},
                {"type": "checkout"}
            ])),
        );

        assert_eq!(report.steps.len(), 4);
        let added = report.steps[1].output.as_ref().map(|output| output["action"].clone());
        assert_eq!(added, Some(json!("added")));
        let checkout = report.checkout.expect("checkout summary");
        assert_eq!(checkout.cart.unique_items, 2);
        assert_eq!(checkout.score.matched_count, 2);
    }

    #[test]
    fn tool_errors_are_recorded_without_stopping() {
        let catalog = Arc::new(Catalog::builtin().expect("builtin catalog"));
        let report = replay(
            catalog,
            PerfectCart::default(),
            &ToolSettings::default(),
            steps(json!([
                {"type": "tool", "name": "applyCoupon", "input": {}},
                {"type": "tool", "name": "addToCart", "input": {"itemId": 3}}
            ])),
        );

        let rejected = report.steps[0].error.as_deref().unwrap_or_default();
        assert!(rejected.contains("applyCoupon"));
        assert!(report.steps[1].error.is_none());
        assert_eq!(report.cart["uniqueItems"], json!(1));
        assert!(report.checkout.is_none());
    }

    #[test]
    fn unknown_step_types_are_rejected() {
        let parsed = serde_json::from_value::<Vec<ReplayStep>>(json!([{"type": "teleport"}]));
        assert!(parsed.is_err());
    }
}
