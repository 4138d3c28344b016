use epicerie_agent::tools::tool_specs;

use super::CommandResult;

pub fn run() -> CommandResult {
    let specs = tool_specs();
    let data = serde_json::to_value(&specs).ok();
    CommandResult::success_with_data("tools", format!("{} assistant tools", specs.len()), data)
}
