use epicerie_agent::tools::{tool_specs, ToolName};
use epicerie_core::catalog::Catalog;
use epicerie_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report(AppConfig::load(LoadOptions::default()));

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report<E: std::fmt::Display>(loaded: Result<AppConfig, E>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            match Catalog::load_or_builtin(config.catalog.path.as_deref()) {
                Ok(catalog) => {
                    checks.push(DoctorCheck {
                        name: "catalog_load",
                        status: CheckStatus::Pass,
                        details: format!(
                            "{} products in {} categories",
                            catalog.len(),
                            catalog.categories().len()
                        ),
                    });
                    checks.push(check_perfect_cart(&config, &catalog));
                }
                Err(error) => {
                    checks.push(DoctorCheck {
                        name: "catalog_load",
                        status: CheckStatus::Fail,
                        details: error.to_string(),
                    });
                    checks.push(skipped("perfect_cart_coverage", "catalog did not load"));
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("catalog_load", "configuration did not load"));
            checks.push(skipped("perfect_cart_coverage", "configuration did not load"));
        }
    }
    checks.push(check_tool_contract());

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Every perfect-cart id must exist in the catalog, otherwise a full score is unreachable.
fn check_perfect_cart(config: &AppConfig, catalog: &Catalog) -> DoctorCheck {
    let perfect_cart = config.perfect_cart();
    let missing = perfect_cart
        .item_ids()
        .iter()
        .filter(|item_id| catalog.find(**item_id).is_none())
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    if missing.is_empty() {
        DoctorCheck {
            name: "perfect_cart_coverage",
            status: CheckStatus::Pass,
            details: format!("all {} perfect cart items are in the catalog", perfect_cart.len()),
        }
    } else {
        DoctorCheck {
            name: "perfect_cart_coverage",
            status: CheckStatus::Fail,
            details: format!("perfect cart items missing from catalog: {}", missing.join(", ")),
        }
    }
}

fn check_tool_contract() -> DoctorCheck {
    let specs = tool_specs();
    let well_formed = specs.len() == ToolName::ALL.len()
        && specs.iter().all(|spec| spec.input_schema.get("type").is_some());

    DoctorCheck {
        name: "tool_contract",
        status: if well_formed { CheckStatus::Pass } else { CheckStatus::Fail },
        details: format!("{} tool signatures advertised", specs.len()),
    }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use epicerie_core::config::AppConfig;

    use super::{build_report, render_human, CheckStatus};

    #[test]
    fn default_setup_passes_every_check() {
        let report = build_report::<String>(Ok(AppConfig::default()));
        assert_eq!(report.overall_status, CheckStatus::Pass);
        assert_eq!(report.checks.len(), 4);
        assert!(render_human(&report).contains("- [ok] catalog_load: 30 products in 8 categories"));
    }

    #[test]
    fn unknown_perfect_cart_items_fail_coverage() {
        let mut config = AppConfig::default();
        config.scoring.perfect_cart = vec![1, 404];

        let report = build_report::<String>(Ok(config));
        let coverage = report
            .checks
            .iter()
            .find(|check| check.name == "perfect_cart_coverage")
            .expect("coverage check");
        assert_eq!(coverage.status, CheckStatus::Fail);
        assert!(coverage.details.contains("404"));
        assert_eq!(report.overall_status, CheckStatus::Fail);
    }

    #[test]
    fn config_failure_skips_dependent_checks() {
        let report = build_report(Err("scoring.perfect_cart must list at least one item id"));
        let statuses = report.checks.iter().map(|check| check.status).collect::<Vec<_>>();
        assert_eq!(
            statuses,
            vec![CheckStatus::Fail, CheckStatus::Skipped, CheckStatus::Skipped, CheckStatus::Pass]
        );
    }
}
