use amanah_agent::prompt::{PromptContext, SystemPrompt};
use amanah_agent::provider_from_config;
use amanah_channel::gateway_from_config;
use amanah_core::config::{AppConfig, LoadOptions};
use amanah_db::{verify_loaded, DemoCatalog, InMemoryCommerce};
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;

use super::CommandResult;

const FAILURE_EXIT_CODE: u8 = 4;

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

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { FAILURE_EXIT_CODE };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_provider(&config));
            checks.push(check_gateway(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["llm_provider", "messaging_gateway"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }
    checks.push(check_system_prompt());
    checks.push(check_demo_catalog());

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_provider(config: &AppConfig) -> DoctorCheck {
    match provider_from_config(&config.llm) {
        Ok(provider) => DoctorCheck {
            name: "llm_provider",
            status: CheckStatus::Pass,
            details: format!("{} adapter ready for model `{}`", provider.name(), config.llm.model),
        },
        Err(error) => DoctorCheck {
            name: "llm_provider",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_gateway(config: &AppConfig) -> DoctorCheck {
    let base_url = config.gateway.base_url.trim();
    match gateway_from_config(&config.gateway) {
        Ok(_) if base_url.is_empty() => DoctorCheck {
            name: "messaging_gateway",
            status: CheckStatus::Pass,
            details: "no gateway base url configured; replies will only be logged".to_string(),
        },
        Ok(_) => DoctorCheck {
            name: "messaging_gateway",
            status: CheckStatus::Pass,
            details: format!("sending through `{base_url}`"),
        },
        Err(error) => DoctorCheck {
            name: "messaging_gateway",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_system_prompt() -> DoctorCheck {
    let rendered = SystemPrompt::new().and_then(|prompt| {
        prompt.render(&PromptContext::new(Utc::now().date_naive(), "6281200000000"))
    });
    match rendered {
        Ok(text) => DoctorCheck {
            name: "system_prompt",
            status: CheckStatus::Pass,
            details: format!("template renders ({} chars)", text.chars().count()),
        },
        Err(error) => DoctorCheck {
            name: "system_prompt",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_demo_catalog() -> DoctorCheck {
    match load_demo_catalog() {
        Ok(details) => DoctorCheck { name: "demo_catalog", status: CheckStatus::Pass, details },
        Err(error) => DoctorCheck {
            name: "demo_catalog",
            status: CheckStatus::Fail,
            details: format!("{error:#}"),
        },
    }
}

fn load_demo_catalog() -> anyhow::Result<String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;

    runtime.block_on(async {
        let catalog = DemoCatalog::bundled().context("bundled catalog is invalid")?;
        let references = catalog.verify();
        anyhow::ensure!(
            references.all_present,
            "catalog references are broken: {}",
            failing(&references.checks)
        );

        let store = InMemoryCommerce::default();
        let seeded = catalog.clone().load(&store).await;
        let loaded = verify_loaded(&store, &catalog).await;
        anyhow::ensure!(
            loaded.all_present,
            "records missing after load: {}",
            failing(&loaded.checks)
        );

        Ok::<_, anyhow::Error>(format!(
            "{} campaigns, {} zakat programs, {} qurban packages loaded",
            seeded.campaigns, seeded.zakat_programs, seeded.qurban_packages
        ))
    })
}

fn failing(checks: &[(String, bool)]) -> String {
    let names: Vec<&str> =
        checks.iter().filter(|(_, ok)| !ok).map(|(name, _)| name.as_str()).collect();
    names.join(", ")
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
