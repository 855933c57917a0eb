use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use pricecmp_core::{AppConfig, ChainProfile};
use pricecmp_fetch::{Coordinator, CoordinatorReport, PriceClient, RetryPolicy, TracingSink};

pub(crate) async fn run_download(
    config: &AppConfig,
    date: Option<NaiveDate>,
    chain_keys: &[String],
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    let chains_file = pricecmp_core::load_chains(&config.chains_path)
        .with_context(|| format!("loading {}", config.chains_path.display()))?;
    let chains = select_chains(&chains_file.chains, chain_keys)?;
    let date = date.unwrap_or_else(|| Local::now().date_naive());

    let policy = RetryPolicy {
        max_attempts: config.max_attempts,
        delay_base_ms: config.retry_delay_base_ms,
        ..RetryPolicy::default()
    };
    let client = PriceClient::new(config.request_timeout_secs, &config.user_agent, policy)?;
    let coordinator = Coordinator::new(
        Arc::new(client),
        config.download_dir.clone(),
        Arc::new(TracingSink),
    )
    .with_max_concurrent(config.max_concurrent_chains)
    .with_run_timeout(config.run_timeout_secs.map(Duration::from_secs));

    let report = coordinator.run_all(&chains, date).await;
    log_summary(&report);

    if let Some(path) = report_path {
        write_report(&report, path)?;
        tracing::info!(path = %path.display(), "run report written");
    }

    if !report.reports.is_empty() && report.overall_success_count == 0 {
        anyhow::bail!("all {} chains failed for {date}", report.reports.len());
    }
    Ok(())
}

pub(crate) fn list_chains(config: &AppConfig) -> anyhow::Result<()> {
    let chains_file = pricecmp_core::load_chains(&config.chains_path)
        .with_context(|| format!("loading {}", config.chains_path.display()))?;
    for chain in &chains_file.chains {
        let state = if chain.enabled { "enabled" } else { "disabled" };
        println!(
            "{:>4}  {:<16} {:<13} {:<8} {}",
            chain.id, chain.key, chain.protocol, state, chain.name
        );
    }
    Ok(())
}

/// Chains to run. With no keys, every configured chain (the coordinator
/// skips disabled ones); named chains run even when disabled.
fn select_chains(chains: &[ChainProfile], keys: &[String]) -> anyhow::Result<Vec<ChainProfile>> {
    if keys.is_empty() {
        return Ok(chains.to_vec());
    }
    let mut selected = Vec::with_capacity(keys.len());
    for key in keys {
        let Some(chain) = chains.iter().find(|c| c.key.eq_ignore_ascii_case(key)) else {
            anyhow::bail!("unknown chain key '{key}'");
        };
        let mut chain = chain.clone();
        chain.enabled = true;
        selected.push(chain);
    }
    Ok(selected)
}

fn log_summary(report: &CoordinatorReport) {
    for chain in &report.reports {
        if chain.success {
            tracing::info!(
                retailer = %chain.retailer_key,
                status = ?chain.status,
                files = chain.files_downloaded(),
                bytes = chain.bytes_written(),
                warnings = chain.errors.len(),
                "chain complete"
            );
        } else {
            tracing::error!(
                retailer = %chain.retailer_key,
                error = chain.errors.first().map_or("unknown error", String::as_str),
                "chain failed"
            );
        }
    }
    tracing::info!(
        run_id = %report.run_id,
        date = %report.date,
        succeeded = report.overall_success_count,
        chains = report.reports.len(),
        files = report.total_files,
        bytes = report.total_bytes,
        "download run summary"
    );
}

fn write_report(report: &CoordinatorReport, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
