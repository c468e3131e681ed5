use anyhow::{Context, Result};
use colored::Colorize;
use std::time::Duration;

use layout_service::{
    build_info,
    config::{LogConfig, LogFormat},
    error::ErrorResponse,
    health::{HealthStatus, StatusReport},
    observability::init_tracing,
};

/// What a running instance reported
#[derive(Debug)]
struct InstanceHealth {
    live: bool,
    /// `Err` carries the joined failure message
    ready: std::result::Result<(), String>,
    report: StatusReport,
}

pub async fn execute(url: String, verbose: bool) -> Result<()> {
    let log_config = LogConfig {
        format: LogFormat::Pretty,
        ..LogConfig::default()
    };
    let _log_guard =
        init_tracing(&log_config, "app-layout").context("Failed to initialize logging")?;
    build_info::show_info();

    let base_url = url.trim_end_matches('/');
    println!("{} {}", "Checking".bold(), base_url);
    println!();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("Failed to create HTTP client")?;

    let health = query(&client, base_url).await?;

    print_line("Liveness", health.live);
    print_line("Readiness", health.ready.is_ok());
    if let Err(message) = &health.ready {
        println!("  {}", message);
    }

    println!();
    print_report(&health.report, verbose);
    println!();

    match health.ready {
        Ok(()) => {
            println!("{}", "Service is healthy and ready!".green().bold());
            Ok(())
        }
        Err(message) => anyhow::bail!("service is not ready: {}", message),
    }
}

async fn query(client: &reqwest::Client, base_url: &str) -> Result<InstanceHealth> {
    let live = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .context("Failed to reach the health endpoint")?
        .status()
        .is_success();

    let response = client
        .get(format!("{}/ready", base_url))
        .send()
        .await
        .context("Failed to reach the readiness endpoint")?;
    let ready = if response.status().is_success() {
        Ok(())
    } else {
        let status = response.status();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => format!("HTTP {}", status),
        };
        Err(message)
    };

    let response = client
        .get(format!("{}/status", base_url))
        .send()
        .await
        .context("Failed to reach the status endpoint")?;
    if !response.status().is_success() {
        anyhow::bail!("status endpoint returned HTTP {}", response.status());
    }
    let report = response
        .json::<StatusReport>()
        .await
        .context("Failed to parse status report")?;

    Ok(InstanceHealth {
        live,
        ready,
        report,
    })
}

fn print_line(label: &str, ok: bool) {
    if ok {
        println!("{:<10} {}", label, "✓ OK".green().bold());
    } else {
        println!("{:<10} {}", label, "✗ FAILED".red().bold());
    }
}

fn status_label(status: HealthStatus) -> colored::ColoredString {
    match status {
        HealthStatus::Up => "UP".green().bold(),
        HealthStatus::Down => "DOWN".red().bold(),
    }
}

fn print_report(report: &StatusReport, verbose: bool) {
    println!(
        "{} {} ({}, up {}s)",
        report.service.bold(),
        status_label(report.overall),
        report.version_info.version,
        report.uptime.as_secs()
    );

    if verbose {
        println!("  {}", report.version_info.summary().dimmed());
    }

    for check in &report.checks {
        if !verbose && check.status == HealthStatus::Up {
            continue;
        }
        let reason = if check.reason.is_empty() {
            String::new()
        } else {
            format!(" {}", check.reason)
        };
        println!(
            "  {:<16} {} {}ms{}",
            check.name,
            status_label(check.status),
            check.latency.as_millis(),
            reason
        );
    }
}
