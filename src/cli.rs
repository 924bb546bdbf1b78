//! Subcommand implementations for the waypoints binary

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use waypoints::{LoyaltyConfig, RewardLedger, SubmitOutcome, WebhookNotifier};

/// Default ledger location (~/.waypoints/ledger.db).
fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".waypoints")
        .join("ledger.db")
}

/// Build the ledger from CLI options: config file (or built-in tables),
/// database path, and the webhook notifier when one is configured.
pub fn open_ledger(db: Option<PathBuf>, config_path: Option<&Path>) -> Result<RewardLedger> {
    let config = LoyaltyConfig::load(config_path)?;
    let webhook = config.analytics_webhook.clone();
    let db_path = db.unwrap_or_else(default_db_path);

    let mut ledger = RewardLedger::open(&db_path, config)
        .with_context(|| format!("Failed to open ledger at {}", db_path.display()))?;
    if let Some(endpoint) = webhook {
        ledger = ledger.with_notifier(Arc::new(WebhookNotifier::new(endpoint)));
    }
    Ok(ledger)
}

pub fn submit_command(
    ledger: &RewardLedger,
    user: &str,
    action: &str,
    points: u32,
    meta: &[String],
) -> Result<()> {
    let metadata = parse_metadata(meta)?;

    match ledger.submit_action(user, action, points, &metadata)? {
        SubmitOutcome::Committed(receipt) => {
            println!(
                "Committed: +{} points (balance {})",
                receipt.points_awarded, receipt.new_balance
            );
            if let Some(tier) = receipt.new_tier {
                println!("Tier upgraded to {tier}!");
            }
        }
        SubmitOutcome::Rejected(reason) => {
            println!("Rejected ({reason}): {}", reason.user_message());
        }
    }
    Ok(())
}

pub fn eligibility_command(ledger: &RewardLedger, user: &str, action: &str) -> Result<()> {
    let report = ledger.eligibility(user, action)?;

    if report.eligible {
        println!("Eligible");
    } else if let Some(reason) = report.reason {
        println!("Not eligible ({reason}): {}", reason.user_message());
    }
    if let Some(at) = report.next_eligible_at {
        println!("  next eligible at: {at}");
    }
    print_quota("today", report.remaining_today);
    print_quota("this week", report.remaining_this_week);
    print_quota("this month", report.remaining_this_month);
    Ok(())
}

pub fn tier_command(ledger: &RewardLedger, user: &str) -> Result<()> {
    let info = ledger.tier_info(user)?;

    println!("{}: {} points (x{} earning)", info.tier_name, info.points, info.multiplier);
    match info.next_tier_threshold {
        Some(threshold) => println!("  next tier at {threshold} points"),
        None => println!("  top tier reached"),
    }
    for benefit in &info.benefits {
        println!("  - {benefit}");
    }
    Ok(())
}

pub fn history_command(ledger: &RewardLedger, user: &str, limit: u32) -> Result<()> {
    let records = ledger.history(user, limit)?;
    if records.is_empty() {
        println!("No awards recorded");
        return Ok(());
    }

    for record in records {
        let verified = if record.verified { "" } else { " (unverified)" };
        println!(
            "{}  {:>6} pts  {}{}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.points_awarded,
            record.action,
            verified
        );
    }
    Ok(())
}

fn print_quota(label: &str, remaining: Option<u32>) {
    if let Some(n) = remaining {
        println!("  remaining {label}: {n}");
    }
}

fn parse_metadata(entries: &[String]) -> Result<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("Invalid metadata entry '{entry}', expected KEY=VALUE");
        };
        metadata.insert(key.to_string(), value.to_string());
    }
    Ok(metadata)
}
