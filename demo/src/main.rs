//! vigil audit engine — demo CLI
//!
//! Exercises the real engine end to end against a file-backed store:
//! recording typed events, alert dispatch, chain verification, compliance
//! export, and retention purge.
//!
//! Usage:
//!   cargo run -p demo -- record --dir ./vigil-data
//!   cargo run -p demo -- verify --dir ./vigil-data
//!   cargo run -p demo -- export --dir ./vigil-data --hours 24
//!   cargo run -p demo -- purge --dir ./vigil-data

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vigil_contracts::{AuditEvent, EngineConfig, EventResult, RiskLevel, VigilResult};
use vigil_crypto::StaticSecretProvider;
use vigil_engine::{AuditEngine, EventFilter};
use vigil_store::{AlertNotifier, CredentialOp, FileStorage, KeyOp, SecurityIncident};

// ── CLI definition ────────────────────────────────────────────────────────────

/// vigil — tamper-evident encrypted audit logging demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "vigil audit engine demo",
    long_about = "Runs the vigil audit engine against a file-backed store,\n\
                  demonstrating integrity chaining, envelope encryption,\n\
                  alerting, compliance export, and retention."
)]
struct Cli {
    /// Storage directory for the audit store.
    #[arg(long, default_value = "./vigil-data", global = true)]
    dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a batch of representative audit events.
    Record,
    /// Decrypt and chain-verify every stored event.
    Verify,
    /// Generate and verify a signed compliance report.
    Export {
        /// Report window, in hours before now.
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Run the retention sweep.
    Purge,
}

// ── Alert notifier ────────────────────────────────────────────────────────────

/// Prints alerts to stdout; a real host would page or push a notification.
struct StdoutNotifier;

impl AlertNotifier for StdoutNotifier {
    fn notify(&self, event: &AuditEvent) -> VigilResult<()> {
        println!(
            "  ALERT  seq={} {} risk={}",
            event.sequence,
            event.event_type.as_str(),
            event.risk_level.as_str()
        );
        Ok(())
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> VigilResult<()> {
    // Demo-only root secret.  A real host supplies a RootSecretProvider
    // backed by the platform keystore or an HSM.
    let provider = StaticSecretProvider::new(vec![0x42u8; 32]);
    let storage = Arc::new(FileStorage::open(cli.dir.as_str())?);
    let engine = AuditEngine::new(
        EngineConfig::default(),
        &provider,
        storage,
        Some(Arc::new(StdoutNotifier)),
    )?;
    tracing::info!(dir = %cli.dir, "audit engine opened");

    match cli.command {
        Command::Record => record_sample(&engine),
        Command::Verify => verify(&engine),
        Command::Export { hours } => export(&engine, hours),
        Command::Purge => purge(&engine),
    }
}

fn record_sample(engine: &AuditEngine) -> VigilResult<()> {
    let recorder = engine.recorder();

    let mut ctx = BTreeMap::new();
    ctx.insert("method".to_string(), "passphrase".to_string());
    recorder.record_authentication(
        "alice",
        Some("session-1".to_string()),
        EventResult::Success,
        RiskLevel::Info,
        ctx,
    )?;

    recorder.record_credential_event(
        CredentialOp::Accessed,
        "alice",
        EventResult::Success,
        RiskLevel::Low,
        BTreeMap::new(),
    )?;

    recorder.record_authentication(
        "mallory",
        None,
        EventResult::Failure,
        RiskLevel::Medium,
        BTreeMap::new(),
    )?;

    recorder.record_lockout("mallory", BTreeMap::new())?;

    recorder.record_key_event(
        KeyOp::Generated,
        "alice",
        EventResult::Success,
        RiskLevel::Low,
        BTreeMap::new(),
    )?;

    let last = recorder.record_security_event(
        SecurityIncident::SuspiciousActivity,
        Some("mallory"),
        EventResult::Denied,
        RiskLevel::Critical,
        BTreeMap::new(),
    )?;

    println!("recorded {} events (latest sequence {})", 6, last);
    Ok(())
}

fn verify(engine: &AuditEngine) -> VigilResult<()> {
    let filter = EventFilter::window(Utc::now() - Duration::days(3650), Utc::now());
    let events = engine.query(&filter)?;
    println!("chain OK — {} events decrypted and verified", events.len());
    for event in &events {
        println!(
            "  seq={:<4} {:<24} result={:<8} risk={}",
            event.sequence,
            event.event_type.as_str(),
            event.result.as_str(),
            event.risk_level.as_str()
        );
    }
    Ok(())
}

fn export(engine: &AuditEngine, hours: i64) -> VigilResult<()> {
    let filter = EventFilter::window(Utc::now() - Duration::hours(hours), Utc::now());
    let report = engine.export(&filter)?;
    engine.verify_report(&report)?;

    println!(
        "report: total={} high_risk={} failed={} users={}",
        report.summary.total_events,
        report.summary.high_risk_events,
        report.summary.failed_operations,
        report.summary.unique_users
    );
    println!("integrity tag: {}", report.integrity_tag);
    println!(
        "{}",
        serde_json::to_string_pretty(&report).unwrap_or_else(|e| format!("<serialize error: {}>", e))
    );
    Ok(())
}

fn purge(engine: &AuditEngine) -> VigilResult<()> {
    let deleted = engine.purge_expired(Utc::now())?;
    if deleted.is_empty() {
        println!("no segments past retention");
    } else {
        println!("securely deleted segments: {:?}", deleted);
    }
    Ok(())
}
