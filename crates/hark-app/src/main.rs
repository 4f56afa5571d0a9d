//! Hark application binary - composition root.
//!
//! Ties the crates together into one executable:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Pick the speech platform (SAPI, or the mock with `--mock`)
//! 3. `engines`: enumerate installed recognition engines
//! 4. `listen`: create a session, configure interest, and poll the event
//!    channel on a fixed cadence until Ctrl-C
//!
//! The core is synchronous and pull-only; the tokio interval loop here is
//! the caller-side cadence the drain contract expects.

mod cli;

use std::time::Duration;

use clap::Parser;

use cli::{CliArgs, Command};
use hark_core::config::HarkConfig;
use hark_core::types::{EventKind, EventRecord};
use hark_engine::{MockPlatform, SapiPlatform, SpeechPlatform};
use hark_registry::SessionRegistry;
use hark_session::SessionOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_path = args.resolve_config_path();
    let config = HarkConfig::load_or_default(&config_path);

    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    tracing::info!("Starting Hark v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_path.display(), "Configuration resolved");

    // Keep a handle to the mock so `listen --mock` can feed demo events.
    let mock = args.mock.then(MockPlatform::new);
    let platform: Box<dyn SpeechPlatform> = match mock.clone() {
        Some(mock) => Box::new(mock),
        None => Box::new(SapiPlatform::new()),
    };
    tracing::info!(platform = platform.name(), "Speech platform selected");

    let defaults = SessionOptions {
        engine_name: None,
        scope: config.engine.scope,
        dictation: config.engine.dictation,
    };
    let registry = SessionRegistry::with_options(platform, defaults);

    match args.command {
        Command::Engines => engines(&registry),
        Command::Listen {
            engine,
            max,
            interval,
            json,
        } => listen(registry, mock, &config, engine, max, interval, json).await,
    }
}

/// Print the installed engine display names, one per line.
fn engines(registry: &SessionRegistry) -> Result<(), Box<dyn std::error::Error>> {
    let names = registry.list_engines()?;
    if names.is_empty() {
        tracing::warn!("No recognition engines installed");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

/// Create a session and poll its event channel until Ctrl-C.
async fn listen(
    mut registry: SessionRegistry,
    mock: Option<MockPlatform>,
    config: &HarkConfig,
    engine: Option<String>,
    max: Option<u32>,
    interval: Option<u64>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine_name = engine.as_deref().or(config.engine.name.as_deref());
    let id = registry.create_session(engine_name)?;
    tracing::info!(
        session = %id,
        engine = %registry.get_engine_name(&id)?,
        "Session active"
    );

    let kinds = interest_kinds(&config.events.kinds);
    if let Some((first, rest)) = kinds.split_first() {
        let rest: Vec<u32> = rest.iter().map(|k| k.raw()).collect();
        registry.set_interest(&id, first.raw(), &rest)?;
    }

    if let Some(mock) = mock {
        spawn_mock_feeder(mock);
    }

    let max_count = max.unwrap_or(config.events.max_drain).max(1);
    let period = interval.unwrap_or(config.events.poll_interval_ms).max(1);
    let mut ticker = tokio::time::interval(Duration::from_millis(period));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = registry.drain_events(&id, Some(max_count))?;
                for record in outcome.records() {
                    print_record(&record, json);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, tearing down");
                break;
            }
        }
    }

    registry.destroy_session(&id);
    tracing::info!(session = %id, valid = registry.is_valid(&id), "Session torn down");
    Ok(())
}

/// Map configured kind names to event kinds, skipping unknown names.
fn interest_kinds(names: &[String]) -> Vec<EventKind> {
    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        match EventKind::from_name(name) {
            Some(kind) => kinds.push(kind),
            None => tracing::warn!(kind = %name, "Unknown event kind in config, skipping"),
        }
    }
    kinds
}

/// Feed the mock platform a recognition event on a steady cadence so
/// `listen --mock` demonstrates the drain loop end to end.
fn spawn_mock_feeder(platform: MockPlatform) {
    tokio::spawn(async move {
        let mut offset = 0u64;
        let mut ticker = tokio::time::interval(Duration::from_millis(700));
        loop {
            ticker.tick().await;
            offset += 3_200;
            platform.push_event(EventRecord {
                event_id: EventKind::Recognition.raw(),
                stream_num: 1,
                stream_offset: offset,
                ..EventRecord::default()
            });
        }
    });
}

fn print_record(record: &EventRecord, json: bool) {
    if json {
        match serde_json::to_string(record) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize event record"),
        }
        return;
    }
    let kind = record
        .kind()
        .map(|k| format!("{k:?}"))
        .unwrap_or_else(|| format!("raw({})", record.event_id));
    println!(
        "event {kind} stream={} offset={} wparam={} lparam={}",
        record.stream_num, record.stream_offset, record.wparam, record.lparam
    );
}
