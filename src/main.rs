// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! session-telemetry entry point - runs simulated sessions through the
//! telemetry plugin and prints what was recorded.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::{json, Value};

use session_telemetry::config::{self, CliOptions, TelemetryConfig};
use session_telemetry::telemetry::{
    init_logging, InMemoryTracer, LoggingConfig, PeriodicReader, SpanData, SpanStatus, Tracer,
    TracingTracer,
};
use session_telemetry::trace::{RequestHooks, RequestInfo};
use session_telemetry::{
    next_fn, Capabilities, CommandError, CommandResponse, DriverRef, HostError, LiveSession, Next,
    SessionCapabilities, SessionHost, TelemetryPlugin, TelemetryRuntime,
};

/// Crate version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commands issued by every simulated session, in rotation.
const SIMULATED_COMMANDS: &[&str] = &["findElement", "click", "getText", "getPageSource", "back"];

/// session-telemetry - session-correlated tracing and metrics.
#[derive(Parser)]
#[command(name = "session-telemetry")]
#[command(author, version, about = "Session-correlated tracing and metrics", long_about = None)]
struct Cli {
    /// Config file (JSON or YAML)
    #[arg(short, long, env = "APPIUM_OTEL_CONFIG")]
    config: Option<PathBuf>,

    /// Correlation strategy (command, http)
    #[arg(short, long)]
    semantic: Option<String>,

    /// Number of simulated sessions
    #[arg(long, default_value_t = 3)]
    sessions: usize,

    /// Commands per session
    #[arg(long, default_value_t = 4)]
    commands: usize,

    /// Fail every Nth command (0 disables failures)
    #[arg(long, default_value_t = 3)]
    fail_every: usize,

    /// Emit spans through `tracing` instead of printing them
    #[arg(long)]
    emit_spans: bool,

    /// Show debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Show the resolved configuration
    Config,

    /// Show version information
    Version,
}

/// In-memory host tracking live sessions.
#[derive(Default)]
struct SimulatedHost {
    sessions: RwLock<HashMap<String, Capabilities>>,
}

impl SimulatedHost {
    fn open(&self, session_id: &str, capabilities: Capabilities) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.to_string(), capabilities);
    }

    fn close(&self, session_id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }
}

#[async_trait]
impl SessionHost for SimulatedHost {
    async fn list_live_sessions(&self) -> Result<Vec<LiveSession>, HostError> {
        Ok(self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, capabilities)| LiveSession {
                id: id.clone(),
                capabilities: capabilities.clone(),
            })
            .collect())
    }
}

/// Where spans go.
enum SpanOutput {
    Memory(InMemoryTracer),
    Tracing(TracingTracer),
}

impl SpanOutput {
    fn tracer(&self) -> Arc<dyn Tracer> {
        match self {
            Self::Memory(tracer) => Arc::new(tracer.clone()),
            Self::Tracing(tracer) => Arc::new(tracer.clone()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_options = CliOptions {
        semantic: cli.semantic.clone(),
        debug: if cli.debug { Some(true) } else { None },
        ..Default::default()
    };
    let config = config::load_config(cli.config.as_deref(), cli_options)?;

    let _guard = init_logging(&LoggingConfig::for_debug(config.debug))?;

    match cli.command {
        Some(Commands::Config) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Commands::Version) => {
            println!("session-telemetry {}", VERSION);
            Ok(())
        }
        None => run_simulation(&cli, &config).await,
    }
}

async fn run_simulation(cli: &Cli, config: &TelemetryConfig) -> anyhow::Result<()> {
    let output = if cli.emit_spans {
        SpanOutput::Tracing(TracingTracer::new(&config.service_name))
    } else {
        SpanOutput::Memory(InMemoryTracer::new())
    };
    let registry = Arc::new(config.metrics_registry());
    let runtime = TelemetryRuntime::new(config, output.tracer(), registry.as_ref());
    let reader = PeriodicReader::spawn(Arc::clone(&registry), config.export_interval());

    let host = Arc::new(SimulatedHost::default());
    let tracer = output.tracer();
    let hooks = runtime.request_hooks();

    println!(
        "{} {} sessions x {} commands, semantic={}",
        "Simulating".bold(),
        cli.sessions,
        cli.commands,
        config.semantic.cyan()
    );

    let mut issued = 0usize;
    for index in 0..cli.sessions {
        let plugin = runtime.new_plugin();
        let session_id = format!("sim-{}", &uuid::Uuid::new_v4().to_string()[..8]);
        let capabilities = simulated_capabilities(index);

        let request = RequestInfo::new("POST", "/session");
        let request_span = tracer.start_span("POST /session", None);
        if let Some(hooks) = &hooks {
            hooks.on_request_start(&request_span, &request);
        }
        let created = {
            let host = Arc::clone(&host);
            let session_id = session_id.clone();
            let capabilities = capabilities.clone();
            next_fn(move || async move {
                host.open(&session_id, capabilities.clone());
                Ok(CommandResponse::session_created(&session_id, capabilities))
            })
        };
        let umbrella = DriverRef::umbrella(Arc::clone(&host) as Arc<dyn SessionHost>);
        let caps = SessionCapabilities {
            merged: Value::Object(capabilities.clone()),
            ..Default::default()
        };
        let result = plugin.create_session(created, &umbrella, caps).await;
        finish_request(hooks.as_ref(), &request_span, &request, result.is_ok());

        let driver = DriverRef::for_session(&session_id);
        for step in 0..cli.commands {
            issued += 1;
            let command = SIMULATED_COMMANDS[step % SIMULATED_COMMANDS.len()];
            let fail = cli.fail_every > 0 && issued % cli.fail_every == 0;
            let result = run_command(&plugin, &tracer, hooks.as_ref(), &driver, &session_id, command, fail).await;
            if let Err(err) = result {
                tracing::debug!(error = %err, "simulated command failed");
            }
        }

        if index + 1 == cli.sessions && cli.sessions > 1 {
            host.close(&session_id);
            plugin.on_unexpected_shutdown(&driver, "simulated crash").await;
            println!("  {} {}", "crashed".red(), session_id);
        } else {
            let request = RequestInfo::new("DELETE", format!("/session/{}", session_id));
            let request_span = tracer.start_span(&format!("DELETE /session/{}", session_id), None);
            let deleted = {
                let host = Arc::clone(&host);
                let session_id = session_id.clone();
                next_fn(move || async move {
                    if host.close(&session_id) {
                        Ok(CommandResponse::new(Value::Null))
                    } else {
                        Err(CommandError::SessionNotFound(session_id))
                    }
                })
            };
            let result = plugin.delete_session(deleted, &driver, &session_id).await;
            finish_request(hooks.as_ref(), &request_span, &request, result.is_ok());
            println!("  {} {}", "deleted".green(), session_id);
        }
    }

    reader.shutdown().await;

    if let SpanOutput::Memory(tracer) = &output {
        print_spans(&tracer.finished_spans());
    }
    println!("{}", registry.collect().await.format_report());
    Ok(())
}

async fn run_command(
    plugin: &TelemetryPlugin,
    tracer: &Arc<dyn Tracer>,
    hooks: Option<&RequestHooks>,
    driver: &DriverRef,
    session_id: &str,
    command: &str,
    fail: bool,
) -> Result<CommandResponse, CommandError> {
    let request = RequestInfo::new("POST", format!("/session/{}/{}", session_id, command));
    let request_span = tracer.start_span(&format!("POST /session/{}/{}", session_id, command), None);

    let name = command.to_string();
    let next: Next = next_fn(move || async move {
        if fail {
            Err(CommandError::failed(name, "no such element"))
        } else {
            Ok(CommandResponse::new(json!({ "command": name })))
        }
    });
    let result = plugin.handle(next, driver, command, Vec::new()).await;

    finish_request(hooks, &request_span, &request, result.is_ok());
    result
}

/// Close a simulated request span the way an interception layer would.
fn finish_request(
    hooks: Option<&RequestHooks>,
    span: &session_telemetry::telemetry::SpanRef,
    request: &RequestInfo,
    success: bool,
) {
    if let Some(hooks) = hooks {
        hooks.on_response(span, request);
    }
    span.set_status(if success {
        SpanStatus::Ok
    } else {
        SpanStatus::Error("request failed".to_string())
    });
    span.end();
}

fn simulated_capabilities(index: usize) -> Capabilities {
    let platform = if index % 2 == 0 { "Android" } else { "iOS" };
    let mut capabilities = Capabilities::new();
    capabilities.insert("platformName".to_string(), json!(platform));
    capabilities.insert("deviceName".to_string(), json!(format!("device-{}", index)));
    capabilities.insert("automationName".to_string(), json!("simulated"));
    capabilities
}

fn print_spans(spans: &[SpanData]) {
    println!("\n{} ({})", "Spans".bold(), spans.len());
    for span in spans {
        let status = match &span.status {
            SpanStatus::Ok => "OK".green(),
            SpanStatus::Error(_) => "ERROR".red(),
            SpanStatus::Unset => "UNSET".dimmed(),
        };
        let parent = span
            .parent_id
            .map(|id| format!(" parent={}", id.short()))
            .unwrap_or_default();
        println!("  {} [{}] {}{}", span.name.cyan(), status, span.id.short().dimmed(), parent.dimmed());
        for (key, value) in &span.attributes {
            println!("      {} = {}", key, value);
        }
    }
    println!();
}
