use clap::{Parser, ValueEnum};
use futures::future::join_all;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use callgate::config::{AppConfig, LoggingConfig};
use callgate::throttle::{AdmissionGate, GateExt, LimiterRegistry, Unlimited, WaitPolicy};

/// Push simulated calls through a windowed call limiter.
#[derive(Debug, Parser)]
#[command(name = "callgate", version, about)]
struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum calls started per window
    #[arg(long)]
    limit: Option<u32>,

    /// Window length in milliseconds
    #[arg(long)]
    window_ms: Option<u64>,

    /// How saturated calls wait
    #[arg(long, value_enum)]
    wait: Option<WaitArg>,

    /// Number of calls to make
    #[arg(long, default_value_t = 20)]
    calls: u32,

    /// Fire all calls at once instead of one after another
    #[arg(long)]
    concurrent: bool,

    /// Upper bound of each simulated call's duration in milliseconds
    #[arg(long, default_value_t = 50)]
    task_ms: u64,

    /// Make every Nth call fail
    #[arg(long)]
    fail_every: Option<u32>,

    /// Throttle under this registry key, using the configured rules
    #[arg(long)]
    key: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WaitArg {
    FullWindow,
    SharedReset,
}

impl From<WaitArg> for WaitPolicy {
    fn from(arg: WaitArg) -> Self {
        match arg {
            WaitArg::FullWindow => WaitPolicy::FullWindow,
            WaitArg::SharedReset => WaitPolicy::SharedReset,
        }
    }
}

#[derive(Debug, Default)]
struct Summary {
    succeeded: u32,
    failed: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(limit) = args.limit {
        config.limiter.limit = limit;
    }
    if let Some(window_ms) = args.window_ms {
        config.limiter.window_ms = window_ms;
    }
    if let Some(wait) = args.wait {
        config.limiter.wait = wait.into();
    }
    config.limiter.validate()?;

    init_tracing(&config.logging);

    info!("Starting callgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        enabled = config.enabled,
        limit = config.limiter.limit,
        window_ms = config.limiter.window_ms,
        wait = ?config.limiter.wait,
        "Configuration loaded"
    );

    let gate = build_gate(&config, args.key.as_deref())?;

    let start = Instant::now();
    let summary = tokio::select! {
        summary = run_calls(gate, &args) => summary,
        _ = shutdown_signal() => {
            warn!("Stopped before all calls completed");
            return Ok(());
        }
    };

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "All calls completed"
    );
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Pick the gate calls go through: unlimited, a registry entry, or the default limiter.
fn build_gate(config: &AppConfig, key: Option<&str>) -> anyhow::Result<Arc<dyn AdmissionGate>> {
    if !config.enabled {
        info!("Throttling disabled");
        return Ok(Arc::new(Unlimited));
    }

    let registry = match key {
        Some(_) => LimiterRegistry::with_rules(config.rules()?)?,
        None => LimiterRegistry::new(config.limiter)?,
    };
    let key = key.unwrap_or("default");
    let limiter = registry.limiter(key)?;
    info!(
        key = %key,
        limit = limiter.policy().limit,
        window_ms = limiter.policy().window_ms,
        "Limiter ready"
    );

    let gate: Arc<dyn AdmissionGate> = limiter;
    Ok(gate)
}

async fn run_calls(gate: Arc<dyn AdmissionGate>, args: &Args) -> Summary {
    let start = Instant::now();
    let outcomes = if args.concurrent {
        let calls = (1..=args.calls).map(|id| simulated_call(gate.clone(), id, args, start));
        join_all(calls).await
    } else {
        let mut outcomes = Vec::with_capacity(args.calls as usize);
        for id in 1..=args.calls {
            outcomes.push(simulated_call(gate.clone(), id, args, start).await);
        }
        outcomes
    };

    let mut summary = Summary::default();
    for outcome in outcomes {
        match outcome {
            Ok(_) => summary.succeeded += 1,
            Err(_) => summary.failed += 1,
        }
    }
    summary
}

async fn simulated_call(
    gate: Arc<dyn AdmissionGate>,
    id: u32,
    args: &Args,
    start: Instant,
) -> Result<u32, String> {
    let duration = Duration::from_millis(rand::thread_rng().gen_range(0..=args.task_ms));
    let fails = args.fail_every.is_some_and(|n| n > 0 && id % n == 0);

    let outcome = gate
        .run(move || async move {
            tokio::time::sleep(duration).await;
            if fails {
                Err(format!("call {} failed", id))
            } else {
                Ok(id)
            }
        })
        .await;

    let at_ms = start.elapsed().as_millis() as u64;
    match &outcome {
        Ok(_) => info!(call = id, at_ms, "Call succeeded"),
        Err(e) => warn!(call = id, at_ms, error = %e, "Call failed"),
    }
    outcome
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
