use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use env_logger::Env;
use hex::{FromHex, encode as hex_encode};
use log::{LevelFilter, debug};
use qtoken_core::config::REFERENCE_HOLDER_ID;
use qtoken_core::{
    LogObserver, ProtocolConfig, ProtocolObserver, ProtocolSession, RecordingObserver,
    RunStatistics, SessionOutcome, Tee, fresh_seed, mac,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "qtoken",
    author,
    version,
    about = "Quantum-token payment authentication (simulated)"
)]
struct Cli {
    #[arg(long, global = true)]
    debug: bool,
    /// JSON protocol configuration; defaults to the reference setup.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "N")]
    lambda: Option<usize>,
    #[arg(long, global = true, value_name = "ID")]
    verifier: Option<String>,
    /// Seed material (`hex:` prefix for raw bytes); fresh OS randomness if absent.
    #[arg(long, global = true)]
    seed: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run issuer, holder and verifier once.
    Run {
        #[arg(long, default_value = REFERENCE_HOLDER_ID)]
        holder: String,
        /// Flip κ[POS] on the holder → verifier wire.
        #[arg(long, value_name = "POS")]
        tamper: Option<usize>,
        #[arg(long, value_name = "N", default_value_t = 0)]
        index: u64,
        /// Write the protocol event log as JSON.
        #[arg(long, value_name = "FILE")]
        trace_out: Option<PathBuf>,
    },
    /// Acceptance statistics over repeated runs.
    Stats {
        #[arg(long, default_value = REFERENCE_HOLDER_ID)]
        holder: String,
        #[arg(long, value_name = "N", default_value_t = 100)]
        runs: u64,
        /// Also run every session with κ[POS] flipped and compare.
        #[arg(long, value_name = "POS")]
        tamper: Option<usize>,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print MAC(secret, message) truncated to λ bits.
    Mac {
        #[arg(long)]
        secret: String,
        #[arg(long)]
        message: String,
        #[arg(long, value_name = "N", default_value_t = qtoken_core::DEFAULT_LAMBDA)]
        lambda: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    match cli.command {
        Commands::Run {
            ref holder,
            tamper,
            index,
            ref trace_out,
        } => {
            let config = resolve_config(&cli)?;
            let seed = resolve_seed(cli.seed.as_deref())?;
            cmd_run(config, holder, &seed, index, tamper, trace_out.as_deref())
        }
        Commands::Stats {
            ref holder,
            runs,
            tamper,
            ref out,
        } => {
            let config = resolve_config(&cli)?;
            let seed = resolve_seed(cli.seed.as_deref())?;
            cmd_stats(config, holder, &seed, runs, tamper, out.as_deref())
        }
        Commands::Mac {
            ref secret,
            ref message,
            lambda,
        } => cmd_mac(secret, message, lambda),
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default));
    builder.format_timestamp(None);
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

fn resolve_config(cli: &Cli) -> Result<ProtocolConfig> {
    let mut config = match &cli.config {
        Some(path) => ProtocolConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ProtocolConfig::reference(),
    };
    if let Some(lambda) = cli.lambda {
        config = config.with_lambda(lambda);
    }
    if let Some(verifier) = &cli.verifier {
        config = config.with_verifier(verifier.clone());
    }
    config.validate().context("invalid protocol configuration")?;
    Ok(config)
}

fn resolve_seed(seed: Option<&str>) -> Result<Vec<u8>> {
    match seed {
        Some(seed) => parse_seed(seed),
        None => {
            let seed = fresh_seed();
            debug!("fresh seed hex:{}", hex_encode(&seed));
            Ok(seed)
        }
    }
}

fn cmd_run(
    config: ProtocolConfig,
    holder: &str,
    seed: &[u8],
    index: u64,
    tamper: Option<usize>,
    trace_out: Option<&Path>,
) -> Result<()> {
    if let Some(position) = tamper {
        check_position(position, config.lambda)?;
    }
    let recorder = Arc::new(RecordingObserver::new());
    let observer: Arc<dyn ProtocolObserver> =
        Arc::new(Tee::new(Arc::new(LogObserver), recorder.clone()));
    let mut session = ProtocolSession::new(config)?.with_observer(observer);
    println!("λ = {}", session.config().lambda);
    println!("Verifier: {}", session.config().verifier_id);
    println!("Holder: {holder}");
    println!("Seed: hex:{}", hex_encode(seed));
    if let Some(position) = tamper {
        println!("Tampering: flipping κ[{position}] in transit");
        session = session.with_tamper(position);
    }

    let result = session.run(holder, seed, index);
    if let Some(path) = trace_out {
        save_json(path, "trace", &recorder.events())?;
        println!("Trace written to {}", path.display());
    }
    let outcome = result.with_context(|| format!("protocol run for {holder} failed"))?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &SessionOutcome) {
    println!("m = MAC(secret, verifier): {}", outcome.receipt.measurement_basis);
    println!("κ: {}", outcome.receipt.kappa);
    println!(
        "Checked positions: {:?} ({} match)",
        outcome.report.checked,
        outcome.report.matches()
    );
    if !outcome.report.mismatched.is_empty() {
        println!("Mismatched positions: {:?}", outcome.report.mismatched);
    }
    println!(
        "Result: {}",
        if outcome.accepted { "ACCEPTED" } else { "REJECTED" }
    );
}

#[derive(Serialize)]
struct StatsReport {
    holder_id: String,
    verifier_id: String,
    lambda: usize,
    honest: RunStatistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    tampered: Option<TamperedStats>,
}

#[derive(Serialize)]
struct TamperedStats {
    position: usize,
    stats: RunStatistics,
}

fn cmd_stats(
    config: ProtocolConfig,
    holder: &str,
    seed: &[u8],
    runs: u64,
    tamper: Option<usize>,
    out: Option<&Path>,
) -> Result<()> {
    if runs == 0 {
        bail!("--runs must be at least 1");
    }
    if let Some(position) = tamper {
        check_position(position, config.lambda)?;
    }
    let honest = ProtocolSession::new(config.clone())?
        .run_many(holder, seed, runs)
        .context("honest runs failed")?;
    print_stats("honest", &honest);

    let tampered = match tamper {
        Some(position) => {
            let stats = ProtocolSession::new(config.clone())?
                .with_tamper(position)
                .run_many(holder, seed, runs)
                .context("tampered runs failed")?;
            print_stats(&format!("tampered κ[{position}]"), &stats);
            Some(TamperedStats { position, stats })
        }
        None => None,
    };

    if let Some(path) = out {
        let report = StatsReport {
            holder_id: holder.to_string(),
            verifier_id: config.verifier_id.clone(),
            lambda: config.lambda,
            honest,
            tampered,
        };
        save_json(path, "statistics", &report)?;
        println!("Statistics written to {}", path.display());
    }
    Ok(())
}

fn print_stats(label: &str, stats: &RunStatistics) {
    println!(
        "{label}: {}/{} accepted ({:.1}%), mean checked positions {:.2}",
        stats.accepted,
        stats.runs,
        stats.acceptance_rate() * 100.0,
        stats.mean_checked()
    );
}

fn cmd_mac(secret: &str, message: &str, lambda: usize) -> Result<()> {
    if lambda == 0 {
        bail!("--lambda must be at least 1");
    }
    println!("{}", mac(secret, message, lambda));
    Ok(())
}

fn check_position(position: usize, lambda: usize) -> Result<()> {
    if position >= lambda {
        bail!("tamper position {position} is outside 0..{lambda}");
    }
    Ok(())
}

fn save_json<T: ?Sized + Serialize>(path: &Path, label: &str, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)
        .with_context(|| format!("writing {} to {}", label, path.display()))?;
    Ok(())
}

fn parse_seed(seed: &str) -> Result<Vec<u8>> {
    if let Some(hex) = seed.strip_prefix("hex:") {
        let bytes = Vec::from_hex(hex.trim())
            .with_context(|| "failed to parse hex-encoded seed".to_string())?;
        Ok(bytes)
    } else {
        Ok(seed.as_bytes().to_vec())
    }
}
