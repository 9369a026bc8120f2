//! tendersim deterministic simulator CLI
//!
//! Runs the two-phase finality protocol over a simulated faulty network and
//! reports what each replica finalized.
//!
//! # Example
//!
//! ```bash
//! # Four validators, three heights, default fault model
//! tendersim-sim
//!
//! # Harsh network, write the audit log and verify replay
//! tendersim-sim --drop 0.25 --dup 0.35 --delay-max 15 --log-file run.log --check-determinism
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use tendersim_simulation::{
    EventLog, NetworkConfig, SimulationConfig, SimulationReport, SimulationRunner,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// tendersim deterministic simulator
///
/// Given the same seed and parameters, produces identical logs and ledgers
/// every run.
#[derive(Parser, Debug)]
#[command(name = "tendersim-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of validators
    #[arg(short = 'v', long, default_value = "4")]
    validators: usize,

    /// Random seed for deterministic simulation
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Last height to propose
    #[arg(long, default_value = "3")]
    height: u64,

    /// Message loss probability (0.0-1.0)
    #[arg(long, default_value = "0.05")]
    drop: f64,

    /// Message duplication probability (0.0-1.0)
    #[arg(long, default_value = "0.05")]
    dup: f64,

    /// Minimum delivery delay in ticks
    #[arg(long, default_value = "0")]
    delay_min: u64,

    /// Maximum delivery delay in ticks
    #[arg(long, default_value = "5")]
    delay_max: u64,

    /// Tokens added per tick to each link
    #[arg(long, default_value = "1.0")]
    bucket_rate: f64,

    /// Token bucket capacity per link
    #[arg(long, default_value = "10.0")]
    bucket_capacity: f64,

    /// Ticks a link stays blocked after running out of tokens
    #[arg(long, default_value = "10")]
    cooldown: u64,

    /// Transactions generated per block
    #[arg(long, default_value = "0")]
    txs_per_block: usize,

    /// Write the structured log to this file
    #[arg(long)]
    log_file: Option<std::path::PathBuf>,

    /// Run twice and compare the logs
    #[arg(long)]
    check_determinism: bool,
}

impl Args {
    fn config(&self) -> SimulationConfig {
        let network = NetworkConfig::default()
            .with_drop_probability(self.drop)
            .with_duplicate_probability(self.dup)
            .with_delay(self.delay_min, self.delay_max)
            .with_bucket(self.bucket_rate, self.bucket_capacity)
            .with_block_cooldown(self.cooldown);
        SimulationConfig::new(self.validators, self.seed)
            .with_target_height(self.height)
            .with_txs_per_block(self.txs_per_block)
            .with_network(network)
    }
}

fn run_once(config: &SimulationConfig, log: EventLog) -> Result<(SimulationReport, String)> {
    let mut runner =
        SimulationRunner::with_log(config.clone(), log).context("invalid configuration")?;
    let report = runner.run();
    let logs = runner.collect_logs();
    runner.finish().context("failed to write event log")?;
    Ok((report, logs))
}

fn print_report(report: &SimulationReport) {
    println!("\n=== Simulation Complete ===");
    println!("Seed:       {}", report.seed);
    println!("Validators: {}", report.num_validators);
    println!("Finalized:  {:?}", report.finalized_heights);
    println!("Stalled:    {:?}", report.stalled_heights);
    println!("Final time: {}", report.final_time);

    println!("\n=== Ledger Tips ===");
    for (validator, tip) in report.ledger_tips() {
        match tip {
            Some(entry) => println!(
                "{validator}: height {} block {}",
                entry.height,
                entry.block_hash.short()
            ),
            None => println!("{validator}: (empty)"),
        }
    }

    let net = &report.network;
    println!("\n=== Network ===");
    println!("Sent:       {}", net.messages_sent);
    println!("Delivered:  {}", net.messages_delivered);
    println!("Duplicated: {}", net.messages_duplicated);
    println!(
        "Dropped:    {} (loss {}, blocked {}, rate limited {}, causal {})",
        net.messages_dropped(),
        net.messages_dropped_loss,
        net.messages_dropped_blocked,
        net.messages_dropped_rate_limited,
        net.messages_dropped_causal
    );
    println!("Deferred:   {}", net.deferrals);
    println!("Blocks:     {} / unblocks {}", net.links_blocked, net.links_unblocked);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,tendersim_simulation=info")),
        )
        .init();

    let args = Args::parse();
    let config = args.config();

    info!(
        validators = args.validators,
        seed = args.seed,
        height = args.height,
        drop = args.drop,
        dup = args.dup,
        delay_max = args.delay_max,
        "Starting simulation"
    );

    let log = match &args.log_file {
        Some(path) => EventLog::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?,
        None => EventLog::in_memory(),
    };
    let (report, logs) = run_once(&config, log)?;
    print_report(&report);

    let mut failed = false;
    match report.check_no_fork() {
        Ok(()) => println!("\nSafety: no fork"),
        Err(e) => {
            println!("\nSafety: FORK ({e})");
            failed = true;
        }
    }

    if args.check_determinism {
        let (_, replay) = run_once(&config, EventLog::in_memory())?;
        if replay == logs {
            println!("Determinism: logs identical ({} lines)", logs.lines().count());
        } else {
            warn!("Replay produced a different log");
            println!("Determinism: MISMATCH");
            failed = true;
        }
    }

    if failed {
        bail!("simulation check failed");
    }
    Ok(())
}
