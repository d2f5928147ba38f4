use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use loadbench::config::CliArgs;
use loadbench::runner::BenchmarkRunner;
use loadbench::sim::{sample_catalog, SimulatedBackend, SimulatorConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();

    let log_level = args.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config = args.to_benchmark_config()?;

    print_startup_banner(&args);

    let backend = Arc::new(SimulatedBackend::new(SimulatorConfig::scaled(
        args.sim_latency_ms,
        args.sim_jitter_ms,
        args.sim_error_rate,
    )));

    let runner = BenchmarkRunner::new(config, sample_catalog(), backend)?;
    let result = runner.run().await;

    if args.json {
        println!("{}", result.to_json());
    } else {
        result.print_table();
    }

    if !result.is_complete() {
        anyhow::bail!("benchmark aborted after repeated fatal backend failures");
    }
    Ok(())
}

fn print_startup_banner(args: &CliArgs) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                        loadbench                          ║
║        concurrent load-testing harness (simulated)        ║
╚═══════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner);
    println!("  Version:      {}", env!("CARGO_PKG_VERSION"));
    println!("  Pattern:      {} (max {})", args.pattern, args.concurrency);
    println!(
        "  Phases:       warmup {}s / run {}s / cooldown {}s",
        args.warmup, args.duration, args.cooldown
    );
    println!("  Interval:     {}s", args.interval);
    println!(
        "  Sim backend:  base {}ms, jitter {}ms, error rate {:.1}%",
        args.sim_latency_ms,
        args.sim_jitter_ms,
        args.sim_error_rate * 100.0
    );
    println!();
}
