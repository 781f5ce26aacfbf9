use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use portsweep::config::{
    default_worker_count, parse_duration, ScanConfig, DEFAULT_MIN_PACKET_RATE,
};
use portsweep::ports::ports_from_arg;
use portsweep::report::{self, write_report_json};
use portsweep::scanner::ScanController;

/// portsweep: rate-limited concurrent TCP connect scanner.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portsweep",
    version,
    about = "Rate-limited concurrent TCP connect scanner.",
    long_about = None
)]
struct Cli {
    /// Target hostname or IP address.
    host: String,

    /// Ports to scan, e.g. `22,80,8000-8100`. Scans 1-65535 when omitted or empty.
    #[arg(short = 'p', value_name = "SPEC")]
    ports: Option<String>,

    /// Minimum packets per second per worker.
    #[arg(long = "min-packet-rate", default_value_t = DEFAULT_MIN_PACKET_RATE)]
    min_packet_rate: u32,

    /// Extra fixed delay after every job (e.g. `10ms`, `1s`).
    #[arg(long, value_parser = parse_duration, default_value = "0")]
    delay: Duration,

    /// Number of workers. Defaults to the number of available processors.
    #[arg(long)]
    threads: Option<usize>,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 300)]
    timeout_ms: u64,

    /// Write results as pretty JSON to this path (optional).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbosity; `-vvv` prints each open port as it is found.
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    init_tracing();

    let config = ScanConfig::new(
        cli.min_packet_rate,
        cli.delay,
        cli.threads.unwrap_or_else(default_worker_count),
        Duration::from_millis(cli.timeout_ms),
    )?;

    let ports = ports_from_arg(cli.ports.as_deref())?;
    let live = cli.verbose >= 3;

    let mut controller = ScanController::new(&cli.host, ports, config);
    if live {
        controller = controller.on_open(|port| println!("{}", report::format_open_port(port)));
    }

    println!("{}", report::BANNER);
    let results = controller.run().await?;

    if !live {
        println!("{}", report::format_summary(&results));
    }

    if let Some(path) = cli.output.as_deref() {
        write_report_json(path, &results)?;
        println!("Wrote JSON results to {}", path.display());
    }

    Ok(())
}
