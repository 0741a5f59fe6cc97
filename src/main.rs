use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;

use check_influxdb::{
    Check, Context, CpuState, InfluxClient, Probe, Report, State, ThresholdRange, TimeRange,
};

#[derive(Parser, Debug)]
#[command(name = "check_influxdb")]
#[command(about = "Evaluate InfluxDB metrics against Nagios-style threshold ranges")]
#[command(disable_version_flag = true)]
struct Args {
    /// InfluxDB version tag (only 0.8 is supported)
    #[arg(short = 'v', long = "version", default_value = "0.8")]
    server_version: String,

    /// InfluxDB hostname or IP
    #[arg(short = 'H', long)]
    host: String,

    /// Username for authentication
    #[arg(short = 'u', long)]
    user: String,

    /// Password for authentication
    #[arg(short = 'p', long)]
    password: String,

    /// InfluxDB database name
    #[arg(short = 'd', long)]
    database: String,

    /// InfluxDB HTTP port
    #[arg(short = 'P', long, default_value_t = 8086)]
    port: u16,

    /// Return warning if the value is outside RANGE
    #[arg(short = 'w', long, value_name = "RANGE", default_value = "")]
    warning: String,

    /// Return critical if the value is outside RANGE
    #[arg(short = 'c', long, value_name = "RANGE", default_value = "")]
    critical: String,

    /// Increase output verbosity (use up to 3 times)
    #[arg(short = 'V', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Abort execution after TIMEOUT seconds
    #[arg(short = 't', long, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a raw InfluxDB query as a scalar
    Raw {
        /// Raw query to run
        #[arg(short, long)]
        query: String,

        /// Metric name for the result
        #[arg(short, long, default_value = "default")]
        metric: String,
    },

    /// Built-in node checks (cpu and memory)
    Custom {
        /// Metric name
        #[arg(short, long, value_enum)]
        metric: CustomMetric,

        /// Node name the series are recorded under
        #[arg(short, long)]
        node: String,

        /// Time window for the query (examples: 1s, 10s, 15m, 2h, 3d)
        #[arg(short = 'T', long, default_value = "1m")]
        time_range: String,
    },

    /// Service status checks
    Status {
        /// Service name (nova, ..)
        #[arg(short, long)]
        service: String,

        /// Node name
        #[arg(short, long)]
        node: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "snake_case")]
enum CustomMetric {
    Cpu,
    CpuUser,
    CpuSystem,
    CpuWait,
    CpuIdle,
    Memory,
}

fn main() {
    std::process::exit(run());
}

/// Guarded entry point: every failure path ends in a single output line
/// and an exit code the monitoring host understands.
fn run() -> i32 {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let is_help = matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            let _ = err.print();
            return if is_help { 0 } else { State::Unknown.exit_code() };
        }
    };

    init_tracing(args.verbose);

    match evaluate(&args) {
        Ok(report) => {
            println!("{}", report.render());
            report.exit_code()
        }
        Err(err) => {
            // Startup errors (bad ranges, unsupported version) land here.
            println!("UNKNOWN - {err}");
            State::Unknown.exit_code()
        }
    }
}

fn evaluate(args: &Args) -> Result<Report> {
    let check = build_check(args)?;

    let client = InfluxClient::builder()
        .host(&args.host)
        .port(args.port)
        .credentials(&args.user, &args.password)
        .database(&args.database)
        .version(&args.server_version)
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    // The timeout covers the whole evaluation: on expiry there is no
    // partial report, only the UNKNOWN line.
    let report = runtime.block_on(async {
        match tokio::time::timeout(Duration::from_secs(args.timeout), check.run(&client)).await {
            Ok(report) => report,
            Err(_) => Report::unknown(format!("timed out after {}s", args.timeout)),
        }
    });

    Ok(report)
}

fn build_check(args: &Args) -> Result<Check> {
    let warning = ThresholdRange::parse(&args.warning)?;
    let critical = ThresholdRange::parse(&args.critical)?;

    let check = match &args.command {
        Command::Raw { query, metric } => {
            let mut check = Check::new(Probe::RawQuery {
                query: query.clone(),
                metric: metric.clone(),
            });
            check.add_context(metric.clone(), Context::Scalar { warning, critical });
            check
        }
        Command::Custom {
            metric,
            node,
            time_range,
        } => {
            let range = TimeRange::parse(time_range)?;
            let node = node.clone();
            let (probe, context_name) = match metric {
                CustomMetric::Memory => (Probe::Memory { node, range }, "memory"),
                CustomMetric::Cpu => (Probe::CpuAggregate { node, range }, "cpu"),
                CustomMetric::CpuUser => (cpu_probe(node, range, CpuState::User), "cpu"),
                CustomMetric::CpuSystem => (cpu_probe(node, range, CpuState::System), "cpu"),
                CustomMetric::CpuWait => (cpu_probe(node, range, CpuState::Wait), "cpu"),
                CustomMetric::CpuIdle => (cpu_probe(node, range, CpuState::Idle), "cpu"),
            };
            let mut check = Check::new(probe);
            check.add_context(context_name, Context::Scalar { warning, critical });
            check
        }
        Command::Status { service, node: _ } => {
            let mut check = Check::new(Probe::ServiceStatus {
                service: service.clone(),
            });
            check.add_context("status", Context::Status);
            check
        }
    };

    Ok(check)
}

fn cpu_probe(node: String, range: TimeRange, state: CpuState) -> Probe {
    Probe::Cpu { node, range, state }
}

/// Diagnostics go to stderr so the plugin output line stays clean.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
