use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use psrecord::config::{self, Config, load_config, load_config_from_path};
use psrecord::format::format_megabytes;
use psrecord::logging::{self, LogFormat};
use psrecord::network::NetworkCollector;
use psrecord::shutdown;
use psrecord::system::collector::SysinfoProbe;
use psrecord::system::launch::Workload;
use psrecord::{MonitorOptions, monitor};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "psrecord",
    version,
    about = "Record CPU, memory, disk I/O and network usage of a process"
)]
struct Cli {
    /// Process id to attach to, or a shell command to start and record
    process_id_or_command: String,

    /// Write samples to this file (default: psrecord_<pid>.log)
    #[arg(long)]
    log: Option<PathBuf>,

    /// Write an SVG chart of the run to this file
    #[arg(long)]
    plot: Option<PathBuf>,

    /// Stop recording after this many seconds (default: until the process exits)
    #[arg(long)]
    duration: Option<f64>,

    /// Seconds between samples (default: as often as possible)
    #[arg(long)]
    interval: Option<f64>,

    /// Include sub-processes in the statistics (slower maximum sampling rate)
    #[arg(long, default_value_t = false)]
    include_children: bool,

    /// Do not run the network monitor
    #[arg(long, default_value_t = false)]
    no_network: bool,

    /// Substring identifying the workload in the network monitor's output
    #[arg(long)]
    network_filter: Option<String>,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// More diagnostics on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Diagnostic output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(logging::level_for(cli.verbose, cli.quiet), cli.log_format)?;
    let config = load_config_for_cli(&cli);

    let duration = positive_seconds("--duration", cli.duration)?;
    let interval = positive_seconds(
        "--interval",
        cli.interval.or(config.sampling.interval_secs),
    )?;

    let (pid, workload) = match cli.process_id_or_command.trim().parse::<u32>() {
        Ok(pid) => {
            info!(pid, "attaching to process");
            (pid, None)
        }
        Err(_) => {
            let command = cli.process_id_or_command.as_str();
            let workload = Workload::spawn(command)
                .wrap_err_with(|| format!("failed to start command '{command}'"))?;
            (workload.pid(), Some(workload))
        }
    };

    let probe = SysinfoProbe::new();
    let network = network_collector(&cli, &config, workload.as_ref(), &probe, pid);
    let options = MonitorOptions {
        pid,
        log: Some(cli.log.clone().unwrap_or_else(|| config.output.log_path(pid))),
        plot: cli.plot.clone(),
        duration,
        interval,
        include_children: cli.include_children || config.sampling.include_children,
        network,
    };

    let result = monitor(probe, options, shutdown::on_ctrl_c()).await;

    if let Some(workload) = workload {
        workload.kill();
    }

    let report = result?;
    println!(
        "{}: {} samples over {:.2}s, {} network samples, peak resident memory {}",
        report.termination,
        report.samples,
        report.last_elapsed,
        report.network_samples,
        format_megabytes(report.peak_resident_mb),
    );
    if let Some(log) = &report.log {
        println!("log: {}", log.display());
    }
    if let Some(plot) = &cli.plot {
        println!("plot: {}", plot.display());
    }
    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Config {
    match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    }
}

fn positive_seconds(flag: &str, value: Option<f64>) -> Result<Option<Duration>> {
    match value {
        None => Ok(None),
        Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
        Some(secs) => Err(eyre!("{flag} must be a positive number of seconds, got {secs}")),
    }
}

fn network_collector(
    cli: &Cli,
    config: &Config,
    workload: Option<&Workload>,
    probe: &SysinfoProbe,
    pid: u32,
) -> Option<NetworkCollector> {
    if cli.no_network || !config.network.enabled {
        return None;
    }
    let filter = cli
        .network_filter
        .clone()
        .or_else(|| config.network.filter.clone())
        .or_else(|| workload.map(|w| w.program_name().to_string()))
        .or_else(|| probe.process_name(pid))
        .filter(|f| !f.is_empty());

    let Some(filter) = filter else {
        warn!("no name to match network traffic against; network recording disabled");
        return None;
    };
    let collector = NetworkCollector::new(&config.network.command, filter);
    if collector.is_none() {
        warn!("empty network command in {:?}", config::config_path());
    }
    collector
}

#[cfg(test)]
mod tests {
    use super::*;
    use psrecord::system::launch::program_name;

    #[test]
    fn cli_parses_psrecord_flags() {
        let cli = Cli::try_parse_from([
            "psrecord",
            "python train.py",
            "--interval",
            "0.5",
            "--duration",
            "10",
            "--include-children",
            "--plot",
            "run.svg",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.process_id_or_command, "python train.py");
        assert_eq!(cli.interval, Some(0.5));
        assert_eq!(cli.duration, Some(10.0));
        assert!(cli.include_children);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(program_name(&cli.process_id_or_command), "python");
    }

    #[test]
    fn rejects_non_positive_seconds() {
        assert!(positive_seconds("--interval", Some(0.0)).is_err());
        assert!(positive_seconds("--interval", Some(-1.0)).is_err());
        assert!(positive_seconds("--interval", Some(f64::NAN)).is_err());
        assert_eq!(
            positive_seconds("--interval", Some(0.25)).unwrap(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(positive_seconds("--duration", None).unwrap(), None);
    }
}
