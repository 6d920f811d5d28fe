use std::path::PathBuf;
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::network::{NetworkCollector, NetworkSample};
use crate::render;
use crate::sampler::{RunContext, Sampler, Termination};
use crate::shutdown::{self, Shutdown};
use crate::sink::{TimeSeriesSink, network_log_path, read_log};
use crate::system::snapshot::ProcessProbe;

/// Longest wait for the network task once sampling has stopped.
const NETWORK_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
pub struct MonitorOptions {
    pub pid: u32,
    pub log: Option<PathBuf>,
    pub plot: Option<PathBuf>,
    pub duration: Option<Duration>,
    pub interval: Option<Duration>,
    pub include_children: bool,
    /// Started alongside the sampling loop when set.
    pub network: Option<NetworkCollector>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReport {
    pub termination: Termination,
    pub samples: usize,
    pub network_samples: usize,
    pub peak_resident_mb: f64,
    pub last_elapsed: f64,
    pub log: Option<PathBuf>,
    pub network_log: Option<PathBuf>,
}

/// Samples `options.pid` until it exits, the duration passes, or `shutdown`
/// fires. Every one of those ends in `Ok`; errors are reserved for failing to
/// attach, to write the logs, or to render the plot.
pub async fn monitor<P: ProcessProbe>(
    mut probe: P,
    options: MonitorOptions,
    mut shutdown: Shutdown,
) -> Result<MonitorReport> {
    let root = probe
        .attach(options.pid)
        .wrap_err_with(|| format!("cannot attach to process {}", options.pid))?;
    info!(pid = root.pid, name = %root.name, "attached");

    let plotting = options.plot.is_some();
    let mut sink = TimeSeriesSink::open(options.log.as_deref(), true)
        .wrap_err("failed to create resource log")?;
    let network_log = options.log.as_deref().map(network_log_path);

    let ctx = RunContext::start(options.duration, options.interval, options.include_children);

    let (stop_network, network_stop) = shutdown::channel();
    let network_task = match options.network {
        Some(collector) => {
            let network_sink = TimeSeriesSink::open(network_log.as_deref(), plotting)
                .wrap_err("failed to create network log")?;
            Some(collector.spawn(ctx, network_sink, network_stop))
        }
        None => None,
    };

    let mut sampler = Sampler::new(probe, root, ctx);
    let outcome = sampler.run(&mut sink, &mut shutdown).await;

    stop_network.trigger();
    let network = collect_network(network_task, network_log.clone()).await;

    let termination = outcome.wrap_err("failed to record sample")?;
    let series = sink.series();

    if let Some(plot) = options.plot.as_deref() {
        render::render(plot, series, &network.series)?;
    }

    Ok(MonitorReport {
        termination,
        samples: sink.emitted(),
        network_samples: network.emitted,
        peak_resident_mb: series.iter().map(|s| s.mem_resident_mb).fold(0.0, f64::max),
        last_elapsed: series.last().map(|s| s.elapsed_seconds).unwrap_or(0.0),
        log: options.log,
        network_log: network.log,
    })
}

struct NetworkOutcome {
    series: Vec<NetworkSample>,
    emitted: usize,
    log: Option<PathBuf>,
}

async fn collect_network(
    task: Option<JoinHandle<TimeSeriesSink<NetworkSample>>>,
    log: Option<PathBuf>,
) -> NetworkOutcome {
    let Some(mut task) = task else {
        return NetworkOutcome {
            series: Vec::new(),
            emitted: 0,
            log: None,
        };
    };

    match tokio::time::timeout(NETWORK_JOIN_TIMEOUT, &mut task).await {
        Ok(Ok(sink)) => NetworkOutcome {
            emitted: sink.emitted(),
            log,
            series: sink.into_series(),
        },
        Ok(Err(err)) => {
            warn!(error = %err, "network task failed");
            recover_from_log(log)
        }
        Err(_) => {
            warn!("network task did not stop in time, abandoning it");
            task.abort();
            recover_from_log(log)
        }
    }
}

/// Re-reads whatever the network task managed to write before it was lost.
fn recover_from_log(log: Option<PathBuf>) -> NetworkOutcome {
    let series = log
        .as_deref()
        .and_then(|path| match read_log::<NetworkSample>(path) {
            Ok(series) => Some(series),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read network log");
                None
            }
        })
        .unwrap_or_default();
    NetworkOutcome {
        emitted: series.len(),
        series,
        log,
    }
}
