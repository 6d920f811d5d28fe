//! Host network throughput, read from an external bandwidth monitor.
//!
//! The tool (by default `bandwhich -trp`) prints one line per process and
//! refresh containing `<up>/<down>` byte counts. Lines are attributed to the
//! workload by substring match, which is a heuristic: unrelated processes
//! whose names contain the filter are counted too.

use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::sleep_until;
use tracing::{debug, info, warn};

use crate::sampler::RunContext;
use crate::shutdown::Shutdown;
use crate::sink::{Record, SampleSink, TimeSeriesSink, push_count, push_float};

/// How long a tool that closed its output may take to exit before it is killed.
const EXIT_GRACE: Duration = Duration::from_secs(1);

static PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)/(\d+)").expect("byte pair pattern is valid"));

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NetworkSample {
    pub elapsed_seconds: f64,
    pub upload_bytes: u64,
    pub download_bytes: u64,
}

impl Record for NetworkSample {
    const COLUMNS: &'static [&'static str] = &["Elapsed time", "Upload (B)", "Download (B)"];

    fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    fn write_fields(&self, line: &mut String) {
        push_float(line, self.elapsed_seconds);
        push_count(line, self.upload_bytes);
        push_count(line, self.download_bytes);
    }

    fn from_fields(fields: &[&str]) -> Option<Self> {
        let [elapsed, up, down] = fields else {
            return None;
        };
        Some(Self {
            elapsed_seconds: elapsed.parse().ok()?,
            upload_bytes: up.parse().ok()?,
            download_bytes: down.parse().ok()?,
        })
    }
}

/// Extracts `(upload, download)` pairs attributed to `filter`.
///
/// Each `<int>/<int>` token belongs to the text between the previous token
/// (or the line start) and itself; the pair is kept when that text contains
/// `filter`. Tokens whose numbers overflow `u64` are skipped.
pub fn parse_line(line: &str, filter: &str) -> Vec<(u64, u64)> {
    let mut pairs = Vec::new();
    let mut owner_start = 0;
    for caps in PAIR.captures_iter(line) {
        let (Some(whole), Some(up), Some(down)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let owner = &line[owner_start..whole.start()];
        owner_start = whole.end();
        if !owner.contains(filter) {
            continue;
        }
        match (up.as_str().parse::<u64>(), down.as_str().parse::<u64>()) {
            (Ok(up), Ok(down)) => pairs.push((up, down)),
            _ => debug!(token = whole.as_str(), "skipping malformed byte counts"),
        }
    }
    pairs
}

/// Launches the bandwidth tool and turns its output into a series.
#[derive(Clone, Debug)]
pub struct NetworkCollector {
    program: String,
    args: Vec<String>,
    filter: String,
}

impl NetworkCollector {
    /// `command` is the program followed by its arguments. Returns `None`
    /// for an empty command.
    pub fn new(command: &[String], filter: impl Into<String>) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            filter: filter.into(),
        })
    }

    /// Starts collecting on a background task. The task ends at the run's
    /// duration limit, when `stop` fires, or when the tool exits, and yields
    /// the finalized sink.
    pub fn spawn(
        self,
        ctx: RunContext,
        sink: TimeSeriesSink<NetworkSample>,
        stop: Shutdown,
    ) -> JoinHandle<TimeSeriesSink<NetworkSample>> {
        tokio::spawn(self.collect(ctx, sink, stop))
    }

    pub async fn collect(
        self,
        ctx: RunContext,
        mut sink: TimeSeriesSink<NetworkSample>,
        mut stop: Shutdown,
    ) -> TimeSeriesSink<NetworkSample> {
        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                warn!(program = %self.program, error = %err, "network monitor failed to start; no network series");
                finalize(&mut sink);
                return sink;
            }
        };
        info!(program = %self.program, filter = %self.filter, "network monitor started");

        let Some(stdout) = child.stdout.take() else {
            warn!("network monitor has no stdout");
            finalize(&mut sink);
            return sink;
        };
        let mut lines = BufReader::new(stdout).lines();

        let deadline = async {
            match ctx.deadline() {
                Some(at) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut lines_seen = 0usize;
        let tool_finished = loop {
            tokio::select! {
                _ = &mut deadline => {
                    debug!("network monitor reached duration limit");
                    break false;
                }
                _ = stop.triggered() => {
                    debug!("network monitor stopped");
                    break false;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        lines_seen += 1;
                        if let Err(err) = self.record_line(&line, &ctx, &mut sink) {
                            warn!(error = %err, "failed to write network sample; ending series");
                            break false;
                        }
                    }
                    Ok(None) => break true,
                    Err(err) => {
                        warn!(error = %err, "failed to read network monitor output");
                        break false;
                    }
                },
            }
        };

        // A tool that closed its output gets a moment to exit before the kill.
        let exited = if tool_finished {
            tokio::time::timeout(EXIT_GRACE, child.wait()).await.ok()
        } else {
            None
        };
        match exited {
            Some(Ok(status)) => {
                if let Some(message) = early_exit_message(&self.program, lines_seen, status) {
                    warn!("{message}");
                }
            }
            Some(Err(err)) => debug!(error = %err, "failed to reap network monitor"),
            None => {
                if let Err(err) = child.start_kill() {
                    debug!(error = %err, "network monitor already gone");
                }
                let _ = child.wait().await;
            }
        }
        finalize(&mut sink);
        info!(samples = sink.emitted(), "network series complete");
        sink
    }

    fn record_line(
        &self,
        line: &str,
        ctx: &RunContext,
        sink: &mut TimeSeriesSink<NetworkSample>,
    ) -> std::io::Result<()> {
        let pairs = parse_line(line, &self.filter);
        if pairs.is_empty() {
            return Ok(());
        }
        let elapsed_seconds = ctx.elapsed().as_secs_f64();
        for (upload_bytes, download_bytes) in pairs {
            sink.emit(NetworkSample {
                elapsed_seconds,
                upload_bytes,
                download_bytes,
            })?;
        }
        Ok(())
    }
}

/// Describes a tool that closed its output before the run ended. A tool that
/// printed nothing at all usually lacks privileges (bandwhich needs root).
fn early_exit_message(program: &str, lines_seen: usize, status: ExitStatus) -> Option<String> {
    if lines_seen == 0 {
        return Some(format!(
            "network monitor '{program}' exited ({status}) without output; \
             it may need elevated privileges, e.g. a `sudo` prefix in [network].command"
        ));
    }
    if status.success() {
        None
    } else {
        Some(format!(
            "network monitor '{program}' exited early ({status}) after {lines_seen} lines"
        ))
    }
}

fn finalize(sink: &mut TimeSeriesSink<NetworkSample>) {
    if let Err(err) = sink.finalize() {
        warn!(error = %err, "failed to close network log");
    }
}
