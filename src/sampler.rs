//! The sampling loop: one aggregated reading of a process tree per tick.

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, trace};

use crate::format::bytes_to_mb;
use crate::shutdown::Shutdown;
use crate::sink::{Record, SampleSink, push_float};
use crate::system::process::{ProcessHandle, ProcessSet};
use crate::system::snapshot::{ProcessProbe, RefreshScope, ResourceSample};
use crate::system::tracker;

/// Settings fixed at run start and shared read-only with the network
/// collector. Both series measure elapsed time from `origin`.
#[derive(Clone, Copy, Debug)]
pub struct RunContext {
    pub origin: Instant,
    pub duration_limit: Option<Duration>,
    pub poll_interval: Option<Duration>,
    pub include_children: bool,
}

impl RunContext {
    pub fn start(
        duration_limit: Option<Duration>,
        poll_interval: Option<Duration>,
        include_children: bool,
    ) -> Self {
        Self {
            origin: Instant::now(),
            duration_limit,
            poll_interval,
            include_children,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.duration_limit.map(|limit| self.origin + limit)
    }

    pub fn past_limit(&self, elapsed: Duration) -> bool {
        matches!(self.duration_limit, Some(limit) if elapsed > limit)
    }
}

/// Root plus every readable descendant at one tick, in megabytes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AggregatedSample {
    pub elapsed_seconds: f64,
    pub cpu_percent: f64,
    pub mem_resident_mb: f64,
    pub mem_virtual_mb: f64,
    pub io_read_mb: f64,
    pub io_write_mb: f64,
}

impl AggregatedSample {
    pub fn from_total(elapsed_seconds: f64, total: &ResourceSample) -> Self {
        Self {
            elapsed_seconds,
            cpu_percent: f64::from(total.cpu_percent),
            mem_resident_mb: bytes_to_mb(total.mem_resident_bytes),
            mem_virtual_mb: bytes_to_mb(total.mem_virtual_bytes),
            io_read_mb: bytes_to_mb(total.io_read_bytes),
            io_write_mb: bytes_to_mb(total.io_write_bytes),
        }
    }
}

impl Record for AggregatedSample {
    const COLUMNS: &'static [&'static str] = &[
        "Elapsed time",
        "CPU (%)",
        "Real (MB)",
        "Virtual (MB)",
        "IO Read (MB)",
        "IO Write (MB)",
    ];

    fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    fn write_fields(&self, line: &mut String) {
        for value in [
            self.elapsed_seconds,
            self.cpu_percent,
            self.mem_resident_mb,
            self.mem_virtual_mb,
            self.io_read_mb,
            self.io_write_mb,
        ] {
            push_float(line, value);
        }
    }

    fn from_fields(fields: &[&str]) -> Option<Self> {
        let [elapsed, cpu, real, virt, read, write] = fields else {
            return None;
        };
        Some(Self {
            elapsed_seconds: elapsed.parse().ok()?,
            cpu_percent: cpu.parse().ok()?,
            mem_resident_mb: real.parse().ok()?,
            mem_virtual_mb: virt.parse().ok()?,
            io_read_mb: read.parse().ok()?,
            io_write_mb: write.parse().ok()?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Root exited, became a zombie, or vanished mid-read.
    ProcessExit,
    Duration,
    Signal,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Termination::ProcessExit => "process exited",
            Termination::Duration => "duration elapsed",
            Termination::Signal => "interrupted",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminated(Termination),
    /// The sink rejected a sample; no further ticks run.
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tick {
    Sample(AggregatedSample),
    Stop(Termination),
    /// The loop halted after the sink rejected a sample.
    Failed,
}

pub struct Sampler<P> {
    probe: P,
    root: ProcessHandle,
    ctx: RunContext,
    children: ProcessSet,
    state: LoopState,
    ticks: u64,
}

impl<P: ProcessProbe> Sampler<P> {
    pub fn new(probe: P, root: ProcessHandle, ctx: RunContext) -> Self {
        Self {
            probe,
            root,
            ctx,
            children: ProcessSet::new(),
            state: LoopState::Running,
            ticks: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn children(&self) -> &ProcessSet {
        &self.children
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    fn stop(&mut self, termination: Termination) -> Tick {
        if self.state == LoopState::Running {
            info!(
                pid = self.root.pid,
                cause = %termination,
                ticks = self.ticks,
                elapsed_s = self.ctx.elapsed().as_secs_f64(),
                "sampling stopped"
            );
            self.state = LoopState::Terminated(termination);
        }
        Tick::Stop(termination)
    }

    /// Runs one tick. After a `Stop` or `Failed` every further call returns
    /// the same outcome without touching the probe.
    pub fn tick(&mut self) -> Tick {
        match self.state {
            LoopState::Running => {}
            LoopState::Terminated(termination) => return Tick::Stop(termination),
            LoopState::Failed => return Tick::Failed,
        }

        let elapsed = self.ctx.elapsed();
        let scope = if self.ctx.include_children {
            RefreshScope::All
        } else {
            RefreshScope::Root(self.root.pid)
        };
        self.probe.refresh(scope);

        match self.probe.status(&self.root) {
            Ok(state) if state.has_exited() => {
                debug!(pid = self.root.pid, ?state, "root process finished");
                return self.stop(Termination::ProcessExit);
            }
            Ok(_) => {}
            Err(err) if err.is_gone() => return self.stop(Termination::ProcessExit),
            Err(err) => debug!(error = %err, "root status unavailable, reading anyway"),
        }

        if self.ctx.past_limit(elapsed) {
            return self.stop(Termination::Duration);
        }

        // The root can exit between the status check and the read.
        let mut total = match self.probe.read(&self.root) {
            Ok(sample) => sample,
            Err(err) => {
                debug!(error = %err, "root read failed");
                return self.stop(Termination::ProcessExit);
            }
        };

        if self.ctx.include_children {
            tracker::discover(&mut self.probe, &self.root, &mut self.children);
            for child in self.children.iter() {
                match self.probe.read(child) {
                    Ok(sample) => total.merge(&sample),
                    Err(err) => trace!(pid = child.pid, error = %err, "child skipped this tick"),
                }
            }
        }

        self.ticks += 1;
        Tick::Sample(AggregatedSample::from_total(elapsed.as_secs_f64(), &total))
    }

    /// Ticks until a terminal state, emitting each sample to `sink`. The
    /// sink is finalized on every exit path.
    pub async fn run<S>(&mut self, sink: &mut S, shutdown: &mut Shutdown) -> io::Result<Termination>
    where
        S: SampleSink<AggregatedSample>,
    {
        let outcome = self.drive(sink, shutdown).await;
        let finalized = sink.finalize();
        let termination = outcome?;
        finalized?;
        Ok(termination)
    }

    async fn drive<S>(&mut self, sink: &mut S, shutdown: &mut Shutdown) -> io::Result<Termination>
    where
        S: SampleSink<AggregatedSample>,
    {
        loop {
            if shutdown.is_triggered() {
                self.stop(Termination::Signal);
            }
            let sample = match self.tick() {
                Tick::Sample(sample) => sample,
                Tick::Stop(termination) => return Ok(termination),
                Tick::Failed => return Err(io::Error::other("sampling halted after a sink failure")),
            };
            if let Err(err) = sink.emit(sample) {
                self.state = LoopState::Failed;
                return Err(err);
            }

            match self.ctx.poll_interval {
                Some(interval) => {
                    tokio::select! {
                        _ = sleep(interval) => {}
                        _ = shutdown.triggered() => {
                            self.stop(Termination::Signal);
                        }
                    }
                }
                // Best effort: sample again right away, but let other tasks
                // (and the interrupt listener) run first.
                None => tokio::task::yield_now().await,
            }
        }
    }
}
