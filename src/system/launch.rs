use std::io;
use std::process::{Child, Command, Stdio};

use tracing::{debug, info, warn};

/// A command launched through the platform shell for the duration of a run.
pub struct Workload {
    child: Child,
    command: String,
}

impl Workload {
    pub fn spawn(command: &str) -> io::Result<Self> {
        #[cfg(windows)]
        let mut cmd = {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        };

        #[cfg(not(windows))]
        let mut cmd = {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };

        let child = cmd.stdin(Stdio::inherit()).spawn()?;
        info!(pid = child.id(), command, "started workload");
        Ok(Self {
            child,
            command: command.to_string(),
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Program name the network collector filters on: the file name of the
    /// first word of the command line.
    pub fn program_name(&self) -> &str {
        program_name(&self.command)
    }

    /// Kills the shell and reaps it. Harmless when it already exited.
    pub fn kill(mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = self.child.id(), %status, "workload already exited");
                return;
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "failed to poll workload"),
        }
        if let Err(err) = self.child.kill() {
            warn!(pid = self.child.id(), error = %err, "failed to kill workload");
        }
        let _ = self.child.wait();
    }
}

pub fn program_name(command: &str) -> &str {
    let first = command.split_whitespace().next().unwrap_or("");
    first.rsplit(['/', '\\']).next().unwrap_or(first)
}
