use tracing::{debug, warn};

use super::process::{ProcessHandle, ProcessSet};
use super::snapshot::ProcessProbe;

/// Merges the root's current descendants into `known` and returns how many
/// were new. Enumeration is best effort: when the probe cannot walk the tree
/// the set is left exactly as it was.
pub fn discover<P: ProcessProbe + ?Sized>(
    probe: &mut P,
    root: &ProcessHandle,
    known: &mut ProcessSet,
) -> usize {
    let current = match probe.descendants(root) {
        Ok(current) => current,
        Err(err) if err.is_gone() => {
            debug!(pid = root.pid, "root gone during enumeration, keeping known children");
            return 0;
        }
        Err(err) => {
            warn!(error = %err, "child enumeration failed, keeping known children");
            return 0;
        }
    };

    let mut added = 0;
    for handle in current {
        let (pid, name) = (handle.pid, handle.name.clone());
        if known.insert(handle) {
            debug!(pid, name = %name, parent = root.pid, "tracking new child process");
            added += 1;
        }
    }
    added
}
