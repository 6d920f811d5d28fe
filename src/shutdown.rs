use tokio::sync::watch;
use tracing::{info, warn};

/// Receiving side of a one-shot stop request. Clones observe the same
/// trigger.
#[derive(Clone, Debug)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    /// A shutdown that never fires.
    pub fn never() -> Self {
        let (trigger, shutdown) = channel();
        drop(trigger);
        shutdown
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once triggered. Pends forever if the trigger is dropped
    /// without firing.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Fires on the first Ctrl-C. A second Ctrl-C exits immediately.
pub fn on_ctrl_c() -> Shutdown {
    let (trigger, shutdown) = channel();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for interrupts");
            return;
        }
        info!("interrupt received, finishing current sample");
        trigger.trigger();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("second interrupt, exiting without cleanup");
            std::process::exit(130);
        }
    });
    shutdown
}
