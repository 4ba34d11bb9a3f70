//! Restartable idle timer with reference counting.
//!
//! The countdown restarts whenever the duration is rewritten or the last
//! outstanding reference is released. It can only elapse while the
//! reference count is zero, so a container busier than its grace time is
//! never considered idle.
//!
//! Every expiry is tagged with the number of duration rewrites the timer had
//! seen. An expiry delivered before the owner's latest rewrite is stale and
//! is discarded by [`IdleTimer::fired`].

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug)]
enum IdleCommand {
    Duration(Duration),
    Ref,
    Unref,
    Stop,
}

/// Cloneable reference-counting side of an [`IdleTimer`].
#[derive(Debug, Clone)]
pub struct IdleHandle {
    commands: mpsc::UnboundedSender<IdleCommand>,
}

impl IdleHandle {
    /// Mark a request as outstanding.
    pub fn add_ref(&self) {
        let _ = self.commands.send(IdleCommand::Ref);
    }

    /// Mark an outstanding request as finished.
    pub fn release_ref(&self) {
        let _ = self.commands.send(IdleCommand::Unref);
    }
}

/// Idle timer owned by a container worker.
#[derive(Debug)]
pub struct IdleTimer {
    handle: IdleHandle,
    expiries: mpsc::UnboundedReceiver<u64>,
    epoch: u64,
}

impl IdleTimer {
    /// Start counting down from `duration`.
    pub fn start(duration: Duration) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_timer(duration, rx, expiry_tx));

        Self {
            handle: IdleHandle { commands },
            expiries: expiry_rx,
            epoch: 0,
        }
    }

    pub fn handle(&self) -> IdleHandle {
        self.handle.clone()
    }

    /// Rewrite the countdown target and restart it.
    ///
    /// Any expiry not yet observed through [`fired`](Self::fired) is void.
    pub fn set_duration(&mut self, duration: Duration) {
        self.epoch += 1;
        let _ = self.handle.commands.send(IdleCommand::Duration(duration));
    }

    pub fn add_ref(&self) {
        self.handle.add_ref();
    }

    pub fn release_ref(&self) {
        self.handle.release_ref();
    }

    /// Resolves when the countdown elapses with no outstanding references.
    ///
    /// Cancel safe. After an expiry the timer stays quiet until the next
    /// restart; after [`stop`](Self::stop) this never resolves.
    pub async fn fired(&mut self) {
        while let Some(epoch) = self.expiries.recv().await {
            if epoch == self.epoch {
                return;
            }
            tracing::trace!(epoch, current = self.epoch, "Discarding stale idle expiry");
        }
        std::future::pending::<()>().await
    }

    /// Stop the countdown; the timer will not fire afterwards.
    pub fn stop(&self) {
        let _ = self.handle.commands.send(IdleCommand::Stop);
    }
}

async fn run_timer(
    mut duration: Duration,
    mut commands: mpsc::UnboundedReceiver<IdleCommand>,
    expiries: mpsc::UnboundedSender<u64>,
) {
    let mut refs: usize = 0;
    let mut epoch: u64 = 0;
    let mut armed = true;
    let mut deadline = Instant::now() + duration;

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(IdleCommand::Duration(d)) => {
                    epoch += 1;
                    duration = d;
                    deadline = Instant::now() + duration;
                    armed = true;
                }
                Some(IdleCommand::Ref) => refs += 1,
                Some(IdleCommand::Unref) => {
                    debug_assert!(refs > 0, "unbalanced idle reference release");
                    refs = refs.saturating_sub(1);
                    if refs == 0 {
                        deadline = Instant::now() + duration;
                        armed = true;
                    }
                }
                Some(IdleCommand::Stop) | None => return,
            },
            _ = tokio::time::sleep_until(deadline), if armed && refs == 0 => {
                armed = false;
                if expiries.send(epoch).is_err() {
                    return;
                }
            }
        }
    }
}
