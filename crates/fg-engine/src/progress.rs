//! Progress notifications for observers such as a UI thread.

use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use fg_types::{OptimizationResult, ResultType};
use std::time::{Duration, Instant};
use tracing::debug;

/// Events emitted by the controller while a batch runs.
///
/// Events of one kind arrive in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Best value found so far after every evaluation of the current run.
    BestValues { run: usize, trace: Vec<f64> },
    RunFinished {
        run: usize,
        result_type: ResultType,
        value: f64,
        iterations: u64,
    },
    /// Single terminal notification for the whole batch.
    Finished {
        message: String,
        best: Option<OptimizationResult>,
    },
}

/// Best-effort publisher. Events are dropped once the receiver is gone.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<Sender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Connected sink and the receiving end for an observer.
    pub fn channel() -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = unbounded();
        (Self::new(tx), rx)
    }

    pub fn publish(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            if let Err(TrySendError::Disconnected(_)) = tx.try_send(event) {
                debug!("progress receiver dropped");
            }
        }
    }
}

/// Limits publication to one per `interval` of wall-clock time.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Instant,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// True when a full interval elapsed since the last publication; resets the window.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}
