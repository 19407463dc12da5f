//! FrOG optimization engine.
//!
//! Runs solvers on a worker thread while the host model is recomputed on the
//! host's own thread, connected by a single-slot [`bridge`].

pub mod bridge;
pub mod cancel;
pub mod controller;
pub mod error;
pub mod host;
pub mod progress;
pub mod run_log;
pub mod run_state;

pub use bridge::{BridgeClient, BridgeError, BridgeServer, EvaluationBridge, HostRequest, HostResponse};
pub use cancel::CancellationToken;
pub use controller::{BatchReport, Controller, RunPhase, WorkerHandle};
pub use error::{EngineError, EngineResult};
pub use host::{FunctionModel, HostDescription, HostModel, HostStats};
pub use progress::{ProgressEvent, ProgressSink, ProgressThrottle};
pub use run_log::{FileRunLog, RunLog, TracingRunLog};
pub use run_state::RunState;
