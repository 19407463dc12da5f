//! Evaluation bridge between the worker running a solver and the host thread
//! that owns the model.
//!
//! Two single-slot channels carry one request and its response at a time.
//! The worker blocks until the host answers; the client methods take
//! `&mut self`, so a second request cannot be issued while one is in flight.
//! The channel hand-off orders the request before the host's computation and
//! the response before the worker resumes.
//!
//! There is no timeout on the wait for a response: a host that never answers
//! stalls the worker until the host side is dropped.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use fg_types::SetupError;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::host::{HostDescription, HostModel};

/// Errors surfaced on the worker side of the bridge.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("evaluation cancelled before it was requested")]
    Cancelled,

    #[error("host disconnected")]
    Disconnected,

    #[error("unexpected host response to {request}")]
    UnexpectedResponse { request: &'static str },

    #[error(transparent)]
    Setup(#[from] SetupError),
}

/// Messages sent from the worker to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostRequest {
    /// Discover inputs, output and document metadata.
    Describe,
    /// Recompute the model with these parameters and report the objective.
    Evaluate(Vec<Decimal>),
    /// Leave the model at these parameters.
    Commit(Vec<Decimal>),
}

impl HostRequest {
    fn kind(&self) -> &'static str {
        match self {
            Self::Describe => "describe",
            Self::Evaluate(_) => "evaluate",
            Self::Commit(_) => "commit",
        }
    }
}

/// Messages sent from the host back to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum HostResponse {
    Description(Result<HostDescription, SetupError>),
    /// Objective value, NaN when the host could not produce one.
    Objective(f64),
    Committed,
}

/// Create a connected client/server pair.
pub struct EvaluationBridge;

impl EvaluationBridge {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (BridgeClient, BridgeServer) {
        let (request_tx, request_rx) = bounded(1);
        let (response_tx, response_rx) = bounded(1);
        (
            BridgeClient {
                requests: request_tx,
                responses: response_rx,
            },
            BridgeServer {
                requests: request_rx,
                responses: response_tx,
            },
        )
    }
}

/// Worker side of the bridge.
#[derive(Debug)]
pub struct BridgeClient {
    requests: Sender<HostRequest>,
    responses: Receiver<HostResponse>,
}

impl BridgeClient {
    fn round_trip(&mut self, request: HostRequest) -> Result<HostResponse, BridgeError> {
        self.requests
            .send(request)
            .map_err(|_| BridgeError::Disconnected)?;
        self.responses.recv().map_err(|_| BridgeError::Disconnected)
    }

    /// Ask the host for its variables and document metadata.
    pub fn describe(&mut self) -> Result<HostDescription, BridgeError> {
        match self.round_trip(HostRequest::Describe)? {
            HostResponse::Description(description) => Ok(description?),
            _ => Err(BridgeError::UnexpectedResponse {
                request: "describe",
            }),
        }
    }

    /// Evaluate `parameters` on the host as if it were a local function call.
    ///
    /// Nothing is sent when `cancel` is already set.
    pub fn evaluate(
        &mut self,
        parameters: &[Decimal],
        cancel: &CancellationToken,
    ) -> Result<f64, BridgeError> {
        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        match self.round_trip(HostRequest::Evaluate(parameters.to_vec()))? {
            HostResponse::Objective(value) => Ok(value),
            _ => Err(BridgeError::UnexpectedResponse {
                request: "evaluate",
            }),
        }
    }

    /// Apply the final parameters to the host model and wait for it to finish.
    pub fn commit(&mut self, parameters: &[Decimal]) -> Result<(), BridgeError> {
        match self.round_trip(HostRequest::Commit(parameters.to_vec()))? {
            HostResponse::Committed => Ok(()),
            _ => Err(BridgeError::UnexpectedResponse { request: "commit" }),
        }
    }
}

/// Host side of the bridge.
#[derive(Debug)]
pub struct BridgeServer {
    requests: Receiver<HostRequest>,
    responses: Sender<HostResponse>,
}

impl BridgeServer {
    /// Answer requests until the worker hangs up. Returns the number handled.
    pub fn serve<M: HostModel + ?Sized>(&self, model: &mut M) -> usize {
        let mut handled = 0;
        for request in self.requests.iter() {
            let response = handle(model, request);
            handled += 1;
            if self.responses.send(response).is_err() {
                warn!("worker dropped before receiving the host response");
                break;
            }
        }
        debug!(handled, "bridge server stopped");
        handled
    }

    /// Handle at most one pending request without blocking.
    ///
    /// `Ok(false)` when nothing was pending, for hosts that poll from their
    /// own event loop.
    pub fn try_serve_one<M: HostModel + ?Sized>(&self, model: &mut M) -> Result<bool, BridgeError> {
        let request = match self.requests.try_recv() {
            Ok(request) => request,
            Err(TryRecvError::Empty) => return Ok(false),
            Err(TryRecvError::Disconnected) => return Err(BridgeError::Disconnected),
        };
        let response = handle(model, request);
        self.responses
            .send(response)
            .map_err(|_| BridgeError::Disconnected)?;
        Ok(true)
    }
}

fn handle<M: HostModel + ?Sized>(model: &mut M, request: HostRequest) -> HostResponse {
    debug!(request = request.kind(), "host handling request");
    match request {
        HostRequest::Describe => HostResponse::Description(describe(model)),
        HostRequest::Evaluate(parameters) => {
            model.apply_parameters(&parameters);
            HostResponse::Objective(model.objective_value())
        }
        HostRequest::Commit(parameters) => {
            model.commit(&parameters);
            HostResponse::Committed
        }
    }
}

fn describe<M: HostModel + ?Sized>(model: &mut M) -> Result<HostDescription, SetupError> {
    if !model.set_inputs() {
        return Err(SetupError::InputsUnavailable);
    }
    if !model.set_output() {
        return Err(SetupError::ObjectiveUnavailable);
    }

    let variables = model.variables();
    if variables.is_empty() {
        return Err(SetupError::NoVariables);
    }
    for (index, variable) in variables.iter().enumerate() {
        variable.validate(index)?;
    }

    Ok(HostDescription {
        variables,
        document_path: model.document_path(),
        document_name: model.document_name(),
        component_folder: model.component_folder(),
    })
}
