//! The execution-unit seam: one device, one block, run to completion.
//!
//! An [`ExecutionUnit`] owns whatever device state it needs (a compiled
//! pipeline and queue for a GPU, a stepping rule for the host) and exposes a
//! single blocking operation that drives one block from its initial state to
//! its final state, writing results back into the block's slices in place.

use std::io;

use crate::dispatcher::Block;

/// Parameters shared by every block of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunParams {
    /// Total simulated duration `T`.
    pub t_final: f64,
    /// Integration step size `h`.
    pub h: f64,
    /// Sub-steps performed per device invocation. Sub-stepping inside one
    /// invocation cuts host/device round trips; it does not change the
    /// integration itself.
    pub steps_per_call: u32,
}

impl RunParams {
    /// Elapsed time advanced by one device invocation.
    pub fn stride(&self) -> f64 {
        self.h * f64::from(self.steps_per_call)
    }
}

/// One accelerator (or host) bound to one worker thread for the run.
pub trait ExecutionUnit: Send {
    /// Human-readable device name for logging.
    fn name(&self) -> &str;

    /// Block size this unit asks the dispatcher for.
    fn preferred_block_size(&self) -> usize;

    /// Run `block` from `t = 0` to completion: either `t >= t_final` or
    /// every flag in the block is set, whichever comes first.
    ///
    /// On return the block's slices hold the true final device state. An
    /// error is fatal for this unit; partially-updated state is never
    /// reported as success.
    fn run_block(
        &mut self,
        block: &mut Block<'_>,
        params: &RunParams,
        args: &[f32],
    ) -> Result<(), ExecError>;
}

/// Fatal execution-unit failure.
#[derive(Debug)]
pub enum ExecError {
    /// The device rejected an allocation, invocation, or readback.
    Device {
        /// Description of the device failure.
        message: String,
    },
    /// A trajectory sink could not be written.
    Sink(io::Error),
    /// Invalid run parameters.
    InvalidParams {
        /// Description of the invalid parameter.
        message: String,
    },
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Device { message } => {
                write!(f, "Device failure: {}", message)
            }
            ExecError::Sink(err) => {
                write!(f, "Trajectory sink write failed: {}", err)
            }
            ExecError::InvalidParams { message } => {
                write!(f, "Invalid run parameters: {}", message)
            }
        }
    }
}

impl std::error::Error for ExecError {}

impl From<io::Error> for ExecError {
    fn from(err: io::Error) -> Self {
        ExecError::Sink(err)
    }
}
