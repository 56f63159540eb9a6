//! Cyclic module interface
//!
//! A cyclic module is initialised once from its parameter files and then processed once per
//! control cycle by the executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// State of a cyclic module.
///
/// `init` may be called again to reload the parameters, it replaces the whole state. `proc`
/// must return an error if called before a successful `init`.
pub trait State {
    /// Locations of the parameter files and anything else fixed at start up
    type InitData;
    type InitError;

    /// Inputs gathered by the executable during the cycle
    type InputData;
    /// Outputs acted on by the executable after processing
    type OutputData;
    /// Flags and monitoring quantities for the cycle, archived by the executable
    type StatusReport;
    type ProcError;

    /// Load parameters and open any archives in the session directory.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Process one cycle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
