//! Cyclic module interface
//!
//! Processing modules which are stepped once per control cycle (position
//! control for example) implement `State`, so that executables initialise
//! and drive them the same way.

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// A module stepped once per control cycle.
pub trait State {
    /// Passed to `init`, usually the name of the module's parameter file
    type InitData;
    type InitError;

    type InputData;
    type OutputData;
    /// Diagnostics of one step
    type StatusReport;
    type ProcError;

    /// Load parameters and prepare the module for its first step.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError>;

    /// Forget everything accumulated by previous steps.
    ///
    /// Called whenever the module is engaged after a period of not being
    /// stepped.
    fn reset(&mut self);

    /// Run one step.
    ///
    /// An error leaves the module memory as it was before the call.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
