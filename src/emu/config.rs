/// Register read by the 8xy6 / 8xyE shift instructions.
///
/// The original COSMAC VIP interpreter shifts Vy into Vx, later interpreters
/// (CHIP-48, SUPER-CHIP) shift Vx in place and ignore y.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShiftSource {
    #[default]
    Vy,
    Vx,
}

/// Behaviour knobs for a [`Machine`](super::Machine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    pub shift_source: ShiftSource,
    /// Maximum number of nested subroutine calls.
    pub stack_limit: usize,
    /// Seed for the Cxnn random generator, `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            shift_source: ShiftSource::default(),
            stack_limit: 16,
            seed: None,
        }
    }
}
