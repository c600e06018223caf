use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

/// Host-tick count the external-reset condition is held after a reset-arm
/// command. Sized to guarantee a minimum pulse width for downstream
/// consumers regardless of host timing jitter.
pub const RESET_HOLD_TICKS: u32 = 0x0010_0000;

const_assert!(RESET_HOLD_TICKS > 0);

/// Two-state countdown hold: Idle (`countdown == 0`) and Holding
/// (`countdown > 0`). Arming while Holding restarts the count. Once armed
/// the hold always runs to completion; there is no cancellation path.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResetSequencer {
    countdown: u32,
}

impl ResetSequencer {
    pub fn new() -> Self {
        Self { countdown: 0 }
    }

    /// Re-arms the hold to the full duration. Write data is ignored by the
    /// register that triggers this, so there is nothing to pass in.
    pub fn arm(&mut self) {
        self.countdown = RESET_HOLD_TICKS;
    }

    /// Advances one host tick, decrementing toward Idle.
    pub fn tick(&mut self) {
        self.countdown = self.countdown.saturating_sub(1);
    }

    pub fn is_holding(&self) -> bool {
        self.countdown > 0
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.countdown
    }
}
