use crate::bus::{
    AddressMatch, REG_ACCURATE_TIMING, REG_BLANKING_ALPHA, REG_BLANKING_FADE, REG_RESET_ARM,
};
use crate::reset::ResetSequencer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterId {
    ResetArm,
    AccurateTiming,
    BlankingFade,
    BlankingAlpha,
}

#[derive(Debug, Clone, Copy)]
pub struct RegisterEntry {
    pub matcher: AddressMatch,
    pub register: RegisterId,
    pub readable: bool,
}

/// Exact-match register decode table. Exactly one entry is selected per
/// lookup; table order defines precedence should entries ever overlap.
pub const REGISTER_DECODE_TABLE: [RegisterEntry; 4] = [
    RegisterEntry {
        matcher: AddressMatch::Exact(REG_RESET_ARM),
        register: RegisterId::ResetArm,
        readable: false,
    },
    RegisterEntry {
        matcher: AddressMatch::Exact(REG_ACCURATE_TIMING),
        register: RegisterId::AccurateTiming,
        readable: false,
    },
    RegisterEntry {
        matcher: AddressMatch::Exact(REG_BLANKING_FADE),
        register: RegisterId::BlankingFade,
        readable: false,
    },
    RegisterEntry {
        matcher: AddressMatch::Exact(REG_BLANKING_ALPHA),
        register: RegisterId::BlankingAlpha,
        readable: true,
    },
];

pub fn decode_register(address: u32) -> Option<RegisterEntry> {
    REGISTER_DECODE_TABLE
        .iter()
        .find(|entry| entry.matcher.matches(address))
        .copied()
}

/// Host-visible settings mutated only by the register file, on the host
/// domain's tick. Other domains see publisher snapshots of these, never the
/// struct itself.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Settings {
    pub accurate_timing: bool,
    pub show_blanking_fade: bool,
    pub blanking_alpha: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    pub accurate_timing: bool,
    pub show_blanking_fade: bool,
    pub blanking_alpha: u8,
    pub effective_alpha: u8,
    pub reset_remaining_ticks: u32,
}

#[derive(Debug, Default)]
pub struct RegisterFile {
    settings: Settings,
    reset: ResetSequencer,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            reset: ResetSequencer::new(),
        }
    }

    /// Applies one write transaction's register side effects. Evaluated at
    /// most once per host tick. Addresses outside the decode table have no
    /// register effect; other bus consumers still see the write.
    pub fn apply_write(&mut self, address: u32, data: u32) {
        let Some(entry) = decode_register(address) else {
            return;
        };

        match entry.register {
            RegisterId::ResetArm => self.reset.arm(),
            RegisterId::AccurateTiming => self.settings.accurate_timing = data & 0x1 != 0,
            RegisterId::BlankingFade => self.settings.show_blanking_fade = data & 0x1 != 0,
            RegisterId::BlankingAlpha => self.settings.blanking_alpha = (data & 0xFF) as u8,
        }
    }

    /// Computes the read response for an address. Write-only registers and
    /// unmatched addresses read as zero.
    pub fn read(&self, address: u32) -> u32 {
        match decode_register(address) {
            Some(entry) if entry.readable => match entry.register {
                RegisterId::BlankingAlpha => u32::from(self.settings.blanking_alpha),
                _ => 0,
            },
            _ => 0,
        }
    }

    /// Advances one host tick. Runs independently of any write transaction.
    pub fn tick(&mut self) {
        self.reset.tick();
    }

    pub fn reset_asserted(&self) -> bool {
        self.reset.is_holding()
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Derived, never stored: the alpha the downstream consumer sees is
    /// forced to zero while the fade is disabled.
    pub fn effective_alpha(&self) -> u8 {
        if self.settings.show_blanking_fade {
            self.settings.blanking_alpha
        } else {
            0
        }
    }

    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            accurate_timing: self.settings.accurate_timing,
            show_blanking_fade: self.settings.show_blanking_fade,
            blanking_alpha: self.settings.blanking_alpha,
            effective_alpha: self.effective_alpha(),
            reset_remaining_ticks: self.reset.remaining_ticks(),
        }
    }
}
