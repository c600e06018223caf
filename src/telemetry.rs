use crate::bridge::BridgeSnapshot;
use crate::controller::{BridgeController, ControllerStats};
use crate::loader::LoaderStats;
use crate::registers::RegisterSnapshot;
use heapless::Vec;
use serde::{Deserialize, Serialize};

const TELEMETRY_HISTORY_SIZE: usize = 64;
const DEFAULT_TELEMETRY_PERIOD_MS: u64 = 1000;

/// One periodic status packet. Everything in here is a host-domain snapshot;
/// consumers wanting core-domain truth must look at `CoreOutputs` instead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BridgeTelemetry {
    pub timestamp: u64,
    pub sequence_number: u32,
    pub ticks: ControllerStats,
    pub registers: RegisterSnapshot,
    pub reset_asserted: bool,
    pub external_reset: bool,
    pub loader: LoaderStats,
    pub loader_queue_len: u8,
    pub bridge: BridgeSnapshot,
}

#[derive(Debug)]
pub struct TelemetryCollector {
    history: Vec<BridgeTelemetry, TELEMETRY_HISTORY_SIZE>,
    sequence_number: u32,
    period_ms: u64,
    last_collection_time: u64,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            sequence_number: 0,
            period_ms: DEFAULT_TELEMETRY_PERIOD_MS,
            last_collection_time: 0,
        }
    }

    pub fn set_period_ms(&mut self, period_ms: u64) {
        self.period_ms = period_ms.max(1);
    }

    pub fn should_collect(&self, current_time: u64) -> bool {
        self.sequence_number == 0 || current_time >= self.last_collection_time + self.period_ms
    }

    /// Snapshots the controller into a sequenced packet and records it in
    /// the bounded history, evicting the oldest entry when full.
    pub fn collect(&mut self, current_time: u64, controller: &BridgeController) -> BridgeTelemetry {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.last_collection_time = current_time;

        let registers = controller.register_snapshot();
        let packet = BridgeTelemetry {
            timestamp: current_time,
            sequence_number: self.sequence_number,
            ticks: controller.stats(),
            registers,
            reset_asserted: registers.reset_remaining_ticks > 0,
            external_reset: controller.external_reset(),
            loader: controller.loader_stats(),
            loader_queue_len: controller.loader_queue_len() as u8,
            bridge: controller.bridge_snapshot(),
        };

        if self.history.is_full() {
            self.history.remove(0);
        }
        let _ = self.history.push(packet);

        packet
    }

    pub fn latest(&self) -> Option<&BridgeTelemetry> {
        self.history.last()
    }

    pub fn history(&self) -> &[BridgeTelemetry] {
        &self.history
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}
