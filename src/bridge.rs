//! Command Bridge collaborator stub.
//!
//! The higher-level request/acknowledge protocol (data-slot transfer,
//! save-state transfer, RTC delivery) lives outside this core. This module
//! models only the surface the core consumes: a bus tap for the bridge
//! address range, the boolean status lines, the download-session flag
//! derived from transfer notifications, and the handful of protocol fields
//! republished downstream.

use crate::bus::BRIDGE_PREFIX;
use heapless::Vec;
use serde::{Deserialize, Serialize};

const MAX_TRACKED_TRANSFERS: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub boot_done: bool,
    pub setup_done: bool,
    pub running: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RtcTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Data-slot transfer request, keyed by a 16-bit slot id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlotRequest {
    pub slot_id: u16,
    pub offset: u32,
    pub length: u32,
    pub bridge_address: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferPhase {
    Requested,
    Acknowledged,
    Done,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlotTransfer {
    pub request: SlotRequest,
    pub phase: TransferPhase,
    pub started_at_tick: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SaveStateStatus {
    pub busy: bool,
    pub ok: bool,
    pub err: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BridgeSnapshot {
    pub status: BridgeStatus,
    pub in_menu: bool,
    pub downloading: bool,
    pub words_observed: u32,
    pub active_transfers: u8,
}

#[derive(Debug, Default)]
pub struct CommandBridge {
    status: BridgeStatus,
    in_menu: bool,
    rtc: RtcTime,
    downloading: bool,
    savestate: SaveStateStatus,
    transfers: Vec<SlotTransfer, MAX_TRACKED_TRANSFERS>,
    last_bus_word: u32,
    words_observed: u32,
}

impl CommandBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus tap: the orchestrator fans every write out here; the bridge
    /// decides for itself whether the address is its own and ignores the
    /// rest.
    pub fn observe_write(&mut self, address: u32, data: u32) {
        if address >> 24 != BRIDGE_PREFIX {
            return;
        }
        self.last_bus_word = data;
        self.words_observed = self.words_observed.saturating_add(1);
    }

    pub fn last_bus_word(&self) -> u32 {
        self.last_bus_word
    }

    /// Read response for the bridge address range. The transfer protocol is
    /// a black box here, so reads return zero.
    pub fn read(&self, _address: u32) -> u32 {
        0
    }

    /// A write-request for a data slot opens the download session.
    pub fn begin_write_request(&mut self, request: SlotRequest, current_tick: u64) {
        self.downloading = true;

        let transfer = SlotTransfer {
            request,
            phase: TransferPhase::Requested,
            started_at_tick: current_tick,
        };
        if self.transfers.push(transfer).is_err() {
            self.transfers.remove(0);
            let _ = self.transfers.push(transfer);
        }
    }

    pub fn acknowledge_slot(&mut self, slot_id: u16) -> bool {
        match self
            .transfers
            .iter_mut()
            .find(|t| t.request.slot_id == slot_id && t.phase == TransferPhase::Requested)
        {
            Some(transfer) => {
                transfer.phase = TransferPhase::Acknowledged;
                true
            }
            None => false,
        }
    }

    /// The all-transfers-complete notification closes the download session.
    /// If the host never sends it, `downloading` never clears; that liveness
    /// hazard belongs to the host protocol, not this core.
    pub fn all_transfers_complete(&mut self) {
        self.downloading = false;
        for transfer in self.transfers.iter_mut() {
            transfer.phase = TransferPhase::Done;
        }
    }

    pub fn begin_savestate(&mut self) {
        self.savestate = SaveStateStatus {
            busy: true,
            ok: false,
            err: false,
        };
    }

    pub fn finish_savestate(&mut self, ok: bool) {
        self.savestate = SaveStateStatus {
            busy: false,
            ok,
            err: !ok,
        };
    }

    pub fn set_status_lines(&mut self, status: BridgeStatus) {
        self.status = status;
    }

    pub fn set_in_menu(&mut self, in_menu: bool) {
        self.in_menu = in_menu;
    }

    pub fn set_rtc(&mut self, rtc: RtcTime) {
        self.rtc = rtc;
    }

    pub fn status(&self) -> BridgeStatus {
        self.status
    }

    pub fn downloading(&self) -> bool {
        self.downloading
    }

    pub fn rtc(&self) -> RtcTime {
        self.rtc
    }

    pub fn savestate(&self) -> SaveStateStatus {
        self.savestate
    }

    pub fn transfers(&self) -> &[SlotTransfer] {
        &self.transfers
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        BridgeSnapshot {
            status: self.status,
            in_menu: self.in_menu,
            downloading: self.downloading,
            words_observed: self.words_observed,
            active_transfers: self
                .transfers
                .iter()
                .filter(|t| t.phase != TransferPhase::Done)
                .count() as u8,
        }
    }
}
