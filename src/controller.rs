use crate::bridge::{BridgeSnapshot, BridgeStatus, CommandBridge, RtcTime, SlotRequest};
use crate::bus::{decode_region, BusAccess, BusRegion, BusTransaction};
use crate::loader::{LoadStreamEvent, LoaderConfig, LoaderStats, StreamingLoader};
use crate::registers::{RegisterFile, RegisterSnapshot};
use crate::sync::DomainPublisher;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Settings crossed host-to-core as one bundle. These fields change together
/// under host control and their consumers tolerate slightly stale cross-field
/// combinations, so they share a publisher instance. The combined reset, the
/// download flag, and the bridge status lines each cross in their own
/// instance instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsBundle {
    pub accurate_timing: bool,
    pub show_blanking_fade: bool,
    /// Already gated by the fade enable; the stored alpha never leaves the
    /// host domain.
    pub blanking_alpha: u8,
}

/// Everything the application-core collaborator consumes on one core tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CoreOutputs {
    pub reset: bool,
    pub accurate_timing: bool,
    pub show_blanking_fade: bool,
    pub blanking_alpha: u8,
    pub downloading: bool,
    pub bridge_status: BridgeStatus,
    pub load_event: LoadStreamEvent,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ControllerStats {
    pub host_ticks: u64,
    pub core_ticks: u64,
    pub reads: u32,
    pub writes: u32,
}

/// Composition root. Routes the shared read-data bus to the first matching
/// consumer, fans every write out to all of them, and republishes host-domain
/// state through domain publishers before the core domain sees it.
pub struct BridgeController {
    registers: RegisterFile,
    loader: StreamingLoader,
    bridge: CommandBridge,
    external_reset: bool,

    settings_publisher: DomainPublisher<SettingsBundle>,
    reset_publisher: DomainPublisher<bool>,
    session_publisher: DomainPublisher<bool>,
    status_publisher: DomainPublisher<BridgeStatus>,

    stats: ControllerStats,
}

impl BridgeController {
    pub fn new() -> Self {
        Self::with_loader_config(LoaderConfig::default())
    }

    pub fn with_loader_config(config: LoaderConfig) -> Self {
        Self {
            registers: RegisterFile::new(),
            loader: StreamingLoader::new(config),
            bridge: CommandBridge::new(),
            external_reset: false,
            settings_publisher: DomainPublisher::default(),
            reset_publisher: DomainPublisher::default(),
            session_publisher: DomainPublisher::default(),
            status_publisher: DomainPublisher::default(),
            stats: ControllerStats::default(),
        }
    }

    /// Advances the host domain by one tick, processing at most one bus
    /// transaction. Returns the combinational read response when the
    /// transaction is a read.
    pub fn host_tick(&mut self, transaction: Option<&BusTransaction>) -> Option<u32> {
        self.stats.host_ticks += 1;

        // The countdown runs every tick, with or without a transaction. It
        // runs before write dispatch so an arming write wins over the same
        // tick's decrement and the hold lasts its full configured length.
        self.registers.tick();

        let mut read_data = None;
        if let Some(txn) = transaction {
            match txn.kind {
                BusAccess::Read => {
                    self.stats.reads = self.stats.reads.saturating_add(1);
                    read_data = Some(self.route_read(txn.address));
                }
                BusAccess::Write => {
                    self.stats.writes = self.stats.writes.saturating_add(1);
                    debug!(address = txn.address, data = txn.write_data, "bus write");

                    // Fan-out, not dispatch: every consumer sees the write
                    // and decides for itself whether the address is its own.
                    self.registers.apply_write(txn.address, txn.write_data);
                    self.loader.offer(txn);
                    self.bridge.observe_write(txn.address, txn.write_data);
                }
            }
        }

        self.publish_host_state();
        read_data
    }

    /// Advances the core domain by one tick and returns the outputs the
    /// application core consumes on that tick.
    pub fn core_tick(&mut self) -> CoreOutputs {
        self.stats.core_ticks += 1;

        let settings = self.settings_publisher.tick();
        CoreOutputs {
            reset: self.reset_publisher.tick(),
            accurate_timing: settings.accurate_timing,
            show_blanking_fade: settings.show_blanking_fade,
            blanking_alpha: settings.blanking_alpha,
            downloading: self.session_publisher.tick(),
            bridge_status: self.status_publisher.tick(),
            load_event: self.loader.tick(),
        }
    }

    fn publish_host_state(&mut self) {
        let settings = self.registers.settings();
        self.settings_publisher.publish(SettingsBundle {
            accurate_timing: settings.accurate_timing,
            show_blanking_fade: settings.show_blanking_fade,
            blanking_alpha: self.registers.effective_alpha(),
        });

        // Combined reset: host reset command OR host-driven external reset.
        self.reset_publisher
            .publish(self.registers.reset_asserted() || self.external_reset);
        self.session_publisher.publish(self.bridge.downloading());
        self.status_publisher.publish(self.bridge.status());
    }

    /// Shared read-data routing: first match wins, default zero.
    fn route_read(&self, address: u32) -> u32 {
        match decode_region(address) {
            BusRegion::Registers => self.registers.read(address),
            BusRegion::CommandBridge => self.bridge.read(address),
            BusRegion::LoaderWindow | BusRegion::Unmapped => 0,
        }
    }

    /// Streams a block of payload bytes through the load window, one 16-bit
    /// word write per host tick, stopping when the loader queue has no
    /// capacity left. Returns the number of bytes consumed; the caller
    /// resubmits the remainder once the core domain has drained the queue.
    pub fn load_block(&mut self, base_address: u32, bytes: &[u8]) -> usize {
        let mut consumed = 0;
        for chunk in bytes.chunks_exact(2) {
            if !self.loader.has_capacity() {
                break;
            }
            let word = u32::from(chunk[0]) | (u32::from(chunk[1]) << 8);
            let txn = BusTransaction::write(base_address + consumed as u32, word);
            self.host_tick(Some(&txn));
            consumed += 2;
        }
        consumed
    }

    pub fn set_external_reset(&mut self, asserted: bool) {
        self.external_reset = asserted;
    }

    pub fn external_reset(&self) -> bool {
        self.external_reset
    }

    pub fn begin_transfer(&mut self, request: SlotRequest) {
        self.bridge
            .begin_write_request(request, self.stats.host_ticks);
    }

    pub fn acknowledge_slot(&mut self, slot_id: u16) -> bool {
        self.bridge.acknowledge_slot(slot_id)
    }

    pub fn complete_transfers(&mut self) {
        self.bridge.all_transfers_complete();
    }

    pub fn set_status_lines(&mut self, status: BridgeStatus) {
        self.bridge.set_status_lines(status);
    }

    pub fn set_in_menu(&mut self, in_menu: bool) {
        self.bridge.set_in_menu(in_menu);
    }

    pub fn set_rtc(&mut self, rtc: RtcTime) {
        self.bridge.set_rtc(rtc);
    }

    pub fn register_snapshot(&self) -> RegisterSnapshot {
        self.registers.snapshot()
    }

    pub fn loader_stats(&self) -> LoaderStats {
        self.loader.stats()
    }

    pub fn loader_queue_len(&self) -> usize {
        self.loader.queue_len()
    }

    pub fn loader_has_capacity(&self) -> bool {
        self.loader.has_capacity()
    }

    pub fn bridge_snapshot(&self) -> BridgeSnapshot {
        self.bridge.snapshot()
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }
}

impl Default for BridgeController {
    fn default() -> Self {
        Self::new()
    }
}
