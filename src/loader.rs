use crate::bus::{BusTransaction, LOADER_WINDOW_PREFIX};
use heapless::spsc::Queue;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use tracing::warn;

/// Depth of the host-to-destination word queue. The hardware analog has no
/// buffer at all; the host pacing contract keeps this from filling.
pub const LOADER_QUEUE_DEPTH: usize = 64;

const WINDOW_OFFSET_MASK: u32 = 0x0FFF_FFFF;

const_assert!(LOADER_QUEUE_DEPTH > 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Top-4-bit address prefix selecting the load window.
    pub window_prefix: u32,
    /// Destination ticks to wait after an enable pulse before the next word.
    pub settle_ticks: u8,
    /// Destination ticks the enable line stays asserted per word.
    pub enable_ticks: u8,
    /// Width of the destination word address space.
    pub address_bits: u8,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            window_prefix: LOADER_WINDOW_PREFIX,
            settle_ticks: 8,
            enable_ticks: 2,
            address_bits: 25,
        }
    }
}

/// One destination-domain loader output. `address` is in destination-word
/// units: the payload byte address with the low bit dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStreamEvent {
    pub enable: bool,
    pub address: u32,
    pub data: u16,
}

impl LoadStreamEvent {
    pub fn idle() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LoaderStats {
    pub words_accepted: u32,
    pub out_of_window: u32,
    pub overflow_drops: u32,
    pub events_emitted: u32,
}

#[derive(Debug, Clone, Copy)]
struct PendingWord {
    address: u32,
    data: u16,
}

#[derive(Debug, Clone, Copy)]
enum LoaderPhase {
    Idle,
    Asserting { remaining: u8 },
    Settling { remaining: u8 },
}

/// Converts host write transactions inside the configured address window
/// into a paced destination-domain event stream. FIFO order matches
/// submission order; out-of-window writes are dropped without buffering.
/// There is no abort path: a word accepted on the host side always produces
/// its enable pulse.
pub struct StreamingLoader {
    config: LoaderConfig,
    queue: Queue<PendingWord, LOADER_QUEUE_DEPTH>,
    phase: LoaderPhase,
    current: LoadStreamEvent,
    stats: LoaderStats,
}

impl StreamingLoader {
    pub fn new(config: LoaderConfig) -> Self {
        debug_assert!(
            config.enable_ticks >= 1,
            "Enable pulse length {} must be at least one tick",
            config.enable_ticks
        );
        debug_assert!(
            config.address_bits <= 26,
            "Destination address width {} exceeds 26 bits",
            config.address_bits
        );

        Self {
            config,
            queue: Queue::new(),
            phase: LoaderPhase::Idle,
            current: LoadStreamEvent::idle(),
            stats: LoaderStats::default(),
        }
    }

    /// Host-domain side: observes one bus transaction and queues the payload
    /// word when the address falls inside the load window. Returns whether
    /// the word was accepted. An overflowing write is dropped and counted;
    /// the host pacing contract makes that a host protocol violation rather
    /// than a recoverable condition.
    pub fn offer(&mut self, transaction: &BusTransaction) -> bool {
        if !transaction.is_write() {
            return false;
        }

        if transaction.address >> 28 != self.config.window_prefix {
            self.stats.out_of_window = self.stats.out_of_window.saturating_add(1);
            return false;
        }

        let word_mask = (1_u32 << self.config.address_bits) - 1;
        let word = PendingWord {
            address: ((transaction.address & WINDOW_OFFSET_MASK) >> 1) & word_mask,
            data: (transaction.write_data & 0xFFFF) as u16,
        };

        if self.queue.enqueue(word).is_err() {
            self.stats.overflow_drops = self.stats.overflow_drops.saturating_add(1);
            warn!(
                address = transaction.address,
                "Loader queue full, payload word dropped"
            );
            return false;
        }

        self.stats.words_accepted = self.stats.words_accepted.saturating_add(1);
        true
    }

    /// Destination-domain side: advances one destination tick and returns
    /// the loader output for that tick. Exactly one enable pulse is emitted
    /// per accepted word, each followed by the configured settle delay.
    pub fn tick(&mut self) -> LoadStreamEvent {
        match self.phase {
            LoaderPhase::Idle => match self.queue.dequeue() {
                Some(word) => {
                    self.current = LoadStreamEvent {
                        enable: true,
                        address: word.address,
                        data: word.data,
                    };
                    self.stats.events_emitted = self.stats.events_emitted.saturating_add(1);
                    self.phase = self.after_enable_tick(self.config.enable_ticks - 1);
                    self.current
                }
                None => LoadStreamEvent::idle(),
            },
            LoaderPhase::Asserting { remaining } => {
                self.phase = self.after_enable_tick(remaining - 1);
                self.current
            }
            LoaderPhase::Settling { remaining } => {
                self.phase = if remaining > 1 {
                    LoaderPhase::Settling {
                        remaining: remaining - 1,
                    }
                } else {
                    LoaderPhase::Idle
                };
                LoadStreamEvent::idle()
            }
        }
    }

    fn after_enable_tick(&self, enable_remaining: u8) -> LoaderPhase {
        if enable_remaining > 0 {
            LoaderPhase::Asserting {
                remaining: enable_remaining,
            }
        } else if self.config.settle_ticks > 0 {
            LoaderPhase::Settling {
                remaining: self.config.settle_ticks,
            }
        } else {
            LoaderPhase::Idle
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the host can submit another word without it being dropped.
    pub fn has_capacity(&self) -> bool {
        self.queue.len() < LOADER_QUEUE_DEPTH - 1
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats
    }

    pub fn config(&self) -> LoaderConfig {
        self.config
    }
}

impl Default for StreamingLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}
