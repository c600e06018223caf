//! # Host-Bridge Control-Plane Simulator
//!
//! A cycle-accurate simulation library for the bridge register/command
//! interface of a reconfigurable hardware platform: bus transaction decode,
//! cross-domain state publication, and a paced streaming data loader.
//!
//! ## Features
//!
//! - **Register file**: address-dispatched read/write side effects with an
//!   explicit first-match-wins decode table
//! - **Reset sequencing**: countdown hold guaranteeing a minimum reset pulse
//!   width regardless of host timing jitter
//! - **Clock-domain crossing**: bundles republished through fixed-latency
//!   publisher pipelines, never observed partially updated
//! - **Streaming loader**: masked-window payload capture with settle-delay
//!   pacing toward the downstream memory consumer
//! - **Command processing**: JSON-based host protocol with ACK/NACK semantics
//! - **Embedded-friendly**: bounded queues and histories, no heap growth in
//!   the tick path
//!
//! ## Quick Start
//!
//! ```rust
//! use corebridge::{BridgeController, BusTransaction};
//!
//! let mut controller = BridgeController::new();
//!
//! // Host domain: set the blanking alpha, then read it back.
//! controller.host_tick(Some(&BusTransaction::write(0x214, 0x80)));
//! let read = controller.host_tick(Some(&BusTransaction::read(0x214)));
//! assert_eq!(read, Some(0x80));
//!
//! // Core domain: outputs settle after the publisher latency.
//! for _ in 0..4 {
//!     let _ = controller.core_tick();
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`controller`] - Orchestrator and public API
//! - [`registers`] - Register file and decode table
//! - [`reset`] - Reset hold sequencer
//! - [`sync`] - Cross-domain publisher primitive
//! - [`loader`] - Streaming data-load pipeline
//! - [`bridge`] - Command-bridge collaborator stub
//! - [`protocol`] - Host command/response protocol handling
//! - [`telemetry`] - Periodic status packet generation

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

extern crate alloc;

pub mod bridge;
pub mod bus;
pub mod controller;
pub mod loader;
pub mod protocol;
pub mod registers;
pub mod reset;
pub mod sync;
pub mod telemetry;

// Re-export main public types for convenience
pub use bridge::{BridgeStatus, CommandBridge, RtcTime, SlotRequest};
pub use bus::{BusAccess, BusRegion, BusTransaction};
pub use controller::{BridgeController, CoreOutputs};
pub use loader::{LoadStreamEvent, LoaderConfig, StreamingLoader};
pub use protocol::{CommandResponse, HostCommand, HostCommandType};
pub use registers::RegisterFile;
pub use reset::ResetSequencer;
pub use sync::DomainPublisher;
pub use telemetry::BridgeTelemetry;
