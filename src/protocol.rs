use crate::bus::LOADER_WINDOW_PREFIX;
use crate::telemetry::BridgeTelemetry;
use arrayvec::ArrayString;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_COMMAND_SIZE: usize = 4096;
pub const MAX_RESPONSE_SIZE: usize = 2048;
pub const MAX_TELEMETRY_SIZE: usize = 2048;

/// Largest payload accepted in one `LoadBlock` command. Larger images are
/// split by the host into multiple commands, matching the loader's pacing
/// contract.
pub const MAX_BLOCK_BYTES: usize = 1024;

pub type CommandBuffer = ArrayString<MAX_COMMAND_SIZE>;
pub type ResponseBuffer = ArrayString<MAX_RESPONSE_SIZE>;
pub type TelemetryBuffer = ArrayString<MAX_TELEMETRY_SIZE>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCommand {
    pub id: u32,
    pub timestamp: u64,
    pub command_type: HostCommandType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostCommandType {
    Ping,
    SystemStatus,
    BusWrite {
        address: u32,
        data: u32,
    },
    BusRead {
        address: u32,
    },
    LoadBlock {
        base_address: u32,
        #[serde(with = "serde_bytes")]
        data: alloc::vec::Vec<u8>,
    },
    SetExternalReset {
        asserted: bool,
    },
    SetStatusLines {
        boot_done: bool,
        setup_done: bool,
        running: bool,
    },
    SetInMenu {
        in_menu: bool,
    },
    BeginTransfer {
        slot_id: u16,
        offset: u32,
        length: u32,
    },
    AcknowledgeSlot {
        slot_id: u16,
    },
    CompleteTransfers,
    SetRtc {
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub id: u32,
    pub timestamp: u64,
    pub status: ResponseStatus,
    pub message: Option<alloc::string::String>,
    /// Combinational read result for `BusRead` commands.
    pub read_data: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    Error,
    InvalidCommand,

    // ACK/NACK semantics
    Acknowledged,
    NegativeAck,
    ExecutionFailed,
    Timeout,
    InProgress,
}

const MAX_TRACKED_COMMANDS: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandTracker {
    pub command_id: u32,
    pub timestamp: u64,
    pub status: ResponseStatus,
    pub timeout_ms: u64,
    pub last_update: u64,
}

impl CommandTracker {
    pub fn new(command_id: u32, timestamp: u64, timeout_ms: u64) -> Self {
        Self {
            command_id,
            timestamp,
            status: ResponseStatus::Acknowledged,
            timeout_ms,
            last_update: timestamp,
        }
    }

    pub fn is_expired(&self, current_time: u64) -> bool {
        current_time > self.timestamp + self.timeout_ms
    }

    pub fn update_status(&mut self, status: ResponseStatus, current_time: u64) {
        self.status = status;
        self.last_update = current_time;
    }
}

#[derive(Debug)]
pub struct ProtocolHandler {
    sequence_counter: u32,
    command_counter: u32,

    // Preallocated buffers
    command_buffer: CommandBuffer,
    response_buffer: ResponseBuffer,
    telemetry_buffer: TelemetryBuffer,

    // Command tracking for ACK/NACK semantics
    tracked_commands: Vec<CommandTracker, MAX_TRACKED_COMMANDS>,
}

impl ProtocolHandler {
    pub fn new() -> Self {
        Self {
            sequence_counter: 0,
            command_counter: 0,
            command_buffer: ArrayString::new(),
            response_buffer: ArrayString::new(),
            telemetry_buffer: ArrayString::new(),
            tracked_commands: Vec::new(),
        }
    }

    pub fn parse_command(&mut self, json_str: &str) -> Result<HostCommand, ProtocolError> {
        self.command_buffer.clear();
        if json_str.len() > MAX_COMMAND_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.command_buffer.push_str(json_str);

        serde_json::from_str::<HostCommand>(json_str).map_err(|_| ProtocolError::InvalidJson)
    }

    pub fn serialize_response(&mut self, response: &CommandResponse) -> Result<&str, ProtocolError> {
        self.response_buffer.clear();

        let json_str =
            serde_json::to_string(response).map_err(|_| ProtocolError::SerializationError)?;

        if json_str.len() > MAX_RESPONSE_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.response_buffer.push_str(&json_str);

        Ok(&self.response_buffer)
    }

    pub fn serialize_telemetry(&mut self, packet: &BridgeTelemetry) -> Result<&str, ProtocolError> {
        self.telemetry_buffer.clear();

        let json_str =
            serde_json::to_string(packet).map_err(|_| ProtocolError::SerializationError)?;

        if json_str.len() > MAX_TELEMETRY_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.telemetry_buffer.push_str(&json_str);

        Ok(&self.telemetry_buffer)
    }

    pub fn validate_command(&self, command: &HostCommand) -> Result<(), ProtocolError> {
        if command.id == 0 {
            return Err(ProtocolError::InvalidCommand);
        }

        match &command.command_type {
            HostCommandType::LoadBlock { base_address, data } => {
                if data.is_empty() || data.len() > MAX_BLOCK_BYTES {
                    return Err(ProtocolError::InvalidParameter);
                }
                // Payload words are 16 bits wide at even byte addresses.
                if data.len() % 2 != 0 || base_address % 2 != 0 {
                    return Err(ProtocolError::InvalidParameter);
                }
                if base_address >> 28 != LOADER_WINDOW_PREFIX {
                    return Err(ProtocolError::InvalidParameter);
                }
            }
            HostCommandType::BeginTransfer { length, .. } => {
                if *length == 0 {
                    return Err(ProtocolError::InvalidParameter);
                }
            }
            HostCommandType::SetRtc {
                month,
                day,
                hour,
                minute,
                second,
                ..
            } => {
                let valid = (1..=12).contains(month)
                    && (1..=31).contains(day)
                    && *hour < 24
                    && *minute < 60
                    && *second < 60;
                if !valid {
                    return Err(ProtocolError::InvalidParameter);
                }
            }
            _ => {}
        }

        Ok(())
    }

    pub fn create_response(
        &mut self,
        command_id: u32,
        status: ResponseStatus,
        message: Option<&str>,
    ) -> CommandResponse {
        let message_string = message.map(|msg| alloc::string::ToString::to_string(msg));

        CommandResponse {
            id: command_id,
            timestamp: self.next_timestamp(),
            status,
            message: message_string,
            read_data: None,
        }
    }

    pub fn create_read_response(&mut self, command_id: u32, read_data: u32) -> CommandResponse {
        let mut response = self.create_response(command_id, ResponseStatus::Success, None);
        response.read_data = Some(read_data);
        response
    }

    pub fn create_ack_response(
        &mut self,
        command_id: u32,
        message: Option<&str>,
    ) -> CommandResponse {
        self.create_response(command_id, ResponseStatus::Acknowledged, message)
    }

    pub fn create_nack_response(&mut self, command_id: u32, reason: &str) -> CommandResponse {
        self.create_response(command_id, ResponseStatus::NegativeAck, Some(reason))
    }

    pub fn next_command_id(&mut self) -> u32 {
        self.command_counter = self.command_counter.wrapping_add(1);
        self.command_counter
    }

    fn next_timestamp(&mut self) -> u64 {
        // Deterministic simulation timestamp derived from the response
        // sequence; the transport layer may substitute wall-clock time.
        self.sequence_counter = self.sequence_counter.wrapping_add(1);
        u64::from(self.sequence_counter) * 1000
    }

    // ACK/NACK command tracking

    pub fn track_command(
        &mut self,
        command_id: u32,
        current_time: u64,
        timeout_ms: u64,
    ) -> Result<(), ProtocolError> {
        self.cleanup_expired_commands(current_time);

        if self.tracked_commands.iter().any(|t| t.command_id == command_id) {
            return Err(ProtocolError::InvalidCommand);
        }

        let tracker = CommandTracker::new(command_id, current_time, timeout_ms);
        if self.tracked_commands.push(tracker).is_err() {
            // Evict the oldest tracker when the buffer is full.
            self.tracked_commands.remove(0);
            let _ = self
                .tracked_commands
                .push(CommandTracker::new(command_id, current_time, timeout_ms));
        }

        Ok(())
    }

    pub fn update_command_status(
        &mut self,
        command_id: u32,
        status: ResponseStatus,
        current_time: u64,
    ) -> Result<(), ProtocolError> {
        if let Some(tracker) = self
            .tracked_commands
            .iter_mut()
            .find(|t| t.command_id == command_id)
        {
            tracker.update_status(status, current_time);
            Ok(())
        } else {
            Err(ProtocolError::InvalidCommand)
        }
    }

    pub fn get_command_status(&self, command_id: u32) -> Option<&CommandTracker> {
        self.tracked_commands.iter().find(|t| t.command_id == command_id)
    }

    pub fn cleanup_expired_commands(&mut self, current_time: u64) {
        self.tracked_commands
            .retain(|tracker| !tracker.is_expired(current_time));
    }

    pub fn get_tracked_commands(&self) -> &[CommandTracker] {
        &self.tracked_commands
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON format")]
    InvalidJson,
    #[error("Message exceeds buffer size")]
    MessageTooLarge,
    #[error("Serialization failed")]
    SerializationError,
    #[error("Invalid command")]
    InvalidCommand,
    #[error("Invalid parameter")]
    InvalidParameter,
}
