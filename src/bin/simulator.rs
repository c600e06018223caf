use corebridge::bridge::BridgeStatus;
use corebridge::bus::BusTransaction;
use corebridge::controller::BridgeController;
use corebridge::protocol::{
    CommandResponse, HostCommand, HostCommandType, ProtocolHandler, ResponseStatus,
};
use corebridge::telemetry::TelemetryCollector;
use corebridge::{RtcTime, SlotRequest};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio::time;
use tracing::{error, info, warn};

const TCP_PORT: u16 = 8080;
const TELEMETRY_BROADCAST_BUFFER_SIZE: usize = 256;

// Tick budget per 10 ms simulation slice. The two domains deliberately run
// at different rates; there is no phase relationship between them.
const SIM_SLICE_MS: u64 = 10;
const HOST_TICKS_PER_SLICE: u32 = 10_000;
const CORE_TICKS_PER_SLICE: u32 = 8_192;

// Core ticks run inline to drain the loader queue when a block load backs up.
const LOAD_DRAIN_TICKS: u32 = 64;

struct SimState {
    controller: BridgeController,
    protocol: ProtocolHandler,
    telemetry: TelemetryCollector,
}

impl SimState {
    fn new() -> Self {
        Self {
            controller: BridgeController::new(),
            protocol: ProtocolHandler::new(),
            telemetry: TelemetryCollector::new(),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("🔧 Host-Bridge Control-Plane Simulator");
    println!("======================================");

    let state = Arc::new(Mutex::new(SimState::new()));

    // Create broadcast channel for telemetry
    let (telemetry_tx, _) = broadcast::channel(TELEMETRY_BROADCAST_BUFFER_SIZE);

    // Start TCP server
    let tcp_state = Arc::clone(&state);
    let tcp_telemetry_tx = telemetry_tx.clone();
    let _tcp_server = tokio::spawn(async move {
        if let Err(e) = start_tcp_server(tcp_state, tcp_telemetry_tx).await {
            error!("TCP server error: {}", e);
        }
    });

    println!("   Register File: ✓");
    println!("   Reset Sequencer: ✓");
    println!("   Streaming Loader: ✓");
    println!("   Command Bridge: ✓");
    println!("📡 Ready for host commands on TCP port {TCP_PORT}");

    // Free-running domain loop
    let mut interval = time::interval(Duration::from_millis(SIM_SLICE_MS));

    loop {
        interval.tick().await;

        let packet = {
            let mut guard = state.lock().await;
            let sim = &mut *guard;

            for _ in 0..HOST_TICKS_PER_SLICE {
                sim.controller.host_tick(None);
            }
            for _ in 0..CORE_TICKS_PER_SLICE {
                let _ = sim.controller.core_tick();
            }

            let current_time = now_ms();
            if sim.telemetry.should_collect(current_time) {
                let packet = sim.telemetry.collect(current_time, &sim.controller);
                match sim.protocol.serialize_telemetry(&packet) {
                    Ok(json) => Some(json.to_string()),
                    Err(e) => {
                        warn!("Failed to serialize telemetry: {}", e);
                        None
                    }
                }
            } else {
                None
            }
        };

        if let Some(json) = packet {
            // A send error just means no clients are connected right now.
            let _ = telemetry_tx.send(json);
        }
    }
}

async fn start_tcp_server(
    state: Arc<Mutex<SimState>>,
    telemetry_tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{TCP_PORT}")).await?;
    info!("🌐 TCP server listening on port {}", TCP_PORT);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("🔗 New host connection: {}", addr);
                let client_state = Arc::clone(&state);
                let client_telemetry_rx = telemetry_tx.subscribe();

                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, client_state, client_telemetry_rx).await {
                        warn!("Client {} error: {}", addr, e);
                    }
                    info!("🔌 Client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    state: Arc<Mutex<SimState>>,
    mut telemetry_rx: broadcast::Receiver<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);

    let writer = Arc::new(Mutex::new(writer));

    // Spawn telemetry streaming task
    let telemetry_writer = Arc::clone(&writer);
    let telemetry_task = tokio::spawn(async move {
        while let Ok(telemetry) = telemetry_rx.recv().await {
            let mut writer_guard = telemetry_writer.lock().await;
            if writer_guard.write_all(telemetry.as_bytes()).await.is_err() {
                break;
            }
            if writer_guard.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    // Process commands from the host
    let mut line = String::new();
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => break, // Client disconnected
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let response_json = {
                    let mut guard = state.lock().await;
                    let response = match guard.protocol.parse_command(trimmed) {
                        Ok(command) => {
                            info!("📨 Received command: {:?}", command.command_type);
                            execute_command(&mut guard, &command)
                        }
                        Err(e) => {
                            error!("Failed to parse command: {}", e);
                            guard.protocol.create_nack_response(0, &format!("{e}"))
                        }
                    };
                    match guard.protocol.serialize_response(&response) {
                        Ok(json) => json.to_string(),
                        Err(e) => {
                            error!("Failed to serialize response: {}", e);
                            continue;
                        }
                    }
                };

                {
                    let mut writer_guard = writer.lock().await;
                    writer_guard.write_all(response_json.as_bytes()).await?;
                    writer_guard.write_all(b"\n").await?;
                }
                info!("📤 Sent response: {}", response_json);
            }
            Err(e) => {
                error!("Error reading from client: {}", e);
                break;
            }
        }
    }

    telemetry_task.abort();
    Ok(())
}

fn execute_command(state: &mut SimState, command: &HostCommand) -> CommandResponse {
    let current_time = now_ms();

    if let Err(e) = state.protocol.validate_command(command) {
        return state
            .protocol
            .create_nack_response(command.id, &format!("Command validation failed: {e}"));
    }

    let _ = state.protocol.track_command(command.id, current_time, 30_000);

    let response = match &command.command_type {
        HostCommandType::Ping => {
            state
                .protocol
                .create_response(command.id, ResponseStatus::Success, Some("pong"))
        }
        HostCommandType::SystemStatus => {
            let packet = state.telemetry.collect(current_time, &state.controller);
            match serde_json::to_string(&packet) {
                Ok(json) => {
                    state
                        .protocol
                        .create_response(command.id, ResponseStatus::Success, Some(&json))
                }
                Err(_) => state.protocol.create_response(
                    command.id,
                    ResponseStatus::ExecutionFailed,
                    Some("Status serialization failed"),
                ),
            }
        }
        HostCommandType::BusWrite { address, data } => {
            state
                .controller
                .host_tick(Some(&BusTransaction::write(*address, *data)));
            state
                .protocol
                .create_response(command.id, ResponseStatus::Success, None)
        }
        HostCommandType::BusRead { address } => {
            let read_data = state
                .controller
                .host_tick(Some(&BusTransaction::read(*address)))
                .unwrap_or(0);
            state.protocol.create_read_response(command.id, read_data)
        }
        HostCommandType::LoadBlock { base_address, data } => {
            let mut offset = 0_usize;
            while offset < data.len() {
                let consumed = state
                    .controller
                    .load_block(base_address + offset as u32, &data[offset..]);
                if consumed == 0 {
                    // Queue is full; drain the destination domain a little.
                    for _ in 0..LOAD_DRAIN_TICKS {
                        let _ = state.controller.core_tick();
                    }
                    continue;
                }
                offset += consumed;
            }
            state.protocol.create_response(
                command.id,
                ResponseStatus::Success,
                Some(&format!("Loaded {} bytes", data.len())),
            )
        }
        HostCommandType::SetExternalReset { asserted } => {
            state.controller.set_external_reset(*asserted);
            state
                .protocol
                .create_response(command.id, ResponseStatus::Success, None)
        }
        HostCommandType::SetStatusLines {
            boot_done,
            setup_done,
            running,
        } => {
            state.controller.set_status_lines(BridgeStatus {
                boot_done: *boot_done,
                setup_done: *setup_done,
                running: *running,
            });
            state
                .protocol
                .create_response(command.id, ResponseStatus::Success, None)
        }
        HostCommandType::SetInMenu { in_menu } => {
            state.controller.set_in_menu(*in_menu);
            state
                .protocol
                .create_response(command.id, ResponseStatus::Success, None)
        }
        HostCommandType::BeginTransfer {
            slot_id,
            offset,
            length,
        } => {
            state.controller.begin_transfer(SlotRequest {
                slot_id: *slot_id,
                offset: *offset,
                length: *length,
                bridge_address: 0xF800_0000,
            });
            state.protocol.create_ack_response(
                command.id,
                Some(&format!("Transfer session opened for slot {slot_id}")),
            )
        }
        HostCommandType::AcknowledgeSlot { slot_id } => {
            if state.controller.acknowledge_slot(*slot_id) {
                state
                    .protocol
                    .create_response(command.id, ResponseStatus::Success, None)
            } else {
                state
                    .protocol
                    .create_nack_response(command.id, "No pending request for slot")
            }
        }
        HostCommandType::CompleteTransfers => {
            state.controller.complete_transfers();
            state
                .protocol
                .create_response(command.id, ResponseStatus::Success, None)
        }
        HostCommandType::SetRtc {
            year,
            month,
            day,
            hour,
            minute,
            second,
        } => {
            state.controller.set_rtc(RtcTime {
                year: *year,
                month: *month,
                day: *day,
                hour: *hour,
                minute: *minute,
                second: *second,
            });
            state
                .protocol
                .create_response(command.id, ResponseStatus::Success, None)
        }
    };

    let _ = state
        .protocol
        .update_command_status(command.id, response.status, current_time);

    response
}
