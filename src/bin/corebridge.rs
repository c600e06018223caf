use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use corebridge::bus::{REG_ACCURATE_TIMING, REG_BLANKING_ALPHA, REG_BLANKING_FADE, REG_RESET_ARM};
use corebridge::protocol::{HostCommand, HostCommandType};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("corebridge")
        .version("0.1.0")
        .author("Platform Bring-up Team")
        .about("🔧 Host-Bridge Simulator Client - drive the bridge register interface over TCP")
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Simulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Simulator port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table"])
                .default_value("table")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("ping").about("🏓 Test connection to the bridge simulator"),
        )
        .subcommand(
            SubCommand::with_name("status").about("📊 Get bridge telemetry snapshot"),
        )
        .subcommand(
            SubCommand::with_name("read")
                .about("Read a bridge register")
                .arg(
                    Arg::with_name("address")
                        .help("Register address (decimal or 0x-prefixed hex)")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("write")
                .about("Write a bridge register")
                .arg(
                    Arg::with_name("address")
                        .help("Register address (decimal or 0x-prefixed hex)")
                        .required(true),
                )
                .arg(
                    Arg::with_name("data")
                        .help("32-bit write data (decimal or 0x-prefixed hex)")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("reset").about("Arm the reset hold countdown"),
        )
        .subcommand(
            SubCommand::with_name("external-reset")
                .about("Drive the host external-reset line")
                .arg(
                    Arg::with_name("state")
                        .help("Line state")
                        .required(true)
                        .possible_values(&["on", "off"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("timing")
                .about("Set the accurate-timing enable")
                .arg(
                    Arg::with_name("state")
                        .help("Enable state")
                        .required(true)
                        .possible_values(&["on", "off"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("fade")
                .about("Set the show-blanking-fade enable")
                .arg(
                    Arg::with_name("state")
                        .help("Enable state")
                        .required(true)
                        .possible_values(&["on", "off"]),
                ),
        )
        .subcommand(
            SubCommand::with_name("alpha")
                .about("Set the blanking alpha")
                .arg(
                    Arg::with_name("value")
                        .help("Alpha value 0-255")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("load")
                .about("Stream a payload block through the load window")
                .arg(
                    Arg::with_name("base")
                        .help("Base byte address inside the 0x1xxxxxxx window")
                        .required(true),
                )
                .arg(
                    Arg::with_name("bytes")
                        .long("bytes")
                        .value_name("N")
                        .help("Payload length in bytes (even, max 1024)")
                        .takes_value(true)
                        .default_value("256"),
                )
                .arg(
                    Arg::with_name("pattern")
                        .long("pattern")
                        .value_name("BYTE")
                        .help("Fill byte for the generated payload")
                        .takes_value(true)
                        .default_value("0xA5"),
                ),
        )
        .subcommand(
            SubCommand::with_name("session")
                .about("Download-session control")
                .subcommand(
                    SubCommand::with_name("begin")
                        .about("Open a transfer session for a data slot")
                        .arg(Arg::with_name("slot").help("16-bit slot id").required(true))
                        .arg(
                            Arg::with_name("length")
                                .long("length")
                                .value_name("BYTES")
                                .help("Transfer length in bytes")
                                .takes_value(true)
                                .default_value("4096"),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("ack")
                        .about("Acknowledge a pending slot request")
                        .arg(Arg::with_name("slot").help("16-bit slot id").required(true)),
                )
                .subcommand(
                    SubCommand::with_name("complete")
                        .about("Signal that all transfers are complete"),
                ),
        )
        .subcommand(
            SubCommand::with_name("monitor").about("📡 Stream live telemetry packets"),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST).to_string();
    let port: u16 = matches
        .value_of("port")
        .unwrap_or(DEFAULT_PORT)
        .parse()
        .unwrap_or(8080);
    let format = matches.value_of("format").unwrap_or("table").to_string();

    match matches.subcommand() {
        ("ping", _) => {
            let response = send_command(&host, port, command_of(HostCommandType::Ping)).await?;
            match format.as_str() {
                "json" => println!("{}", response),
                _ => {
                    if response_succeeded(&response) {
                        println!("{} {}", "✅".green(), "Bridge simulator is responsive".bright_green());
                    } else {
                        println!("{} {}", "❌".red(), "Ping failed".bright_red());
                    }
                }
            }
        }
        ("status", _) => {
            let response =
                send_command(&host, port, command_of(HostCommandType::SystemStatus)).await?;
            print_status(&response, &format);
        }
        ("read", Some(sub)) => {
            let address = parse_number(sub.value_of("address").unwrap())?;
            let response = send_command(
                &host,
                port,
                command_of(HostCommandType::BusRead { address }),
            )
            .await?;
            match format.as_str() {
                "json" => println!("{}", response),
                _ => {
                    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&response) {
                        let data = parsed["read_data"].as_u64().unwrap_or(0);
                        println!(
                            "{} [{}] = {}",
                            "📖".bright_blue(),
                            format!("0x{address:08X}").bright_white(),
                            format!("0x{data:08X}").bright_cyan()
                        );
                    }
                }
            }
        }
        ("write", Some(sub)) => {
            let address = parse_number(sub.value_of("address").unwrap())?;
            let data = parse_number(sub.value_of("data").unwrap())?;
            let response = send_command(
                &host,
                port,
                command_of(HostCommandType::BusWrite { address, data }),
            )
            .await?;
            print_command_result(
                "Bus Write",
                &format!("0x{address:08X} <= 0x{data:08X}"),
                &response,
                &format,
            );
        }
        ("reset", _) => {
            let response = send_command(
                &host,
                port,
                command_of(HostCommandType::BusWrite {
                    address: REG_RESET_ARM,
                    data: 0,
                }),
            )
            .await?;
            print_command_result("Reset Hold", "ARMED", &response, &format);
        }
        ("external-reset", Some(sub)) => {
            let asserted = normalize_state(sub.value_of("state").unwrap());
            let response = send_command(
                &host,
                port,
                command_of(HostCommandType::SetExternalReset { asserted }),
            )
            .await?;
            print_command_result(
                "External Reset",
                if asserted { "ASSERTED" } else { "RELEASED" },
                &response,
                &format,
            );
        }
        ("timing", Some(sub)) => {
            let enabled = normalize_state(sub.value_of("state").unwrap());
            let response = send_command(
                &host,
                port,
                command_of(HostCommandType::BusWrite {
                    address: REG_ACCURATE_TIMING,
                    data: u32::from(enabled),
                }),
            )
            .await?;
            print_command_result(
                "Accurate Timing",
                if enabled { "ON" } else { "OFF" },
                &response,
                &format,
            );
        }
        ("fade", Some(sub)) => {
            let enabled = normalize_state(sub.value_of("state").unwrap());
            let response = send_command(
                &host,
                port,
                command_of(HostCommandType::BusWrite {
                    address: REG_BLANKING_FADE,
                    data: u32::from(enabled),
                }),
            )
            .await?;
            print_command_result(
                "Blanking Fade",
                if enabled { "ON" } else { "OFF" },
                &response,
                &format,
            );
        }
        ("alpha", Some(sub)) => {
            let value = parse_number(sub.value_of("value").unwrap())? & 0xFF;
            let response = send_command(
                &host,
                port,
                command_of(HostCommandType::BusWrite {
                    address: REG_BLANKING_ALPHA,
                    data: value,
                }),
            )
            .await?;
            print_command_result("Blanking Alpha", &format!("{value}"), &response, &format);
        }
        ("load", Some(sub)) => {
            let base_address = parse_number(sub.value_of("base").unwrap())?;
            let bytes: usize = sub.value_of("bytes").unwrap().parse()?;
            let pattern = parse_number(sub.value_of("pattern").unwrap())? as u8;
            let response = send_command(
                &host,
                port,
                command_of(HostCommandType::LoadBlock {
                    base_address,
                    data: vec![pattern; bytes],
                }),
            )
            .await?;
            print_command_result(
                "Block Load",
                &format!("{bytes} bytes @ 0x{base_address:08X}"),
                &response,
                &format,
            );
        }
        ("session", Some(sub)) => handle_session_command(sub, &host, port, &format).await?,
        ("monitor", _) => monitor_telemetry(&host, port, &format).await?,
        _ => {
            println!("{}", "Quick start:".bright_green());
            println!(
                "  {} Start the simulator server",
                "cargo run --bin corebridge-simulator".bright_cyan()
            );
            println!("  {} Test connection", "corebridge ping".bright_cyan());
            println!("  {} Monitor telemetry", "corebridge monitor".bright_cyan());
        }
    }

    Ok(())
}

async fn handle_session_command(
    matches: &ArgMatches<'_>,
    host: &str,
    port: u16,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match matches.subcommand() {
        ("begin", Some(sub)) => {
            let slot_id: u16 = sub.value_of("slot").unwrap().parse()?;
            let length = parse_number(sub.value_of("length").unwrap())?;
            let response = send_command(
                host,
                port,
                command_of(HostCommandType::BeginTransfer {
                    slot_id,
                    offset: 0,
                    length,
                }),
            )
            .await?;
            print_command_result("Session", &format!("OPEN slot {slot_id}"), &response, format);
        }
        ("ack", Some(sub)) => {
            let slot_id: u16 = sub.value_of("slot").unwrap().parse()?;
            let response = send_command(
                host,
                port,
                command_of(HostCommandType::AcknowledgeSlot { slot_id }),
            )
            .await?;
            print_command_result("Slot Ack", &format!("slot {slot_id}"), &response, format);
        }
        ("complete", _) => {
            let response =
                send_command(host, port, command_of(HostCommandType::CompleteTransfers)).await?;
            print_command_result("Session", "COMPLETE", &response, format);
        }
        _ => {
            println!(
                "{}",
                "Session subcommand required. Use 'corebridge session --help' for options."
                    .yellow()
            );
        }
    }
    Ok(())
}

fn command_of(command_type: HostCommandType) -> String {
    let id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| (d.as_millis() as u32) | 1)
        .unwrap_or(1);
    let command = HostCommand {
        id,
        timestamp: u64::from(id),
        command_type,
    };
    serde_json::to_string(&command).unwrap_or_default()
}

fn parse_number(text: &str) -> Result<u32, std::num::ParseIntError> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse()
    }
}

fn normalize_state(state: &str) -> bool {
    matches!(state, "on" | "enable")
}

fn response_succeeded(response: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(response)
        .map(|parsed| parsed["status"] == "Success" || parsed["status"] == "Acknowledged")
        .unwrap_or(false)
}

fn print_command_result(action: &str, value: &str, response: &str, format: &str) {
    match format {
        "json" => println!("{}", response),
        _ => {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(response) {
                let status = parsed["status"].as_str().unwrap_or("Unknown");
                match status {
                    "Success" | "Acknowledged" => {
                        println!(
                            "{} {} {}",
                            "✅".green(),
                            action.bright_white(),
                            value.bright_cyan()
                        );
                    }
                    "NegativeAck" => {
                        let message = parsed["message"].as_str().unwrap_or("Command rejected");
                        println!(
                            "{} {} failed: {}",
                            "❌".red(),
                            action.bright_white(),
                            message.bright_red()
                        );
                    }
                    _ => {
                        let message = parsed["message"].as_str().unwrap_or("Unknown error");
                        println!(
                            "{} {} status {}: {}",
                            "❓".blue(),
                            action.bright_white(),
                            status.bright_blue(),
                            message
                        );
                    }
                }
            } else {
                println!("{} {}", "✅".green(), "Command completed".bright_green());
            }
        }
    }
}

fn print_status(response: &str, format: &str) {
    match format {
        "json" => println!("{}", response),
        _ => {
            let Ok(parsed) = serde_json::from_str::<serde_json::Value>(response) else {
                println!("{} Failed to parse status response", "❌".red());
                return;
            };
            let Some(message) = parsed.get("message").and_then(|m| m.as_str()) else {
                println!("{} Status response carried no telemetry", "❌".red());
                return;
            };
            let Ok(telemetry) = serde_json::from_str::<serde_json::Value>(message) else {
                println!("{} Failed to parse telemetry payload", "❌".red());
                return;
            };

            println!("\n{}", "🔧 Bridge Status".bright_blue().bold());
            println!("{}", "═══════════════".bright_blue());
            let registers = &telemetry["registers"];
            println!(
                "Accurate timing: {}",
                bool_label(registers["accurate_timing"].as_bool().unwrap_or(false))
            );
            println!(
                "Blanking fade:   {}",
                bool_label(registers["show_blanking_fade"].as_bool().unwrap_or(false))
            );
            println!(
                "Blanking alpha:  {} (effective {})",
                registers["blanking_alpha"].as_u64().unwrap_or(0),
                registers["effective_alpha"].as_u64().unwrap_or(0)
            );
            println!(
                "Reset asserted:  {}",
                bool_label(telemetry["reset_asserted"].as_bool().unwrap_or(false))
            );
            println!(
                "Downloading:     {}",
                bool_label(telemetry["bridge"]["downloading"].as_bool().unwrap_or(false))
            );

            let loader = &telemetry["loader"];
            println!("\n{}", "📦 Loader".bright_white().bold());
            println!(
                "Words accepted: {}  Events emitted: {}  Dropped: {}",
                loader["words_accepted"].as_u64().unwrap_or(0),
                loader["events_emitted"].as_u64().unwrap_or(0),
                loader["overflow_drops"].as_u64().unwrap_or(0)
            );

            let ticks = &telemetry["ticks"];
            println!(
                "Host ticks: {}  Core ticks: {}",
                ticks["host_ticks"].as_u64().unwrap_or(0),
                ticks["core_ticks"].as_u64().unwrap_or(0)
            );
        }
    }
}

fn bool_label(value: bool) -> colored::ColoredString {
    if value {
        "ON".bright_green()
    } else {
        "OFF".bright_red()
    }
}

async fn monitor_telemetry(
    host: &str,
    port: u16,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let stream = TcpStream::connect((host, port)).await?;
    let mut reader = BufReader::new(stream);

    println!(
        "{}",
        "📡 Bridge telemetry monitor (Ctrl+C to stop)".bright_blue().bold()
    );

    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if format == "json" {
            println!("{trimmed}");
            continue;
        }

        let Ok(telemetry) = serde_json::from_str::<serde_json::Value>(trimmed) else {
            continue;
        };
        // Responses to other clients share the stream; skip non-telemetry.
        if telemetry.get("sequence_number").is_none() {
            continue;
        }

        println!(
            "#{:<6} host {:>12}  core {:>12}  alpha {:>3}  reset {}  dl {}  loader {}/{}",
            telemetry["sequence_number"].as_u64().unwrap_or(0),
            telemetry["ticks"]["host_ticks"].as_u64().unwrap_or(0),
            telemetry["ticks"]["core_ticks"].as_u64().unwrap_or(0),
            telemetry["registers"]["effective_alpha"].as_u64().unwrap_or(0),
            bool_label(telemetry["reset_asserted"].as_bool().unwrap_or(false)),
            bool_label(telemetry["bridge"]["downloading"].as_bool().unwrap_or(false)),
            telemetry["loader"]["events_emitted"].as_u64().unwrap_or(0),
            telemetry["loader"]["words_accepted"].as_u64().unwrap_or(0),
        );
    }

    Ok(())
}

async fn send_command(
    host: &str,
    port: u16,
    command: String,
) -> Result<String, Box<dyn std::error::Error>> {
    let addr = format!("{host}:{port}");
    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!(
                "{} Failed to connect to bridge simulator at {}",
                "❌".red(),
                addr.bright_white()
            );
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!("{} Server is not running. Start it with:", "💡".yellow());
                eprintln!("   {}", "cargo run --bin corebridge-simulator".bright_cyan());
            }
            return Err(e.into());
        }
    };

    match tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(command.as_bytes()).await?;
        write_half.write_all(b"\n").await?;

        // Telemetry broadcasts share the connection; skip anything that is
        // not a command response.
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Server closed connection",
                ));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(trimmed) {
                if parsed.get("status").is_some() {
                    return Ok(trimmed.to_string());
                }
            }
        }
    })
    .await
    {
        Ok(result) => Ok(result?),
        Err(_) => {
            eprintln!("{} Command timed out after 5 seconds", "⏰".yellow());
            Err("Command timeout".into())
        }
    }
}
