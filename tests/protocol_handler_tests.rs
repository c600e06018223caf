use corebridge::protocol::{
    HostCommand, HostCommandType, ProtocolError, ProtocolHandler, ResponseStatus, MAX_BLOCK_BYTES,
};

fn make_command(id: u32, command_type: HostCommandType) -> HostCommand {
    HostCommand {
        id,
        timestamp: 1000,
        command_type,
    }
}

#[test]
fn test_command_json_roundtrip() {
    let mut handler = ProtocolHandler::new();

    let command = make_command(
        42,
        HostCommandType::BusWrite {
            address: 0x0000_0214,
            data: 0x80,
        },
    );
    let json = serde_json::to_string(&command).unwrap();
    let parsed = handler.parse_command(&json).unwrap();

    assert_eq!(parsed.id, 42);
    match parsed.command_type {
        HostCommandType::BusWrite { address, data } => {
            assert_eq!(address, 0x214);
            assert_eq!(data, 0x80);
        }
        _ => panic!("unexpected command type"),
    }
}

#[test]
fn test_load_block_payload_roundtrip() {
    let mut handler = ProtocolHandler::new();

    let payload: Vec<u8> = (0..64).collect();
    let command = make_command(
        7,
        HostCommandType::LoadBlock {
            base_address: 0x1000_0100,
            data: payload.clone(),
        },
    );
    let json = serde_json::to_string(&command).unwrap();
    let parsed = handler.parse_command(&json).unwrap();

    match parsed.command_type {
        HostCommandType::LoadBlock { base_address, data } => {
            assert_eq!(base_address, 0x1000_0100);
            assert_eq!(data, payload);
        }
        _ => panic!("unexpected command type"),
    }
}

#[test]
fn test_validation_rejects_bad_block_loads() {
    let handler = ProtocolHandler::new();

    let too_large = make_command(
        1,
        HostCommandType::LoadBlock {
            base_address: 0x1000_0000,
            data: vec![0; MAX_BLOCK_BYTES + 2],
        },
    );
    assert_eq!(
        handler.validate_command(&too_large),
        Err(ProtocolError::InvalidParameter)
    );

    let odd_base = make_command(
        2,
        HostCommandType::LoadBlock {
            base_address: 0x1000_0001,
            data: vec![0; 16],
        },
    );
    assert_eq!(
        handler.validate_command(&odd_base),
        Err(ProtocolError::InvalidParameter)
    );
}

#[test]
fn test_validation_rejects_bad_rtc_fields() {
    let handler = ProtocolHandler::new();

    let valid = make_command(
        1,
        HostCommandType::SetRtc {
            year: 2026,
            month: 8,
            day: 7,
            hour: 12,
            minute: 30,
            second: 0,
        },
    );
    assert!(handler.validate_command(&valid).is_ok());

    let invalid = make_command(
        2,
        HostCommandType::SetRtc {
            year: 2026,
            month: 13,
            day: 7,
            hour: 12,
            minute: 30,
            second: 0,
        },
    );
    assert_eq!(
        handler.validate_command(&invalid),
        Err(ProtocolError::InvalidParameter)
    );
}

#[test]
fn test_zero_length_transfer_rejected() {
    let handler = ProtocolHandler::new();

    let command = make_command(
        1,
        HostCommandType::BeginTransfer {
            slot_id: 0,
            offset: 0,
            length: 0,
        },
    );
    assert_eq!(
        handler.validate_command(&command),
        Err(ProtocolError::InvalidParameter)
    );
}

#[test]
fn test_response_serialization_fits_buffer() {
    let mut handler = ProtocolHandler::new();

    let response = handler.create_read_response(9, 0xDEAD_BEEF);
    let json = handler.serialize_response(&response).unwrap().to_string();

    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["id"], 9);
    assert_eq!(parsed["read_data"], 0xDEAD_BEEF_u32);
    assert_eq!(parsed["status"], "Success");
}

#[test]
fn test_ack_then_failure_tracking() {
    let mut handler = ProtocolHandler::new();

    handler.track_command(5, 1000, 30_000).unwrap();
    assert_eq!(
        handler.get_command_status(5).unwrap().status,
        ResponseStatus::Acknowledged
    );

    handler
        .update_command_status(5, ResponseStatus::ExecutionFailed, 2000)
        .unwrap();
    let tracker = handler.get_command_status(5).unwrap();
    assert_eq!(tracker.status, ResponseStatus::ExecutionFailed);
    assert_eq!(tracker.last_update, 2000);
}

#[test]
fn test_tracker_eviction_keeps_newest() {
    let mut handler = ProtocolHandler::new();

    for id in 1..=20_u32 {
        handler.track_command(id, 1000, 600_000).unwrap();
    }

    // The buffer holds 16 trackers; the earliest ones were evicted.
    assert!(handler.get_command_status(1).is_none());
    assert!(handler.get_command_status(20).is_some());
    assert_eq!(handler.get_tracked_commands().len(), 16);
}

#[test]
fn test_command_ids_increment() {
    let mut handler = ProtocolHandler::new();
    let first = handler.next_command_id();
    let second = handler.next_command_id();
    assert_eq!(first + 1, second);
}
