use corebridge::bus::{
    BusTransaction, REG_ACCURATE_TIMING, REG_BLANKING_ALPHA, REG_BLANKING_FADE, REG_RESET_ARM,
};
use corebridge::controller::BridgeController;
use corebridge::loader::LoaderConfig;
use corebridge::reset::RESET_HOLD_TICKS;
use corebridge::sync::PUBLISH_STAGES;
use corebridge::SlotRequest;

fn settle_core(controller: &mut BridgeController) -> corebridge::CoreOutputs {
    for _ in 0..PUBLISH_STAGES {
        let _ = controller.core_tick();
    }
    controller.core_tick()
}

#[test]
fn test_alpha_write_then_read_roundtrip() {
    let mut controller = BridgeController::new();

    for alpha in [0x00_u32, 0x01, 0x7F, 0x80, 0xFF] {
        controller.host_tick(Some(&BusTransaction::write(REG_BLANKING_ALPHA, alpha)));
        let read = controller.host_tick(Some(&BusTransaction::read(REG_BLANKING_ALPHA)));
        assert_eq!(read, Some(alpha));
    }
}

#[test]
fn test_reset_hold_lasts_exactly_configured_duration() {
    let mut controller = BridgeController::new();

    controller.host_tick(Some(&BusTransaction::write(REG_RESET_ARM, 0)));
    assert_eq!(
        controller.register_snapshot().reset_remaining_ticks,
        RESET_HOLD_TICKS
    );

    // Count source ticks on which the reset condition is observed asserted,
    // starting with the arming tick itself.
    let mut asserted_ticks: u32 = 1;
    loop {
        controller.host_tick(None);
        if controller.register_snapshot().reset_remaining_ticks > 0 {
            asserted_ticks += 1;
        } else {
            break;
        }
    }

    assert_eq!(asserted_ticks, RESET_HOLD_TICKS);
}

#[test]
fn test_reset_hold_unaffected_by_unrelated_writes() {
    let mut controller = BridgeController::new();

    controller.host_tick(Some(&BusTransaction::write(REG_RESET_ARM, 0)));

    let mut asserted_ticks: u32 = 1;
    // Ten unrelated writes land while the hold is running.
    for i in 0..10_u32 {
        controller.host_tick(Some(&BusTransaction::write(REG_BLANKING_ALPHA, i)));
        asserted_ticks += 1;
    }
    loop {
        controller.host_tick(None);
        if controller.register_snapshot().reset_remaining_ticks > 0 {
            asserted_ticks += 1;
        } else {
            break;
        }
    }

    assert_eq!(asserted_ticks, RESET_HOLD_TICKS);
    assert_eq!(controller.register_snapshot().blanking_alpha, 9);
}

#[test]
fn test_rearm_restarts_the_countdown() {
    let mut controller = BridgeController::new();

    controller.host_tick(Some(&BusTransaction::write(REG_RESET_ARM, 0)));
    for _ in 0..1000 {
        controller.host_tick(None);
    }
    assert_eq!(
        controller.register_snapshot().reset_remaining_ticks,
        RESET_HOLD_TICKS - 1000
    );

    controller.host_tick(Some(&BusTransaction::write(REG_RESET_ARM, 0)));
    assert_eq!(
        controller.register_snapshot().reset_remaining_ticks,
        RESET_HOLD_TICKS
    );
}

#[test]
fn test_end_to_end_settings_scenario() {
    let mut controller = BridgeController::new();

    controller.host_tick(Some(&BusTransaction::write(REG_ACCURATE_TIMING, 1)));
    controller.host_tick(Some(&BusTransaction::write(REG_BLANKING_FADE, 1)));
    controller.host_tick(Some(&BusTransaction::write(REG_BLANKING_ALPHA, 0x80)));

    let read = controller.host_tick(Some(&BusTransaction::read(REG_BLANKING_ALPHA)));
    assert_eq!(read, Some(0x80));

    let outputs = settle_core(&mut controller);
    assert!(outputs.accurate_timing);
    assert!(outputs.show_blanking_fade);
    assert_eq!(outputs.blanking_alpha, 0x80);
}

#[test]
fn test_effective_alpha_forced_to_zero_without_fade() {
    let mut controller = BridgeController::new();

    controller.host_tick(Some(&BusTransaction::write(REG_BLANKING_ALPHA, 0xCC)));
    controller.host_tick(Some(&BusTransaction::write(REG_BLANKING_FADE, 0)));

    let outputs = settle_core(&mut controller);
    assert_eq!(outputs.blanking_alpha, 0);

    // The stored alpha is untouched and resurfaces with the fade enable.
    controller.host_tick(Some(&BusTransaction::write(REG_BLANKING_FADE, 1)));
    let outputs = settle_core(&mut controller);
    assert_eq!(outputs.blanking_alpha, 0xCC);
}

#[test]
fn test_combined_reset_includes_external_line() {
    let mut controller = BridgeController::new();

    controller.set_external_reset(true);
    controller.host_tick(None);
    assert!(settle_core(&mut controller).reset);

    controller.set_external_reset(false);
    controller.host_tick(None);
    assert!(!settle_core(&mut controller).reset);
}

#[test]
fn test_download_session_crosses_to_core_domain() {
    let mut controller = BridgeController::new();

    controller.begin_transfer(SlotRequest {
        slot_id: 0,
        offset: 0,
        length: 0x4000,
        bridge_address: 0xF800_0000,
    });
    controller.host_tick(None);
    assert!(settle_core(&mut controller).downloading);

    controller.complete_transfers();
    controller.host_tick(None);
    assert!(!settle_core(&mut controller).downloading);
}

#[test]
fn test_payload_block_streams_to_core_in_order() {
    let mut controller = BridgeController::with_loader_config(LoaderConfig {
        settle_ticks: 2,
        enable_ticks: 1,
        ..LoaderConfig::default()
    });

    let payload: Vec<u8> = (0..32_u8).collect();
    let mut offset = 0_usize;
    if offset < payload.len() {
        offset += controller.load_block(0x1000_0000 + offset as u32, &payload[offset..]);
    }
    assert_eq!(offset, payload.len());

    // One enable tick per word with this config, so each enable is one event.
    let mut events = Vec::new();
    for _ in 0..256 {
        let outputs = controller.core_tick();
        if outputs.load_event.enable {
            events.push(outputs.load_event);
        }
    }

    assert_eq!(events.len(), 16);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.address, i as u32);
        let expected = u16::from(payload[i * 2]) | (u16::from(payload[i * 2 + 1]) << 8);
        assert_eq!(event.data, expected);
    }
}

#[test]
fn test_unmapped_reads_return_zero() {
    let mut controller = BridgeController::new();

    assert_eq!(
        controller.host_tick(Some(&BusTransaction::read(0x0000_0004))),
        Some(0)
    );
    assert_eq!(
        controller.host_tick(Some(&BusTransaction::read(0x1000_0000))),
        Some(0)
    );
    assert_eq!(
        controller.host_tick(Some(&BusTransaction::read(0xF800_0000))),
        Some(0)
    );
}

#[test]
fn test_tick_counters_track_domains_independently() {
    let mut controller = BridgeController::new();

    for _ in 0..7 {
        controller.host_tick(None);
    }
    for _ in 0..3 {
        let _ = controller.core_tick();
    }

    let stats = controller.stats();
    assert_eq!(stats.host_ticks, 7);
    assert_eq!(stats.core_ticks, 3);
    assert_eq!(stats.reads, 0);
    assert_eq!(stats.writes, 0);
}
