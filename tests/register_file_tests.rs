use corebridge::bus::{
    decode_region, BusRegion, REG_ACCURATE_TIMING, REG_BLANKING_ALPHA, REG_BLANKING_FADE,
    REG_RESET_ARM,
};
use corebridge::registers::{decode_register, RegisterFile, RegisterId};
use corebridge::reset::RESET_HOLD_TICKS;

#[test]
fn test_register_addresses_decode_to_register_region() {
    for address in [
        REG_RESET_ARM,
        REG_ACCURATE_TIMING,
        REG_BLANKING_FADE,
        REG_BLANKING_ALPHA,
    ] {
        assert_eq!(decode_region(address), BusRegion::Registers);
        assert!(decode_register(address).is_some());
    }
}

#[test]
fn test_register_decode_identity() {
    assert_eq!(
        decode_register(REG_RESET_ARM).unwrap().register,
        RegisterId::ResetArm
    );
    assert_eq!(
        decode_register(REG_ACCURATE_TIMING).unwrap().register,
        RegisterId::AccurateTiming
    );
    assert_eq!(
        decode_register(REG_BLANKING_FADE).unwrap().register,
        RegisterId::BlankingFade
    );
    assert_eq!(
        decode_register(REG_BLANKING_ALPHA).unwrap().register,
        RegisterId::BlankingAlpha
    );

    // Near-miss addresses decode to nothing.
    assert!(decode_register(REG_BLANKING_ALPHA + 4).is_none());
    assert!(decode_register(REG_ACCURATE_TIMING + 1).is_none());
}

#[test]
fn test_only_alpha_register_is_readable() {
    let entry = decode_register(REG_BLANKING_ALPHA).unwrap();
    assert!(entry.readable);

    for address in [REG_RESET_ARM, REG_ACCURATE_TIMING, REG_BLANKING_FADE] {
        assert!(!decode_register(address).unwrap().readable);
    }
}

#[test]
fn test_alpha_roundtrip_for_all_values() {
    let mut registers = RegisterFile::new();

    for alpha in 0..=255_u32 {
        registers.apply_write(REG_BLANKING_ALPHA, alpha);
        assert_eq!(registers.read(REG_BLANKING_ALPHA), alpha);
    }
}

#[test]
fn test_unmatched_writes_have_no_register_effect() {
    let mut registers = RegisterFile::new();

    registers.apply_write(0x0000_0300, 0xFFFF_FFFF);
    registers.apply_write(0x1000_0000, 0xFFFF_FFFF);
    registers.apply_write(0xF800_0000, 0xFFFF_FFFF);

    let snapshot = registers.snapshot();
    assert!(!snapshot.accurate_timing);
    assert!(!snapshot.show_blanking_fade);
    assert_eq!(snapshot.blanking_alpha, 0);
    assert_eq!(snapshot.reset_remaining_ticks, 0);
}

#[test]
fn test_reset_condition_tracks_countdown() {
    let mut registers = RegisterFile::new();
    assert!(!registers.reset_asserted());

    registers.apply_write(REG_RESET_ARM, 0);
    assert!(registers.reset_asserted());
    assert_eq!(registers.snapshot().reset_remaining_ticks, RESET_HOLD_TICKS);

    for _ in 0..RESET_HOLD_TICKS {
        registers.tick();
    }
    assert!(!registers.reset_asserted());
}

#[test]
fn test_effective_alpha_derivation() {
    let mut registers = RegisterFile::new();

    registers.apply_write(REG_BLANKING_ALPHA, 0x55);
    assert_eq!(registers.effective_alpha(), 0);

    registers.apply_write(REG_BLANKING_FADE, 1);
    assert_eq!(registers.effective_alpha(), 0x55);

    // Disabling the fade zeroes the derived value, not the stored one.
    registers.apply_write(REG_BLANKING_FADE, 0);
    assert_eq!(registers.effective_alpha(), 0);
    assert_eq!(registers.snapshot().blanking_alpha, 0x55);
}
