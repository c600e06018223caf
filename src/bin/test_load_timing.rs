use corebridge::bus::BusTransaction;
use corebridge::controller::BridgeController;
use corebridge::loader::LoaderConfig;

const TEST_WORDS: u32 = 16;

fn main() {
    // Drive a burst of payload writes and verify the destination-side
    // pacing offline, without the TCP transport in the way.
    let config = LoaderConfig::default();
    let mut controller = BridgeController::with_loader_config(config);

    for i in 0..TEST_WORDS {
        let txn = BusTransaction::write(0x1000_0000 + i * 2, u32::from(0xC0DE_u16) + i);
        controller.host_tick(Some(&txn));
    }

    let mut rising_edges = Vec::new();
    let mut previous_enable = false;
    for tick in 0..4096_u32 {
        let outputs = controller.core_tick();
        if outputs.load_event.enable && !previous_enable {
            rising_edges.push(tick);
        }
        previous_enable = outputs.load_event.enable;
    }

    let stats = controller.loader_stats();
    println!("✅ Loader burst complete");
    println!("📏 Words accepted: {}", stats.words_accepted);
    println!("📏 Events emitted: {}", stats.events_emitted);
    println!("🎯 Configured settle delay: {} ticks", config.settle_ticks);
    println!("🎯 Configured enable pulse: {} ticks", config.enable_ticks);

    if rising_edges.len() != TEST_WORDS as usize {
        println!(
            "❌ Expected {} enable pulses, observed {}",
            TEST_WORDS,
            rising_edges.len()
        );
        return;
    }

    let min_spacing = rising_edges
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .min()
        .unwrap_or(0);
    println!("📊 Minimum pulse spacing: {min_spacing} ticks");

    let required = u32::from(config.settle_ticks) + u32::from(config.enable_ticks);
    if min_spacing >= required {
        println!("✅ Pulse spacing honors the settle delay (>= {required} ticks)");
    } else {
        println!("❌ Pulse spacing below configured minimum of {required} ticks");
    }
}
