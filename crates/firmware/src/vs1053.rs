//! Hardware-specific handling of the VS1053B synthesizer chip.

use embassy_stm32::gpio::Output;
use embassy_time::Timer;

/// How long the XRESET line is held low. The datasheet only requires a couple of XTALI cycles;
/// this is comfortably above that for any crystal the chip supports.
const RESET_HOLD_MS: u64 = 2;

/// How long to wait after releasing XRESET before talking to the chip. The datasheet quotes
/// roughly 1.8 ms at a 12.288 MHz crystal for the boot sequence to finish.
const RESET_SETTLE_MS: u64 = 10;

/// Perform a hardware reset of the VS1053B via its XRESET line.
///
/// Runs once before any MIDI traffic is bridged, so the chip starts from a known state. The
/// line is active low: drive it low, hold, release, then give the chip time to boot.
pub async fn hard_reset(xreset: &mut Output<'static>) {
    xreset.set_low();
    Timer::after_millis(RESET_HOLD_MS).await;
    xreset.set_high();
    Timer::after_millis(RESET_SETTLE_MS).await;
}
