//! Module for all hardware-specific setup of the acquisition board (NUCLEO-H743ZI)
pub use stm32h7xx_hal as hal;

use embedded_hal_compat::{markers::ForwardOutputPin, Forward};

mod adc;
pub mod delay;
mod serial;
pub mod setup;
mod timers;

pub use adc::AnalogChannels;
pub use serial::{SerialRx, SerialTx};
pub use setup::{setup, DaqDevices};
pub use timers::SampleTimer;

rtic_monotonics::systick_monotonic!(Systick, 1_000);

/// A status output: LED or synchronization line.
pub type StatusPin =
    Forward<hal::gpio::ErasedPin<hal::gpio::Output>, ForwardOutputPin>;

#[inline(never)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    use core::{
        fmt::Write,
        sync::atomic::{AtomicBool, Ordering},
    };
    use cortex_m::asm;
    use rtt_target::{ChannelMode, UpChannel};

    cortex_m::interrupt::disable();

    // Recursion protection
    static PANICKED: AtomicBool = AtomicBool::new(false);
    while PANICKED.load(Ordering::Relaxed) {
        asm::bkpt();
    }
    PANICKED.store(true, Ordering::Relaxed);

    // Turn on the red LED (LD3, PB14)
    let gpiob = unsafe { &*hal::stm32::GPIOB::ptr() };
    gpiob.odr.modify(|_, w| w.odr14().high());

    // Analogous to panic-rtt-target
    if let Some(mut channel) = unsafe { UpChannel::conjure(0) } {
        channel.set_mode(ChannelMode::BlockIfFull);
        writeln!(channel, "{}", info).ok();
    }

    // Abort
    asm::udf();
}

#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    panic!("HardFault at {:#?}", ef);
}

#[cortex_m_rt::exception]
unsafe fn DefaultHandler(irqn: i16) {
    panic!("Unhandled exception (IRQn = {})", irqn);
}
