//! Acquisition board hardware configuration
//!
//! This file contains all of the hardware-specific configuration of the NUCLEO-H743ZI:
//! * USART3 on PD8/PD9 carries the serial link (ST-LINK virtual COM port).
//! * ADC1 converts A0 (PA3), A1 (PC0) and A2 (PC3).
//! * TIM2 paces the sampling.
//! * LD1 (green, PB0) is lit while waiting for a configuration, LD3 (red, PB14) blinks on a fatal
//!   configuration error. PE13 (D3) is the synchronization output.
//! * The user button (B1, PC13) held during reset selects the diagnostic counter source.
use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal_compat::ForwardCompat;
use stm32h7xx_hal::{self as hal, prelude::*};

use super::{
    delay::AsmDelay, AnalogChannels, SampleTimer, SerialRx, SerialTx,
    StatusPin, Systick,
};
use crate::configuration::Indicators;
use crate::design_parameters::{BAUD_RATE, CHANNEL_COUNT};
use crate::sample_source::Source;
use crate::settings::{Resolution, Settings};

/// The configured board peripherals.
pub struct DaqDevices {
    pub settings: Settings,
    pub source: Source<AnalogChannels>,
    pub timer: SampleTimer,
    pub tx: SerialTx,
    pub rx: SerialRx,
    pub indicators: Indicators<StatusPin>,
}

fn adc_resolution(resolution: Resolution) -> hal::adc::Resolution {
    match resolution {
        Resolution::Eight => hal::adc::Resolution::EightBit,
        Resolution::Ten => hal::adc::Resolution::TenBit,
        Resolution::Twelve => hal::adc::Resolution::TwelveBit,
        Resolution::Fourteen => hal::adc::Resolution::FourteenBit,
        Resolution::Sixteen => hal::adc::Resolution::SixteenBit,
    }
}

/// Configure the board.
///
/// # Args
/// * `core` - The Cortex-M core peripherals.
/// * `device` - The microcontroller peripherals.
///
/// # Returns
/// The devices used by the acquisition firmware. The sampling timer is stopped.
pub fn setup(
    core: hal::stm32::CorePeripherals,
    device: hal::stm32::Peripherals,
) -> DaqDevices {
    // Set up RTT logging
    {
        // Enable debug during WFE/WFI-induced sleep
        device.DBGMCU.cr.modify(|_, w| w.dbgsleep_d1().set_bit());

        // Set up RTT channel to use for `rprintln!()` as "best effort".
        // This removes a critical section around the logging and thus allows
        // high-prio tasks to always interrupt at low latency.
        // If a high-priority tasks preempts while we are logging something,
        // and if we then also want to log from within that high-priority task,
        // the high-prio log message will be lost.
        let channels = rtt_target::rtt_init_default!();
        // Note(unsafe): The closure we pass does not establish a critical section
        // as demanded but it does ensure synchronization and implements a lock.
        unsafe {
            rtt_target::set_print_channel_cs(
                channels.up.0,
                &((|arg, f| {
                    static LOCKED: AtomicBool = AtomicBool::new(false);
                    if LOCKED.compare_exchange_weak(
                        false,
                        true,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    ) == Ok(false)
                    {
                        f(arg);
                        LOCKED.store(false, Ordering::Release);
                    }
                }) as rtt_target::CriticalSectionFunc),
            );
        }

        static LOGGER: rtt_logger::RTTLogger =
            rtt_logger::RTTLogger::new(log::LevelFilter::Info);
        log::set_logger(&LOGGER)
            .map(|()| log::set_max_level(log::LevelFilter::Trace))
            .unwrap();
        log::info!("Starting");
    }

    let pwr = device.PWR.constrain();
    let vos = pwr.freeze();

    // Clear reset flags.
    device.RCC.rsr.write(|w| w.rmvf().set_bit());

    // The ADC runs from the fixed frequency per_ck.
    device.RCC.d3ccipr.modify(|_, w| w.adcsel().per());

    let rcc = device.RCC.constrain();
    let ccdr = rcc
        .sysclk(400.MHz())
        .hclk(200.MHz())
        .per_ck(64.MHz()) // fixed frequency HSI, only used for the internal ADC.
        .freeze(vos, &device.SYSCFG);

    Systick::start(core.SYST, ccdr.clocks.sysclk().to_Hz());

    let mut delay = AsmDelay::new(ccdr.clocks.c_ck().to_Hz());

    let gpioa = device.GPIOA.split(ccdr.peripheral.GPIOA);
    let gpiob = device.GPIOB.split(ccdr.peripheral.GPIOB);
    let gpioc = device.GPIOC.split(ccdr.peripheral.GPIOC);
    let gpiod = device.GPIOD.split(ccdr.peripheral.GPIOD);
    let gpioe = device.GPIOE.split(ccdr.peripheral.GPIOE);

    let settings = Settings::new(gpioc.pc13.into_floating_input().is_high());
    log::info!("Settings: {settings:?}");

    let indicators: Indicators<StatusPin> = Indicators {
        waiting: gpiob.pb0.into_push_pull_output().erase().forward(),
        error: gpiob.pb14.into_push_pull_output().erase().forward(),
        sync: settings
            .sync_output
            .then(|| gpioe.pe13.into_push_pull_output().erase().forward()),
    };

    let inputs = {
        let mut adc1 = hal::adc::Adc::adc1(
            device.ADC1,
            25.MHz(),
            &mut delay,
            ccdr.peripheral.ADC12,
            &ccdr.clocks,
        );
        adc1.set_sample_time(hal::adc::AdcSampleTime::T_810);
        adc1.set_resolution(adc_resolution(settings.resolution));
        adc1.calibrate();

        AnalogChannels::new(
            adc1.enable(),
            (
                gpioa.pa3.into_analog(),
                gpioc.pc0.into_analog(),
                gpioc.pc3.into_analog(),
            ),
            settings.resolution.bits(),
        )
    };

    let timer = {
        // The tick rate is set on every start, so the 1KHz setting here is a dont-care.
        let timer2 =
            device
                .TIM2
                .timer(1.kHz(), ccdr.peripheral.TIM2, &ccdr.clocks);
        SampleTimer::new(timer2)
    };

    let (tx, rx) = {
        let tx = gpiod.pd8.into_alternate();
        let rx = gpiod.pd9.into_alternate();
        let mut serial = device
            .USART3
            .serial(
                (tx, rx),
                BAUD_RATE.bps(),
                ccdr.peripheral.USART3,
                &ccdr.clocks,
            )
            .unwrap();
        serial.listen(hal::serial::Event::Rxne);
        let (tx, rx) = serial.split();
        (SerialTx::new(tx), SerialRx::new(rx))
    };

    log::info!("setup() complete");

    DaqDevices {
        source: Source::new::<CHANNEL_COUNT>(settings.source, inputs),
        settings,
        timer,
        tx,
        rx,
        indicators,
    }
}
