//! Cynthia is [Embassy](https://embassy.dev)-based firmware for a MIDI filter that sits between a
//! host computer and a [VS1053B](https://www.vlsi.fi/en/products/vs1053.html) synthesizer chip.
//! The firmware runs on the [Nucleo-F767ZI development
//! board](https://www.st.com/en/evaluation-tools/nucleo-f767zi.html), which is powered by an
//! F7-series STM32 microcontroller.
//!
//! The host side appears as a plain USB CDC-ACM serial port and is treated as untrusted: its byte
//! stream is run through the [`Framer`], which reassembles MIDI messages and silently drops
//! anything malformed or administratively unwanted (most notably System Reset). Accepted messages
//! go out over a UART to the VS1053B at the MIDI rate of 31250 baud and are looped back to the
//! host as confirmation. Traffic arriving from the VS1053B is trusted and relayed verbatim, with
//! a mirror copy sent to the host for observability.
//!
//! For details about the hardware or how to use the device, see the `README`.

#![no_std]
#![no_main]

mod vs1053;

use cynthia_lib::Framer;
use defmt::{panic, *};
use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_stm32::{
    Config, bind_interrupts,
    gpio::{Level, Output, Speed},
    mode::Async,
    peripherals,
    time::Hertz,
    usart::{self, RingBufferedUartRx, Uart, UartTx},
    usb,
};
use embassy_usb::{
    Builder, UsbDevice,
    class::cdc_acm::{self, CdcAcmClass},
    driver::EndpointError,
};
use static_cell::StaticCell;
use tinyvec::ArrayVec;

use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(
    #[doc(hidden)]
    struct Irqs {
        OTG_FS => usb::InterruptHandler<peripherals::USB_OTG_FS>;
        USART6 => usart::InterruptHandler<peripherals::USART6>;
    }
);

type UsbDriver = usb::Driver<'static, peripherals::USB_OTG_FS>;

/// The wire rate mandated by the MIDI electrical specification, and the rate the VS1053B expects
/// in real-time MIDI mode.
const MIDI_BAUD: u32 = 31250;

/// Size of a single CDC-ACM bulk packet.
const HOST_PACKET_SIZE: usize = 64;

/// Staging capacity for one packet's worth of framer output. A full host packet can complete a
/// message begun in the previous one, so output can exceed the packet by two carried-over bytes;
/// 128 is the next backing-array size `tinyvec` supports beyond that.
const STAGING_SIZE: usize = 128;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Initializing Cynthia");

    let mut config = Config::default();
    {
        use embassy_stm32::rcc::*;
        // hse: high-speed external clock
        config.rcc.hse = Some(Hse {
            freq: Hertz(8_000_000),
            mode: HseMode::Bypass,
        });

        // pll: phase-locked loop, crucial for dividing clock
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL216,
            divp: Some(PllPDiv::DIV2), // 8mhz / 4 * 216 / 2 = 216Mhz
            // per section 5.2 of RM0410: most peripheral clocks are derived from their bus clock, but the 48MHz clock used for USB OTG FS
            // is derived from main PLL VCO (PLLQ clock) or PLLSAI VCO (PLLSAI clock)
            divq: Some(PllQDiv::DIV9), // 8mhz / 4 * 216 / 9 = 48Mhz
            divr: None,
        });
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.mux.clk48sel = mux::Clk48sel::PLL1_Q;
    }
    let p = embassy_stm32::init(config);

    // the UART to the VS1053B's real-time MIDI input
    let mut uart_config = usart::Config::default();
    uart_config.baudrate = MIDI_BAUD;
    let uart = unwrap!(Uart::new(
        p.USART6,
        p.PC7,
        p.PC6,
        Irqs,
        p.DMA2_CH6,
        p.DMA2_CH1,
        uart_config,
    ));
    let (uart_tx, uart_rx) = uart.split();

    // Ring-buffered reception is cancel-safe: DMA keeps filling the ring while the bridge is
    // busy with host traffic, so the select in `bridge` dropping an in-flight read never loses
    // a byte the chip has already transmitted.
    static RX_RING_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();
    let uart_rx = uart_rx.into_ring_buffered(RX_RING_BUFFER.init([0; 64]));

    // hold the chip in reset from power-on until the sequence below releases it
    let mut xreset = Output::new(p.PF12, Level::Low, Speed::Low);
    vs1053::hard_reset(&mut xreset).await;

    // Create the driver, from the HAL.
    static ENDPOINT_OUT_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    let mut config = embassy_stm32::usb::Config::default();

    // USB devices which are self-powered (i.e., that can stay powered on if unplugged from the host)
    // need to enable vbus_detection to comply with the USB spec. Per section 6.10 of the Nucleo board
    // manual (UM1974), CN13 (the USB port) cannot power the board; external power is necessary.
    // See docs on `vbus_detection` for details.
    config.vbus_detection = true;

    let driver = usb::Driver::new_fs(
        p.USB_OTG_FS,
        Irqs,
        p.PA12,
        p.PA11,
        ENDPOINT_OUT_BUFFER.init([0; 256]),
        config,
    );

    // per https://pid.codes, FOSS projects can apply to be listed under the vendor ID owned by InterBiometrics
    let vendor_id = 0x1209;
    // product ID honors the VS1053B that the device fronts
    let product_id = 0x1053;

    let mut config = embassy_usb::Config::new(vendor_id, product_id);
    config.manufacturer = Some("Cynthia");
    config.product = Some("Cynthia MIDI Filter");
    config.self_powered = true;
    config.max_power = 0;

    // Create embassy-usb DeviceBuilder using the driver and config.
    // It needs some buffers for building the descriptors.
    static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
    static CONTROL_BUFFER: StaticCell<[u8; 64]> = StaticCell::new();

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        &mut [], // no msos descriptors
        CONTROL_BUFFER.init([0; 64]),
    );

    // The host-facing serial port. CDC-ACM rather than USB-MIDI: the device presents the raw
    // MIDI wire protocol, and host tooling talks plain serial.
    static CDC_STATE: StaticCell<cdc_acm::State> = StaticCell::new();
    let class = CdcAcmClass::new(
        &mut builder,
        CDC_STATE.init(cdc_acm::State::new()),
        HOST_PACKET_SIZE as u16,
    );

    let usb = builder.build();

    unwrap!(spawner.spawn(usb_task(usb)));
    unwrap!(spawner.spawn(bridge_task(class, uart_tx, uart_rx, xreset)));
}

#[embassy_executor::task]
async fn usb_task(mut usb: UsbDevice<'static, UsbDriver>) -> ! {
    usb.run().await
}

/// Task owning both channels. One framer per host session; drop counters are reported when the
/// session ends.
#[embassy_executor::task]
async fn bridge_task(
    mut class: CdcAcmClass<'static, UsbDriver>,
    mut uart_tx: UartTx<'static, Async>,
    mut uart_rx: RingBufferedUartRx<'static>,
    // held for the lifetime of the device so the XRESET line stays released
    _xreset: Output<'static>,
) -> ! {
    loop {
        class.wait_connection().await;
        info!("Host connected");
        let mut framer = Framer::new();
        let _ = bridge(&mut class, &mut uart_tx, &mut uart_rx, &mut framer).await;
        info!("Host disconnected; dropped input: {}", framer.stats());
    }
}

#[doc(hidden)]
struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        match val {
            EndpointError::BufferOverflow => panic!("Buffer overflow"),
            EndpointError::Disabled => Disconnected {},
        }
    }
}

/// Shuttle bytes between the two channels until the host goes away.
///
/// Host bytes run through the framer one at a time, in arrival order; a packet's accepted output
/// is staged and then written to the UART and looped back to the host. Bytes from the VS1053B
/// are trusted: whatever the ring buffer holds is written straight back out to the UART and
/// mirrored to the host, unparsed. A UART error is logged and the bridge keeps running; only the
/// host disappearing ends it.
async fn bridge(
    class: &mut CdcAcmClass<'static, UsbDriver>,
    uart_tx: &mut UartTx<'static, Async>,
    uart_rx: &mut RingBufferedUartRx<'static>,
    framer: &mut Framer,
) -> Result<(), Disconnected> {
    let mut host_packet = [0_u8; HOST_PACKET_SIZE];
    let mut relay_buf = [0_u8; HOST_PACKET_SIZE];
    loop {
        match select(
            class.read_packet(&mut host_packet),
            uart_rx.read(&mut relay_buf),
        )
        .await
        {
            Either::First(read) => {
                let n = read?;

                let mut hardware: ArrayVec<[u8; STAGING_SIZE]> = ArrayVec::new();
                let mut loopback: ArrayVec<[u8; STAGING_SIZE]> = ArrayVec::new();
                for &byte in &host_packet[..n] {
                    framer.push(byte, &mut hardware, &mut loopback);
                }

                if !hardware.is_empty() {
                    if let Err(e) = uart_tx.write(&hardware).await {
                        warn!("UART write failed: {}", e);
                    }
                }
                // the staging buffer can outgrow a single bulk packet
                for chunk in loopback.chunks(HOST_PACKET_SIZE) {
                    class.write_packet(chunk).await?;
                }
            }
            Either::Second(read) => match read {
                Ok(n) => {
                    if let Err(e) = uart_tx.write(&relay_buf[..n]).await {
                        warn!("UART write failed: {}", e);
                    }
                    class.write_packet(&relay_buf[..n]).await?;
                }
                Err(e) => warn!("UART read failed: {}", e),
            },
        }
    }
}
