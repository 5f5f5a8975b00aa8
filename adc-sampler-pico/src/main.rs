#![no_std]
#![no_main]

mod devices;
mod onboard;
#[cfg(not(feature = "busy-poll"))]
mod tick_timer;
mod usb;

use adc_sampler::{ChannelSource, Fallback, Pipeline, SamplerConfig};
use defmt_rtt as _;
use embedded_hal::digital::OutputPin;
use fugit::RateExtU32;
use panic_probe as _;
// Alias for our HAL crate
use rp235x_hal as hal;
use static_cell::StaticCell;

use hal::adc::AdcPin;
use hal::gpio::{FunctionI2C, Pin, PullUp};

// USB Device support
use usb_device::{class_prelude::*, prelude::*};

// USB Communications Class Device support
use usbd_serial::{SerialPort, USB_CLASS_CDC};

use devices::ads1015::{Ads1015, Ads1015Scanner, AdsAddressOptions};

/// Tell the Boot ROM about our application
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: hal::block::ImageDef = hal::block::ImageDef::secure_exe();

// External high-speed crystal on the Raspberry Pi Pico 2 board is 12 MHz.
const XTAL_FREQ_HZ: u32 = 12_000_000u32;

/// GPIO26-28.
const ONBOARD_CHANNELS: usize = 3;
/// ADS1015 inputs 0-2, after the on-chip ones.
const EXTERNAL_CHANNELS: u8 = 3;

const CONFIG: SamplerConfig = match SamplerConfig::new(ONBOARD_CHANNELS + EXTERNAL_CHANNELS as usize, 250)
    .with_resolution(12)
    .with_oversampling(1_000)
    .with_fallback(Fallback::LastKnownGood)
    .with_poll_budget(8)
    .validate()
{
    Ok(config) => config,
    Err(_) => panic!("invalid sampler configuration"),
};

/// Log the running totals about once a second.
const STATS_EVERY: u32 = CONFIG.tick_rate_hz();

#[cfg(feature = "timing-diagnostics")]
type Layout = adc_sampler::TimingDiagnostics;
#[cfg(not(feature = "timing-diagnostics"))]
type Layout = adc_sampler::Telemetry;

static USB_BUS: StaticCell<UsbBusAllocator<hal::usb::UsbBus>> = StaticCell::new();

// Entry point to bare-metal applications.
#[hal::entry]
fn main() -> ! {
    // Grab our singleton objects
    let mut pac = hal::pac::Peripherals::take().unwrap();

    // Set up the watchdog driver - needed by the clock setup code
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);

    let clocks = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    // Microsecond time base for the cadence and the tick stamps
    #[allow(unused_mut)]
    let mut timer = hal::Timer::new_timer0(pac.TIMER0, &mut pac.RESETS, &clocks);

    let usb_bus: &'static _ = USB_BUS.init(UsbBusAllocator::new(hal::usb::UsbBus::new(
        pac.USB,
        pac.USB_DPRAM,
        clocks.usb_clock,
        true,
        &mut pac.RESETS,
    )));
    let serial = SerialPort::new(usb_bus);
    let usb_dev = UsbDeviceBuilder::new(usb_bus, UsbVidPid(0x16c0, 0x27dd))
        .strings(&[StringDescriptors::default()
            .manufacturer("adc-sampler")
            .product("ADC sampler")
            .serial_number("0001")])
        .unwrap()
        .device_class(USB_CLASS_CDC) // from: https://www.usb.org/defined-class-codes
        .build();
    let mut sink = usb::UsbSink::new(usb_dev, serial);

    // The single-cycle I/O block controls our GPIO pins
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(pac.IO_BANK0, pac.PADS_BANK0, sio.gpio_bank0, &mut pac.RESETS);

    let adc = hal::Adc::new(pac.ADC, &mut pac.RESETS);
    let onboard = onboard::OnboardAdc::new(
        adc,
        AdcPin::new(pins.gpio26).unwrap(),
        AdcPin::new(pins.gpio27).unwrap(),
        AdcPin::new(pins.gpio28).unwrap(),
    );

    let sda: Pin<_, FunctionI2C, PullUp> = pins.gpio4.reconfigure();
    let scl: Pin<_, FunctionI2C, PullUp> = pins.gpio5.reconfigure();
    let i2c = hal::I2C::i2c0(pac.I2C0, sda, scl, 400.kHz(), &mut pac.RESETS, &clocks.system_clock);
    let external = defmt::unwrap!(Ads1015Scanner::new(
        Ads1015::new(AdsAddressOptions::Addr48),
        i2c,
        EXTERNAL_CHANNELS,
    ));

    let mut pipeline = defmt::unwrap!(Pipeline::new(&CONFIG, onboard.chain(external), Layout::default()));

    // led pin to indicate the program is running
    let mut led_pin = pins.gpio25.into_push_pull_output();
    led_pin.set_high().unwrap();

    #[cfg(not(feature = "busy-poll"))]
    let mut cadence = {
        tick_timer::start(&mut timer, CONFIG.tick_period_us());
        adc_sampler::FlagCadence::new(&tick_timer::READY, CONFIG.tick_period_us())
    };
    #[cfg(feature = "busy-poll")]
    let mut cadence = adc_sampler::Deadline::from_config(&CONFIG, timer.get_counter().ticks());

    let mut clock = move || timer.get_counter().ticks();

    defmt::info!(
        "sampling {} channels, {} Hz packets from {} Hz ticks",
        CONFIG.channels(),
        CONFIG.packet_rate_hz(),
        CONFIG.tick_rate_hz()
    );

    loop {
        // must be called at least every 10 ms
        sink.poll();

        if let Some(report) = pipeline.service(&mut cadence, &mut clock, &mut sink) {
            if report.tick.seq % STATS_EVERY == 0 {
                defmt::info!("{}", pipeline.stats());
            }
        }
    }
}
