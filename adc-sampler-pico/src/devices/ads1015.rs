use adc_sampler::ChannelSource;
use constants::AVAILABLE_I2C_ADDRESSES;
use embedded_hal::i2c::I2c;

/// An error type for ADS1015 operations.
#[derive(Debug)]
pub enum Ads1015Error<I2cE> {
    /// Underlying I²C error.
    I2c(I2cE),
    /// An invalid channel was specified.
    InvalidChannel,
}

impl<I2cE: core::fmt::Debug> defmt::Format for Ads1015Error<I2cE> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::I2c(e) => defmt::write!(f, "i2c: {}", defmt::Debug2Format(e)),
            Self::InvalidChannel => defmt::write!(f, "invalid channel"),
        }
    }
}

pub mod constants {
    pub const AVAILABLE_I2C_ADDRESSES: [u8; 4] = [0x48, 0x49, 0x4A, 0x4B];

    // Pointer Registers
    pub const POINTER_CONVERT: u8 = 0x00;
    pub const POINTER_CONFIG: u8 = 0x01;

    // write: start a single conversion, read: 1 once the conversion is done
    pub const CONFIG_OS_SINGLE: u16 = 0x8000;
    pub const CONFIG_MODE_SINGLE: u16 = 0x0100;

    pub const CONFIG_MUX_SINGLE0: u16 = 0x4000;
    pub const CONFIG_MUX_SINGLE1: u16 = 0x5000;
    pub const CONFIG_MUX_SINGLE2: u16 = 0x6000;
    pub const CONFIG_MUX_SINGLE3: u16 = 0x7000;

    pub const CONFIG_RATE_MASK: u16 = 0x00E0;
    pub const CONFIG_RATE_1600HZ: u16 = 0x0080;
    pub const CONFIG_RATE_3300HZ: u16 = 0x00C0;

    pub const CONFIG_PGA_MASK: u16 = 0x0E00;
    pub const CONFIG_PGA_1: u16 = 0x0200; // ±4.096 V
    pub const CONFIG_PGA_2: u16 = 0x0400; // ±2.048 V (default)

    pub const CONFIG_CQUE_NONE: u16 = 0x0003;
}

#[derive(Debug, Clone, Copy, Default)]
pub enum AdsAddressOptions {
    #[default]
    Addr48,
    Addr49,
    Addr4A,
    Addr4B,
}

impl AdsAddressOptions {
    pub fn address(self) -> u8 {
        match self {
            Self::Addr48 => AVAILABLE_I2C_ADDRESSES[0],
            Self::Addr49 => AVAILABLE_I2C_ADDRESSES[1],
            Self::Addr4A => AVAILABLE_I2C_ADDRESSES[2],
            Self::Addr4B => AVAILABLE_I2C_ADDRESSES[3],
        }
    }
}

/// Register-level access to one ADS1015 in single-shot mode.
#[derive(Copy, Clone)]
pub struct Ads1015 {
    addr: u8,
    sample_rate: u16,
    gain: u16,
}

impl Ads1015 {
    pub fn new(address: AdsAddressOptions) -> Self {
        Self {
            addr: address.address(),
            sample_rate: constants::CONFIG_RATE_1600HZ,
            gain: constants::CONFIG_PGA_2,
        }
    }

    /// Reads the conversion register once to see whether the device answers.
    pub fn begin<T: I2c>(&mut self, i2c: &mut T) -> Result<(), Ads1015Error<T::Error>> {
        self.read_block(i2c, constants::POINTER_CONVERT).map(|_| ())
    }

    pub fn set_gain(&mut self, gain: u16) {
        self.gain = gain & constants::CONFIG_PGA_MASK;
    }

    pub fn set_sample_rate(&mut self, rate: u16) {
        self.sample_rate = rate & constants::CONFIG_RATE_MASK;
    }

    /// Starts a single-ended conversion on `channel` (0-3) and returns
    /// without waiting for it.
    pub fn start_single_ended<T: I2c>(
        &mut self,
        i2c: &mut T,
        channel: u8,
    ) -> Result<(), Ads1015Error<T::Error>> {
        use constants::*;
        let mux = match channel {
            0 => CONFIG_MUX_SINGLE0,
            1 => CONFIG_MUX_SINGLE1,
            2 => CONFIG_MUX_SINGLE2,
            3 => CONFIG_MUX_SINGLE3,
            _ => return Err(Ads1015Error::InvalidChannel),
        };
        let config = CONFIG_OS_SINGLE | CONFIG_MODE_SINGLE | CONFIG_CQUE_NONE | self.sample_rate | self.gain | mux;
        self.write_block(i2c, POINTER_CONFIG, &config.to_be_bytes())
    }

    /// True once the conversion started last has finished.
    pub fn conversion_ready<T: I2c>(&mut self, i2c: &mut T) -> Result<bool, Ads1015Error<T::Error>> {
        let config = u16::from_be_bytes(self.read_block(i2c, constants::POINTER_CONFIG)?);
        Ok(config & constants::CONFIG_OS_SINGLE != 0)
    }

    /// Last conversion result as a single-ended reading. The converter is
    /// bipolar, so readings just below ground come back negative; those
    /// clamp to zero.
    pub fn read_single_ended<T: I2c>(&mut self, i2c: &mut T) -> Result<u16, Ads1015Error<T::Error>> {
        let raw = u16::from_be_bytes(self.read_block(i2c, constants::POINTER_CONVERT)?) >> 4;
        Ok(if raw > 0x07FF { 0 } else { raw })
    }

    fn write_block<T: I2c>(&mut self, i2c: &mut T, register: u8, data: &[u8; 2]) -> Result<(), Ads1015Error<T::Error>> {
        i2c.write(self.addr, &[register, data[0], data[1]])
            .map_err(Ads1015Error::I2c)
    }

    fn read_block<T: I2c>(&mut self, i2c: &mut T, register: u8) -> Result<[u8; 2], Ads1015Error<T::Error>> {
        let mut buf = [0u8; 2];
        i2c.write_read(self.addr, &[register], &mut buf)
            .map_err(Ads1015Error::I2c)?;
        Ok(buf)
    }
}

/// Round-robin single-shot scanner exposing the ADS1015 inputs as channels.
///
/// A full conversion takes longer than a tick may spend on the bus, so the
/// scanner keeps one conversion in flight and caches the latest result per
/// input. The scan advances by one step when channel 0 is read; a channel
/// that has never converted reports `WouldBlock`.
pub struct Ads1015Scanner<I2C> {
    device: Ads1015,
    i2c: I2C,
    channels: u8,
    latest: [u16; 4],
    valid: u8,
    in_flight: Option<u8>,
}

impl<I2C: I2c> Ads1015Scanner<I2C> {
    /// Scans inputs `0..channels`, at most four. A device that does not
    /// answer is not fatal: its channels fault every tick until it does.
    pub fn new(mut device: Ads1015, mut i2c: I2C, channels: u8) -> Result<Self, Ads1015Error<I2C::Error>> {
        if channels == 0 || channels > 4 {
            return Err(Ads1015Error::InvalidChannel);
        }
        if let Err(e) = device.begin(&mut i2c) {
            defmt::warn!("ADS1015 at {=u8:#x} not answering: {}", device.addr, e);
        }
        device.set_sample_rate(constants::CONFIG_RATE_3300HZ);
        device.set_gain(constants::CONFIG_PGA_1);
        Ok(Self {
            device,
            i2c,
            channels,
            latest: [0; 4],
            valid: 0,
            in_flight: None,
        })
    }

    /// One scan step: collects a finished conversion and starts the next.
    fn step(&mut self) -> Result<(), Ads1015Error<I2C::Error>> {
        let next = match self.in_flight {
            None => 0,
            Some(channel) => {
                if !self.device.conversion_ready(&mut self.i2c)? {
                    return Ok(());
                }
                self.latest[usize::from(channel)] = self.device.read_single_ended(&mut self.i2c)?;
                self.valid |= 1 << channel;
                (channel + 1) % self.channels
            }
        };
        self.device.start_single_ended(&mut self.i2c, next)?;
        self.in_flight = Some(next);
        Ok(())
    }
}

impl<I2C: I2c> ChannelSource for Ads1015Scanner<I2C> {
    type Error = Ads1015Error<I2C::Error>;

    fn channel_count(&self) -> usize {
        usize::from(self.channels)
    }

    fn read(&mut self, channel: usize) -> nb::Result<u16, Self::Error> {
        if channel == 0 {
            self.step()?;
        }
        if self.valid & (1 << channel) == 0 {
            return Err(nb::Error::WouldBlock);
        }
        Ok(self.latest[channel])
    }
}
