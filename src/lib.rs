//! # TAS5720 Driver
//!
//! This is driver for the Texas Instruments TAS5720 mono Class-D audio
//! amplifier.
//!
//! Specifically, this driver is for setting the registers in the TAS5720 over
//! I²C - this driver does not handle the serial audio interface (I²S, or
//! similar), nor the `SPK_SD` shutdown pin.
//!
//! Unlike write-only parts, every TAS5720 register can be read back, so the
//! [`Amplifier`] keeps no register cache. Changing one setting reads the
//! register that holds it, replaces just those bits, and writes it back. The
//! chip is the only source of truth.
//!
//! The [`Amplifier`] owns its [`RegisterTransport`]. If you have more than one
//! handle on the same bus, you must make sure their register accesses do not
//! interleave.
//!
//! # Example
//!
//! You might setup the Amplifier like this:
//!
//! ```rust
//! # use embedded_hal::blocking::i2c::{SevenBitAddress, Write, WriteRead};
//! # struct I2c;
//! # impl Write for I2c {
//! #     type Error = ();
//! #     fn write(&mut self, _address: SevenBitAddress, _bytes: &[u8]) -> Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! # impl WriteRead for I2c {
//! #     type Error = ();
//! #     fn write_read(&mut self, _address: SevenBitAddress, _bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
//! #         buffer.fill(0);
//! #         Ok(())
//! #     }
//! # }
//! # let i2c = I2c;
//! let transport = tas5720::I2cTransport::new(i2c, tas5720::DEFAULT_BUS_ADDRESS);
//! let mut amp = tas5720::Amplifier::new(transport);
//! if let Err(_e) = amp.set_mute(true) {
//!     // Amplifier didn't respond
//! }
//! amp.set_serial_audio_format(tas5720::SerialAudioFormat::I2s).unwrap();
//! amp.set_channel_selection(tas5720::ChannelSelection::Right).unwrap();
//! amp.set_analog_gain(tas5720::AnalogGain::Gain25Dbv).unwrap();
//! amp.set_digital_boost(tas5720::DigitalBoost::Boost6Db).unwrap();
//! amp.set_volume(200).unwrap();
//! amp.set_mute(false).unwrap();
//! if amp.get_fault_status().map(|f| f.any()).unwrap_or(true) {
//!     // Amplifier is unhappy
//! }
//! ```

#![no_std]
#![deny(unsafe_code)]
#![deny(missing_docs)]

#[cfg(test)]
extern crate std;

pub mod registers;
mod transport;

pub use registers::{Field, Register};
pub use transport::{I2cTransport, RegisterTransport, DEFAULT_BUS_ADDRESS};

use registers::*;

//
// Public Types
//

/// The things that can go wrong when talking to the TAS5720.
///
/// `E` is the error type of the underlying [`RegisterTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<E> {
    /// A bus transaction failed (e.g. the chip did not acknowledge).
    ///
    /// The register that failed was not changed. Setters that write two
    /// registers in turn ([`Amplifier::set_mute`],
    /// [`Amplifier::set_volume_channels`]) may already have written the first
    /// one; read the setting back to find out.
    Bus(E),
    /// The value given cannot be written: it does not fit in the register(s),
    /// or it is a reserved bit pattern. The chip was not touched.
    InvalidArgument,
    /// A write spanning several registers failed part-way through. The
    /// registers before `reached` hold the new value, the rest the old one.
    PartialWrite {
        /// How far the sequence got before it failed
        reached: ClipperWriteState,
        /// The bus error that stopped it
        source: E,
    },
}

/// Progress through writing the three registers of the digital clipper.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClipperWriteState {
    /// Nothing written yet
    NotStarted,
    /// Digital Clipper 1 (bits [5:0]) holds the new value
    Byte1Written,
    /// Digital Clipper 1 and 2 (bits [13:0]) hold the new value
    Byte2Written,
    /// All 20 bits written
    Complete,
}

/// How the serial audio interface is framed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialAudioFormat {
    /// 24-bit, right justified
    RightJustified24,
    /// 20-bit, right justified
    RightJustified20,
    /// 18-bit, right justified
    RightJustified18,
    /// 16-bit, right justified
    RightJustified16,
    /// I²S, 16 to 24 bits
    I2s,
    /// Left justified, 16 to 24 bits
    LeftJustified16To24,
    /// A bit pattern the datasheet doesn't define
    Reserved(u8),
}

/// Extra digital gain applied before the modulator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DigitalBoost {
    /// +0 dB
    Boost0Db = 0,
    /// +6 dB
    Boost6Db = 1,
    /// +12 dB
    Boost12Db = 2,
    /// +18 dB
    Boost18Db = 3,
}

/// Which channel of the stereo serial audio stream the amplifier plays.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelSelection {
    /// Play the right channel
    Right = 0,
    /// Play the left channel
    Left = 1,
}

/// Analog gain of the output stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogGain {
    /// 19.2 dBV
    Gain19_2Dbv,
    /// 22.6 dBV
    Gain22_6Dbv,
    /// 25 dBV
    Gain25Dbv,
    /// A bit pattern the datasheet doesn't define
    Reserved(u8),
}

/// PWM switching rate, as a multiple of the LRCK frequency.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmRate {
    /// 6 x LRCK
    Lrck6 = 0,
    /// 8 x LRCK
    Lrck8 = 1,
    /// 10 x LRCK
    Lrck10 = 2,
    /// 12 x LRCK
    Lrck12 = 3,
    /// 14 x LRCK
    Lrck14 = 4,
    /// 16 x LRCK
    Lrck16 = 5,
    /// 20 x LRCK
    Lrck20 = 6,
    /// 24 x LRCK
    Lrck24 = 7,
}

/// Over-current error threshold.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OceThreshold {
    /// The datasheet default threshold
    Default = 0,
    /// Reduced to 75% of the default
    Reduced75Percent = 1,
    /// Reduced to 50% of the default
    Reduced50Percent = 2,
    /// Reduced to 25% of the default
    Reduced25Percent = 3,
}

/// A snapshot of the error flags in the Fault Configuration / Error Status
/// register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultStatus {
    /// The raw register contents
    pub status: u8,
}

/// Represents a TAS5720 chip, sitting on the other side of a
/// [`RegisterTransport`].
pub struct Amplifier<T> {
    transport: T,
    last_volume: Option<(u8, u8)>,
}

//
// Public Data
//

/// The largest value the 20-bit digital clipper can hold.
pub const DIGITAL_CLIPPER_MAX: u32 = (1 << 20) - 1;

//
// impls on Public Types
//

impl SerialAudioFormat {
    fn from_bits(bits: u8) -> SerialAudioFormat {
        match bits {
            0 => SerialAudioFormat::RightJustified24,
            1 => SerialAudioFormat::RightJustified20,
            2 => SerialAudioFormat::RightJustified18,
            3 => SerialAudioFormat::RightJustified16,
            4 => SerialAudioFormat::I2s,
            5 => SerialAudioFormat::LeftJustified16To24,
            other => SerialAudioFormat::Reserved(other),
        }
    }

    /// `None` for a reserved pattern, which can be read but not written.
    fn bits(self) -> Option<u8> {
        match self {
            SerialAudioFormat::RightJustified24 => Some(0),
            SerialAudioFormat::RightJustified20 => Some(1),
            SerialAudioFormat::RightJustified18 => Some(2),
            SerialAudioFormat::RightJustified16 => Some(3),
            SerialAudioFormat::I2s => Some(4),
            SerialAudioFormat::LeftJustified16To24 => Some(5),
            SerialAudioFormat::Reserved(_) => None,
        }
    }
}

impl DigitalBoost {
    fn from_bits(bits: u8) -> DigitalBoost {
        match bits {
            0 => DigitalBoost::Boost0Db,
            1 => DigitalBoost::Boost6Db,
            2 => DigitalBoost::Boost12Db,
            _ => DigitalBoost::Boost18Db,
        }
    }
}

impl ChannelSelection {
    fn from_bits(bits: u8) -> ChannelSelection {
        if bits == 0 {
            ChannelSelection::Right
        } else {
            ChannelSelection::Left
        }
    }
}

impl AnalogGain {
    fn from_bits(bits: u8) -> AnalogGain {
        match bits {
            0 => AnalogGain::Gain19_2Dbv,
            1 => AnalogGain::Gain22_6Dbv,
            2 => AnalogGain::Gain25Dbv,
            other => AnalogGain::Reserved(other),
        }
    }

    /// `None` for a reserved pattern, which can be read but not written.
    fn bits(self) -> Option<u8> {
        match self {
            AnalogGain::Gain19_2Dbv => Some(0),
            AnalogGain::Gain22_6Dbv => Some(1),
            AnalogGain::Gain25Dbv => Some(2),
            AnalogGain::Reserved(_) => None,
        }
    }
}

impl PwmRate {
    fn from_bits(bits: u8) -> PwmRate {
        match bits {
            0 => PwmRate::Lrck6,
            1 => PwmRate::Lrck8,
            2 => PwmRate::Lrck10,
            3 => PwmRate::Lrck12,
            4 => PwmRate::Lrck14,
            5 => PwmRate::Lrck16,
            6 => PwmRate::Lrck20,
            _ => PwmRate::Lrck24,
        }
    }
}

impl OceThreshold {
    fn from_bits(bits: u8) -> OceThreshold {
        match bits {
            0 => OceThreshold::Default,
            1 => OceThreshold::Reduced75Percent,
            2 => OceThreshold::Reduced50Percent,
            _ => OceThreshold::Reduced25Percent,
        }
    }
}

impl From<u8> for FaultStatus {
    fn from(status: u8) -> FaultStatus {
        FaultStatus { status }
    }
}

impl FaultStatus {
    /// The die got too hot
    pub fn over_temperature(&self) -> bool {
        OVER_TEMPERATURE_ERROR.extract(self.status) != 0
    }

    /// DC offset detected on the output
    pub fn output_dc(&self) -> bool {
        OUTPUT_DC_ERROR.extract(self.status) != 0
    }

    /// Output current exceeded the over-current threshold
    pub fn over_current(&self) -> bool {
        OVER_CURRENT_ERROR.extract(self.status) != 0
    }

    /// The serial audio clocks are missing or invalid
    pub fn clock_error(&self) -> bool {
        CLOCK_ERROR.extract(self.status) != 0
    }

    /// True if any of the four error flags is set
    pub fn any(&self) -> bool {
        ANY_FAULT.extract(self.status) != 0
    }
}

impl ClipperWriteState {
    /// The state after one more register has been written.
    fn next(self) -> ClipperWriteState {
        match self {
            ClipperWriteState::NotStarted => ClipperWriteState::Byte1Written,
            ClipperWriteState::Byte1Written => ClipperWriteState::Byte2Written,
            ClipperWriteState::Byte2Written | ClipperWriteState::Complete => {
                ClipperWriteState::Complete
            }
        }
    }

    /// Turn a bus error hit in this state into the error we report.
    fn failure<E>(self, source: E) -> Error<E> {
        match self {
            ClipperWriteState::NotStarted => Error::Bus(source),
            reached => Error::PartialWrite { reached, source },
        }
    }
}

impl<T> Amplifier<T>
where
    T: RegisterTransport,
{
    /// Create a new TAS5720 proxy object.
    ///
    /// Nothing is sent to the chip until you call a method.
    pub fn new(transport: T) -> Amplifier<T> {
        Amplifier {
            transport,
            last_volume: None,
        }
    }

    /// Give back the transport.
    pub fn release(self) -> T {
        self.transport
    }

    /// Read a register, as-is.
    pub fn read_register(&mut self, register: Register) -> Result<u8, Error<T::Error>> {
        self.transport
            .read_register(register.addr())
            .map_err(Error::Bus)
    }

    /// Write a whole register, adding any bits the register must always have
    /// set.
    fn write_raw(&mut self, register: Register, value: u8) -> Result<(), T::Error> {
        self.transport
            .write_register(register.addr(), value | register.forced_bits())
    }

    /// Read back one field, shifted down to bit 0.
    fn get_field(&mut self, field: Field) -> Result<u8, Error<T::Error>> {
        let raw = self.read_register(field.register)?;
        Ok(field.extract(raw))
    }

    /// Change one field, leaving the rest of its register alone.
    ///
    /// A field that fills its register is written without reading first.
    fn update_field(&mut self, field: Field, value: u8) -> Result<(), T::Error> {
        let raw = if field.is_whole_register() {
            0
        } else {
            self.transport.read_register(field.register.addr())?
        };
        self.write_raw(field.register, field.insert(raw, value))
    }

    fn set_field(&mut self, field: Field, value: u8) -> Result<(), Error<T::Error>> {
        self.update_field(field, value).map_err(Error::Bus)
    }

    fn get_flag(&mut self, field: Field) -> Result<bool, Error<T::Error>> {
        Ok(self.get_field(field)? != 0)
    }

    fn set_flag(&mut self, field: Field, value: bool) -> Result<(), Error<T::Error>> {
        self.set_field(field, value as u8)
    }

    /// Read the Device Identification register.
    pub fn get_device_identification(&mut self) -> Result<u8, Error<T::Error>> {
        self.read_register(Register::DeviceIdentification)
    }

    /// Get whether the amplifier is in sleep mode.
    pub fn get_sleep_mode(&mut self) -> Result<bool, Error<T::Error>> {
        self.get_flag(SLEEP)
    }

    /// Put the amplifier into, or take it out of, sleep mode.
    pub fn set_sleep_mode(&mut self, sleep: bool) -> Result<(), Error<T::Error>> {
        self.set_flag(SLEEP, sleep)
    }

    /// Get whether the amplifier is shut down.
    pub fn get_shutdown(&mut self) -> Result<bool, Error<T::Error>> {
        // The register bit is active-low
        Ok(!self.get_flag(SHUTDOWN_N)?)
    }

    /// Shut the amplifier down, or bring it back up.
    pub fn set_shutdown(&mut self, shutdown: bool) -> Result<(), Error<T::Error>> {
        self.set_flag(SHUTDOWN_N, !shutdown)
    }

    /// Get the serial audio interface format.
    ///
    /// Undefined bit patterns come back as [`SerialAudioFormat::Reserved`].
    pub fn get_serial_audio_format(&mut self) -> Result<SerialAudioFormat, Error<T::Error>> {
        Ok(SerialAudioFormat::from_bits(self.get_field(AUDIO_FORMAT)?))
    }

    /// Set the serial audio interface format.
    ///
    /// [`SerialAudioFormat::Reserved`] gives [`Error::InvalidArgument`] and
    /// nothing is sent to the chip.
    pub fn set_serial_audio_format(
        &mut self,
        format: SerialAudioFormat,
    ) -> Result<(), Error<T::Error>> {
        let bits = format.bits().ok_or(Error::InvalidArgument)?;
        self.set_field(AUDIO_FORMAT, bits)
    }

    /// Get whether double speed (88.2 / 96 kHz) sample rates are selected.
    pub fn get_double_speed(&mut self) -> Result<bool, Error<T::Error>> {
        self.get_flag(DOUBLE_SPEED)
    }

    /// Select single speed (`false`) or double speed (`true`) sample rates.
    pub fn set_double_speed(&mut self, double_speed: bool) -> Result<(), Error<T::Error>> {
        self.set_flag(DOUBLE_SPEED, double_speed)
    }

    /// Get the digital boost.
    pub fn get_digital_boost(&mut self) -> Result<DigitalBoost, Error<T::Error>> {
        Ok(DigitalBoost::from_bits(self.get_field(DIGITAL_BOOST)?))
    }

    /// Set the digital boost.
    pub fn set_digital_boost(&mut self, boost: DigitalBoost) -> Result<(), Error<T::Error>> {
        self.set_field(DIGITAL_BOOST, boost as u8)
    }

    /// Get whether the high-pass filter is bypassed.
    pub fn get_high_pass_filter_bypass(&mut self) -> Result<bool, Error<T::Error>> {
        self.get_flag(HPF_BYPASS)
    }

    /// Bypass (`true`) or enable (`false`) the high-pass filter.
    pub fn set_high_pass_filter_bypass(&mut self, bypass: bool) -> Result<(), Error<T::Error>> {
        self.set_flag(HPF_BYPASS, bypass)
    }

    /// Get whether the left channel is muted.
    pub fn get_mute_left(&mut self) -> Result<bool, Error<T::Error>> {
        self.get_flag(MUTE_LEFT)
    }

    /// Mute or unmute the left channel.
    pub fn set_mute_left(&mut self, mute: bool) -> Result<(), Error<T::Error>> {
        self.set_flag(MUTE_LEFT, mute)
    }

    /// Get whether the right channel is muted.
    pub fn get_mute_right(&mut self) -> Result<bool, Error<T::Error>> {
        self.get_flag(MUTE_RIGHT)
    }

    /// Mute or unmute the right channel.
    pub fn set_mute_right(&mut self, mute: bool) -> Result<(), Error<T::Error>> {
        self.set_flag(MUTE_RIGHT, mute)
    }

    /// Get the mute state of both channels, as `(left, right)`.
    pub fn get_mute(&mut self) -> Result<(bool, bool), Error<T::Error>> {
        let raw = self.read_register(Register::VolumeControlConfiguration)?;
        Ok((MUTE_LEFT.extract(raw) != 0, MUTE_RIGHT.extract(raw) != 0))
    }

    /// Mute or unmute both channels.
    ///
    /// The left channel is set first. If setting the right channel fails, the
    /// left channel keeps its new state.
    pub fn set_mute(&mut self, mute: bool) -> Result<(), Error<T::Error>> {
        self.set_mute_left(mute)?;
        self.set_mute_right(mute)
    }

    /// Get whether volume changes fade.
    pub fn get_fade(&mut self) -> Result<bool, Error<T::Error>> {
        self.get_flag(FADE)
    }

    /// Make volume changes fade (`true`) or step (`false`).
    pub fn set_fade(&mut self, fade: bool) -> Result<(), Error<T::Error>> {
        self.set_flag(FADE, fade)
    }

    /// Read the volume of both channels, as `(left, right)`.
    pub fn get_volume(&mut self) -> Result<(u8, u8), Error<T::Error>> {
        let left = self.get_field(VOLUME_LEFT)?;
        let right = self.get_field(VOLUME_RIGHT)?;
        self.last_volume = Some((left, right));
        Ok((left, right))
    }

    /// Set both channels to the same volume.
    pub fn set_volume(&mut self, volume: u8) -> Result<(), Error<T::Error>> {
        self.set_volume_channels(volume, volume)
    }

    /// Set the left and right channel volumes.
    ///
    /// The left register is written first. If the right one then fails, the
    /// left channel keeps its new volume.
    pub fn set_volume_channels(&mut self, left: u8, right: u8) -> Result<(), Error<T::Error>> {
        self.last_volume = None;
        self.set_field(VOLUME_LEFT, left)?;
        self.set_field(VOLUME_RIGHT, right)?;
        self.last_volume = Some((left, right));
        Ok(())
    }

    /// The volume as last read or written through this object, if known.
    ///
    /// This does not touch the bus and may be stale.
    pub fn get_last_volume(&self) -> Option<(u8, u8)> {
        self.last_volume
    }

    /// Get which channel of the serial audio stream is played.
    pub fn get_channel_selection(&mut self) -> Result<ChannelSelection, Error<T::Error>> {
        Ok(ChannelSelection::from_bits(self.get_field(CHANNEL_SELECTION)?))
    }

    /// Choose which channel of the serial audio stream is played.
    pub fn set_channel_selection(
        &mut self,
        channel: ChannelSelection,
    ) -> Result<(), Error<T::Error>> {
        self.set_field(CHANNEL_SELECTION, channel as u8)
    }

    /// Get the analog gain.
    ///
    /// An undefined bit pattern comes back as [`AnalogGain::Reserved`].
    pub fn get_analog_gain(&mut self) -> Result<AnalogGain, Error<T::Error>> {
        Ok(AnalogGain::from_bits(self.get_field(ANALOG_GAIN)?))
    }

    /// Set the analog gain.
    ///
    /// [`AnalogGain::Reserved`] gives [`Error::InvalidArgument`] and nothing
    /// is sent to the chip.
    pub fn set_analog_gain(&mut self, gain: AnalogGain) -> Result<(), Error<T::Error>> {
        let bits = gain.bits().ok_or(Error::InvalidArgument)?;
        self.set_field(ANALOG_GAIN, bits)
    }

    /// Get the PWM switching rate.
    pub fn get_pwm_rate(&mut self) -> Result<PwmRate, Error<T::Error>> {
        Ok(PwmRate::from_bits(self.get_field(PWM_RATE)?))
    }

    /// Set the PWM switching rate.
    pub fn set_pwm_rate(&mut self, rate: PwmRate) -> Result<(), Error<T::Error>> {
        self.set_field(PWM_RATE, rate as u8)
    }

    /// Read all the error flags at once.
    pub fn get_fault_status(&mut self) -> Result<FaultStatus, Error<T::Error>> {
        Ok(FaultStatus::from(
            self.read_register(Register::FaultConfigurationErrorStatus)?,
        ))
    }

    /// Get the over-temperature error flag.
    pub fn get_over_temperature_error(&mut self) -> Result<bool, Error<T::Error>> {
        self.get_flag(OVER_TEMPERATURE_ERROR)
    }

    /// Get the output DC error flag.
    pub fn get_output_dc_error(&mut self) -> Result<bool, Error<T::Error>> {
        self.get_flag(OUTPUT_DC_ERROR)
    }

    /// Get the over-current error flag.
    pub fn get_over_current_error(&mut self) -> Result<bool, Error<T::Error>> {
        self.get_flag(OVER_CURRENT_ERROR)
    }

    /// Get the clock error flag.
    pub fn get_clock_error(&mut self) -> Result<bool, Error<T::Error>> {
        self.get_flag(CLOCK_ERROR)
    }

    /// True if any error flag is set.
    pub fn get_any_fault(&mut self) -> Result<bool, Error<T::Error>> {
        self.get_flag(ANY_FAULT)
    }

    /// Get the over-current threshold.
    pub fn get_oce_threshold(&mut self) -> Result<OceThreshold, Error<T::Error>> {
        Ok(OceThreshold::from_bits(self.get_field(OCE_THRESHOLD)?))
    }

    /// Set the over-current threshold.
    pub fn set_oce_threshold(&mut self, threshold: OceThreshold) -> Result<(), Error<T::Error>> {
        self.set_field(OCE_THRESHOLD, threshold as u8)
    }

    /// Read the 20-bit digital clipper level.
    ///
    /// The level is spread over three registers; if any of them cannot be
    /// read, the whole read fails.
    pub fn get_digital_clipper(&mut self) -> Result<u32, Error<T::Error>> {
        let low = self.get_field(CLIPPER_LOW)? as u32;
        let mid = self.get_field(CLIPPER_MID)? as u32;
        let high = self.get_field(CLIPPER_HIGH)? as u32;
        Ok(low | (mid << 6) | (high << 14))
    }

    /// Set the 20-bit digital clipper level.
    ///
    /// Levels above [`DIGITAL_CLIPPER_MAX`] give [`Error::InvalidArgument`]
    /// and nothing is sent to the chip.
    ///
    /// Three registers are written in turn (Digital Clipper 1, Digital Clipper
    /// 2, then Power Control) and there is no way to undo the earlier ones. A
    /// failure after the first write gives [`Error::PartialWrite`], and the
    /// chip then holds a mix of the old and new levels.
    pub fn set_digital_clipper(&mut self, level: u32) -> Result<(), Error<T::Error>> {
        if level > DIGITAL_CLIPPER_MAX {
            #[cfg(feature = "defmt")]
            defmt::warn!("TAS5720 clipper level 0x{:x} out of range", level);
            return Err(Error::InvalidArgument);
        }
        let low = (level & 0x3F) as u8;
        let mid = ((level >> 6) & 0xFF) as u8;
        let high = ((level >> 14) & 0x3F) as u8;

        let state = self.clipper_step(ClipperWriteState::NotStarted, CLIPPER_LOW, low)?;
        let state = self.clipper_step(state, CLIPPER_MID, mid)?;
        self.clipper_step(state, CLIPPER_HIGH, high)?;
        Ok(())
    }

    /// Write one clipper fragment, moving on from `state`.
    fn clipper_step(
        &mut self,
        state: ClipperWriteState,
        field: Field,
        value: u8,
    ) -> Result<ClipperWriteState, Error<T::Error>> {
        match self.update_field(field, value) {
            Ok(()) => Ok(state.next()),
            Err(source) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("TAS5720 clipper write failed in {}", state);
                Err(state.failure(source))
            }
        }
    }
}

//
// impls on Private Types
//

// None

//
// Tests
//

#[cfg(test)]
mod tests {
    use super::*;

    /// The register file of a pretend TAS5720, with optional faults.
    struct FakeChip {
        registers: [u8; 0x20],
        fail_read: Option<u8>,
        fail_write: Option<u8>,
        write_budget: Option<usize>,
        writes: usize,
    }

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    struct Nak;

    impl FakeChip {
        fn new() -> FakeChip {
            FakeChip {
                registers: [0; 0x20],
                fail_read: None,
                fail_write: None,
                write_budget: None,
                writes: 0,
            }
        }

        fn with(register: Register, value: u8) -> FakeChip {
            let mut chip = FakeChip::new();
            chip.registers[register as usize] = value;
            chip
        }
    }

    impl RegisterTransport for FakeChip {
        type Error = Nak;

        fn write_register(&mut self, register: u8, value: u8) -> Result<(), Nak> {
            if self.fail_write == Some(register) || self.write_budget == Some(self.writes) {
                return Err(Nak);
            }
            self.writes += 1;
            self.registers[register as usize] = value;
            Ok(())
        }

        fn read_register(&mut self, register: u8) -> Result<u8, Nak> {
            if self.fail_read == Some(register) {
                return Err(Nak);
            }
            Ok(self.registers[register as usize])
        }
    }

    fn raw(amp: &Amplifier<FakeChip>, register: Register) -> u8 {
        amp.transport.registers[register as usize]
    }

    type Get = fn(&mut Amplifier<FakeChip>) -> Result<bool, Error<Nak>>;
    type Set = fn(&mut Amplifier<FakeChip>, bool) -> Result<(), Error<Nak>>;

    #[test]
    fn boolean_fields_round_trip_without_touching_neighbours() {
        let cases: [(Get, Set, Field, bool); 7] = [
            (Amplifier::get_sleep_mode, Amplifier::set_sleep_mode, SLEEP, false),
            (Amplifier::get_shutdown, Amplifier::set_shutdown, SHUTDOWN_N, true),
            (Amplifier::get_mute_left, Amplifier::set_mute_left, MUTE_LEFT, false),
            (Amplifier::get_mute_right, Amplifier::set_mute_right, MUTE_RIGHT, false),
            (Amplifier::get_fade, Amplifier::set_fade, FADE, false),
            (
                Amplifier::get_high_pass_filter_bypass,
                Amplifier::set_high_pass_filter_bypass,
                HPF_BYPASS,
                false,
            ),
            (Amplifier::get_double_speed, Amplifier::set_double_speed, DOUBLE_SPEED, false),
        ];
        for (get, set, field, inverted) in cases {
            for background in [0x00u8, 0xFF, 0b1010_0101, 0b0101_1010] {
                for value in [true, false] {
                    let mut amp = Amplifier::new(FakeChip::with(field.register, background));
                    set(&mut amp, value).unwrap();
                    assert_eq!(get(&mut amp), Ok(value), "{:?}", field);

                    let after = raw(&amp, field.register);
                    let expected_bit = if value != inverted { field.mask() } else { 0 };
                    assert_eq!(after & field.mask(), expected_bit, "{:?}", field);
                    assert_eq!(
                        after & !field.mask(),
                        background & !field.mask(),
                        "{:?} disturbed other bits",
                        field
                    );
                }
            }
        }
    }

    #[test]
    fn shutdown_is_active_low() {
        let mut amp = Amplifier::new(FakeChip::with(Register::PowerControl, 0b0000_0001));
        assert_eq!(amp.get_shutdown(), Ok(false));
        amp.set_shutdown(true).unwrap();
        assert_eq!(raw(&amp, Register::PowerControl), 0);
        amp.set_shutdown(false).unwrap();
        assert_eq!(raw(&amp, Register::PowerControl), 1);
    }

    #[test]
    fn serial_audio_format_round_trips() {
        let mut amp = Amplifier::new(FakeChip::with(Register::DigitalControl, 0b1011_1000));
        for format in [
            SerialAudioFormat::RightJustified24,
            SerialAudioFormat::RightJustified20,
            SerialAudioFormat::RightJustified18,
            SerialAudioFormat::RightJustified16,
            SerialAudioFormat::I2s,
            SerialAudioFormat::LeftJustified16To24,
        ] {
            amp.set_serial_audio_format(format).unwrap();
            assert_eq!(amp.get_serial_audio_format(), Ok(format));
            assert_eq!(raw(&amp, Register::DigitalControl) & 0xF8, 0b1011_1000);
        }
    }

    #[test]
    fn undefined_patterns_come_back_as_reserved() {
        let mut amp = Amplifier::new(FakeChip::with(Register::DigitalControl, 0b0000_0111));
        assert_eq!(amp.get_serial_audio_format(), Ok(SerialAudioFormat::Reserved(7)));

        let mut amp = Amplifier::new(FakeChip::with(Register::AnalogControl, 0b1000_1100));
        assert_eq!(amp.get_analog_gain(), Ok(AnalogGain::Reserved(3)));
    }

    #[test]
    fn digital_boost_round_trips() {
        let mut amp = Amplifier::new(FakeChip::with(Register::DigitalControl, 0b1000_1100));
        for boost in [
            DigitalBoost::Boost0Db,
            DigitalBoost::Boost6Db,
            DigitalBoost::Boost12Db,
            DigitalBoost::Boost18Db,
        ] {
            amp.set_digital_boost(boost).unwrap();
            assert_eq!(amp.get_digital_boost(), Ok(boost));
            assert_eq!(raw(&amp, Register::DigitalControl) & 0xCF, 0b1000_1100);
        }
    }

    #[test]
    fn analog_control_fields_round_trip() {
        let mut amp = Amplifier::new(FakeChip::new());
        for channel in [ChannelSelection::Left, ChannelSelection::Right] {
            amp.set_channel_selection(channel).unwrap();
            assert_eq!(amp.get_channel_selection(), Ok(channel));
        }
        for gain in [
            AnalogGain::Gain19_2Dbv,
            AnalogGain::Gain22_6Dbv,
            AnalogGain::Gain25Dbv,
        ] {
            amp.set_analog_gain(gain).unwrap();
            assert_eq!(amp.get_analog_gain(), Ok(gain));
        }
        for rate in [
            PwmRate::Lrck6,
            PwmRate::Lrck8,
            PwmRate::Lrck10,
            PwmRate::Lrck12,
            PwmRate::Lrck14,
            PwmRate::Lrck16,
            PwmRate::Lrck20,
            PwmRate::Lrck24,
        ] {
            amp.set_pwm_rate(rate).unwrap();
            assert_eq!(amp.get_pwm_rate(), Ok(rate));
        }
        // The last of each survived the later writes
        assert_eq!(amp.get_channel_selection(), Ok(ChannelSelection::Right));
        assert_eq!(amp.get_analog_gain(), Ok(AnalogGain::Gain25Dbv));
    }

    #[test]
    fn analog_control_top_bit_always_written() {
        let setters: [fn(&mut Amplifier<FakeChip>) -> Result<(), Error<Nak>>; 3] = [
            |amp| amp.set_channel_selection(ChannelSelection::Right),
            |amp| amp.set_analog_gain(AnalogGain::Gain19_2Dbv),
            |amp| amp.set_pwm_rate(PwmRate::Lrck6),
        ];
        for set in setters {
            let mut amp = Amplifier::new(FakeChip::with(Register::AnalogControl, 0x00));
            set(&mut amp).unwrap();
            assert_eq!(raw(&amp, Register::AnalogControl), 0x80);
        }
    }

    #[test]
    fn oce_threshold_leaves_fault_bits_alone() {
        let mut amp = Amplifier::new(FakeChip::with(
            Register::FaultConfigurationErrorStatus,
            0b0000_0101,
        ));
        for threshold in [
            OceThreshold::Default,
            OceThreshold::Reduced75Percent,
            OceThreshold::Reduced50Percent,
            OceThreshold::Reduced25Percent,
        ] {
            amp.set_oce_threshold(threshold).unwrap();
            assert_eq!(amp.get_oce_threshold(), Ok(threshold));
            assert_eq!(
                raw(&amp, Register::FaultConfigurationErrorStatus) & 0x0F,
                0b0101
            );
        }
    }

    #[test]
    fn fault_flags() {
        let status = FaultStatus::from(0b0000_0101);
        assert!(status.over_temperature());
        assert!(!status.output_dc());
        assert!(status.over_current());
        assert!(!status.clock_error());
        assert!(status.any());

        let status = FaultStatus::from(0b1111_0000);
        assert!(!status.over_temperature());
        assert!(!status.any());

        let mut amp = Amplifier::new(FakeChip::with(
            Register::FaultConfigurationErrorStatus,
            0b0011_1010,
        ));
        assert_eq!(amp.get_over_temperature_error(), Ok(false));
        assert_eq!(amp.get_output_dc_error(), Ok(true));
        assert_eq!(amp.get_over_current_error(), Ok(false));
        assert_eq!(amp.get_clock_error(), Ok(true));
        assert_eq!(amp.get_any_fault(), Ok(true));
        assert_eq!(amp.get_fault_status(), Ok(FaultStatus::from(0b0011_1010)));

        let mut amp = Amplifier::new(FakeChip::with(
            Register::FaultConfigurationErrorStatus,
            0b1111_0000,
        ));
        assert_eq!(amp.get_any_fault(), Ok(false));
    }

    #[test]
    fn volume() {
        let mut amp = Amplifier::new(FakeChip::new());
        assert_eq!(amp.get_last_volume(), None);

        amp.set_volume_channels(10, 20).unwrap();
        assert_eq!(amp.get_volume(), Ok((10, 20)));

        amp.set_volume(50).unwrap();
        assert_eq!(amp.get_volume(), Ok((50, 50)));
        assert_eq!(amp.get_last_volume(), Some((50, 50)));
    }

    #[test]
    fn failed_volume_write_forgets_cache() {
        let mut amp = Amplifier::new(FakeChip::new());
        amp.set_volume(50).unwrap();
        amp.transport.fail_write = Some(Register::VolumeRight.addr());
        assert_eq!(amp.set_volume(60), Err(Error::Bus(Nak)));
        assert_eq!(amp.get_last_volume(), None);
    }

    #[test]
    fn volume_right_failure_keeps_left() {
        let mut chip = FakeChip::new();
        chip.fail_write = Some(Register::VolumeRight.addr());
        let mut amp = Amplifier::new(chip);

        assert_eq!(amp.set_volume_channels(10, 20), Err(Error::Bus(Nak)));
        assert_eq!(raw(&amp, Register::VolumeLeft), 10);
        assert_eq!(raw(&amp, Register::VolumeRight), 0);
        assert_eq!(amp.get_volume(), Ok((10, 0)));
    }

    #[test]
    fn mute_right_failure_keeps_left() {
        let mut chip = FakeChip::new();
        chip.write_budget = Some(1);
        let mut amp = Amplifier::new(chip);

        assert_eq!(amp.set_mute(true), Err(Error::Bus(Nak)));
        assert_eq!(amp.get_mute(), Ok((true, false)));
    }

    #[test]
    fn reserved_patterns_are_not_written() {
        let mut amp = Amplifier::new(FakeChip::with(Register::DigitalControl, 0b1000_0100));
        assert_eq!(
            amp.set_serial_audio_format(SerialAudioFormat::Reserved(9)),
            Err(Error::InvalidArgument)
        );
        assert_eq!(
            amp.set_serial_audio_format(SerialAudioFormat::Reserved(6)),
            Err(Error::InvalidArgument)
        );
        assert_eq!(amp.get_serial_audio_format(), Ok(SerialAudioFormat::I2s));
        assert_eq!(amp.transport.writes, 0);

        let mut amp = Amplifier::new(FakeChip::with(Register::AnalogControl, 0b1000_0100));
        assert_eq!(
            amp.set_analog_gain(AnalogGain::Reserved(6)),
            Err(Error::InvalidArgument)
        );
        assert_eq!(
            amp.set_analog_gain(AnalogGain::Reserved(3)),
            Err(Error::InvalidArgument)
        );
        assert_eq!(amp.get_analog_gain(), Ok(AnalogGain::Gain22_6Dbv));
        assert_eq!(amp.transport.writes, 0);
    }

    #[test]
    fn clipper_states_advance_to_complete() {
        let mut state = ClipperWriteState::NotStarted;
        for expected in [
            ClipperWriteState::Byte1Written,
            ClipperWriteState::Byte2Written,
            ClipperWriteState::Complete,
            ClipperWriteState::Complete,
        ] {
            state = state.next();
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn set_mute_covers_both_channels() {
        let mut amp = Amplifier::new(FakeChip::with(
            Register::VolumeControlConfiguration,
            0b1000_0000,
        ));
        amp.set_mute(true).unwrap();
        assert_eq!(amp.get_mute(), Ok((true, true)));
        assert_eq!(raw(&amp, Register::VolumeControlConfiguration), 0b1000_0011);
        amp.set_mute(false).unwrap();
        assert_eq!(amp.get_mute(), Ok((false, false)));
        assert_eq!(amp.get_fade(), Ok(true));
    }

    #[test]
    fn clipper_round_trips() {
        for level in [0, 1, 0x3FFFF, 0xFFFFF] {
            let mut chip = FakeChip::new();
            chip.registers[Register::PowerControl as usize] = 0b0000_0011;
            chip.registers[Register::DigitalClipper1 as usize] = 0b0000_0010;
            let mut amp = Amplifier::new(chip);

            amp.set_digital_clipper(level).unwrap();
            assert_eq!(amp.get_digital_clipper(), Ok(level));
            assert_eq!(raw(&amp, Register::PowerControl) & 0x03, 0b11);
            assert_eq!(raw(&amp, Register::DigitalClipper1) & 0x03, 0b10);
        }
    }

    #[test]
    fn clipper_fragment_placement() {
        let mut amp = Amplifier::new(FakeChip::new());
        // high = 0b101010, mid = 0b11001100, low = 0b010101
        amp.set_digital_clipper(0b101010_11001100_010101).unwrap();
        assert_eq!(raw(&amp, Register::DigitalClipper1), 0b010101_00);
        assert_eq!(raw(&amp, Register::DigitalClipper2), 0b11001100);
        assert_eq!(raw(&amp, Register::PowerControl), 0b101010_00);
    }

    #[test]
    fn clipper_out_of_range_touches_nothing() {
        let mut amp = Amplifier::new(FakeChip::new());
        amp.set_digital_clipper(0x12345).unwrap();
        let writes = amp.transport.writes;

        assert_eq!(amp.set_digital_clipper(0x100000), Err(Error::InvalidArgument));
        assert_eq!(amp.transport.writes, writes);
        assert_eq!(amp.get_digital_clipper(), Ok(0x12345));
    }

    #[test]
    fn clipper_read_failure_fails_whole_read() {
        for register in [
            Register::DigitalClipper1,
            Register::DigitalClipper2,
            Register::PowerControl,
        ] {
            let mut chip = FakeChip::new();
            chip.fail_read = Some(register.addr());
            let mut amp = Amplifier::new(chip);
            assert_eq!(amp.get_digital_clipper(), Err(Error::Bus(Nak)));
        }
    }

    #[test]
    fn clipper_partial_write_reports_progress() {
        let cases = [
            (None, Some(Register::DigitalClipper1), Error::Bus(Nak)),
            (Some(Register::DigitalClipper1), None, Error::Bus(Nak)),
            (
                None,
                Some(Register::DigitalClipper2),
                Error::PartialWrite {
                    reached: ClipperWriteState::Byte1Written,
                    source: Nak,
                },
            ),
            (
                Some(Register::PowerControl),
                None,
                Error::PartialWrite {
                    reached: ClipperWriteState::Byte2Written,
                    source: Nak,
                },
            ),
            (
                None,
                Some(Register::PowerControl),
                Error::PartialWrite {
                    reached: ClipperWriteState::Byte2Written,
                    source: Nak,
                },
            ),
        ];
        for (fail_read, fail_write, expected) in cases {
            let mut chip = FakeChip::new();
            chip.fail_read = fail_read.map(Register::addr);
            chip.fail_write = fail_write.map(Register::addr);
            let mut amp = Amplifier::new(chip);
            assert_eq!(amp.set_digital_clipper(0xFFFFF), Err(expected));
        }
    }

    #[test]
    fn read_failure_does_not_write() {
        let mut chip = FakeChip::with(Register::DigitalControl, 0xFF);
        chip.fail_read = Some(Register::DigitalControl.addr());
        let mut amp = Amplifier::new(chip);
        assert_eq!(amp.set_digital_boost(DigitalBoost::Boost0Db), Err(Error::Bus(Nak)));
        assert_eq!(amp.transport.writes, 0);
        assert_eq!(raw(&amp, Register::DigitalControl), 0xFF);
    }

    #[test]
    fn device_identification() {
        let mut amp = Amplifier::new(FakeChip::with(Register::DeviceIdentification, 0x01));
        assert_eq!(amp.get_device_identification(), Ok(0x01));
    }
}


//
// End of file
//
