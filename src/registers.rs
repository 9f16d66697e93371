//! # TAS5720 Register Map
//!
//! Where every setting lives on the chip. Each logical setting is a [`Field`]
//! - a run of bits inside one [`Register`] - and all of the bit algebra for
//! reading and merging fields lives here.

//
// Public Types
//

/// The registers in the TAS5720 that this driver knows about.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Device Identification (read-only)
    DeviceIdentification = 0x00,
    /// Power Control. Also holds bits [19:14] of the digital clipper.
    PowerControl = 0x01,
    /// Digital Control
    DigitalControl = 0x02,
    /// Volume Control Configuration
    VolumeControlConfiguration = 0x03,
    /// Left channel volume
    VolumeLeft = 0x04,
    /// Right channel volume
    VolumeRight = 0x05,
    /// Analog Control
    AnalogControl = 0x06,
    /// Fault Configuration and Error Status
    FaultConfigurationErrorStatus = 0x08,
    /// Digital Clipper 2 - bits [13:6] of the digital clipper
    DigitalClipper2 = 0x10,
    /// Digital Clipper 1 - bits [5:0] of the digital clipper, in bits [7:2]
    DigitalClipper1 = 0x11,
}

/// A contiguous run of bits within a single register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Field {
    /// The register the bits live in
    pub register: Register,
    /// Position of the least significant bit of the field
    pub offset: u8,
    /// Number of bits in the field
    pub width: u8,
}

//
// Public Data
//

/// Power Control: 0 means shut down, 1 means running.
pub const SHUTDOWN_N: Field = Field::new(Register::PowerControl, 0, 1);
/// Power Control: sleep mode
pub const SLEEP: Field = Field::new(Register::PowerControl, 1, 1);
/// Power Control: digital clipper bits [19:14]
pub const CLIPPER_HIGH: Field = Field::new(Register::PowerControl, 2, 6);

/// Digital Control: serial audio interface format
pub const AUDIO_FORMAT: Field = Field::new(Register::DigitalControl, 0, 3);
/// Digital Control: double speed sample rate
pub const DOUBLE_SPEED: Field = Field::new(Register::DigitalControl, 3, 1);
/// Digital Control: digital boost
pub const DIGITAL_BOOST: Field = Field::new(Register::DigitalControl, 4, 2);
/// Digital Control: high-pass filter bypass
pub const HPF_BYPASS: Field = Field::new(Register::DigitalControl, 7, 1);

/// Volume Control Configuration: left channel mute
pub const MUTE_LEFT: Field = Field::new(Register::VolumeControlConfiguration, 0, 1);
/// Volume Control Configuration: right channel mute
pub const MUTE_RIGHT: Field = Field::new(Register::VolumeControlConfiguration, 1, 1);
/// Volume Control Configuration: fade on volume changes
pub const FADE: Field = Field::new(Register::VolumeControlConfiguration, 7, 1);

/// Left channel volume (whole register)
pub const VOLUME_LEFT: Field = Field::new(Register::VolumeLeft, 0, 8);
/// Right channel volume (whole register)
pub const VOLUME_RIGHT: Field = Field::new(Register::VolumeRight, 0, 8);

/// Analog Control: which channel of the serial audio stream is played
pub const CHANNEL_SELECTION: Field = Field::new(Register::AnalogControl, 1, 1);
/// Analog Control: analog gain
pub const ANALOG_GAIN: Field = Field::new(Register::AnalogControl, 2, 2);
/// Analog Control: PWM switching rate
pub const PWM_RATE: Field = Field::new(Register::AnalogControl, 4, 3);

/// Error Status: over-temperature
pub const OVER_TEMPERATURE_ERROR: Field =
    Field::new(Register::FaultConfigurationErrorStatus, 0, 1);
/// Error Status: output DC offset
pub const OUTPUT_DC_ERROR: Field = Field::new(Register::FaultConfigurationErrorStatus, 1, 1);
/// Error Status: over-current
pub const OVER_CURRENT_ERROR: Field = Field::new(Register::FaultConfigurationErrorStatus, 2, 1);
/// Error Status: clock error
pub const CLOCK_ERROR: Field = Field::new(Register::FaultConfigurationErrorStatus, 3, 1);
/// Error Status: all four error flags together
pub const ANY_FAULT: Field = Field::new(Register::FaultConfigurationErrorStatus, 0, 4);
/// Fault Configuration: over-current threshold
pub const OCE_THRESHOLD: Field = Field::new(Register::FaultConfigurationErrorStatus, 4, 2);

/// Digital Clipper 1: clipper bits [5:0]
pub const CLIPPER_LOW: Field = Field::new(Register::DigitalClipper1, 2, 6);
/// Digital Clipper 2: clipper bits [13:6]
pub const CLIPPER_MID: Field = Field::new(Register::DigitalClipper2, 0, 8);

//
// impls on Public Types
//

impl Register {
    /// The register's address on the device
    pub const fn addr(self) -> u8 {
        self as u8
    }

    /// Bits which must be set on every write to this register.
    ///
    /// Bit 7 of Analog Control is reserved and the datasheet requires it to
    /// be written as 1.
    pub const fn forced_bits(self) -> u8 {
        match self {
            Register::AnalogControl => 1 << 7,
            _ => 0,
        }
    }
}

impl From<Register> for u8 {
    fn from(register: Register) -> u8 {
        register.addr()
    }
}

impl Field {
    /// Describe `width` bits starting at bit `offset` of `register`.
    pub const fn new(register: Register, offset: u8, width: u8) -> Field {
        Field {
            register,
            offset,
            width,
        }
    }

    /// The field's bits, in register position.
    pub const fn mask(&self) -> u8 {
        (((1u16 << self.width) - 1) << self.offset) as u8
    }

    /// Does this field occupy every bit of its register?
    pub const fn is_whole_register(&self) -> bool {
        self.mask() == 0xFF
    }

    /// Pull this field out of a raw register value, shifted down to bit 0.
    pub const fn extract(&self, raw: u8) -> u8 {
        (raw & self.mask()) >> self.offset
    }

    /// Replace this field within a raw register value.
    ///
    /// Bits outside the field are untouched. Bits of `value` that do not fit
    /// in the field are dropped.
    pub const fn insert(&self, raw: u8, value: u8) -> u8 {
        let value = ((value as u16) << self.offset) as u8;
        (raw & !self.mask()) | (value & self.mask())
    }
}

//
// Tests
//


//
// End of file
//
