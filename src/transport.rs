//! # Register Transport
//!
//! Moves single bytes in and out of TAS5720 registers. The [`Amplifier`]
//! only needs [`RegisterTransport`]; [`I2cTransport`] provides it on top of
//! any `embedded-hal` blocking I²C bus.
//!
//! [`Amplifier`]: crate::Amplifier

use embedded_hal::blocking::i2c::{SevenBitAddress, Write, WriteRead};

//
// Public Types
//

/// Something that can read and write single-byte registers on a TAS5720.
///
/// Implementations must report every failure. A failed read must never be
/// turned into a made-up value, as the caller may merge it into a
/// read-modify-write.
pub trait RegisterTransport {
    /// The error reported when the bus transaction fails.
    type Error;

    /// Write `value` into the register at address `register`.
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error>;

    /// Read back the register at address `register`.
    fn read_register(&mut self, register: u8) -> Result<u8, Self::Error>;
}

/// Talks to a TAS5720 over I²C.
pub struct I2cTransport<I2C> {
    i2c: I2C,
    bus_address: SevenBitAddress,
}

//
// Public Data
//

/// The I²C address of the TAS5720 in its usual strapping.
pub const DEFAULT_BUS_ADDRESS: SevenBitAddress = 0x6D;

//
// impls on Public Types
//

impl<I2C> I2cTransport<I2C> {
    /// Wrap an I²C bus, talking to the TAS5720 at `bus_address`.
    pub fn new(i2c: I2C, bus_address: SevenBitAddress) -> I2cTransport<I2C> {
        I2cTransport { i2c, bus_address }
    }

    /// The I²C address we talk to.
    pub fn bus_address(&self) -> SevenBitAddress {
        self.bus_address
    }

    /// Give back the I²C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, E> RegisterTransport for I2cTransport<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    type Error = E;

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), E> {
        let buffer = [register, value];
        match self.i2c.write(self.bus_address, &buffer) {
            Ok(()) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Setting TAS5720 0x{:02x} to 0x{:02x}", register, value);
                Ok(())
            }
            Err(e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "Failed setting TAS5720 0x{:02x} to 0x{:02x}",
                    register,
                    value
                );
                Err(e)
            }
        }
    }

    fn read_register(&mut self, register: u8) -> Result<u8, E> {
        let mut buffer = [0u8; 1];
        match self.i2c.write_read(self.bus_address, &[register], &mut buffer) {
            Ok(()) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Read TAS5720 0x{:02x} as 0x{:02x}", register, buffer[0]);
                Ok(buffer[0])
            }
            Err(e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Failed reading TAS5720 0x{:02x}", register);
                Err(e)
            }
        }
    }
}

//
// Tests
//


//
// End of file
//
