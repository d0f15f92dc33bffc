// SPDX-License-Identifier: GPL-3.0-or-later
use linux_embedded_hal::I2cdev;

use i2cdev::linux::LinuxI2CError;
use serde::Deserialize;

use std::convert::{Infallible, TryFrom};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::util::parse_int_decimal_hex;

/// An I2C bus, either as the bus number or as the path to the device file.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum Bus {
    Number(u32),
    Path(String),
}

impl FromStr for Bus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match parse_int_decimal_hex(s) {
            Ok(number) => Self::Number(number),
            Err(_) => Self::Path(s.to_string()),
        })
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "/dev/i2c-{}", n),
            Self::Path(p) => f.write_str(p),
        }
    }
}

impl TryFrom<&Bus> for I2cdev {
    type Error = LinuxI2CError;

    fn try_from(bus: &Bus) -> Result<Self, Self::Error> {
        let device_path = match bus {
            Bus::Number(n) => PathBuf::from(format!("/dev/i2c-{}", n)),
            Bus::Path(p) => PathBuf::from(p),
        };
        I2cdev::new(device_path)
    }
}

#[cfg(test)]
mod test {
    use super::Bus;

    #[test]
    fn bus_num_from_decimal_string() {
        let bus: Result<Bus, _> = "1".parse();
        assert_eq!(bus, Ok(Bus::Number(1)))
    }

    #[test]
    fn bus_num_from_hex_string() {
        let bus: Result<Bus, _> = "0x0a".parse();
        assert_eq!(bus, Ok(Bus::Number(10)))
    }

    #[test]
    fn bus_path_from_string() {
        let bus: Result<Bus, _> = "/dev/i2c-0".parse();
        assert_eq!(bus, Ok(Bus::Path("/dev/i2c-0".to_string())))
    }

    #[test]
    fn display() {
        assert_eq!(Bus::Number(1).to_string(), "/dev/i2c-1");
        assert_eq!(Bus::Path("/dev/i2c-7".to_string()).to_string(), "/dev/i2c-7");
    }
}
