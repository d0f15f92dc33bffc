// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;

/// An 8-bit RGB color, as stored in colormap tables and rendered frames.
///
/// This type can be formatted as a hex code using the standard formatting syntax. The formatted
/// output will have a leading '#'.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Color {
    red: u8,
    green: u8,
    blue: u8,
}

impl Color {
    pub(crate) const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    #[cfg(test)]
    pub(crate) fn red(&self) -> u8 {
        self.red
    }

    #[cfg(test)]
    pub(crate) fn green(&self) -> u8 {
        self.green
    }

    #[cfg(test)]
    pub(crate) fn blue(&self) -> u8 {
        self.blue
    }

    pub(crate) fn as_array(&self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }
}

impl From<[u8; 3]> for Color {
    fn from(channels: [u8; 3]) -> Self {
        Self::new(channels[0], channels[1], channels[2])
    }
}

impl From<&image::Rgb<u8>> for Color {
    fn from(pixel: &image::Rgb<u8>) -> Self {
        Self::new(pixel[0], pixel[1], pixel[2])
    }
}

impl fmt::LowerHex for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

#[cfg(test)]
mod test {
    use super::Color;

    #[test]
    fn new_order() {
        let c = Color::new(25, 125, 225);
        assert_eq!(c.red(), 25);
        assert_eq!(c.green(), 125);
        assert_eq!(c.blue(), 225);
        assert_eq!(c.as_array(), [25, 125, 225]);
    }

    #[test]
    fn hex() {
        assert_eq!(format!("{:x}", Color::new(0xfc, 0xf4, 0x34)), "#fcf434");
        assert_eq!(format!("{:x}", Color::new(0, 0, 0)), "#000000");
    }
}
