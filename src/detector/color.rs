use serde::{Deserialize, Serialize};
use std::fmt;

/// Цветовой канал
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    /// Два оставшихся канала в порядке RGB
    pub fn others(self) -> [Channel; 2] {
        match self {
            Channel::Red => [Channel::Green, Channel::Blue],
            Channel::Green => [Channel::Red, Channel::Blue],
            Channel::Blue => [Channel::Red, Channel::Green],
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn from_slice(px: &[u8]) -> Self {
        Self::new(px[0], px[1], px[2])
    }

    pub fn channel(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.r,
            Channel::Green => self.g,
            Channel::Blue => self.b,
        }
    }

    pub fn as_array(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Цветной блок для консоли (24-bit ANSI фон)
    pub fn ansi_block(&self, width: usize) -> String {
        format!(
            "\x1b[48;2;{};{};{}m{}\x1b[0m",
            self.r,
            self.g,
            self.b,
            " ".repeat(width)
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:3}, {:3}, {:3})", self.r, self.g, self.b)
    }
}

/// Приведение значения из конфигурации к диапазону канала
pub fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

pub fn clamp_rgb(values: [i32; 3]) -> Rgb {
    Rgb::new(
        clamp_channel(values[0]),
        clamp_channel(values[1]),
        clamp_channel(values[2]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_formatting() {
        assert_eq!(Rgb::new(255, 0, 16).hex(), "#ff0010");
    }

    #[test]
    fn test_ansi_block_contains_color() {
        let block = Rgb::new(1, 2, 3).ansi_block(2);
        assert!(block.starts_with("\x1b[48;2;1;2;3m"));
        assert!(block.ends_with("\x1b[0m"));
    }

    #[test]
    fn test_clamping() {
        assert_eq!(clamp_rgb([-5, 300, 128]), Rgb::new(0, 255, 128));
    }

    #[test]
    fn test_channel_others() {
        assert_eq!(Channel::Blue.others(), [Channel::Red, Channel::Green]);
        assert_eq!(Rgb::new(1, 2, 3).channel(Channel::Green), 2);
    }
}
