use super::color::{clamp_channel, clamp_rgb, Channel, Rgb};

/// Доминирование одного канала в агрегированном цвете.
///
/// Цвет подходит, если выбранный канал не ниже `min_level`, остальные каналы не выше
/// своих потолков и выбранный канал превосходит каждый из них хотя бы на `dominance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DominanceDetector {
    channel: Channel,
    min_level: u8,
    max_rgb: Rgb,
    dominance: u8,
}

impl DominanceDetector {
    pub fn new(channel: Channel, min_level: u8, max_rgb: Rgb, dominance: u8) -> Self {
        Self {
            channel,
            min_level,
            max_rgb,
            dominance,
        }
    }

    pub fn from_settings(channel: Channel, min_level: i32, max_rgb: [i32; 3], dominance: i32) -> Self {
        Self::new(
            channel,
            clamp_channel(min_level),
            clamp_rgb(max_rgb),
            clamp_channel(dominance),
        )
    }

    /// Классический детектор синего
    pub fn blue(min_blue: u8, max_red: u8, max_green: u8, dominance: u8) -> Self {
        Self::new(Channel::Blue, min_blue, Rgb::new(max_red, max_green, 255), dominance)
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn name(&self) -> String {
        format!("Dominance {}", self.channel)
    }

    pub fn detect(&self, color: Rgb) -> bool {
        let primary = color.channel(self.channel) as u16;
        if primary < self.min_level as u16 {
            return false;
        }

        self.channel.others().iter().all(|&other| {
            let value = color.channel(other) as u16;
            value <= self.max_rgb.channel(other) as u16 && primary >= value + self.dominance as u16
        })
    }
}
