//! Классификаторы цвета: кадр (или его средний цвет) → "обнаружено".
//!
//! Детекторы чистые и не имеют состояния между кадрами. Каждый вариант явно
//! объявляет, что ему нужно на входе: весь кадр или только агрегированный цвет.

pub mod color;
mod dominance;
mod range;

pub use color::{Channel, Rgb};
pub use dominance::DominanceDetector;
pub use range::RangeDetector;

use crate::capture::Frame;
use crate::config::DetectorSettings;

/// Какие данные кадра нужны детектору
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorInput {
    FullFrame,
    AggregateColor,
}

/// Результат классификации одного кадра
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub detected: bool,
    pub message: Option<String>,
}

impl Detection {
    pub fn none() -> Self {
        Self::default()
    }

    fn hit(message: String) -> Self {
        Self {
            detected: true,
            message: Some(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Detector {
    Range(RangeDetector),
    Dominance(DominanceDetector),
}

impl Detector {
    pub fn from_settings(settings: &DetectorSettings) -> Self {
        match settings {
            DetectorSettings::Range {
                min_rgb,
                max_rgb,
                min_percent,
            } => Detector::Range(RangeDetector::from_settings(*min_rgb, *max_rgb, *min_percent)),
            DetectorSettings::Dominance {
                channel,
                min_level,
                max_rgb,
                dominance,
            } => Detector::Dominance(DominanceDetector::from_settings(
                *channel, *min_level, *max_rgb, *dominance,
            )),
        }
    }

    pub fn input(&self) -> DetectorInput {
        match self {
            Detector::Range(_) => DetectorInput::FullFrame,
            Detector::Dominance(_) => DetectorInput::AggregateColor,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Detector::Range(detector) => detector.name(),
            Detector::Dominance(detector) => detector.name(),
        }
    }

    /// Классификация кадра; отсутствующий или пустой кадр никогда не даёт срабатывания
    pub fn classify(&self, frame: Option<&Frame>) -> Detection {
        let Some(frame) = frame.filter(|f| !f.is_empty()) else {
            return Detection::none();
        };
        match frame.average_color() {
            Some(average) => self.classify_sample(frame, average),
            None => Detection::none(),
        }
    }

    /// Классификация, когда средний цвет уже посчитан циклом захвата
    pub fn classify_sample(&self, frame: &Frame, average: Rgb) -> Detection {
        match self {
            Detector::Range(detector) => {
                let fraction = detector.matching_fraction(frame);
                if fraction >= detector.min_percent() {
                    Detection::hit(format!(
                        "Обнаружен цвет {} ({:.1}% пикселей)",
                        detector.name(),
                        fraction * 100.0
                    ))
                } else {
                    Detection::none()
                }
            }
            Detector::Dominance(detector) => {
                if detector.detect(average) {
                    Detection::hit(format!(
                        "Канал {} доминирует, RGB: {}",
                        detector.channel(),
                        average
                    ))
                } else {
                    Detection::none()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_frame_is_not_detected() {
        let detector = Detector::Dominance(DominanceDetector::blue(100, 100, 100, 50));
        assert_eq!(detector.classify(None), Detection::none());
    }

    #[test]
    fn dominance_uses_average_color() {
        let detector = Detector::Dominance(DominanceDetector::blue(100, 100, 100, 50));
        assert_eq!(detector.input(), DetectorInput::AggregateColor);

        let frame = Frame::filled(4, 4, Rgb::new(50, 40, 200));
        let detection = detector.classify(Some(&frame));
        assert!(detection.detected);
        assert!(detection.message.unwrap().contains("blue"));
    }

    #[test]
    fn range_uses_full_frame() {
        let detector = Detector::from_settings(&DetectorSettings::default());
        assert_eq!(detector.input(), DetectorInput::FullFrame);

        let mut frame = Frame::filled(10, 10, Rgb::new(0, 0, 0));
        assert!(!detector.classify(Some(&frame)).detected);

        frame.set_pixel(0, 0, Rgb::new(220, 150, 200));
        frame.set_pixel(1, 0, Rgb::new(220, 150, 200));
        assert!(detector.classify(Some(&frame)).detected);
    }

    #[test]
    fn settings_build_the_matching_variant() {
        let settings = DetectorSettings::Dominance {
            channel: Channel::Green,
            min_level: 120,
            max_rgb: [90, 255, 90],
            dominance: 40,
        };
        let detector = Detector::from_settings(&settings);
        assert_eq!(detector.name(), "Dominance green");
    }
}
