use super::color::{clamp_rgb, Rgb};
use crate::capture::Frame;

/// Доля пикселей кадра, у которых все три канала попадают в `[min_rgb, max_rgb]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeDetector {
    min_rgb: Rgb,
    max_rgb: Rgb,
    min_percent: f64,
}

impl RangeDetector {
    pub fn new(min_rgb: Rgb, max_rgb: Rgb, min_percent: f64) -> Self {
        let min_percent = if min_percent.is_nan() {
            f64::MIN_POSITIVE
        } else {
            min_percent.clamp(f64::MIN_POSITIVE, 1.0)
        };
        Self {
            min_rgb,
            max_rgb,
            min_percent,
        }
    }

    /// Значения из конфигурации, вне диапазона обрезаются
    pub fn from_settings(min_rgb: [i32; 3], max_rgb: [i32; 3], min_percent: f64) -> Self {
        Self::new(clamp_rgb(min_rgb), clamp_rgb(max_rgb), min_percent)
    }

    pub fn min_percent(&self) -> f64 {
        self.min_percent
    }

    pub fn name(&self) -> String {
        format!(
            "Range [{}-{},{}-{},{}-{}]",
            self.min_rgb.r, self.max_rgb.r, self.min_rgb.g, self.max_rgb.g, self.min_rgb.b, self.max_rgb.b
        )
    }

    /// Доля совпавших пикселей за один проход без ветвлений на пиксель
    pub fn matching_fraction(&self, frame: &Frame) -> f64 {
        let total = frame.pixel_count();
        if total == 0 {
            return 0.0;
        }

        let lo = self.min_rgb.as_array();
        let hi = self.max_rgb.as_array();

        let matched: usize = frame
            .as_bytes()
            .chunks_exact(3)
            .map(|px| {
                let inside = (px[0] >= lo[0]) & (px[0] <= hi[0])
                    & (px[1] >= lo[1]) & (px[1] <= hi[1])
                    & (px[2] >= lo[2]) & (px[2] <= hi[2]);
                inside as usize
            })
            .sum();

        matched as f64 / total as f64
    }

    pub fn detect(&self, frame: &Frame) -> bool {
        self.matching_fraction(frame) >= self.min_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pink_detector() -> RangeDetector {
        RangeDetector::new(Rgb::new(200, 120, 180), Rgb::new(255, 200, 255), 0.01)
    }

    /// 100x100 чёрный кадр, первые `matching` пикселей розовые
    fn frame_with_matches(matching: u32) -> Frame {
        let mut frame = Frame::filled(100, 100, Rgb::new(0, 0, 0));
        for i in 0..matching {
            frame.set_pixel(i % 100, i / 100, Rgb::new(220, 150, 200));
        }
        frame
    }

    #[test]
    fn two_percent_of_matching_pixels_detects() {
        let frame = frame_with_matches(200);
        assert!((pink_detector().matching_fraction(&frame) - 0.02).abs() < 1e-9);
        assert!(pink_detector().detect(&frame));
    }

    #[test]
    fn half_percent_of_matching_pixels_does_not_detect() {
        let frame = frame_with_matches(50);
        assert!(!pink_detector().detect(&frame));
    }

    #[test]
    fn bounds_are_inclusive() {
        let frame = Frame::filled(4, 4, Rgb::new(255, 120, 180));
        assert!(pink_detector().detect(&frame));
    }

    #[test]
    fn empty_frame_never_detects() {
        let frame = Frame::filled(0, 0, Rgb::default());
        assert!(!pink_detector().detect(&frame));
    }

    #[test]
    fn out_of_range_settings_are_clamped() {
        let detector = RangeDetector::from_settings([-10, 120, 180], [400, 200, 255], 5.0);
        assert_eq!(detector.min_percent(), 1.0);
        assert_eq!(detector.name(), "Range [0-255,120-200,180-255]");

        let zero = RangeDetector::from_settings([0, 0, 0], [255, 255, 255], 0.0);
        assert!(zero.min_percent() > 0.0);
        assert!(!zero.detect(&Frame::filled(0, 0, Rgb::default())));
    }
}
