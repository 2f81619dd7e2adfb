use crate::detector::Rgb;
use crate::error::{AppError, Result};
use image::RgbaImage;

/// Один захваченный кадр области: плотный RGB буфер, строка за строкой.
///
/// Кадр живёт одну итерацию цикла захвата и после передачи классификатору не меняется.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(AppError::Capture(format!(
                "размер буфера {} не совпадает с {}x{}x3",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, data })
    }

    pub fn filled(width: u32, height: u32, rgb: Rgb) -> Self {
        let count = width as usize * height as usize;
        let data = rgb.as_array().repeat(count);
        Self { width, height, data }
    }

    /// RGBA → RGB, альфа отбрасывается
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let data = image
            .as_raw()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        Some(Rgb::from_slice(&self.data[offset..offset + 3]))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: Rgb) {
        if x < self.width && y < self.height {
            let offset = (y as usize * self.width as usize + x as usize) * 3;
            self.data[offset..offset + 3].copy_from_slice(&rgb.as_array());
        }
    }

    pub fn center_pixel(&self) -> Option<Rgb> {
        self.pixel(self.width / 2, self.height / 2)
    }

    /// Средний цвет по всем пикселям (целочисленное усечение, как у среднего по каналам)
    pub fn average_color(&self) -> Option<Rgb> {
        let count = self.pixel_count() as u64;
        if count == 0 {
            return None;
        }

        let mut sums = [0u64; 3];
        for px in self.data.chunks_exact(3) {
            sums[0] += px[0] as u64;
            sums[1] += px[1] as u64;
            sums[2] += px[2] as u64;
        }

        Some(Rgb::new(
            (sums[0] / count) as u8,
            (sums[1] / count) as u8,
            (sums[2] / count) as u8,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(Frame::new(2, 2, vec![0; 11]).is_err());
        assert!(Frame::new(2, 2, vec![0; 12]).is_ok());
    }

    #[test]
    fn test_from_rgba_drops_alpha() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        image.put_pixel(1, 0, Rgba([40, 50, 60, 0]));

        let frame = Frame::from_rgba(&image);
        assert_eq!(frame.as_bytes(), &[10, 20, 30, 40, 50, 60]);
        assert_eq!(frame.pixel(1, 0), Some(Rgb::new(40, 50, 60)));
    }

    #[test]
    fn test_average_and_center() {
        let mut frame = Frame::filled(3, 1, Rgb::new(0, 0, 0));
        frame.set_pixel(1, 0, Rgb::new(90, 30, 3));

        assert_eq!(frame.center_pixel(), Some(Rgb::new(90, 30, 3)));
        assert_eq!(frame.average_color(), Some(Rgb::new(30, 10, 1)));
    }

    #[test]
    fn test_empty_frame_has_no_average() {
        let frame = Frame::filled(0, 0, Rgb::default());
        assert!(frame.is_empty());
        assert_eq!(frame.average_color(), None);
        assert_eq!(frame.center_pixel(), None);
    }
}
