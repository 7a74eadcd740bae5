//! Image to model-input conversion.

use crate::error::CaptchaError;
use image::imageops::FilterType;

/// Model input width in pixels.
pub const INPUT_WIDTH: u32 = 130;
/// Model input height in pixels.
pub const INPUT_HEIGHT: u32 = 42;
const CHANNELS: usize = 3;

/// Channel-first `[1, 3, 42, 130]` float tensor with values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub data: Vec<f32>,
}

impl InputTensor {
    pub fn shape(&self) -> [usize; 4] {
        [1, CHANNELS, INPUT_HEIGHT as usize, INPUT_WIDTH as usize]
    }

    /// Value at (channel, y, x).
    pub fn at(&self, channel: usize, y: usize, x: usize) -> f32 {
        let plane = (INPUT_WIDTH * INPUT_HEIGHT) as usize;
        self.data[channel * plane + y * INPUT_WIDTH as usize + x]
    }
}

/// Decode, resize to 130x42, drop alpha and lay out as CHW.
pub fn preprocess(image_bytes: &[u8]) -> Result<InputTensor, CaptchaError> {
    let img = image::load_from_memory(image_bytes)
        .map_err(|e| CaptchaError::ImageProcessing(format!("Failed to load image: {}", e)))?;

    let rgb = img.to_rgb8();
    let resized = image::imageops::resize(&rgb, INPUT_WIDTH, INPUT_HEIGHT, FilterType::Triangle);

    let plane = (INPUT_WIDTH * INPUT_HEIGHT) as usize;
    let mut data = vec![0.0f32; CHANNELS * plane];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = y as usize * INPUT_WIDTH as usize + x as usize;
        for c in 0..CHANNELS {
            data[c * plane + offset] = pixel[c] as f32 / 255.0;
        }
    }

    Ok(InputTensor { data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(img: DynamicImage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_shape_and_channel_layout() {
        // Solid red with half alpha: alpha must be ignored.
        let img = RgbaImage::from_pixel(260, 84, Rgba([255, 0, 0, 128]));
        let tensor = preprocess(&png(DynamicImage::ImageRgba8(img))).unwrap();

        assert_eq!(tensor.shape(), [1, 3, 42, 130]);
        assert_eq!(tensor.data.len(), 3 * 42 * 130);
        assert!(tensor.at(0, 10, 10) > 0.99);
        assert!(tensor.at(1, 10, 10).abs() < 1e-6);
        assert!(tensor.at(2, 41, 129).abs() < 1e-6);
    }

    #[test]
    fn test_values_are_normalized() {
        let img = RgbaImage::from_fn(130, 42, |x, y| Rgba([(x * 2) as u8, (y * 6) as u8, 200, 255]));
        let tensor = preprocess(&png(DynamicImage::ImageRgba8(img))).unwrap();
        assert!(tensor.data.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = preprocess(b"not an image").unwrap_err();
        assert!(matches!(err, CaptchaError::ImageProcessing(_)));
    }
}
