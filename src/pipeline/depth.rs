use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::{
    error::SensorError,
    types::{
        BGR32_BYTES_PER_PIXEL, Bgr32Image, ColorImageFormat, ColorImagePoint, DepthFrame,
        DepthImagePixel, DepthSentinels,
    },
};

/// Alpha written alongside every mapped depth color.
const OPAQUE: u8 = 0xFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthCategory {
    Unknown,
    TooNear,
    TooFar,
    Valid,
}

impl DepthCategory {
    /// Sentinels are checked in a fixed order so overlapping values resolve
    /// the same way on every frame.
    pub fn classify(depth: i32, sentinels: &DepthSentinels) -> Self {
        if depth == sentinels.unknown {
            DepthCategory::Unknown
        } else if depth == sentinels.too_near {
            DepthCategory::TooNear
        } else if depth == sentinels.too_far {
            DepthCategory::TooFar
        } else {
            DepthCategory::Valid
        }
    }

    /// Fixed (B, G, R) triplet for the category.
    pub fn bgr(&self) -> [u8; 3] {
        match self {
            DepthCategory::Unknown => [66, 66, 33],
            DepthCategory::TooNear => [0, 255, 0],
            DepthCategory::TooFar => [66, 0, 66],
            DepthCategory::Valid => [0, 255, 255],
        }
    }

    pub fn bgr32(&self) -> [u8; 4] {
        let [b, g, r] = self.bgr();
        [b, g, r, OPAQUE]
    }
}

pub fn classify_frame(pixels: &[DepthImagePixel], sentinels: &DepthSentinels) -> Vec<DepthCategory> {
    pixels
        .par_iter()
        .map(|pixel| DepthCategory::classify(pixel.depth, sentinels))
        .collect()
}

/// Scatters each depth pixel's category color to where the sensor says it
/// lands in the color image.
///
/// The destination has the color stream's resolution. Projections that fall
/// outside it are skipped; pixels nothing maps onto stay zeroed.
pub fn map_depth_to_color(
    frame: &DepthFrame,
    color_points: &[ColorImagePoint],
    color_format: ColorImageFormat,
) -> Result<Bgr32Image> {
    let expected = frame.format.pixel_count();
    if frame.pixels.len() != expected {
        return Err(SensorError::InvalidFrame {
            expected,
            actual: frame.pixels.len(),
        })
        .with_context(|| format!("depth frame {}", frame.frame_number));
    }

    Ok(scatter_depth_colors(
        &frame.pixels,
        &frame.sentinels,
        color_points,
        color_format.width(),
        color_format.height(),
    ))
}

/// Resolution-agnostic core of `map_depth_to_color`.
pub fn scatter_depth_colors(
    pixels: &[DepthImagePixel],
    sentinels: &DepthSentinels,
    color_points: &[ColorImagePoint],
    width: u32,
    height: u32,
) -> Bgr32Image {
    let categories = classify_frame(pixels, sentinels);
    let mut image = Bgr32Image::new(width, height);
    let (width, height) = (width as i64, height as i64);

    for (category, point) in categories.iter().zip(color_points) {
        let (x, y) = (point.x as i64, point.y as i64);
        if x < 0 || y < 0 || x >= width || y >= height {
            continue;
        }
        let idx = ((width * y + x) as usize) * BGR32_BYTES_PER_PIXEL;
        image.bytes[idx..idx + BGR32_BYTES_PER_PIXEL].copy_from_slice(&category.bgr32());
    }

    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DepthImageFormat;
    use std::time::Instant;

    fn sentinels() -> DepthSentinels {
        DepthSentinels::default()
    }

    fn frame_from(depths: &[i32], format: DepthImageFormat) -> DepthFrame {
        let mut pixels = vec![DepthImagePixel::default(); format.pixel_count()];
        for (pixel, &depth) in pixels.iter_mut().zip(depths) {
            pixel.depth = depth;
        }
        DepthFrame {
            format,
            pixels,
            sentinels: sentinels(),
            frame_number: 1,
            timestamp: Instant::now(),
        }
    }

    fn identity_points(format: DepthImageFormat) -> Vec<ColorImagePoint> {
        (0..format.pixel_count() as i32)
            .map(|i| ColorImagePoint {
                x: i % format.width() as i32,
                y: i / format.width() as i32,
            })
            .collect()
    }

    #[test]
    fn sentinels_map_to_fixed_colors() {
        let s = sentinels();
        assert_eq!(DepthCategory::classify(s.unknown, &s).bgr(), [66, 66, 33]);
        assert_eq!(DepthCategory::classify(s.too_near, &s).bgr(), [0, 255, 0]);
        assert_eq!(DepthCategory::classify(s.too_far, &s).bgr(), [66, 0, 66]);
        for depth in [1, 500, 800, 4000, 8000] {
            assert_eq!(DepthCategory::classify(depth, &s), DepthCategory::Valid);
            assert_eq!(DepthCategory::classify(depth, &s).bgr(), [0, 255, 255]);
        }
    }

    #[test]
    fn unknown_wins_when_sentinels_overlap() {
        let s = DepthSentinels {
            unknown: 0,
            too_near: 0,
            too_far: 4095,
        };
        assert_eq!(DepthCategory::classify(0, &s), DepthCategory::Unknown);
    }

    #[test]
    fn classification_ignores_position() {
        let s = sentinels();
        let pixels: Vec<DepthImagePixel> = [s.too_far, 700, s.too_far, 700]
            .iter()
            .map(|&depth| DepthImagePixel {
                depth,
                source_index: 0,
            })
            .collect();
        let categories = classify_frame(&pixels, &s);
        assert_eq!(categories[0], categories[2]);
        assert_eq!(categories[1], categories[3]);
        assert_eq!(categories.len(), 4);
    }

    #[test]
    fn identity_mapping_colors_every_pixel() {
        let format = DepthImageFormat::Resolution80x60Fps30;
        let s = sentinels();
        let frame = frame_from(&[s.unknown, 500], format);
        let points = identity_points(format);
        let image = map_depth_to_color(
            &frame,
            &points,
            ColorImageFormat::RgbResolution640x480Fps30,
        )
        .unwrap();

        assert_eq!(image.bytes.len(), 640 * 480 * 4);
        assert_eq!(image.stride, 640 * 4);
        assert_eq!(&image.bytes[0..8], &[66, 66, 33, 0xFF, 0, 255, 255, 0xFF]);
        // Remaining depth pixels are 0, which is the too-near sentinel.
        assert_eq!(image.pixel(2, 0).unwrap(), &[0, 255, 0, 0xFF]);
        // Row 0 of the color image past the depth width is never mapped.
        assert_eq!(image.pixel(100, 0).unwrap(), &[0, 0, 0, 0]);
    }

    #[test]
    fn two_pixel_frame_end_to_end() {
        let s = sentinels();
        let pixels = [
            DepthImagePixel {
                depth: s.unknown,
                source_index: 0,
            },
            DepthImagePixel {
                depth: 500,
                source_index: 0,
            },
        ];
        let points = [ColorImagePoint { x: 0, y: 0 }, ColorImagePoint { x: 1, y: 0 }];
        let image = scatter_depth_colors(&pixels, &s, &points, 2, 1);
        assert_eq!(image.bytes, vec![66, 66, 33, 0xFF, 0, 255, 255, 0xFF]);
        assert_eq!(image.stride, 8);
    }

    #[test]
    fn out_of_range_points_are_skipped() {
        let format = DepthImageFormat::Resolution80x60Fps30;
        let frame = frame_from(&[500, 500, 500, 500], format);
        let mut points = vec![ColorImagePoint { x: -1, y: -1 }; format.pixel_count()];
        points[0] = ColorImagePoint { x: 640, y: 0 };
        points[1] = ColorImagePoint { x: 0, y: 480 };
        points[2] = ColorImagePoint { x: -5, y: 10 };
        points[3] = ColorImagePoint { x: 7, y: 9 };

        let image = map_depth_to_color(
            &frame,
            &points,
            ColorImageFormat::RgbResolution640x480Fps30,
        )
        .unwrap();

        let written: Vec<usize> = image
            .bytes
            .chunks_exact(4)
            .enumerate()
            .filter(|(_, px)| px.iter().any(|&b| b != 0))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(written, vec![9 * 640 + 7]);
        assert_eq!(image.pixel(7, 9).unwrap(), &[0, 255, 255, 0xFF]);
    }

    #[test]
    fn short_projection_leaves_rest_unmapped() {
        let format = DepthImageFormat::Resolution80x60Fps30;
        let frame = frame_from(&[500], format);
        let points = vec![ColorImagePoint { x: 1, y: 1 }];
        let image = map_depth_to_color(
            &frame,
            &points,
            ColorImageFormat::RgbResolution640x480Fps30,
        )
        .unwrap();
        assert_eq!(image.bytes.iter().filter(|&&b| b != 0).count(), 3);
    }

    #[test]
    fn mismatched_frame_is_rejected() {
        let mut frame = frame_from(&[], DepthImageFormat::Resolution80x60Fps30);
        frame.pixels.truncate(10);
        let err = map_depth_to_color(&frame, &[], ColorImageFormat::RgbResolution640x480Fps30)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SensorError>(),
            Some(SensorError::InvalidFrame { actual: 10, .. })
        ));
    }

    #[test]
    fn mapping_is_deterministic() {
        let format = DepthImageFormat::Resolution80x60Fps30;
        let s = sentinels();
        let depths: Vec<i32> = (0..format.pixel_count() as i32)
            .map(|i| match i % 5 {
                0 => s.unknown,
                1 => s.too_far,
                _ => 400 + i,
            })
            .collect();
        let frame = frame_from(&depths, format);
        let points = identity_points(format);
        let a = map_depth_to_color(&frame, &points, ColorImageFormat::RgbResolution640x480Fps30)
            .unwrap();
        let b = map_depth_to_color(&frame, &points, ColorImageFormat::RgbResolution640x480Fps30)
            .unwrap();
        assert_eq!(a, b);
    }
}
