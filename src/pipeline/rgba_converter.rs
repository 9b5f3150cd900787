use anyhow::{Result, anyhow};
use image::RgbaImage;
use rayon::prelude::*;

use crate::types::{BGR32_BYTES_PER_PIXEL, Bgr32Image, ColorFrame};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Alpha {
    Keep,
    Opaque,
}

impl Bgr32Image {
    /// Unmapped pixels keep their zero alpha and come out transparent.
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        let rgba = bgr32_to_rgba(&self.bytes, self.width, self.height, self.stride, Alpha::Keep)?;
        into_image(rgba, self.width, self.height)
    }
}

impl ColorFrame {
    /// The color camera leaves the fourth byte unused, so every pixel is made opaque.
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        let (width, height) = (self.width(), self.height());
        let rgba = bgr32_to_rgba(
            &self.bgr32,
            width,
            height,
            self.format.stride(),
            Alpha::Opaque,
        )?;
        into_image(rgba, width, height)
    }
}

fn bgr32_to_rgba(
    data: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    alpha: Alpha,
) -> Result<Vec<u8>> {
    let row_len = width as usize * BGR32_BYTES_PER_PIXEL;
    if stride < row_len {
        return Err(anyhow!("BGR32 stride {stride} shorter than row ({row_len})"));
    }
    let expected_len = stride * height as usize;
    if data.len() < expected_len {
        return Err(anyhow!(
            "BGR32 buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let mut rgba = vec![0u8; row_len * height as usize];
    rgba.par_chunks_mut(row_len)
        .zip(data.par_chunks(stride))
        .for_each(|(dst_row, src_row)| {
            for (dst, src) in dst_row
                .chunks_exact_mut(4)
                .zip(src_row[..row_len].chunks_exact(BGR32_BYTES_PER_PIXEL))
            {
                dst[0] = src[2];
                dst[1] = src[1];
                dst[2] = src[0];
                dst[3] = match alpha {
                    Alpha::Keep => src[3],
                    Alpha::Opaque => 255,
                };
            }
        });

    Ok(rgba)
}

fn into_image(rgba: Vec<u8>, width: u32, height: u32) -> Result<RgbaImage> {
    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow!("RGBA buffer does not match {width}x{height}"))
}
