use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageReader, Luma};
use ndarray::Array4;
use std::io::Cursor;
use std::path::Path;

use super::InputShape;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("cannot identify image file: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported channel count {0}, expected 1 or 3")]
    UnsupportedChannels(usize),
    #[error("target size must be non-zero, got {height}x{width}")]
    EmptyTarget { height: usize, width: usize },
    #[error("tensor layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),
}

/// `(1, H, W, C)` float tensor with every value in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct NormalizedTensor(Array4<f32>);

impl NormalizedTensor {
    pub fn shape(&self) -> [usize; 4] {
        let dims = self.0.dim();
        [dims.0, dims.1, dims.2, dims.3]
    }

    /// Row-major NHWC data, `None` only if the array is not contiguous.
    pub fn as_slice(&self) -> Option<&[f32]> {
        self.0.as_slice()
    }
}

/// Reads an image from disk. The format is sniffed from the content, never
/// from the file extension.
pub fn normalize_file(path: &Path, shape: InputShape) -> Result<NormalizedTensor, NormalizeError> {
    let bytes = std::fs::read(path)?;
    normalize_bytes(&bytes, shape)
}

pub fn normalize_bytes(bytes: &[u8], shape: InputShape) -> Result<NormalizedTensor, NormalizeError> {
    let image = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    normalize_image(&image, shape)
}

/// Converts the colour mode first, then stretches to exactly `width x height`.
pub fn normalize_image(
    image: &DynamicImage,
    shape: InputShape,
) -> Result<NormalizedTensor, NormalizeError> {
    let InputShape {
        height,
        width,
        channels,
    } = shape;
    if height == 0 || width == 0 {
        return Err(NormalizeError::EmptyTarget { height, width });
    }
    log::debug!(
        "Original image size: {}x{}, target {}x{}x{}",
        image.width(),
        image.height(),
        height,
        width,
        channels
    );

    let (w, h) = (width as u32, height as u32);
    let pixels = match channels {
        1 => imageops::resize(&to_grayscale(image), w, h, FilterType::CatmullRom).into_raw(),
        3 => imageops::resize(&image.to_rgb8(), w, h, FilterType::CatmullRom).into_raw(),
        other => return Err(NormalizeError::UnsupportedChannels(other)),
    };

    let data: Vec<f32> = pixels.into_iter().map(|p| f32::from(p) / 255.0).collect();
    let array = Array4::from_shape_vec((1, height, width, channels), data)?;
    Ok(NormalizedTensor(array))
}

/// ITU-R 601-2 luma with the same fixed-point rounding the spiral model was
/// trained against. Single-channel sources pass through unchanged.
fn to_grayscale(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => image.to_luma8(),
        _ => {
            let rgb = image.to_rgb8();
            GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                let luma = u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000;
                Luma([(luma >> 16) as u8])
            })
        }
    }
}
