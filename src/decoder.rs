use std::path::Path;

use image::{ImageReader, RgbaImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid subsampling factor {0}")]
    InvalidSubsample(u32),
}

/// Source of pixel data for a `TextureStore`.
///
/// `decode` receives the subsampling factor so an implementation can shrink
/// the image while decoding and keep peak memory near the subsampled size.
/// `ImageCrateDecoder` cannot: the `image` crate has no reduced-size decode,
/// so it holds the full-resolution image before subsampling.
pub trait ImageDecoder {
    /// Reads only as much of the file as needed to learn its pixel size.
    fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32), DecodeError>;

    /// Decodes the whole file to RGBA8, keeping every `subsample`-th pixel
    /// on both axes.
    fn decode(&self, path: &Path, subsample: u32) -> Result<RgbaImage, DecodeError>;
}

/// Decoder backed by the `image` crate. The format is sniffed from the file
/// contents, falling back to the extension. Peak memory is that of the full
/// resolution RGBA8 image, whatever the subsampling factor.
///
/// Subsampled output is `max(1, floor(dimension / factor))` pixels on each
/// axis, with output pixel `(x, y)` taken from source pixel
/// `(x * factor, y * factor)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32), DecodeError> {
        let dimensions = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(dimensions)
    }

    fn decode(&self, path: &Path, subsample: u32) -> Result<RgbaImage, DecodeError> {
        if subsample == 0 {
            return Err(DecodeError::InvalidSubsample(subsample));
        }
        let rgba = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?
            .into_rgba8();
        Ok(subsample_image(rgba, subsample))
    }
}

/// Nearest-neighbour downscale by an integer factor.
pub fn subsample_image(image: RgbaImage, factor: u32) -> RgbaImage {
    if factor <= 1 {
        return image;
    }
    let width = (image.width() / factor).max(1);
    let height = (image.height() / factor).max(1);
    RgbaImage::from_fn(width, height, |x, y| *image.get_pixel(x * factor, y * factor))
}

/// Integer decode factor for an image of `probed` size going into a store of
/// `store` size.
///
/// When the image overflows the store on either axis, the ceiling ratio is
/// taken on the height axis if the image is at least as wide as it is tall,
/// otherwise on the width axis. The axis is picked by the image's own aspect,
/// not by which axis overflows, so a wide image that only overflows in width
/// can come back with factor 1.
pub fn subsample_factor(probed: (u32, u32), store: (u32, u32)) -> u32 {
    let (width, height) = probed;
    let (store_width, store_height) = store;
    if width <= store_width && height <= store_height {
        return 1;
    }
    let factor = if width >= height {
        height.div_ceil(store_height.max(1))
    } else {
        width.div_ceil(store_width.max(1))
    };
    factor.max(1)
}
