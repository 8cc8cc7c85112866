use serde::{Deserialize, Serialize};

/// Smallest edge length a store is ever allocated with.
pub const MIN_STORE_SIZE: u32 = 32;

#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
pub enum TextureTarget {
    #[default]
    Texture2D,
    Rectangle,
}

impl TextureTarget {
    pub fn to_gl(self) -> u32 {
        match self {
            TextureTarget::Texture2D => glow::TEXTURE_2D,
            TextureTarget::Rectangle => glow::TEXTURE_RECTANGLE,
        }
    }
}

/// Sampling filter used for both minification and magnification.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

impl FilterMode {
    pub fn to_gl(self) -> u32 {
        match self {
            FilterMode::Nearest => glow::NEAREST,
            FilterMode::Linear => glow::LINEAR,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    #[default]
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
        }
    }

    /// (internal format, format, type) triple for `tex_image_2d`.
    pub fn to_gl(self) -> (u32, u32, u32) {
        match self {
            PixelFormat::Rgba8 => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        }
    }
}

/// Zero-based texture unit index; unit `n` maps to `GL_TEXTURE0 + n`.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextureUnit(pub u32);

impl TextureUnit {
    pub fn to_gl(self) -> u32 {
        glow::TEXTURE0 + self.0
    }
}

/// Edge length of the store allocated for a requested edge length:
/// the smallest power of two that is at least `MIN_STORE_SIZE` and at least
/// `requested`. `None` for zero or when the result does not fit in a `u32`.
pub fn store_dimension(requested: u32) -> Option<u32> {
    if requested == 0 {
        return None;
    }
    requested.max(MIN_STORE_SIZE).checked_next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_dimension_floor() {
        assert_eq!(store_dimension(1), Some(32));
        assert_eq!(store_dimension(31), Some(32));
        assert_eq!(store_dimension(32), Some(32));
    }

    #[test]
    fn test_store_dimension_rounds_up_to_power_of_two() {
        assert_eq!(store_dimension(33), Some(64));
        assert_eq!(store_dimension(50), Some(64));
        assert_eq!(store_dimension(100), Some(128));
        assert_eq!(store_dimension(1024), Some(1024));
        assert_eq!(store_dimension(1025), Some(2048));
    }

    #[test]
    fn test_store_dimension_rejects_zero_and_overflow() {
        assert_eq!(store_dimension(0), None);
        assert_eq!(store_dimension(1 << 31), Some(1 << 31));
        assert_eq!(store_dimension((1 << 31) + 1), None);
    }

    #[test]
    fn test_gl_enums() {
        assert_eq!(TextureTarget::Texture2D.to_gl(), glow::TEXTURE_2D);
        assert_eq!(FilterMode::Nearest.to_gl(), glow::NEAREST);
        assert_eq!(TextureUnit(3).to_gl(), glow::TEXTURE3);
        assert_eq!(PixelFormat::Rgba8.bytes_per_pixel(), 4);
    }
}
