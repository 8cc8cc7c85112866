//! Power-of-two GPU texture stores with subsampled image loading and a
//! texture coordinate transform that hides the padding.

pub mod backend;
pub mod decoder;
pub mod handles;
pub mod scope_timer;
pub mod settings;
pub mod texture;
pub mod texture_store;

pub use backend::{BackendCall, BackendError, GlowBackend, GraphicsBackend, NullBackend};
pub use decoder::{DecodeError, ImageCrateDecoder, ImageDecoder, subsample_factor};
pub use handles::TextureHandle;
pub use settings::{Settings, SettingsError};
pub use texture::{
    FilterMode, MIN_STORE_SIZE, PixelFormat, TextureTarget, TextureUnit, store_dimension,
};
pub use texture_store::{BoundTexture, TextureError, TextureStore};
