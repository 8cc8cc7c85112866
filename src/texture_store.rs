use std::path::Path;
use std::rc::Rc;

use glam::{Mat4, Vec3};
use image::RgbaImage;
use log::{debug, warn};
use thiserror::Error;

use crate::backend::{BackendError, GlowBackend, GraphicsBackend};
use crate::decoder::{DecodeError, ImageCrateDecoder, ImageDecoder, subsample_factor};
use crate::handles::TextureHandle;
use crate::scope_timer::ScopeTimer;
use crate::texture::{FilterMode, PixelFormat, TextureTarget, TextureUnit, store_dimension};

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Decode Error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Backend allocation failed: {0}")]
    BackendAllocation(#[source] BackendError),

    #[error("Backend upload failed: {0}")]
    BackendUpload(#[source] BackendError),
}

/// Scale matrix mapping unit texture coordinates onto the `logical` sub-rectangle
/// of a `store` sized texture.
fn scale_transform(logical: (u32, u32), store: (u32, u32)) -> Mat4 {
    Mat4::from_scale(Vec3::new(
        logical.0 as f32 / store.0 as f32,
        logical.1 as f32 / store.1 as f32,
        1.0,
    ))
}

/// Zeroed store-sized RGBA8 buffer with `image` copied to its top-left corner.
fn composite(image: &RgbaImage, store_width: u32, store_height: u32) -> RgbaImage {
    let mut canvas = RgbaImage::new(store_width, store_height);
    image::imageops::replace(&mut canvas, image, 0, 0);
    canvas
}

/// One power-of-two sized GPU texture plus the matrix that maps unit texture
/// coordinates onto the part of it holding the loaded image.
///
/// The texture is created on construction and deleted by [`release`] or on
/// drop, whichever comes first. Both must happen with the backend's context
/// current on the calling thread.
///
/// [`release`]: TextureStore::release
pub struct TextureStore<B: GraphicsBackend = GlowBackend> {
    backend: Rc<B>,
    target: TextureTarget,
    unit: TextureUnit,
    filter: FilterMode,
    handle: TextureHandle,
    store_width: u32,
    store_height: u32,
    image_width: u32,
    image_height: u32,
    transform: Mat4,
}

impl<B: GraphicsBackend> TextureStore<B> {
    /// Allocates a `TEXTURE_2D` store on unit 0 big enough for
    /// `width x height`.
    pub fn new(
        backend: Rc<B>,
        width: u32,
        height: u32,
        filter: FilterMode,
    ) -> Result<Self, TextureError> {
        Self::with_target(
            backend,
            TextureTarget::Texture2D,
            TextureUnit::default(),
            width,
            height,
            filter,
        )
    }

    pub fn with_target(
        backend: Rc<B>,
        target: TextureTarget,
        unit: TextureUnit,
        width: u32,
        height: u32,
        filter: FilterMode,
    ) -> Result<Self, TextureError> {
        let store_width = store_dimension(width).ok_or_else(|| {
            TextureError::InvalidArgument(format!("unsupported texture width {width}"))
        })?;
        let store_height = store_dimension(height).ok_or_else(|| {
            TextureError::InvalidArgument(format!("unsupported texture height {height}"))
        })?;

        let handle = backend
            .allocate_texture(target, filter)
            .map_err(TextureError::BackendAllocation)?;
        if let Err(e) = backend.allocate_storage(
            handle,
            target,
            store_width,
            store_height,
            PixelFormat::Rgba8,
        ) {
            backend.delete_texture(handle);
            return Err(TextureError::BackendAllocation(e));
        }
        debug!(
            "Allocated texture {:?}: requested {}x{}, store {}x{}",
            handle, width, height, store_width, store_height
        );

        Ok(Self {
            backend,
            target,
            unit,
            filter,
            handle,
            store_width,
            store_height,
            image_width: 0,
            image_height: 0,
            transform: scale_transform((width, height), (store_width, store_height)),
        })
    }

    /// Loads the image at `path` with the `image` crate decoder.
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<(), TextureError> {
        self.load_image_with(&ImageCrateDecoder, path)
    }

    /// Loads the image at `path` into the store, subsampling during decode
    /// when it is bigger than the store.
    ///
    /// Probe and decode failures leave the store untouched. An upload failure
    /// happens after the image size and transform have been updated, so the
    /// texture contents no longer match them; release the store in that case.
    pub fn load_image_with<D: ImageDecoder + ?Sized>(
        &mut self,
        decoder: &D,
        path: impl AsRef<Path>,
    ) -> Result<(), TextureError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(TextureError::InvalidArgument(
                "image path should not be empty".to_string(),
            ));
        }
        self.ensure_allocated()?;
        let _timer = ScopeTimer::new("TextureStore::load_image");

        let probed = decoder.probe_dimensions(path)?;
        let factor = subsample_factor(probed, (self.store_width, self.store_height));
        debug!(
            "Loading {:?}: image {}x{}, store {}x{}, subsample {}",
            path, probed.0, probed.1, self.store_width, self.store_height, factor
        );

        let decoded = decoder.decode(path, factor)?;
        self.load_rgba(&decoded)
    }

    /// Copies already decoded pixels into the store.
    pub fn load_rgba(&mut self, image: &RgbaImage) -> Result<(), TextureError> {
        self.ensure_allocated()?;
        let (width, height) = image.dimensions();
        if width > self.store_width || height > self.store_height {
            warn!(
                "Image {}x{} exceeds store {}x{}, clipping",
                width, height, self.store_width, self.store_height
            );
        }
        let canvas = composite(image, self.store_width, self.store_height);

        self.image_width = width;
        self.image_height = height;
        self.transform = scale_transform((width, height), (self.store_width, self.store_height));

        let bound = self.bind_scoped();
        let result = self.backend.upload(
            self.handle,
            self.target,
            0,
            canvas.as_raw(),
            self.store_width,
            self.store_height,
        );
        drop(bound);
        result.map_err(TextureError::BackendUpload)
    }

    fn ensure_allocated(&self) -> Result<(), TextureError> {
        if self.handle.is_null() {
            return Err(TextureError::InvalidArgument(
                "texture store has been released".to_string(),
            ));
        }
        Ok(())
    }

    /// Makes `unit` active and binds the texture to the store's target.
    pub fn bind(&self) {
        if self.handle.is_null() {
            warn!("bind called on a released texture store");
            return;
        }
        self.backend.bind(self.unit, self.target, self.handle);
    }

    pub fn unbind(&self) {
        self.backend.unbind(self.target);
    }

    /// Binds now and unbinds when the returned guard is dropped.
    pub fn bind_scoped(&self) -> BoundTexture<'_, B> {
        self.bind();
        BoundTexture { store: self }
    }

    /// Deletes the backend texture. Calling it again does nothing.
    pub fn release(&mut self) {
        if !self.handle.is_null() {
            self.backend.delete_texture(self.handle);
            debug!("Released texture {:?}", self.handle);
            self.handle = TextureHandle::NULL;
        }
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_null()
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    pub fn unit(&self) -> TextureUnit {
        self.unit
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn backend(&self) -> &Rc<B> {
        &self.backend
    }

    /// Texture coordinate transform; `x_axis.x` and `y_axis.y` hold the
    /// image to store ratios.
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    /// Column-major copy of the transform.
    pub fn transform_array(&self) -> [f32; 16] {
        self.transform.to_cols_array()
    }

    /// Writes the 16 column-major transform elements to `buffer[offset..offset + 16]`.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` is shorter than `offset + 16`.
    pub fn copy_transform_into(&self, buffer: &mut [f32], offset: usize) {
        buffer[offset..offset + 16].copy_from_slice(&self.transform_array());
    }

    pub fn store_width(&self) -> u32 {
        self.store_width
    }

    pub fn store_height(&self) -> u32 {
        self.store_height
    }

    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    pub fn image_height(&self) -> u32 {
        self.image_height
    }
}

impl<B: GraphicsBackend> Drop for TextureStore<B> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Keeps a `TextureStore` bound until dropped.
pub struct BoundTexture<'a, B: GraphicsBackend> {
    store: &'a TextureStore<B>,
}

impl<B: GraphicsBackend> Drop for BoundTexture<'_, B> {
    fn drop(&mut self) {
        self.store.unbind();
    }
}
