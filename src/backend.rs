use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroU32;
use std::rc::Rc;

use glow::HasContext;
use thiserror::Error;

use crate::handles::TextureHandle;
use crate::texture::{FilterMode, PixelFormat, TextureTarget, TextureUnit};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Driver error: {0}")]
    Driver(String),

    #[error("GL error 0x{0:04X}")]
    Gl(u32),

    #[error("Requested {width}x{height} exceeds the maximum texture size {max}")]
    TooLarge { width: u32, height: u32, max: u32 },

    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Texture handle is not allocated")]
    Unallocated,

    #[error("Injected failure: {0}")]
    Injected(&'static str),
}

/// The texture operations a `TextureStore` needs from a graphics API.
///
/// All calls must happen on the thread that owns the current context.
pub trait GraphicsBackend {
    /// Creates a texture name with `filter` applied to min and mag filtering.
    fn allocate_texture(
        &self,
        target: TextureTarget,
        filter: FilterMode,
    ) -> Result<TextureHandle, BackendError>;

    /// Allocates level 0 storage with no initial pixel data.
    fn allocate_storage(
        &self,
        handle: TextureHandle,
        target: TextureTarget,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<(), BackendError>;

    /// Replaces `width x height` RGBA8 texels of `mip_level` starting at the origin.
    fn upload(
        &self,
        handle: TextureHandle,
        target: TextureTarget,
        mip_level: u32,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>;

    fn bind(&self, unit: TextureUnit, target: TextureTarget, handle: TextureHandle);

    /// Binds the null texture to `target`. The active unit is left alone.
    fn unbind(&self, target: TextureTarget);

    /// Best effort; errors are not reported.
    fn delete_texture(&self, handle: TextureHandle);
}

fn expected_len(width: u32, height: u32, format: PixelFormat) -> usize {
    width as usize * height as usize * format.bytes_per_pixel()
}

/// OpenGL backend on top of a shared glow context.
pub struct GlowBackend {
    gl: Rc<glow::Context>,
}

impl GlowBackend {
    pub fn new(gl: Rc<glow::Context>) -> Self {
        Self { gl }
    }

    pub fn gl(&self) -> &Rc<glow::Context> {
        &self.gl
    }

    fn native(handle: TextureHandle) -> Option<glow::Texture> {
        NonZeroU32::new(handle.0).map(glow::NativeTexture)
    }

    fn check_error(&self) -> Result<(), BackendError> {
        let err = unsafe { self.gl.get_error() };
        if err == glow::NO_ERROR {
            Ok(())
        } else {
            Err(BackendError::Gl(err))
        }
    }
}

impl GraphicsBackend for GlowBackend {
    fn allocate_texture(
        &self,
        target: TextureTarget,
        filter: FilterMode,
    ) -> Result<TextureHandle, BackendError> {
        let gl_target = target.to_gl();
        let texture = unsafe { self.gl.create_texture() }.map_err(BackendError::Driver)?;
        unsafe {
            self.gl.bind_texture(gl_target, Some(texture));
            self.gl.tex_parameter_i32(
                gl_target,
                glow::TEXTURE_MIN_FILTER,
                filter.to_gl() as i32,
            );
            self.gl.tex_parameter_i32(
                gl_target,
                glow::TEXTURE_MAG_FILTER,
                filter.to_gl() as i32,
            );
            self.gl
                .tex_parameter_i32(gl_target, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            self.gl
                .tex_parameter_i32(gl_target, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            self.gl.bind_texture(gl_target, None);
        }
        Ok(TextureHandle(texture.0.get()))
    }

    fn allocate_storage(
        &self,
        handle: TextureHandle,
        target: TextureTarget,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<(), BackendError> {
        let texture = Self::native(handle).ok_or(BackendError::Unallocated)?;
        let max = unsafe { self.gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE) }.max(0) as u32;
        if width > max || height > max {
            return Err(BackendError::TooLarge { width, height, max });
        }

        let gl_target = target.to_gl();
        let (internal_format, pixel_format, pixel_type) = format.to_gl();
        unsafe {
            self.gl.bind_texture(gl_target, Some(texture));
            self.gl.tex_image_2d(
                gl_target,
                0,
                internal_format as i32,
                width as i32,
                height as i32,
                0,
                pixel_format,
                pixel_type,
                glow::PixelUnpackData::Slice(None),
            );
            self.gl.bind_texture(gl_target, None);
        }
        self.check_error()
    }

    fn upload(
        &self,
        handle: TextureHandle,
        target: TextureTarget,
        mip_level: u32,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        let texture = Self::native(handle).ok_or(BackendError::Unallocated)?;
        let expected = expected_len(width, height, PixelFormat::Rgba8);
        if pixels.len() != expected {
            return Err(BackendError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }

        let (_, pixel_format, pixel_type) = PixelFormat::Rgba8.to_gl();
        unsafe {
            // Leaves `texture` bound; the caller owns the binding scope.
            self.gl.bind_texture(target.to_gl(), Some(texture));
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
            self.gl.tex_sub_image_2d(
                target.to_gl(),
                mip_level as i32,
                0,
                0,
                width as i32,
                height as i32,
                pixel_format,
                pixel_type,
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
        }
        self.check_error()
    }

    fn bind(&self, unit: TextureUnit, target: TextureTarget, handle: TextureHandle) {
        unsafe {
            self.gl.active_texture(unit.to_gl());
            self.gl.bind_texture(target.to_gl(), Self::native(handle));
        }
    }

    fn unbind(&self, target: TextureTarget) {
        unsafe {
            self.gl.bind_texture(target.to_gl(), None);
        }
    }

    fn delete_texture(&self, handle: TextureHandle) {
        if let Some(texture) = Self::native(handle) {
            unsafe {
                self.gl.delete_texture(texture);
            }
        }
    }
}

/// A single recorded call made against a `NullBackend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    AllocateTexture {
        target: TextureTarget,
        filter: FilterMode,
    },
    AllocateStorage {
        handle: TextureHandle,
        target: TextureTarget,
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    Upload {
        handle: TextureHandle,
        target: TextureTarget,
        mip_level: u32,
        width: u32,
        height: u32,
    },
    Bind {
        unit: TextureUnit,
        target: TextureTarget,
        handle: TextureHandle,
    },
    Unbind {
        target: TextureTarget,
    },
    DeleteTexture {
        handle: TextureHandle,
    },
}

/// Headless backend. Tracks texture names, bindings and uploaded pixels
/// without touching a GPU, and records every call it receives.
#[derive(Debug, Default)]
pub struct NullBackend {
    calls: RefCell<Vec<BackendCall>>,
    last_handle: Cell<u32>,
    live: RefCell<BTreeSet<TextureHandle>>,
    bindings: RefCell<HashMap<TextureTarget, TextureHandle>>,
    active_unit: Cell<TextureUnit>,
    contents: RefCell<HashMap<TextureHandle, Vec<u8>>>,
    fail_allocation: Cell<bool>,
    fail_storage: Cell<bool>,
    fail_upload: Cell<bool>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_allocation(&self, fail: bool) {
        self.fail_allocation.set(fail);
    }

    pub fn set_fail_storage(&self, fail: bool) {
        self.fail_storage.set(fail);
    }

    pub fn set_fail_upload(&self, fail: bool) {
        self.fail_upload.set(fail);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn live_textures(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn is_live(&self, handle: TextureHandle) -> bool {
        self.live.borrow().contains(&handle)
    }

    /// Texture currently bound to `target`, `TextureHandle::NULL` if none.
    pub fn bound(&self, target: TextureTarget) -> TextureHandle {
        self.bindings
            .borrow()
            .get(&target)
            .copied()
            .unwrap_or(TextureHandle::NULL)
    }

    pub fn active_unit(&self) -> TextureUnit {
        self.active_unit.get()
    }

    /// Last level 0 contents uploaded to `handle`.
    pub fn contents(&self, handle: TextureHandle) -> Option<Vec<u8>> {
        self.contents.borrow().get(&handle).cloned()
    }

    fn record(&self, call: BackendCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl GraphicsBackend for NullBackend {
    fn allocate_texture(
        &self,
        target: TextureTarget,
        filter: FilterMode,
    ) -> Result<TextureHandle, BackendError> {
        self.record(BackendCall::AllocateTexture { target, filter });
        if self.fail_allocation.get() {
            return Err(BackendError::Injected("allocate_texture"));
        }
        let handle = TextureHandle(self.last_handle.get() + 1);
        self.last_handle.set(handle.0);
        self.live.borrow_mut().insert(handle);
        Ok(handle)
    }

    fn allocate_storage(
        &self,
        handle: TextureHandle,
        target: TextureTarget,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::AllocateStorage {
            handle,
            target,
            width,
            height,
            format,
        });
        if self.fail_storage.get() {
            return Err(BackendError::Injected("allocate_storage"));
        }
        if !self.is_live(handle) {
            return Err(BackendError::Unallocated);
        }
        self.contents
            .borrow_mut()
            .insert(handle, vec![0; expected_len(width, height, format)]);
        Ok(())
    }

    fn upload(
        &self,
        handle: TextureHandle,
        target: TextureTarget,
        mip_level: u32,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        self.record(BackendCall::Upload {
            handle,
            target,
            mip_level,
            width,
            height,
        });
        if self.fail_upload.get() {
            return Err(BackendError::Injected("upload"));
        }
        if !self.is_live(handle) {
            return Err(BackendError::Unallocated);
        }
        let expected = expected_len(width, height, PixelFormat::Rgba8);
        if pixels.len() != expected {
            return Err(BackendError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        if mip_level == 0 {
            self.contents.borrow_mut().insert(handle, pixels.to_vec());
        }
        Ok(())
    }

    fn bind(&self, unit: TextureUnit, target: TextureTarget, handle: TextureHandle) {
        self.record(BackendCall::Bind {
            unit,
            target,
            handle,
        });
        self.active_unit.set(unit);
        self.bindings.borrow_mut().insert(target, handle);
    }

    fn unbind(&self, target: TextureTarget) {
        self.record(BackendCall::Unbind { target });
        self.bindings
            .borrow_mut()
            .insert(target, TextureHandle::NULL);
    }

    fn delete_texture(&self, handle: TextureHandle) {
        self.record(BackendCall::DeleteTexture { handle });
        self.live.borrow_mut().remove(&handle);
        self.contents.borrow_mut().remove(&handle);
        let mut bindings = self.bindings.borrow_mut();
        for bound in bindings.values_mut() {
            if *bound == handle {
                *bound = TextureHandle::NULL;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_backend_hands_out_distinct_handles() {
        let backend = NullBackend::new();
        let a = backend
            .allocate_texture(TextureTarget::Texture2D, FilterMode::Linear)
            .unwrap();
        let b = backend
            .allocate_texture(TextureTarget::Texture2D, FilterMode::Nearest)
            .unwrap();
        assert!(!a.is_null());
        assert_ne!(a, b);
        assert_eq!(backend.live_textures(), 2);
    }

    #[test]
    fn test_null_backend_storage_is_zeroed() {
        let backend = NullBackend::new();
        let handle = backend
            .allocate_texture(TextureTarget::Texture2D, FilterMode::Linear)
            .unwrap();
        backend
            .allocate_storage(handle, TextureTarget::Texture2D, 32, 64, PixelFormat::Rgba8)
            .unwrap();
        let contents = backend.contents(handle).unwrap();
        assert_eq!(contents.len(), 32 * 64 * 4);
        assert!(contents.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_null_backend_rejects_wrong_buffer_size() {
        let backend = NullBackend::new();
        let handle = backend
            .allocate_texture(TextureTarget::Texture2D, FilterMode::Linear)
            .unwrap();
        let result = backend.upload(handle, TextureTarget::Texture2D, 0, &[0; 12], 2, 2);
        assert!(matches!(
            result,
            Err(BackendError::BufferSize {
                expected: 16,
                actual: 12
            })
        ));
    }

    #[test]
    fn test_null_backend_delete_clears_binding() {
        let backend = NullBackend::new();
        let handle = backend
            .allocate_texture(TextureTarget::Texture2D, FilterMode::Linear)
            .unwrap();
        backend.bind(TextureUnit(2), TextureTarget::Texture2D, handle);
        assert_eq!(backend.bound(TextureTarget::Texture2D), handle);
        assert_eq!(backend.active_unit(), TextureUnit(2));

        backend.delete_texture(handle);
        assert!(!backend.is_live(handle));
        assert_eq!(backend.bound(TextureTarget::Texture2D), TextureHandle::NULL);
    }

    #[test]
    fn test_null_backend_injected_failures() {
        let backend = NullBackend::new();
        backend.set_fail_allocation(true);
        assert!(matches!(
            backend.allocate_texture(TextureTarget::Texture2D, FilterMode::Linear),
            Err(BackendError::Injected("allocate_texture"))
        ));
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.calls().len(), 1);
    }
}
