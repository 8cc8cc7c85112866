/// Backend texture name. `TextureHandle(0)` never names a live texture.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    pub const NULL: TextureHandle = TextureHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}
