//! Temporary render target pool
//!
//! Render passes often need textures that only live for part of a frame
//! (shadow maps, intermediate lighting buffers). The pool hands these out
//! through [`RenderTargetHandle`]s and keeps the textures after the handles
//! are dropped so that the next request with the same descriptor can reuse
//! them. A texture nobody has requested for [`UNUSED_FRAMES_BEFORE_FREE`]
//! frames is released.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::engine::FrameListener;
use crate::foundation::logging::debug;
use crate::gpu::manager::GpuManager;
use crate::gpu::texture::{GpuTexture, GpuTextureDesc, GpuTextureImageRef};

/// Number of frame starts a target can go unused for before being freed
pub const UNUSED_FRAMES_BEFORE_FREE: u32 = 3;

struct Target {
    texture: Rc<dyn GpuTexture>,
    unused_frames: Cell<u32>,
}

/// Handle to a pooled render target
///
/// While any handle to a target is alive the target is not handed out to
/// another request and is not freed. Clones refer to the same target.
#[derive(Clone)]
pub struct RenderTargetHandle {
    target: Rc<Target>,
}

impl RenderTargetHandle {
    /// The pooled texture
    pub fn texture(&self) -> &Rc<dyn GpuTexture> {
        &self.target.texture
    }

    /// Reference to the top level of the texture, for use as a render target
    pub fn image_ref(&self) -> GpuTextureImageRef {
        GpuTextureImageRef::from_texture(&self.target.texture)
    }
}

impl Deref for RenderTargetHandle {
    type Target = dyn GpuTexture;

    fn deref(&self) -> &Self::Target {
        &*self.target.texture
    }
}

impl PartialEq for RenderTargetHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.target, &other.target)
    }
}

impl Eq for RenderTargetHandle {}

impl fmt::Debug for RenderTargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTargetHandle")
            .field("texture", &self.target.texture.id())
            .finish()
    }
}

fn log_desc(action: &str, desc: &GpuTextureDesc) {
    let depth = if desc.texture_type.uses_depth() { desc.depth } else { 0 };
    debug!(
        "{} {}x{}x{} temporary render target of type {:?}",
        action, desc.width, desc.height, depth, desc.texture_type
    );
}

/// Pool of temporary render targets
#[derive(Default)]
pub struct RenderTargetPool {
    pool: RefCell<HashMap<GpuTextureDesc, Vec<Rc<Target>>>>,
}

impl RenderTargetPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a render target matching a descriptor
    ///
    /// A pooled texture with no outstanding handles is reused if there is
    /// one, otherwise a new texture is created and added to the pool.
    pub fn allocate(&self, manager: &GpuManager, desc: &GpuTextureDesc) -> RenderTargetHandle {
        let mut pool = self.pool.borrow_mut();
        let entries = pool.entry(*desc).or_default();

        if let Some(target) = entries.iter().find(|target| Rc::strong_count(target) == 1) {
            target.unused_frames.set(0);
            return RenderTargetHandle {
                target: Rc::clone(target),
            };
        }

        log_desc("Allocating new", desc);

        let target = Rc::new(Target {
            texture: manager.create_texture(*desc),
            unused_frames: Cell::new(0),
        });
        entries.push(Rc::clone(&target));

        RenderTargetHandle { target }
    }

    /// Age unused targets, freeing those unused for too long
    pub fn frame_started(&self) {
        let mut pool = self.pool.borrow_mut();

        pool.retain(|desc, entries| {
            entries.retain(|target| {
                if Rc::strong_count(target) > 1 {
                    return true;
                }

                let unused_frames = target.unused_frames.get() + 1;
                if unused_frames >= UNUSED_FRAMES_BEFORE_FREE {
                    log_desc("Releasing unused", desc);
                    return false;
                }

                target.unused_frames.set(unused_frames);
                true
            });

            !entries.is_empty()
        });
    }

    /// Number of textures held by the pool
    pub fn len(&self) -> usize {
        self.pool.borrow().values().map(Vec::len).sum()
    }

    /// Whether the pool holds no textures
    pub fn is_empty(&self) -> bool {
        self.pool.borrow().is_empty()
    }

    /// Release every texture without an outstanding handle
    pub fn purge(&self) {
        let mut pool = self.pool.borrow_mut();
        pool.retain(|_, entries| {
            entries.retain(|target| Rc::strong_count(target) > 1);
            !entries.is_empty()
        });
    }
}

impl FrameListener for RenderTargetPool {
    fn frame_started(&self) {
        RenderTargetPool::frame_started(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::pixel_format::PixelFormat;
    use crate::gpu::test_support::{mock_backend, mock_manager};
    use crate::gpu::texture::{GpuTextureType, TextureFlags};

    fn shadow_map_desc() -> GpuTextureDesc {
        GpuTextureDesc::new_2d(512, 512, PixelFormat::Depth32).with_flags(TextureFlags::RENDER_TARGET)
    }

    fn textures_created(manager: &GpuManager) -> usize {
        mock_backend(manager).counters().get("texture").copied().unwrap_or(0)
    }

    #[test]
    fn test_live_handles_never_alias() {
        let manager = mock_manager();
        let pool = RenderTargetPool::new();

        let first = pool.allocate(&manager, &shadow_map_desc());
        let second = pool.allocate(&manager, &shadow_map_desc());

        assert_ne!(first, second);
        assert_ne!(first.id(), second.id());
        assert_eq!(pool.len(), 2);
        assert_eq!(textures_created(&manager), 2);
    }

    #[test]
    fn test_released_target_is_reused() {
        let manager = mock_manager();
        let pool = RenderTargetPool::new();

        let id = pool.allocate(&manager, &shadow_map_desc()).id();
        let again = pool.allocate(&manager, &shadow_map_desc());

        assert_eq!(again.id(), id);
        assert_eq!(textures_created(&manager), 1);
    }

    #[test]
    fn test_different_descriptors_not_shared() {
        let manager = mock_manager();
        let pool = RenderTargetPool::new();

        let depth = pool.allocate(&manager, &shadow_map_desc()).id();
        let colour = pool.allocate(&manager, &GpuTextureDesc::new_2d(512, 512, PixelFormat::R8G8B8A8));

        assert_ne!(colour.id(), depth);
        assert_eq!(colour.format(), PixelFormat::R8G8B8A8);
    }

    #[test]
    fn test_eviction_after_unused_frames() {
        let manager = mock_manager();
        let pool = RenderTargetPool::new();

        let id = pool.allocate(&manager, &shadow_map_desc()).id();

        pool.frame_started();
        pool.frame_started();
        assert_eq!(pool.len(), 1);

        pool.frame_started();
        assert!(pool.is_empty());

        let fresh = pool.allocate(&manager, &shadow_map_desc());
        assert_ne!(fresh.id(), id);
        assert_eq!(textures_created(&manager), 2);
    }

    #[test]
    fn test_reuse_resets_unused_frames() {
        let manager = mock_manager();
        let pool = RenderTargetPool::new();

        let id = pool.allocate(&manager, &shadow_map_desc()).id();
        pool.frame_started();
        pool.frame_started();

        drop(pool.allocate(&manager, &shadow_map_desc()));
        pool.frame_started();
        pool.frame_started();

        assert_eq!(pool.allocate(&manager, &shadow_map_desc()).id(), id);
    }

    #[test]
    fn test_held_target_survives_frames() {
        let manager = mock_manager();
        let pool = RenderTargetPool::new();

        let handle = pool.allocate(&manager, &shadow_map_desc());
        for _ in 0..10 {
            pool.frame_started();
        }

        assert_eq!(pool.len(), 1);

        let clone = handle.clone();
        drop(handle);
        pool.frame_started();
        pool.frame_started();
        pool.frame_started();
        assert_eq!(pool.len(), 1);

        drop(clone);
        pool.purge();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_array_depth_distinguishes_descriptors() {
        let manager = mock_manager();
        let pool = RenderTargetPool::new();

        let cascades = GpuTextureDesc::new_2d(256, 256, PixelFormat::Depth32)
            .with_type(GpuTextureType::Texture2DArray)
            .with_depth(4);

        let four = pool.allocate(&manager, &cascades).id();
        let two = pool.allocate(&manager, &cascades.with_depth(2)).id();
        assert_ne!(four, two);
        assert_eq!(pool.len(), 2);
    }
}
