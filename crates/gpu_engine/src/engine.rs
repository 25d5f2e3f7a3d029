//! Core engine implementation
//!
//! The engine owns the GPU manager and the render target pool and drives
//! the frame loop. Each frame it notifies frame listeners, renders every
//! registered render target in priority order, then ends the GPU frame.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use thiserror::Error;

use crate::core::config::{BackendKind, ConfigError, EngineConfig, GraphicsConfig};
use crate::foundation::logging::{info, trace};
use crate::gpu::error::GpuError;
use crate::gpu::gl::{GlBackend, SoftDevice};
use crate::gpu::manager::{GpuBackend, GpuManager, WindowInfo};
use crate::gpu::texture::GpuTextureDesc;
use crate::render::render_target_pool::{RenderTargetHandle, RenderTargetPool};

/// Receives notifications at the start and end of each frame
pub trait FrameListener {
    /// Called before any render target is rendered
    fn frame_started(&self) {}

    /// Called after the GPU frame has ended
    fn frame_ended(&self) {}
}

/// Rendering priority of a render target
///
/// Targets are rendered in ascending order, so textures which other targets
/// sample from are rendered before the main window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderPriority {
    /// High priority render texture (rendered first)
    TextureHigh,
    /// Medium priority render texture
    TextureMedium,
    /// Low priority render texture
    TextureLow,
    /// Main window (rendered last)
    Window,
}

/// Something the engine renders every frame
pub trait RenderTarget {
    /// Rendering priority
    fn priority(&self) -> RenderPriority;

    /// Record and submit the target's render passes
    fn render(&self, engine: &Engine);
}

/// Statistics of the last completed frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineStats {
    /// Time taken by the frame in seconds
    pub frame_time: f32,
    /// Render passes submitted
    pub render_passes: u32,
    /// Draw calls submitted
    pub draw_calls: u32,
    /// Blits performed
    pub blits: u32,
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// GPU backend creation error
    #[error("GPU initialization failed: {0}")]
    Gpu(#[from] GpuError),
}

/// Create the GPU backend selected by the configuration
pub fn create_backend(config: &GraphicsConfig) -> Result<Box<dyn GpuBackend>, GpuError> {
    let window = &config.window;
    if window.width == 0 || window.height == 0 {
        return Err(GpuError::InvalidWindowSize {
            width: window.width,
            height: window.height,
        });
    }

    if !window.format.is_colour() {
        return Err(GpuError::UnsupportedWindowFormat(window.format));
    }

    match config.backend {
        BackendKind::GlSoft => {
            let device = Rc::new(SoftDevice::new(window.width, window.height));
            let info = WindowInfo {
                width: window.width,
                height: window.height,
                format: window.format,
            };

            Ok(Box::new(GlBackend::new(device, info)))
        }
        BackendKind::GlNative => Err(GpuError::UnsupportedBackend(config.backend)),
    }
}

/// Main engine struct
///
/// Field order is drop order: render targets and pooled textures are
/// released before the GPU manager.
pub struct Engine {
    render_targets: Vec<Rc<dyn RenderTarget>>,
    frame_listeners: Vec<Rc<dyn FrameListener>>,
    render_target_pool: Rc<RenderTargetPool>,
    gpu: GpuManager,
    config: EngineConfig,
    stats: Cell<EngineStats>,
    frame_count: Cell<u64>,
}

impl Engine {
    /// Create an engine with the backend selected by the configuration
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let backend = create_backend(&config.graphics)?;
        Self::with_backend(config, backend)
    }

    /// Create an engine over an existing backend
    pub fn with_backend(config: EngineConfig, backend: Box<dyn GpuBackend>) -> Result<Self, EngineError> {
        config.validate()?;

        info!("Initializing engine '{}'...", config.graphics.window.title);

        let gpu = GpuManager::new(backend, config.graphics.validation_enabled());
        let render_target_pool = Rc::new(RenderTargetPool::new());

        let mut engine = Self {
            render_targets: Vec::new(),
            frame_listeners: Vec::new(),
            render_target_pool: Rc::clone(&render_target_pool),
            gpu,
            config,
            stats: Cell::default(),
            frame_count: Cell::new(0),
        };

        engine.add_frame_listener(render_target_pool);
        Ok(engine)
    }

    /// The GPU manager
    pub const fn gpu(&self) -> &GpuManager {
        &self.gpu
    }

    /// The temporary render target pool
    pub fn render_target_pool(&self) -> &RenderTargetPool {
        &self.render_target_pool
    }

    /// Allocate a temporary render target from the pool
    pub fn allocate_render_target(&self, desc: &GpuTextureDesc) -> RenderTargetHandle {
        self.render_target_pool.allocate(&self.gpu, desc)
    }

    /// Engine configuration
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Statistics of the last completed frame
    pub fn stats(&self) -> EngineStats {
        self.stats.get()
    }

    /// Number of frames rendered so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count.get()
    }

    /// Register a frame listener
    pub fn add_frame_listener(&mut self, listener: Rc<dyn FrameListener>) {
        self.frame_listeners.push(listener);
    }

    /// Unregister a frame listener
    pub fn remove_frame_listener(&mut self, listener: &Rc<dyn FrameListener>) {
        self.frame_listeners.retain(|existing| !Rc::ptr_eq(existing, listener));
    }

    /// Add a render target to the frame loop
    ///
    /// Targets of equal priority render in the order they were added.
    pub fn add_render_target(&mut self, target: Rc<dyn RenderTarget>) {
        let priority = target.priority();
        let index = self
            .render_targets
            .iter()
            .position(|existing| priority < existing.priority())
            .unwrap_or(self.render_targets.len());

        self.render_targets.insert(index, target);
    }

    /// Remove a render target from the frame loop
    pub fn remove_render_target(&mut self, target: &Rc<dyn RenderTarget>) {
        self.render_targets.retain(|existing| !Rc::ptr_eq(existing, target));
    }

    /// Render one frame
    pub fn render_frame(&self) -> EngineStats {
        let start = Instant::now();

        for listener in &self.frame_listeners {
            listener.frame_started();
        }

        for target in &self.render_targets {
            target.render(self);
        }

        let gpu_stats = self.gpu.end_frame();

        for listener in &self.frame_listeners {
            listener.frame_ended();
        }

        let stats = EngineStats {
            frame_time: start.elapsed().as_secs_f32(),
            render_passes: gpu_stats.render_passes,
            draw_calls: gpu_stats.draws,
            blits: gpu_stats.blits,
        };

        self.stats.set(stats);
        self.frame_count.set(self.frame_count.get() + 1);

        trace!(
            "Frame {}: {} passes, {} draws, {} blits, {:.2} ms",
            self.frame_count.get(),
            stats.render_passes,
            stats.draw_calls,
            stats.blits,
            stats.frame_time * 1000.0
        );

        stats
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        info!("Engine shutdown after {} frames", self.frame_count.get());
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::core::config::WindowConfig;
    use crate::foundation::math::IntRect;
    use crate::gpu::defs::PrimitiveType;
    use crate::gpu::pixel_format::PixelFormat;
    use crate::gpu::render_pass::{GpuRenderAttachmentDesc, GpuRenderLoadOp, GpuRenderPassDesc, GpuRenderPassInstanceDesc};
    use crate::gpu::test_support::{mock_backend, mock_pipeline, mock_vertex_data, MockBackend};

    type Log = Rc<RefCell<Vec<String>>>;

    fn mock_engine() -> Engine {
        Engine::with_backend(EngineConfig::default(), Box::<MockBackend>::default()).expect("engine creation failed")
    }

    struct LoggingTarget {
        name: &'static str,
        priority: RenderPriority,
        log: Log,
    }

    impl RenderTarget for LoggingTarget {
        fn priority(&self) -> RenderPriority {
            self.priority
        }

        fn render(&self, _engine: &Engine) {
            self.log.borrow_mut().push(self.name.to_owned());
        }
    }

    fn logging_target(name: &'static str, priority: RenderPriority, log: &Log) -> Rc<dyn RenderTarget> {
        Rc::new(LoggingTarget {
            name,
            priority,
            log: Rc::clone(log),
        })
    }

    struct LoggingListener {
        log: Log,
    }

    impl FrameListener for LoggingListener {
        fn frame_started(&self) {
            self.log.borrow_mut().push("started".to_owned());
        }

        fn frame_ended(&self) {
            self.log.borrow_mut().push("ended".to_owned());
        }
    }

    /// Clears the main window and draws a triangle
    struct WindowTarget;

    impl RenderTarget for WindowTarget {
        fn priority(&self) -> RenderPriority {
            RenderPriority::Window
        }

        fn render(&self, engine: &Engine) {
            let gpu = engine.gpu();
            let pass = gpu.create_render_pass(
                GpuRenderPassDesc::default()
                    .with_colour(GpuRenderAttachmentDesc::new(PixelFormat::R8G8B8A8, GpuRenderLoadOp::Clear)),
            );

            let window = gpu.window();
            let mut cmd_list = gpu.begin_render_pass(
                GpuRenderPassInstanceDesc::new(&pass).with_render_area(IntRect::from_size(window.width, window.height)),
            );
            cmd_list.bind_pipeline(&mock_pipeline(gpu));
            cmd_list.draw(PrimitiveType::TriangleList, &mock_vertex_data(gpu, 3), None);
            gpu.submit_render_pass(cmd_list);
        }
    }

    #[test]
    fn test_targets_render_in_priority_order() {
        let log = Log::default();
        let mut engine = mock_engine();

        engine.add_render_target(logging_target("window", RenderPriority::Window, &log));
        engine.add_render_target(logging_target("low", RenderPriority::TextureLow, &log));
        engine.add_render_target(logging_target("high", RenderPriority::TextureHigh, &log));
        engine.add_render_target(logging_target("low 2", RenderPriority::TextureLow, &log));

        engine.render_frame();

        assert_eq!(*log.borrow(), vec!["high", "low", "low 2", "window"]);
    }

    #[test]
    fn test_remove_render_target() {
        let log = Log::default();
        let mut engine = mock_engine();

        let target = logging_target("shadow", RenderPriority::TextureHigh, &log);
        engine.add_render_target(Rc::clone(&target));
        engine.add_render_target(logging_target("window", RenderPriority::Window, &log));
        engine.remove_render_target(&target);

        engine.render_frame();
        assert_eq!(*log.borrow(), vec!["window"]);
    }

    #[test]
    fn test_frame_listeners_bracket_rendering() {
        let log = Log::default();
        let mut engine = mock_engine();

        let listener: Rc<dyn FrameListener> = Rc::new(LoggingListener { log: Rc::clone(&log) });
        engine.add_frame_listener(Rc::clone(&listener));
        engine.add_render_target(logging_target("window", RenderPriority::Window, &log));

        engine.render_frame();
        assert_eq!(*log.borrow(), vec!["started", "window", "ended"]);

        engine.remove_frame_listener(&listener);
        engine.render_frame();
        assert_eq!(log.borrow().len(), 4);
        assert_eq!(engine.frame_count(), 2);
        assert_eq!(mock_backend(engine.gpu()).frames.get(), 2);
    }

    #[test]
    fn test_frame_loop_ages_render_targets() {
        let engine = mock_engine();
        let desc = GpuTextureDesc::new_2d(256, 256, PixelFormat::FloatR16G16B16A16);

        drop(engine.allocate_render_target(&desc));
        assert_eq!(engine.render_target_pool().len(), 1);

        for _ in 0..3 {
            engine.render_frame();
        }

        assert!(engine.render_target_pool().is_empty());
    }

    #[test]
    fn test_stats_count_submissions() {
        let mut engine = mock_engine();
        engine.add_render_target(Rc::new(WindowTarget));

        let stats = engine.render_frame();
        assert_eq!(stats.render_passes, 1);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.blits, 0);
        assert_eq!(engine.stats(), stats);
    }

    #[test]
    fn test_native_backend_unsupported() {
        let config = EngineConfig::default().with_graphics(GraphicsConfig::default().with_backend(BackendKind::GlNative));

        assert!(matches!(
            Engine::new(config),
            Err(EngineError::Gpu(GpuError::UnsupportedBackend(BackendKind::GlNative)))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::default()
            .with_graphics(GraphicsConfig::default().with_window(WindowConfig::default().with_size(0, 0)));

        assert!(matches!(Engine::new(config), Err(EngineError::Config(_))));
        assert!(matches!(
            create_backend(&GraphicsConfig::default().with_window(WindowConfig::default().with_size(0, 0))),
            Err(GpuError::InvalidWindowSize { width: 0, height: 0 })
        ));
    }

    #[test]
    fn test_soft_backend_window_matches_config() {
        let window = WindowConfig::default().with_size(320, 200);
        let engine = Engine::new(EngineConfig::default().with_graphics(GraphicsConfig::default().with_window(window)))
            .expect("engine creation failed");

        let info = engine.gpu().window();
        assert_eq!((info.width, info.height), (320, 200));
        assert_eq!(info.format, PixelFormat::R8G8B8A8);
    }
}
