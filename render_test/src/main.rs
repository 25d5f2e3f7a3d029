//! Render Test
//!
//! Renders a few frames on the software GL device and writes the main
//! window to a PNG. Each frame an off-screen target from the render target
//! pool is cleared, with a smaller inner area cleared to a second colour,
//! and the main window is cleared and has the off-screen image blitted
//! into it.
//!
//! Usage: `render_test [config.toml|config.ron] [output.png]`

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use gpu_engine::foundation::logging::{self, error, info};
use gpu_engine::gpu::gl::{GlBackend, SoftDevice};
use gpu_engine::gpu::{GpuRenderPass, TextureFlags, WindowInfo};
use gpu_engine::prelude::*;
use thiserror::Error;

const FRAME_COUNT: u32 = 3;
const OFFSCREEN_SIZE: u32 = 128;
const BLIT_POSITION: i32 = 16;

const WINDOW_COLOUR: [f32; 4] = [0.0, 0.0, 0.5, 1.0];
const OFFSCREEN_COLOUR: [f32; 4] = [1.0, 0.5, 0.0, 1.0];
const INNER_COLOUR: [f32; 4] = [0.0, 1.0, 0.0, 1.0];

#[derive(Error, Debug)]
enum RenderTestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to write image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Window image has unexpected size {0} bytes")]
    ImageSize(usize),

    #[error("Pixel at {x},{y} is {actual:?}, expected {expected:?}")]
    Mismatch {
        x: u32,
        y: u32,
        actual: [u8; 4],
        expected: [u8; 4],
    },
}

type Shared = Rc<RefCell<Option<RenderTargetHandle>>>;

fn clear_pass(gpu: &GpuManager) -> Rc<GpuRenderPass> {
    gpu.create_render_pass(
        GpuRenderPassDesc::default()
            .with_colour(GpuRenderAttachmentDesc::new(PixelFormat::R8G8B8A8, GpuRenderLoadOp::Clear)),
    )
}

/// Pooled off-screen texture, rendered before the window
struct OffscreenTarget {
    shared: Shared,
}

impl RenderTarget for OffscreenTarget {
    fn priority(&self) -> RenderPriority {
        RenderPriority::TextureHigh
    }

    fn render(&self, engine: &Engine) {
        let gpu = engine.gpu();
        let handle = engine.allocate_render_target(
            &GpuTextureDesc::new_2d(OFFSCREEN_SIZE, OFFSCREEN_SIZE, PixelFormat::R8G8B8A8)
                .with_flags(TextureFlags::RENDER_TARGET),
        );

        let pass = clear_pass(gpu);
        let targets = GpuRenderTargetDesc::with_colour(vec![handle.image_ref()]);

        let cmd_list = gpu.begin_render_pass(
            GpuRenderPassInstanceDesc::new(&pass)
                .with_targets(targets.clone())
                .with_clear_colour(0, Colour::from(OFFSCREEN_COLOUR))
                .with_render_area(IntRect::from_size(OFFSCREEN_SIZE, OFFSCREEN_SIZE)),
        );
        gpu.submit_render_pass(cmd_list);

        let inner = OFFSCREEN_SIZE as i32 / 4;
        let cmd_list = gpu.begin_render_pass(
            GpuRenderPassInstanceDesc::new(&pass)
                .with_targets(targets)
                .with_clear_colour(0, Colour::from(INNER_COLOUR))
                .with_render_area(IntRect::new(inner, inner, inner * 2, inner * 2)),
        );
        gpu.submit_render_pass(cmd_list);

        *self.shared.borrow_mut() = Some(handle);
    }
}

/// Main window, cleared with the off-screen image blitted on top
struct WindowTarget {
    shared: Shared,
}

impl RenderTarget for WindowTarget {
    fn priority(&self) -> RenderPriority {
        RenderPriority::Window
    }

    fn render(&self, engine: &Engine) {
        let gpu = engine.gpu();
        let window = gpu.window();

        let pass = clear_pass(gpu);
        let mut cmd_list = gpu.begin_render_pass(
            GpuRenderPassInstanceDesc::new(&pass)
                .with_clear_colour(0, Colour::from(WINDOW_COLOUR))
                .with_render_area(IntRect::from_size(window.width, window.height)),
        );
        cmd_list.begin_debug_group("Window clear");
        cmd_list.end_debug_group();
        gpu.submit_render_pass(cmd_list);

        // Dropping the handle returns the texture to the pool for next frame.
        if let Some(handle) = self.shared.borrow_mut().take() {
            let size = OFFSCREEN_SIZE as i32;
            gpu.blit(
                &handle.image_ref(),
                &GpuTextureImageRef::null(),
                IVec2::new(0, 0),
                IVec2::new(BLIT_POSITION, BLIT_POSITION),
                IVec2::new(size, size),
            );
        }
    }
}

fn to_rgba8(colour: [f32; 4]) -> [u8; 4] {
    colour.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn check_pixel(image: &image::RgbaImage, x: u32, y: u32, expected: [f32; 4]) -> Result<(), RenderTestError> {
    let actual = image.get_pixel(x, y).0;
    let expected = to_rgba8(expected);

    if actual == expected {
        Ok(())
    } else {
        Err(RenderTestError::Mismatch { x, y, actual, expected })
    }
}

fn run() -> Result<(), RenderTestError> {
    let mut args = std::env::args().skip(1);

    let config = match args.next() {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default().with_graphics(
            GraphicsConfig::default().with_window(WindowConfig::default().with_title("Render Test").with_size(320, 240)),
        ),
    };
    let output = PathBuf::from(args.next().unwrap_or_else(|| "render_test.png".to_string()));

    logging::init_with_level(&config.log_level);
    config.validate()?;

    let window = &config.graphics.window;
    let device = Rc::new(SoftDevice::new(window.width, window.height));
    let backend = GlBackend::new(
        device.clone(),
        WindowInfo {
            width: window.width,
            height: window.height,
            format: window.format,
        },
    );

    let mut engine = Engine::with_backend(config, Box::new(backend))?;

    let shared = Shared::default();
    engine.add_render_target(Rc::new(WindowTarget {
        shared: Rc::clone(&shared),
    }));
    engine.add_render_target(Rc::new(OffscreenTarget { shared }));

    for _ in 0..FRAME_COUNT {
        let stats = engine.render_frame();
        info!(
            "Frame {}: {} render passes, {} blits, {:.3} ms",
            engine.frame_count(),
            stats.render_passes,
            stats.blits,
            stats.frame_time * 1000.0
        );
    }

    info!(
        "{} pooled render targets, {} frames presented",
        engine.render_target_pool().len(),
        device.presented_frames()
    );

    let window_image = device.window_image();
    let data = window_image.to_rgba8();
    let data_len = data.len();
    let image = image::RgbaImage::from_raw(window_image.width(), window_image.height(), data)
        .ok_or(RenderTestError::ImageSize(data_len))?;

    let blit = BLIT_POSITION as u32;
    let quarter = OFFSCREEN_SIZE / 4;
    check_pixel(&image, 0, 0, WINDOW_COLOUR)?;
    check_pixel(&image, blit, blit, OFFSCREEN_COLOUR)?;
    check_pixel(&image, blit + quarter * 2, blit + quarter * 2, INNER_COLOUR)?;
    check_pixel(&image, blit + OFFSCREEN_SIZE, blit + OFFSCREEN_SIZE, WINDOW_COLOUR)?;

    image.save(&output)?;
    info!("Wrote {}", output.display());

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        error!("Render test failed: {}", e);
        eprintln!("Render test failed: {e}");
        std::process::exit(1);
    }
}
