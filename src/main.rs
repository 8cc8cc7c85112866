use std::error::Error;
use std::rc::Rc;

use glow::HasContext;
use log::{LevelFilter, error, info};
use texstore::{GlowBackend, Settings, TextureStore, TextureTarget};

fn main() {
    // The logger goes up before settings are read so their warnings are kept.
    // Without RUST_LOG it accepts everything and `log::set_max_level` does
    // the filtering, first at Info, then at the configured level.
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    let mut builder = env_logger::Builder::new();
    if rust_log_set {
        builder.parse_default_env();
    } else {
        builder.filter_level(LevelFilter::Trace);
    }
    builder.init();
    if let Some(level) = max_log_level(rust_log_set, None) {
        log::set_max_level(level);
    }

    let settings = Settings::load_user_settings();
    if let Some(level) = max_log_level(rust_log_set, Some(&settings)) {
        log::set_max_level(level);
    }

    if let Err(e) = run(&settings) {
        error!("{}", e);
        std::process::exit(1);
    }
}

/// Level to filter at, or `None` when RUST_LOG decides.
fn max_log_level(rust_log_set: bool, settings: Option<&Settings>) -> Option<LevelFilter> {
    if rust_log_set {
        return None;
    }
    Some(settings.map_or(LevelFilter::Info, Settings::level_filter))
}

fn run(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let images: Vec<String> = std::env::args().skip(1).collect();
    if images.is_empty() {
        return Err("usage: texstore-probe IMAGE...".into());
    }

    let (gl, _window, _context) = create_sdl2_context()?;
    let gl = Rc::new(gl);
    let version = unsafe { gl.get_parameter_string(glow::VERSION) };
    info!("OpenGL Version: {}", version);
    let max_size = unsafe { gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE) };
    info!("Max texture size: {}", max_size);

    let backend = Rc::new(GlowBackend::new(gl));
    let mut store = TextureStore::with_target(
        backend,
        TextureTarget::Texture2D,
        settings.store.texture_unit(),
        settings.store.width,
        settings.store.height,
        settings.store.filter,
    )?;
    info!(
        "Store {}x{} ({:?}, {:?})",
        store.store_width(),
        store.store_height(),
        store.filter(),
        store.unit()
    );

    for path in &images {
        store.load_image(path)?;
        let transform = store.transform();
        info!(
            "{}: image {}x{}, scale ({:.5}, {:.5})",
            path,
            store.image_width(),
            store.image_height(),
            transform.x_axis.x,
            transform.y_axis.y
        );
    }

    store.release();
    Ok(())
}

fn create_sdl2_context() -> Result<
    (
        glow::Context,
        sdl2::video::Window,
        sdl2::video::GLContext,
    ),
    Box<dyn Error>,
> {
    let sdl = sdl2::init()?;
    let video = sdl.video()?;
    let gl_attr = video.gl_attr();
    gl_attr.set_context_profile(sdl2::video::GLProfile::Core);
    gl_attr.set_context_version(3, 3);
    gl_attr.set_context_flags().forward_compatible().set();
    let window = video
        .window("texstore-probe", 64, 64)
        .opengl()
        .hidden()
        .build()?;
    let gl_context = window.gl_create_context()?;
    window.gl_make_current(&gl_context)?;
    let gl = unsafe {
        glow::Context::from_loader_function(|s| video.gl_get_proc_address(s) as *const _)
    };

    Ok((gl, window, gl_context))
}
