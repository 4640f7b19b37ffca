//! 3D model viewer application
//!
//! Loads an OBJ model and a texture, opens a window and renders the
//! model rotating until the window is closed. Model and texture paths
//! can be given on the command line; sensible defaults are used
//! otherwise.

use std::path::PathBuf;

use viewer_engine::assets::{ImageData, ObjLoader};
use viewer_engine::render::{Window, VulkanRenderer};

const WINDOW_WIDTH: u32 = 800;
const WINDOW_HEIGHT: u32 = 600;
const WINDOW_TITLE: &str = "3D Viewer";

const DEFAULT_MODEL: &str = "resources/models/cube.obj";

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let model_path = args.next().unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let texture_path = args.next();

    log::info!("Loading model from {}", model_path);
    let mesh = ObjLoader::load_obj(&model_path)?;

    let image = match texture_path {
        Some(path) => {
            log::info!("Loading texture from {}", path);
            ImageData::from_file(&path)?
        }
        None => ImageData::solid_color(1, 1, [255, 255, 255, 255]),
    };

    let mut window = Window::new(WINDOW_TITLE, WINDOW_WIDTH, WINDOW_HEIGHT)?;

    let shader_dir = PathBuf::from("target/shaders");
    let mut renderer = VulkanRenderer::new(
        &mut window,
        WINDOW_TITLE,
        &mesh,
        &image,
        &shader_dir.join("model.vert.spv"),
        &shader_dir.join("model.frag.spv"),
    )?;

    log::info!("Entering main loop");
    while !window.should_close() {
        window.poll_events();
        renderer.draw_frame(&mut window)?;
    }

    renderer.wait_idle()?;
    log::info!("Shutting down");
    Ok(())
}

fn main() {
    viewer_engine::foundation::logging::init(log::LevelFilter::Info);

    if let Err(e) = run() {
        log::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}
