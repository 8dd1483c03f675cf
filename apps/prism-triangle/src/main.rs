//! Prism triangle demo
//!
//! Opens a window and draws one colored triangle, generated entirely in the
//! vertex shader, with a single frame in flight.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p prism-triangle -- [OPTIONS]
//! ```
//!
//! The GLSL shaders under `shaders/` are compiled to SPIR-V by the build
//! script and loaded from the build output directory at runtime.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod cli;

use prism_app::{run_app, AppConfig};

use crate::cli::{parse_args, Command};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const VERTEX_SHADER: &str = concat!(env!("OUT_DIR"), "/triangle.vert.spv");
const FRAGMENT_SHADER: &str = concat!(env!("OUT_DIR"), "/triangle.frag.spv");

fn main() -> anyhow::Result<()> {
    let defaults = AppConfig::new("Prism - Triangle")
        .with_size(WIDTH, HEIGHT)
        .with_shaders(VERTEX_SHADER, FRAGMENT_SHADER);

    match parse_args(std::env::args().skip(1), defaults)? {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Run(config) => run_app(config),
    }
}

fn print_help() {
    eprintln!(
        "Prism triangle demo

USAGE:
    cargo run -p prism-triangle -- [OPTIONS]

WINDOW OPTIONS:
    --width <N>               Window width in pixels (default: {WIDTH})
    --height <N>              Window height in pixels (default: {HEIGHT})

GPU OPTIONS:
    --validation              Enable Vulkan validation layers
    --no-validation           Disable Vulkan validation layers
                              Default: enabled in debug builds only

SHADER OPTIONS:
    --vertex-shader <PATH>    Vertex stage SPIR-V
    --fragment-shader <PATH>  Fragment stage SPIR-V
                              Default: triangle.{{vert,frag}}.spv compiled at build time

RUN OPTIONS:
    --max-frames <N>          Exit after presenting N frames

OTHER:
    -h, --help                Print this help message

EXAMPLES:
    # Draw until the window is closed
    cargo run -p prism-triangle

    # Smoke test: 300 frames with validation
    cargo run -p prism-triangle -- --validation --max-frames 300

ENVIRONMENT VARIABLES:
    RUST_LOG                  Set log level (e.g., info, debug, trace)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_app::ShaderPaths;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn default_shaders_are_built() {
        let stages = ShaderPaths::new(VERTEX_SHADER, FRAGMENT_SHADER).load().unwrap();

        assert_eq!(stages.vertex.first(), Some(&SPIRV_MAGIC));
        assert_eq!(stages.fragment.first(), Some(&SPIRV_MAGIC));
    }
}
