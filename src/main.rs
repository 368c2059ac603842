//! # Voxel Streaming Entry Point
//!
//! Runs the headless streaming demo. Pass a JSON config file as the first argument to
//! override the defaults.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- config.json
//! ```

fn main() {
    if let Err(error) = voxel_streaming::run() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}
