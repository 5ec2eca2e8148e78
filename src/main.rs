//! # Terrain Engine Entry Point
//!
//! Runs the headless streaming demo from the library.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [config.json] [--gpu] [--seed N]
//! ```

fn main() -> anyhow::Result<()> {
    terrain_engine::run()
}
