pub mod cli;
pub mod config;
pub mod core;
pub mod lifecycle;
pub mod render;

pub use config::BackdropConfig;
pub use lifecycle::Session;
