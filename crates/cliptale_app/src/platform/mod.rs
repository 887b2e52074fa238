pub mod app;
pub mod config;
pub mod effects;
pub mod ui;

pub use app::run_app;
