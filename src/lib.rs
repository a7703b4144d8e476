pub mod app;
pub mod audio;
pub mod config;
pub mod core;
pub mod library;
pub mod logging;
pub mod model;
pub mod playlist;
pub mod queue;
pub mod settings;
pub mod ui;
