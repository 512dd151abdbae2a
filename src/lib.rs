#![warn(clippy::all, rust_2018_idioms)]

pub mod app;
pub mod assistant;
pub mod config;
pub mod document;
pub mod effects;
pub mod error;
pub mod event;
pub mod geometry;
pub mod image_cache;
pub mod layer;
pub mod library;
pub mod panels;
pub mod pixmap;
pub mod render;
pub mod session;
pub mod stroke;
pub mod util;

pub use app::SketchApp;
pub use config::AppConfig;
pub use document::Document;
pub use error::{Error, ErrorKind};
pub use image_cache::ImageCache;
pub use layer::{Layer, LayerModel};
pub use library::ShapeLibrary;
pub use pixmap::Pixmap;
pub use session::{Session, SessionManager};
pub use stroke::Stroke;
