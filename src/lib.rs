pub mod config;
pub mod contact;
pub mod data;
pub mod dom;
pub mod loader;
pub mod probe;
pub mod render;
pub mod renderer;
pub mod site;

pub use renderer::{MenuRenderer, MenuRendererBuilder, RenderedMenu};
