pub mod config;
pub mod descriptor;
pub mod geometry;
pub mod http;
pub mod image_processing;
