//! Artistic QR code service.
//!
//! Takes a text payload and a picture, renders a QR code blended with the
//! picture and upscales it to a fixed width. Served over HTTP by the binary
//! in `main.rs`.

pub mod config;
pub mod error;
pub mod frames;
pub mod generator;
pub mod models;
pub mod render;
pub mod routes;
pub mod scratch;
pub mod upscale;
pub mod validate;
