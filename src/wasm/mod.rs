//! WASM bindings for spatia
//!
//! This module provides the JavaScript-facing API for running the engine
//! in a browser, driven from an AudioWorklet and `requestAnimationFrame`.

mod engine;
mod error;

pub use engine::SpatiaEngine;
pub use error::SpatiaError;

// Re-export wasm_bindgen for convenience
pub use wasm_bindgen::prelude::*;
