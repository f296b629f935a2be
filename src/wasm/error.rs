//! Errors thrown across the JS boundary

use std::fmt::Display;
use wasm_bindgen::prelude::*;

/// Thrown to JS by every fallible engine method; read `.message`
#[wasm_bindgen]
#[derive(Debug)]
pub struct SpatiaError {
    message: String,
}

impl SpatiaError {
    pub fn new(error: impl Display) -> Self {
        Self {
            message: error.to_string(),
        }
    }
}

#[wasm_bindgen]
impl SpatiaError {
    #[wasm_bindgen(getter)]
    pub fn message(&self) -> String {
        self.message.clone()
    }
}

/// Map any displayable error (engine, scene, config, JSON) to a thrown [`SpatiaError`]
pub(crate) fn js_err(error: impl Display) -> JsValue {
    SpatiaError::new(error).into()
}
