//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::GraftError;
use std::error::Error;

/// Map pipeline errors to a string for CLI output, including the cause chain.
pub fn map_error(e: &GraftError) -> String {
    let mut message = format!("error: {}", e);
    let mut source = e.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(&format!("\n  caused by: {}", text));
        }
        source = cause.source();
    }
    message
}
