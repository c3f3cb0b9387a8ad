// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VqcmpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not open {role} video {}: {reason}", path.display())]
    SourceOpen {
        role: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("Could not open output file {}: {source}", path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No frames were sampled before a stream ended; averages cannot be computed")]
    NoSamples,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("FFmpeg/FFprobe command failed: {0}")]
    Command(String),

    #[error("Failed to parse command output: {0}")]
    Parse(String),

    #[error("Frame decode error: {0}")]
    Decode(String),

    #[error("Invalid frame: {0}")]
    Frame(String),
}

// Define a standard Result type for the crate
pub type Result<T> = std::result::Result<T, VqcmpError>;
