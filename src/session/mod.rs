//! Interactive session
//!
//! This module provides:
//! - Menu command parsing
//! - The file uploader and image viewer seams with console implementations
//! - The blocking read-eval loop tying predictor and reference lookup together

pub mod command;
pub mod repl;
pub mod uploader;
pub mod viewer;

pub use command::Command;
pub use repl::{show_reference, Flow, Session};
pub use uploader::{FileUploader, FixedUploader, PromptUploader, UploadedFile};
pub use viewer::{ConsoleViewer, ImageViewer};
