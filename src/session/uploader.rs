//! Sources of uploaded images for the `image` command

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::utils::error::{FishError, Result};

/// A file handed to the session; lives only for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// File name as given by the user (used for format checks and messages)
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, naming it by its final path component
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| FishError::image_load(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }
}

/// Supplies files for one `image` command
pub trait FileUploader {
    /// Collect the files of one upload
    ///
    /// May interact with the user through `input` and `output`. Problems with
    /// individual files are reported on `output` and those files skipped.
    fn upload(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<Vec<UploadedFile>>;
}

/// Asks for file paths on the console, one per line, until a blank line
#[derive(Debug, Default)]
pub struct PromptUploader;

impl FileUploader for PromptUploader {
    fn upload(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<Vec<UploadedFile>> {
        writeln!(output, "Enter image paths, one per line (blank line to finish):")?;
        output.flush()?;

        let mut files = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let entry = line.trim();
            if entry.is_empty() {
                break;
            }

            match UploadedFile::from_path(&PathBuf::from(entry)) {
                Ok(file) => {
                    debug!("Uploaded {} ({} bytes)", file.name, file.bytes.len());
                    files.push(file);
                }
                Err(e) => writeln!(output, "{e}")?,
            }
        }

        Ok(files)
    }
}

/// Hands out prepared uploads, one batch per call
///
/// Used for the non-interactive `predict` command.
#[derive(Debug, Default)]
pub struct FixedUploader {
    batches: VecDeque<Vec<UploadedFile>>,
}

impl FixedUploader {
    pub fn new(batches: impl IntoIterator<Item = Vec<UploadedFile>>) -> Self {
        Self {
            batches: batches.into_iter().collect(),
        }
    }

    /// Number of batches not yet handed out
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl FileUploader for FixedUploader {
    fn upload(
        &mut self,
        _input: &mut dyn BufRead,
        _output: &mut dyn Write,
    ) -> Result<Vec<UploadedFile>> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}
