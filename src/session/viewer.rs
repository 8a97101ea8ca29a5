//! Image display for the interactive session

use std::io::Write;
use std::path::PathBuf;

use colored::Colorize;
use image::DynamicImage;
use tracing::info;

use crate::utils::error::{FishError, Result};

/// Shows an image with a title
pub trait ImageViewer {
    fn show(&mut self, title: &str, image: &DynamicImage) -> Result<()>;
}

/// Prints the title and dimensions, optionally saving the image as PNG
#[derive(Debug, Default)]
pub struct ConsoleViewer {
    save_dir: Option<PathBuf>,
}

impl ConsoleViewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write every shown image to `dir/<title>.png`
    pub fn saving_to(dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: Some(dir.into()),
        }
    }
}

impl ImageViewer for ConsoleViewer {
    fn show(&mut self, title: &str, image: &DynamicImage) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(
            stdout,
            "{} {} ({}x{})",
            "[image]".cyan(),
            title.bold(),
            image.width(),
            image.height()
        )?;

        if let Some(dir) = &self.save_dir {
            std::fs::create_dir_all(dir)?;
            let path = dir.join(format!("{}.png", file_stem_for(title)));
            image
                .save(&path)
                .map_err(|e| FishError::Io(std::io::Error::other(e)))?;
            info!("Saved displayed image to {:?}", path);
            writeln!(stdout, "        saved to {}", path.display())?;
        }

        Ok(())
    }
}

/// Replace characters that do not belong in a file name
fn file_stem_for(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Records what would have been shown
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingViewer {
    pub shown: Vec<(String, u32, u32)>,
}

#[cfg(test)]
impl ImageViewer for RecordingViewer {
    fn show(&mut self, title: &str, image: &DynamicImage) -> Result<()> {
        self.shown
            .push((title.to_string(), image.width(), image.height()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_stem_for_title() {
        assert_eq!(file_stem_for("Predicted: Rui"), "Predicted__Rui");
        assert_eq!(file_stem_for("Boal Image"), "Boal_Image");
    }

    #[test]
    fn test_console_viewer_saves_png() {
        let dir = TempDir::new().unwrap();
        let mut viewer = ConsoleViewer::saving_to(dir.path());

        viewer.show("Rui Image", &DynamicImage::new_rgb8(4, 3)).unwrap();

        let saved = image::open(dir.path().join("Rui_Image.png")).unwrap();
        assert_eq!((saved.width(), saved.height()), (4, 3));
    }
}
