//! The blocking interactive loop
//!
//! Prompts for a command, then either predicts species for uploaded images or
//! prints reference information for a named species. All collaborators are
//! injected so the loop runs the same against a terminal or a script.

use std::io::{BufRead, Write};

use image::DynamicImage;
use tracing::{debug, warn};

use super::command::Command;
use super::uploader::{FileUploader, UploadedFile};
use super::viewer::ImageViewer;
use crate::dataset::is_valid_image_name;
use crate::dataset::preprocess::{open_image, resize};
use crate::inference::{Predictor, SpeciesModel};
use crate::reference::{ImageLookup, ReferenceEntry, ReferenceLibrary};
use crate::utils::error::{FishError, Result};

pub const MENU_PROMPT: &str =
    "Enter 'image' to predict species from an image, 'name' to provide a fish name, or 'exit' to quit: ";
pub const NAME_PROMPT: &str = "Enter the fish name: ";
pub const EXIT_MESSAGE: &str = "Exiting the program.";
pub const INVALID_CHOICE: &str = "Invalid choice. Please enter 'image', 'name', or 'exit'.";

/// Whether the loop keeps going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Interactive session over a predictor and a reference library
pub struct Session<'a, M: SpeciesModel, U: FileUploader, V: ImageViewer> {
    predictor: &'a Predictor<M>,
    library: &'a ReferenceLibrary,
    uploader: U,
    viewer: V,
}

impl<'a, M: SpeciesModel, U: FileUploader, V: ImageViewer> Session<'a, M, U, V> {
    pub fn new(
        predictor: &'a Predictor<M>,
        library: &'a ReferenceLibrary,
        uploader: U,
        viewer: V,
    ) -> Self {
        Self {
            predictor,
            library,
            uploader,
            viewer,
        }
    }

    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    /// Run until `exit` or end of input
    pub fn run<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<()> {
        while self.step(input, output)? == Flow::Continue {}
        Ok(())
    }

    /// Prompt for and handle a single command
    pub fn step<R: BufRead, W: Write>(&mut self, input: &mut R, output: &mut W) -> Result<Flow> {
        let Some(line) = prompt(input, output, MENU_PROMPT)? else {
            writeln!(output)?;
            writeln!(output, "{EXIT_MESSAGE}")?;
            return Ok(Flow::Exit);
        };

        match Command::parse(&line) {
            Some(Command::Image) => {
                let uploads = self.uploader.upload(input, output)?;
                self.handle_uploads(uploads, output)?;
            }
            Some(Command::Name) => {
                let Some(name) = prompt(input, output, NAME_PROMPT)? else {
                    writeln!(output)?;
                    writeln!(output, "{EXIT_MESSAGE}")?;
                    return Ok(Flow::Exit);
                };
                self.lookup(&name, output)?;
            }
            Some(Command::Exit) => {
                writeln!(output, "{EXIT_MESSAGE}")?;
                return Ok(Flow::Exit);
            }
            None => {
                debug!("Rejected menu input {:?}", line);
                writeln!(output, "{INVALID_CHOICE}")?;
            }
        }

        Ok(Flow::Continue)
    }

    /// Validate and predict each uploaded file
    ///
    /// A failure on one file is reported and the rest still run.
    pub fn handle_uploads<W: Write>(&mut self, uploads: Vec<UploadedFile>, output: &mut W) -> Result<()> {
        for upload in uploads {
            if !is_valid_image_name(&upload.name) {
                writeln!(
                    output,
                    "Uploaded file '{}' is not a valid image format.",
                    upload.name
                )?;
                continue;
            }

            writeln!(output, "Uploaded image: {}", upload.name)?;
            if let Err(e) = self.predict_upload(&upload, output) {
                warn!("Prediction failed for {}: {}", upload.name, e);
                writeln!(output, "{e}")?;
            }
        }
        Ok(())
    }

    fn predict_upload<W: Write>(&mut self, upload: &UploadedFile, output: &mut W) -> Result<()> {
        let image = image::load_from_memory(&upload.bytes)
            .map_err(|e| FishError::image_load(upload.name.as_str(), e))?;
        let prediction = self.predictor.predict_image(&image)?;
        let species = prediction.species;

        self.viewer.show(&format!("Predicted: {species}"), &image)?;

        match self.library.info(&species)? {
            Some(text) => {
                writeln!(output, "Information on {species}:")?;
                writeln!(output, "{text}")?;
            }
            None => writeln!(output, "No information file found for {species}")?,
        }
        Ok(())
    }

    /// Print reference text and show the first sample image for a species
    pub fn lookup<W: Write>(&mut self, name: &str, output: &mut W) -> Result<()> {
        show_reference(self.library, &mut self.viewer, name, output)
    }
}

/// Print the description of `name` and show its first sample image
///
/// Needs no trained model; images are shown at the library's display size.
pub fn show_reference<V: ImageViewer, W: Write>(
    library: &ReferenceLibrary,
    viewer: &mut V,
    name: &str,
    output: &mut W,
) -> Result<()> {
    let (text, image) = match library.lookup(name)? {
        ReferenceEntry::NotFound => {
            writeln!(output, "No information file found for {name}")?;
            return Ok(());
        }
        ReferenceEntry::Found { text, image } => (text, image),
    };

    writeln!(output, "Information on {name}:")?;
    writeln!(output, "{text}")?;

    match image {
        ImageLookup::Found(path) => match open_image(&path) {
            Ok(img) => {
                let shown: DynamicImage = resize(&img, library.display_size());
                viewer.show(&format!("{name} Image"), &shown)?;
            }
            Err(e) => writeln!(output, "{e}")?,
        },
        ImageLookup::EmptyFolder => writeln!(output, "No images found for {name}")?,
        ImageLookup::MissingFolder => writeln!(output, "No image folder found for {name}")?,
    }
    Ok(())
}

/// Write a prompt and read one line without its terminator; `None` at end of input
fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, text: &str) -> Result<Option<String>> {
    write!(output, "{text}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']);
    Ok(Some(trimmed.to_string()))
}
