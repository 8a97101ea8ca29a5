//! Reference lookup for fish species
//!
//! Each species may have a text file `<info_dir>/<name>.txt` and a folder of
//! sample images `<image_dir>/<name>/`, normally the training dataset root.
//! Name matching is exact and case-sensitive on every platform.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::dataset::has_image_extension;
use crate::utils::error::Result;

/// Outcome of looking for a species' sample image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageLookup {
    /// First image in sorted order
    Found(PathBuf),
    /// The folder exists but holds no images
    EmptyFolder,
    /// There is no folder for the species
    MissingFolder,
}

/// Everything known about a species
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceEntry {
    /// No information file; the image folder is not consulted
    NotFound,
    Found { text: String, image: ImageLookup },
}

/// Read-only access to species descriptions and sample images
#[derive(Debug, Clone)]
pub struct ReferenceLibrary {
    info_dir: PathBuf,
    image_dir: PathBuf,
    display_size: usize,
}

impl ReferenceLibrary {
    pub fn new(info_dir: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            info_dir: info_dir.into(),
            image_dir: image_dir.into(),
            display_size: crate::IMAGE_SIZE,
        }
    }

    /// Square size sample images are resized to before display
    pub fn with_display_size(mut self, size: usize) -> Self {
        self.display_size = size.max(1);
        self
    }

    pub fn display_size(&self) -> usize {
        self.display_size
    }

    pub fn info_dir(&self) -> &Path {
        &self.info_dir
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Contents of `<name>.txt`, if present
    pub fn info(&self, name: &str) -> Result<Option<String>> {
        if !is_plain_name(name) {
            debug!("Rejecting reference name {:?}", name);
            return Ok(None);
        }

        let wanted = format!("{name}.txt");
        let Some(path) = find_entry(&self.info_dir, |entry_name, path| {
            entry_name == wanted && path.is_file()
        }) else {
            return Ok(None);
        };

        Ok(Some(std::fs::read_to_string(path)?))
    }

    /// First image of the species' sample folder
    pub fn first_image(&self, name: &str) -> ImageLookup {
        if !is_plain_name(name) {
            return ImageLookup::MissingFolder;
        }

        let Some(folder) =
            find_entry(&self.image_dir, |entry_name, path| entry_name == name && path.is_dir())
        else {
            return ImageLookup::MissingFolder;
        };

        let mut images: Vec<PathBuf> = match std::fs::read_dir(&folder) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && has_image_extension(p))
                .collect(),
            Err(_) => return ImageLookup::MissingFolder,
        };
        images.sort();

        match images.into_iter().next() {
            Some(path) => ImageLookup::Found(path),
            None => ImageLookup::EmptyFolder,
        }
    }

    /// Text and sample image for a species
    pub fn lookup(&self, name: &str) -> Result<ReferenceEntry> {
        match self.info(name)? {
            None => Ok(ReferenceEntry::NotFound),
            Some(text) => Ok(ReferenceEntry::Found {
                text,
                image: self.first_image(name),
            }),
        }
    }
}

/// Names that could escape the directory never match
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Scan a directory for an entry whose exact file name satisfies `matches`
///
/// Scanning instead of joining keeps the match case-sensitive on
/// case-insensitive filesystems.
fn find_entry(dir: &Path, matches: impl Fn(&str, &Path) -> bool) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries.filter_map(|e| e.ok()).find_map(|entry| {
        let path = entry.path();
        let file_name = entry.file_name();
        let file_name = file_name.to_str()?;
        matches(file_name, &path).then_some(path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library(dir: &TempDir) -> ReferenceLibrary {
        let info = dir.path().join("info");
        let images = dir.path().join("images");
        std::fs::create_dir_all(&info).unwrap();
        std::fs::create_dir_all(&images).unwrap();
        ReferenceLibrary::new(info, images)
    }

    #[test]
    fn test_info_exact_match() {
        let dir = TempDir::new().unwrap();
        let lib = library(&dir);
        std::fs::write(lib.info_dir().join("Rui.txt"), "Labeo rohita").unwrap();

        assert_eq!(lib.info("Rui").unwrap().as_deref(), Some("Labeo rohita"));
        assert_eq!(lib.info("rui").unwrap(), None);
        assert_eq!(lib.info("Ru").unwrap(), None);
    }

    #[test]
    fn test_path_like_names_never_match() {
        let dir = TempDir::new().unwrap();
        let lib = library(&dir);
        std::fs::write(dir.path().join("secret.txt"), "x").unwrap();

        assert_eq!(lib.info("../secret").unwrap(), None);
        assert_eq!(lib.info("").unwrap(), None);
        assert_eq!(lib.first_image(".."), ImageLookup::MissingFolder);
    }

    #[test]
    fn test_first_image_variants() {
        let dir = TempDir::new().unwrap();
        let lib = library(&dir);

        assert_eq!(lib.first_image("Rui"), ImageLookup::MissingFolder);

        let folder = lib.image_dir().join("Rui");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("notes.txt"), "x").unwrap();
        assert_eq!(lib.first_image("Rui"), ImageLookup::EmptyFolder);

        std::fs::write(folder.join("b.jpg"), "x").unwrap();
        std::fs::write(folder.join("a.png"), "x").unwrap();
        assert_eq!(lib.first_image("Rui"), ImageLookup::Found(folder.join("a.png")));
    }

    #[test]
    fn test_lookup_without_info_skips_images() {
        let dir = TempDir::new().unwrap();
        let lib = library(&dir);
        let folder = lib.image_dir().join("Rui");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("a.png"), "x").unwrap();

        assert_eq!(lib.lookup("Rui").unwrap(), ReferenceEntry::NotFound);
    }

    #[test]
    fn test_missing_info_dir_is_not_an_error() {
        let lib = ReferenceLibrary::new("/no/such/info", "/no/such/images");
        assert_eq!(lib.lookup("Rui").unwrap(), ReferenceEntry::NotFound);
    }
}
