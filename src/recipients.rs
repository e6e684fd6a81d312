//! Where the ordered list of recipient addresses comes from

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::{self, Error};

/// Supplies recipient addresses, in the order they should be attempted
///
/// Implementations are trusted to hand out unique, well-formed addresses.
pub trait RecipientSource {
    /// Loads the addresses
    fn recipients(&self) -> Result<Vec<String>, Error>;
}

impl RecipientSource for Vec<String> {
    fn recipients(&self) -> Result<Vec<String>, Error> {
        Ok(self.clone())
    }
}

/// One address per line of a text file
///
/// Surrounding whitespace is trimmed, blank lines and lines starting
/// with `#` are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecipients {
    path: PathBuf,
}

impl FileRecipients {
    /// Reads recipients from `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileRecipients { path: path.into() }
    }

    /// The file read
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecipientSource for FileRecipients {
    fn recipients(&self) -> Result<Vec<String>, Error> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            error::configuration(format!(
                "cannot read recipients from {}: {e}",
                self.path.display()
            ))
        })?;

        Ok(parse_lines(&text))
    }
}

fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}
