//! Where router lists come from.
//!
//! We don't parse descriptors or directories here: a [`RouterListParser`]
//! turns document text into a [`RouterList`].  A [`DirectorySource`] tells
//! us where to get the text when we need to reload from configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{Error, ParseError, Result, RouterList};

/// A kind of document that holds relay descriptors.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, derive_more::Display)]
#[non_exhaustive]
pub enum DocKind {
    /// A locally configured list of routers.
    #[display("router file")]
    RouterFile,
    /// A directory, as downloaded from a directory server.
    #[display("directory")]
    Directory,
}

/// An object that can parse relay descriptor documents.
pub trait RouterListParser: Send + Sync {
    /// Parse `text` as a document of type `kind`.
    ///
    /// On success, return every relay in the document along with the
    /// document's publication time and recommended software versions, if
    /// it has any.
    fn parse(&self, text: &str, kind: DocKind) -> std::result::Result<RouterList, ParseError>;
}

/// A place where we can load trusted directory information from.
pub trait DirectorySource: Send + Sync {
    /// Return the text of the document at this source.
    fn load(&self) -> Result<String>;

    /// Return a description of this source, for logging.
    fn describe(&self) -> String;
}

/// A [`DirectorySource`] that reads a file on disk.
#[derive(Clone, Debug)]
pub struct FileSource(PathBuf);

impl FileSource {
    /// Return a new source that reads from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource(path.into())
    }

    /// Return the path that this source reads from.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl DirectorySource for FileSource {
    fn load(&self) -> Result<String> {
        std::fs::read_to_string(&self.0).map_err(|e| Error::Load {
            location: self.describe(),
            cause: Arc::new(e),
        })
    }

    fn describe(&self) -> String {
        self.0.display().to_string()
    }
}

/// A [`DirectorySource`] holding a fixed document in memory.
///
/// This is what we use for a compiled-in list of default directory servers.
#[derive(Clone, Debug)]
pub struct TextSource(String);

impl TextSource {
    /// Return a new source that always yields `text`.
    pub fn new(text: impl Into<String>) -> Self {
        TextSource(text.into())
    }
}

impl DirectorySource for TextSource {
    fn load(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "built-in directory list".into()
    }
}

#[cfg(test)]
mod test {
    // @@ begin test lint list maintained by maint/add_warning @@
    #![allow(clippy::bool_assert_comparison)]
    #![allow(clippy::clone_on_copy)]
    #![allow(clippy::dbg_macro)]
    #![allow(clippy::mixed_attributes_style)]
    #![allow(clippy::print_stderr)]
    #![allow(clippy::print_stdout)]
    #![allow(clippy::single_char_pattern)]
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::unchecked_duration_subtraction)]
    #![allow(clippy::useless_vec)]
    #![allow(clippy::needless_pass_by_value)]
    //! <!-- @@ end test lint list maintained by maint/add_warning @@ -->
    use super::*;

    #[test]
    fn text_source() {
        let src = TextSource::new("router moria1");
        assert_eq!(src.load().unwrap(), "router moria1");
        assert_eq!(src.describe(), "built-in directory list");
    }

    #[test]
    fn missing_file() {
        let path = Path::new("/this/path/should/not/exist/routers.txt");
        let src = FileSource::new(path);
        assert_eq!(src.path(), path);
        match src.load() {
            Err(Error::Load { location, .. }) => {
                assert_eq!(location, "/this/path/should/not/exist/routers.txt");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn doc_kind_display() {
        assert_eq!(DocKind::RouterFile.to_string(), "router file");
        assert_eq!(DocKind::Directory.to_string(), "directory");
        let e = ParseError::new(DocKind::Directory, "no signature");
        assert_eq!(e.to_string(), "Error parsing directory: no signature");
        assert_eq!(e.doc_kind(), DocKind::Directory);
    }
}
