// Read-only access to one round directory, decompressing on the fly

mod codec;

pub use codec::{Codec, Helpers};

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::config::ParsingConfig;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is compressed but decompression tool '{helper}' is not available", file.display())]
    MissingHelper { file: PathBuf, helper: String },
    #[error("'{helper}' failed on {}: {detail}", file.display())]
    HelperFailed {
        file: PathBuf,
        helper: String,
        detail: String,
    },
}

/// Reader bound to one round directory.
///
/// A logical file is looked up as `<name>`, `<name>.lzo`, `<name>.xz`, `<name>.gz` in that order.
/// Absent files are `Ok(None)`, never an error.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    dir: PathBuf,
    dirname: String,
    helpers: Helpers,
}

impl SnapshotReader {
    pub fn new(dir: impl Into<PathBuf>, parsing: &ParsingConfig) -> Self {
        Self::with_helpers(
            dir,
            Helpers {
                lzo: parsing.lzo_helper.clone(),
                xz: parsing.xz_helper.clone(),
            },
        )
    }

    pub fn with_helpers(dir: impl Into<PathBuf>, helpers: Helpers) -> Self {
        let dir = dir.into();
        let dirname = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        Self {
            dir,
            dirname,
            helpers,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Trailing path segment of the directory; the round's identity.
    pub fn dirname(&self) -> &str {
        &self.dirname
    }

    /// First existing on-disk form of `name` and its codec.
    pub fn locate(&self, name: &str) -> Option<(PathBuf, Codec)> {
        Codec::PROBE_ORDER.iter().find_map(|&codec| {
            let path = self.dir.join(format!("{}{}", name, codec.suffix()));
            path.is_file().then_some((path, codec))
        })
    }

    pub fn exists(&self, name: &str) -> bool {
        self.locate(name).is_some()
    }

    /// Decompressed bytes of `name`, or `None` when no form of it exists.
    #[instrument(skip(self), fields(round = %self.dirname, operation = "open"))]
    pub fn open(&self, name: &str) -> Result<Option<Bytes>, ReadError> {
        let Some((path, codec)) = self.locate(name) else {
            tracing::trace!(file = name, "not present");
            return Ok(None);
        };
        tracing::trace!(path = %path.display(), ?codec, "decoding");
        codec::decode(codec, &path, &self.helpers).map(Some)
    }

    /// Names of the regular files directly under `subdir`, sorted. An absent directory is empty.
    pub fn list(&self, subdir: &str) -> Result<Vec<String>, ReadError> {
        let path = self.dir.join(subdir);
        let entries = match std::fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(ReadError::Io { path, source }),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ReadError::Io {
                path: path.clone(),
                source,
            })?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Like [`open`](Self::open) but as text; invalid UTF-8 is replaced, not rejected.
    pub fn open_text(&self, name: &str) -> Result<Option<String>, ReadError> {
        Ok(self
            .open(name)?
            .map(|b| String::from_utf8_lossy(&b).into_owned()))
    }
}
