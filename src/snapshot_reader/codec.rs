// Compression codecs recognised by file suffix

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};

use super::ReadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Raw,
    /// lzop block compression, decoded by an external helper.
    Lzo,
    /// LZMA family, decoded by an external helper.
    Xz,
    /// gzip, decoded in process.
    Gzip,
}

impl Codec {
    /// Probe order. The first suffix that exists on disk wins.
    pub const PROBE_ORDER: [Codec; 4] = [Codec::Raw, Codec::Lzo, Codec::Xz, Codec::Gzip];

    pub fn suffix(self) -> &'static str {
        match self {
            Codec::Raw => "",
            Codec::Lzo => ".lzo",
            Codec::Xz => ".xz",
            Codec::Gzip => ".gz",
        }
    }
}

/// External decompressor names, taken from `[parsing]`.
#[derive(Debug, Clone)]
pub struct Helpers {
    pub lzo: String,
    pub xz: String,
}

impl Default for Helpers {
    fn default() -> Self {
        Self {
            lzo: "lzop".into(),
            xz: "xzcat".into(),
        }
    }
}

pub(crate) fn decode(codec: Codec, path: &Path, helpers: &Helpers) -> Result<Bytes, ReadError> {
    match codec {
        Codec::Raw => std::fs::read(path).map(Bytes::from).map_err(|source| ReadError::Io {
            path: path.to_path_buf(),
            source,
        }),
        Codec::Gzip => gunzip(path),
        Codec::Lzo => run_helper(&helpers.lzo, &["-dc"], path),
        Codec::Xz => run_helper(&helpers.xz, &[], path),
    }
}

fn gunzip(path: &Path) -> Result<Bytes, ReadError> {
    let io_err = |source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(io_err)?;
    let mut out = Vec::new();
    MultiGzDecoder::new(file)
        .read_to_end(&mut out)
        .map_err(io_err)?;
    Ok(Bytes::from(out))
}

/// Run `helper args... path` and capture stdout as the decompressed content.
fn run_helper(helper: &str, args: &[&str], path: &Path) -> Result<Bytes, ReadError> {
    let output = Command::new(helper)
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReadError::MissingHelper {
                    file: path.to_path_buf(),
                    helper: helper.to_string(),
                }
            } else {
                ReadError::HelperFailed {
                    file: path.to_path_buf(),
                    helper: helper.to_string(),
                    detail: e.to_string(),
                }
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReadError::HelperFailed {
            file: path.to_path_buf(),
            helper: helper.to_string(),
            detail: format!("{}: {}", output.status, stderr.trim()),
        });
    }
    Ok(Bytes::from(output.stdout))
}
