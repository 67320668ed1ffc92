//! Reading and writing solids.
//!
//! Supported formats are chosen by file extension: `.stl` (ASCII or binary,
//! behind the `stl-io` feature) and `.3mf`. Segmentation output is written
//! through [`archive`].

pub mod archive;
#[cfg(feature = "stl-io")]
pub mod stl;
pub mod threemf;

use crate::errors::SegmentationError;
use crate::mesh::Mesh;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Result type for mesh I/O operations.
pub type IoResult<T> = Result<T, IoError>;

/// Generic I/O and format-conversion errors.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Unrecognized extension.
    #[error("unknown file format: .{extension}")]
    UnknownFormat { extension: String },

    /// The file parsed but does not describe a usable solid.
    #[error("invalid file content: {message}")]
    InvalidContent { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("float parsing error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error("integer parsing error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
}

impl IoError {
    /// Create an `InvalidContent` error with the given message.
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }
}

/// Open `path` for reading, reporting a missing file as [`IoError::FileNotFound`].
pub(crate) fn open(path: &Path) -> IoResult<File> {
    File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IoError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IoError::Io(e)
        }
    })
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Read a solid, picking the parser from the file extension.
pub fn read_mesh(path: impl AsRef<Path>) -> IoResult<Mesh> {
    let path = path.as_ref();
    match extension_of(path).as_str() {
        #[cfg(feature = "stl-io")]
        "stl" => stl::read_stl(path),
        "3mf" => threemf::read_3mf(path),
        other => Err(IoError::UnknownFormat {
            extension: other.to_string(),
        }),
    }
}

/// Load the input model for segmentation.
///
/// Any read failure is fatal and reported as [`SegmentationError::MeshLoad`];
/// a file without triangles is [`SegmentationError::EmptyMesh`].
pub fn load_mesh(path: impl AsRef<Path>) -> crate::errors::Result<Mesh> {
    let path = path.as_ref();
    let mesh = read_mesh(path).map_err(|source| SegmentationError::MeshLoad {
        path: path.to_path_buf(),
        source,
    })?;
    if mesh.is_empty() {
        return Err(SegmentationError::EmptyMesh);
    }
    Ok(mesh)
}
