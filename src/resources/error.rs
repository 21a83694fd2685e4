//! Resource loading errors

use crate::backend::BackendError;
use std::path::PathBuf;
use thiserror::Error;

/// Error raised while reading or decoding a resource
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Image {0} has no colour channels")]
    ZeroChannels(PathBuf),
    #[error("Failed to import OBJ {path}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("Failed to import glTF {path}: {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("Failed to decode WAV {path}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("No material defined in {0}")]
    NoMaterial(PathBuf),
    #[error("Include cycle through {0}")]
    IncludeCycle(PathBuf),
    #[error("Malformed #include directive in {path} line {line}")]
    MalformedInclude { path: PathBuf, line: usize },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type LoadResult<T> = Result<T, LoadError>;
