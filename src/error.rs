use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("skeleton `{0}` not found")]
    SkeletonNotFound(String),

    #[error("bone `{bone}` not found in skeleton `{skeleton}`")]
    BoneNotFound { skeleton: String, bone: String },

    #[error("template `{0}` not found")]
    TemplateNotFound(String),

    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("bone `{bone}` already exists in skeleton `{skeleton}`")]
    DuplicateName { skeleton: String, bone: String },

    #[error("invalid bone hierarchy in skeleton `{skeleton}`: {reason}")]
    InvalidHierarchy { skeleton: String, reason: String },

    #[error("{}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archive {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Filesystem { path: path.as_ref().to_path_buf(), source }
    }

    pub(crate) fn fs_message(path: impl AsRef<Path>, kind: io::ErrorKind, message: String) -> Self {
        Error::io(path, io::Error::new(kind, message))
    }

    pub(crate) fn parse(origin: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Error::Parse { origin: origin.as_ref().display().to_string(), source }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::SkeletonNotFound(_) | Error::BoneNotFound { .. } | Error::TemplateNotFound(_) => true,
            Error::Filesystem { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Short heading used when the error is shown to the user.
    pub fn title(&self) -> &'static str {
        match self {
            Error::SkeletonNotFound(_) | Error::BoneNotFound { .. } | Error::TemplateNotFound(_) => "Not Found",
            Error::Parse { .. } => "Template Parse Error",
            Error::DuplicateName { .. } => "Duplicate Bone Name",
            Error::InvalidHierarchy { .. } => "Invalid Bone Hierarchy",
            Error::Filesystem { .. } | Error::Archive { .. } => "File System Error",
        }
    }
}
