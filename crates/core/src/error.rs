// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading a conversation log from disk.
///
/// Malformed lines and unrecognized records are not errors: the classifier
/// drops them silently. Only failures to read the file itself surface here.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Log file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Permission denied reading file: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while listing available logs
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Projects directory not found: {path}")]
    ProjectsDirNotFound { path: PathBuf },

    #[error("Cannot access projects directory: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Home directory not found")]
    HomeDirNotFound,
}

impl ParseError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

impl DiscoveryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::ProjectsDirNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_io_kind_maps_to_variant() {
        let cases = [
            (ErrorKind::NotFound, "NotFound"),
            (ErrorKind::PermissionDenied, "PermissionDenied"),
            (ErrorKind::InvalidData, "Io"),
        ];
        for (kind, expected) in cases {
            let err = ParseError::io("/logs/a.jsonl", std::io::Error::from(kind));
            let actual = match &err {
                ParseError::NotFound { .. } => "NotFound",
                ParseError::PermissionDenied { .. } => "PermissionDenied",
                ParseError::Io { .. } => "Io",
            };
            assert_eq!(actual, expected, "{kind:?}");
        }
    }

    #[tokio::test]
    async fn test_reading_missing_log_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.jsonl");
        let err = tokio::fs::read(&path)
            .await
            .map_err(|e| ParseError::io(&path, e))
            .unwrap_err();
        assert!(matches!(err, ParseError::NotFound { .. }));
        assert!(err.to_string().contains("gone.jsonl"));
    }

    #[test]
    fn test_missing_projects_dir() {
        let err = DiscoveryError::io("/nowhere/projects", std::io::Error::from(ErrorKind::NotFound));
        assert!(matches!(err, DiscoveryError::ProjectsDirNotFound { .. }));
        assert_eq!(
            err.to_string(),
            "Projects directory not found: /nowhere/projects"
        );
    }
}
