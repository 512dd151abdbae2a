use thiserror::Error;

use crate::assistant::AssistantError;
use crate::image_cache::CacheError;
use crate::library::LibraryError;
use crate::session::SessionError;
use crate::stroke::StrokeError;

/// Broad classification used by the UI to pick a message style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed data from a file, a model or the user
    Input,
    /// The filesystem or decoder failed
    Io,
    /// The request does not fit the current state
    State,
}

/// Any error the document core reports
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Stroke(#[from] StrokeError),

    #[error(transparent)]
    Assistant(#[from] AssistantError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Session(err) => match err {
                SessionError::Io(_) => ErrorKind::Io,
                SessionError::SaveInProgress => ErrorKind::State,
                _ => ErrorKind::Input,
            },
            Error::Library(err) => match err {
                LibraryError::Io(_) => ErrorKind::Io,
                LibraryError::Json(_) | LibraryError::Stroke(_) => ErrorKind::Input,
                _ => ErrorKind::State,
            },
            Error::Cache(err) => match err {
                CacheError::Decode { .. } => ErrorKind::Input,
                CacheError::Io { .. } => ErrorKind::Io,
                CacheError::LoaderStopped => ErrorKind::State,
            },
            Error::Stroke(_) => ErrorKind::Input,
            Error::Assistant(err) => match err {
                AssistantError::NotConfigured => ErrorKind::State,
                AssistantError::Request(_) => ErrorKind::Io,
                AssistantError::NoStrokes => ErrorKind::Input,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err: Error = SessionError::SaveInProgress.into();
        assert_eq!(err.kind(), ErrorKind::State);
        let err: Error = LibraryError::ReservedCategory("General".into()).into();
        assert_eq!(err.kind(), ErrorKind::State);
        let err: Error = StrokeError::UnknownKind("blob".into()).into();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(err.to_string(), StrokeError::UnknownKind("blob".into()).to_string());
    }
}
