use std::fmt;

use crate::fragment::FragmentId;

#[derive(Debug)]
pub enum SearchError {
    Io(std::io::Error),
    Serialization(Box<bincode::error::EncodeError>),
    Deserialization(Box<bincode::error::DecodeError>),
    MissingFragment(FragmentId),
    Config(String),
    Transport(String),
    Worker(String),
    Other(String),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::Io(e) => write!(f, "IO error: {}", e),
            SearchError::Serialization(e) => write!(f, "Serialization error: {}", e),
            SearchError::Deserialization(e) => write!(f, "Deserialization error: {}", e),
            SearchError::MissingFragment(id) => write!(f, "Fragment {} is missing from storage", id),
            SearchError::Config(e) => write!(f, "Config error: {}", e),
            SearchError::Transport(e) => write!(f, "Transport error: {}", e),
            SearchError::Worker(e) => write!(f, "Worker error: {}", e),
            SearchError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for SearchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SearchError::Io(e) => Some(e),
            SearchError::Serialization(e) => Some(e.as_ref()),
            SearchError::Deserialization(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl SearchError {
    /// Turn a caught panic payload into a worker error.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        SearchError::Worker(format!("worker panicked: {}", message))
    }
}

impl From<bincode::error::EncodeError> for SearchError {
    fn from(err: bincode::error::EncodeError) -> Self {
        SearchError::Serialization(Box::new(err))
    }
}

impl From<bincode::error::DecodeError> for SearchError {
    fn from(err: bincode::error::DecodeError) -> Self {
        SearchError::Deserialization(Box::new(err))
    }
}

impl From<std::io::Error> for SearchError {
    fn from(err: std::io::Error) -> Self {
        SearchError::Io(err)
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Config(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for SearchError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        SearchError::Worker(format!("lock poisoned: {}", err))
    }
}

impl From<String> for SearchError {
    fn from(err: String) -> Self {
        SearchError::Other(err)
    }
}

impl From<&str> for SearchError {
    fn from(err: &str) -> Self {
        SearchError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_missing_fragment() {
        let err = SearchError::MissingFragment(7);
        assert_eq!(err.to_string(), "Fragment 7 is missing from storage");
    }

    #[test]
    fn test_io_error_has_source() {
        let err: SearchError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("IO error"));
    }

    #[test]
    fn test_from_str() {
        let err: SearchError = "boom".into();
        assert!(matches!(err, SearchError::Other(ref s) if s == "boom"));
    }

    #[test]
    fn test_from_panic_keeps_message() {
        let payload = std::panic::catch_unwind(|| -> u32 { panic!("expand failed on {}", 3) }).unwrap_err();
        let err = SearchError::from_panic(payload.as_ref());
        assert_eq!(err.to_string(), "Worker error: worker panicked: expand failed on 3");

        let payload = std::panic::catch_unwind(|| -> u32 { std::panic::panic_any(17u8) }).unwrap_err();
        assert!(matches!(SearchError::from_panic(payload.as_ref()), SearchError::Worker(_)));
    }
}
