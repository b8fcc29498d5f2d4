use std::fmt;

/// Main error type for compileforge
#[derive(Debug)]
pub enum Error {
    /// Malformed request: bad base64, unknown language/compiler/standard
    Validation(String),

    /// Queue was full at submission time
    Admission(String),

    /// Sandbox backend unreachable or refused the request
    Infrastructure(String),

    /// Job store read/write failure
    Store(String),

    /// Configuration errors
    Config(String),

    /// Requested job id is not present in the store
    NotFound(String),

    /// Serialization/deserialization errors
    Serialization(String),

    /// IO errors
    Io(std::io::Error),

    /// Generic errors with description
    Other(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(msg) => write!(f, "Validation error: {}", msg),
            Error::Admission(msg) => write!(f, "Admission error: {}", msg),
            Error::Infrastructure(msg) => write!(f, "Infrastructure error: {}", msg),
            Error::Store(msg) => write!(f, "Store error: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::NotFound(msg) => write!(f, "Not found: {}", msg),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(error: uuid::Error) -> Self {
        Error::Validation(format!("invalid uuid: {}", error))
    }
}

impl From<redis::RedisError> for Error {
    fn from(error: redis::RedisError) -> Self {
        Error::Store(error.to_string())
    }
}

impl From<bollard::errors::Error> for Error {
    fn from(error: bollard::errors::Error) -> Self {
        Error::Infrastructure(error.to_string())
    }
}

impl From<kube::Error> for Error {
    fn from(error: kube::Error) -> Self {
        Error::Infrastructure(error.to_string())
    }
}

// Common error constructors
impl Error {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Error::Validation(msg.into())
    }

    pub fn admission<T: Into<String>>(msg: T) -> Self {
        Error::Admission(msg.into())
    }

    pub fn infrastructure<T: Into<String>>(msg: T) -> Self {
        Error::Infrastructure(msg.into())
    }

    pub fn store<T: Into<String>>(msg: T) -> Self {
        Error::Store(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Error::Config(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        Error::NotFound(msg.into())
    }
}

impl Error {
    /// HTTP status code this error maps to
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Admission(_) => 503,
            Error::Infrastructure(_) => 502,
            Error::Store(_) => 500,
            Error::Config(_) => 500,
            Error::NotFound(_) => 404,
            Error::Serialization(_) => 500,
            Error::Io(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Error category tag for structured logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Admission(_) => "admission",
            Error::Infrastructure(_) => "infrastructure",
            Error::Store(_) => "store",
            Error::Config(_) => "config",
            Error::NotFound(_) => "not_found",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(Error::validation("bad").status_code(), 400);
        assert_eq!(Error::admission("full").status_code(), 503);
        assert_eq!(Error::not_found("x").status_code(), 404);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::infrastructure("down").category(), "infrastructure");
    }
}
