/// Error types for the poptrie library
use std::fmt;

/// Result type alias for poptrie operations
pub type Result<T> = std::result::Result<T, PoptrieError>;

/// Main error type for poptrie operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoptrieError {
    /// Rejected tag value (0 is reserved to signal "no match")
    InvalidTag(u16),

    /// I/O errors
    Io(String),

    /// Memory mapping errors
    Mmap(String),

    /// Artifact format errors (bad magic, truncated file)
    Format(String),

    /// Artifact validation errors (a node record that would dereference
    /// outside the mapped region)
    Validation(String),

    /// Packed buffer length is not a multiple of the address stride
    InvalidStride {
        /// Buffer length in bytes
        len: usize,
        /// Expected address stride (4 or 16)
        stride: usize,
    },
}

impl fmt::Display for PoptrieError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoptrieError::InvalidTag(tag) => {
                write!(f, "Invalid tag value {} (0 is reserved for no-match)", tag)
            }
            PoptrieError::Io(msg) => write!(f, "I/O error: {}", msg),
            PoptrieError::Mmap(msg) => write!(f, "Memory mapping error: {}", msg),
            PoptrieError::Format(msg) => write!(f, "Format error: {}", msg),
            PoptrieError::Validation(msg) => write!(f, "Validation error: {}", msg),
            PoptrieError::InvalidStride { len, stride } => {
                write!(
                    f,
                    "Packed buffer of {} bytes is not a multiple of the {}-byte stride",
                    len, stride
                )
            }
        }
    }
}

impl std::error::Error for PoptrieError {}

impl From<std::io::Error> for PoptrieError {
    fn from(err: std::io::Error) -> Self {
        PoptrieError::Io(err.to_string())
    }
}
