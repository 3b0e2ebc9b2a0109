use std::fmt;

/// Error types for fix aggregation, simplification and export
#[derive(Debug)]
pub enum TrakError {
    /// I/O errors
    Io(std::io::Error),
    /// A single sentence failed NMEA grammar or checksum validation
    Decode(String),
    /// A burst kept failing to decode after the retry budget ran out
    Burst { attempts: u32, message: String },
    /// Fatal failure of the underlying transport
    Device(String),
    /// CSV reading or writing errors
    #[cfg(feature = "csv")]
    Csv(csv::Error),
    /// Malformed caller input (bad CSV row, bad option value)
    InvalidInput(String),
    /// Export format error
    Export(String),
}

impl TrakError {
    /// Errors worth another read before giving up on the current burst
    pub fn is_transient(&self) -> bool {
        matches!(self, TrakError::Decode(_) | TrakError::Burst { .. })
    }
}

impl fmt::Display for TrakError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrakError::Io(err) => write!(f, "I/O error: {}", err),
            TrakError::Decode(msg) => write!(f, "Sentence decode error: {}", msg),
            TrakError::Burst { attempts, message } => {
                write!(f, "Burst failed after {} attempts: {}", attempts, message)
            }
            TrakError::Device(msg) => write!(f, "Device error: {}", msg),
            #[cfg(feature = "csv")]
            TrakError::Csv(err) => write!(f, "CSV error: {}", err),
            TrakError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            TrakError::Export(msg) => write!(f, "Export error: {}", msg),
        }
    }
}

impl std::error::Error for TrakError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrakError::Io(err) => Some(err),
            #[cfg(feature = "csv")]
            TrakError::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TrakError {
    fn from(err: std::io::Error) -> Self {
        TrakError::Io(err)
    }
}

#[cfg(feature = "csv")]
impl From<csv::Error> for TrakError {
    fn from(err: csv::Error) -> Self {
        TrakError::Csv(err)
    }
}

impl From<anyhow::Error> for TrakError {
    fn from(err: anyhow::Error) -> Self {
        TrakError::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrakError>;
