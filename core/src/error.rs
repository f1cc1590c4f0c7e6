use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Configuration,
    TransientIo,
    DataQuality,
    Conflict,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::TransientIo => "TRANSIENT_IO",
            ErrorKind::DataQuality => "DATA_QUALITY",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Internal => "INTERNAL",
        };
        write!(f, "{}", s)
    }
}

pub trait KinsearchError: std::error::Error {
    fn error_kind(&self) -> ErrorKind;
}
