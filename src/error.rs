use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Failure taxonomy for the produced interface.
///
/// Empty pools and empty algorithm output are kept apart from input errors so
/// a caller can suggest relaxing filters instead of fixing the request.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no tracks match filters")]
    EmptyPool,
    #[error("algorithm produced empty playlist")]
    EmptyResult,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    EmptyResult,
    Collaborator,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::EmptyResult => "empty_result",
            Self::Collaborator => "collaborator",
        }
    }
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::Input,
            Self::EmptyPool | Self::EmptyResult => ErrorKind::EmptyResult,
            Self::Database(_) => ErrorKind::Collaborator,
        }
    }
}

impl Serialize for GenerationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("GenerationError", 2)?;
        s.serialize_field("kind", self.kind().as_str())?;
        s.serialize_field("reason", &self.to_string())?;
        s.end()
    }
}
