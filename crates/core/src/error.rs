#[derive(Debug, thiserror::Error)]
pub enum EhrError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("records file not found: {}", .0.display())]
    RecordsNotFound(std::path::PathBuf),
    #[error("failed to create records directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read records file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write records file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize records: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize records: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),
}

pub type EhrResult<T> = std::result::Result<T, EhrError>;
