use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RecordError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    ClientInput(&'static str),

    #[error("Not found")]
    NotFound,

    #[error("connectivity error: {0}")]
    Connectivity(String),

    #[error("execution error: {0}")]
    Execution(String),
}

impl RecordError {
    /// HTTP status the gateway should see for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            RecordError::ClientInput(_) => 400,
            RecordError::NotFound => 404,
            RecordError::Config(_) | RecordError::Connectivity(_) | RecordError::Execution(_) => {
                500
            }
        }
    }

    /// Message safe to return to callers. Store and credential detail stays in the log.
    pub fn public_message(&self) -> String {
        match self {
            RecordError::ClientInput(msg) => (*msg).to_string(),
            RecordError::NotFound => "Not found".to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    /// Whether the reusable connection must be thrown away after this error.
    pub fn invalidates_handle(&self) -> bool {
        matches!(
            self,
            RecordError::Connectivity(_) | RecordError::Execution(_)
        )
    }
}

impl From<figment::Error> for RecordError {
    fn from(e: figment::Error) -> Self {
        RecordError::Config(e.to_string())
    }
}

impl From<tokio_postgres::Error> for RecordError {
    fn from(e: tokio_postgres::Error) -> Self {
        if e.is_closed() {
            RecordError::Connectivity(e.to_string())
        } else {
            RecordError::Execution(e.to_string())
        }
    }
}
