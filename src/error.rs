use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;

impl DigestError {
    /// Attributes any failure raised while fetching records to retrieval.
    pub fn into_retrieval(self) -> Self {
        match self {
            Self::Retrieval(_) => self,
            other => Self::Retrieval(other.to_string()),
        }
    }

    pub fn into_render(self) -> Self {
        match self {
            Self::Render(_) => self,
            other => Self::Render(other.to_string()),
        }
    }

    pub fn into_delivery(self) -> Self {
        match self {
            Self::Delivery(_) => self,
            other => Self::Delivery(other.to_string()),
        }
    }
}
