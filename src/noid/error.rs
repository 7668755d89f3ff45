use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoidError {
    #[error("Invalid noid template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },
}

pub type Result<T> = std::result::Result<T, NoidError>;
