use super::models::{Config, StorageProvider};
use crate::humanize::ByteSize;
use crate::noid::{NoidError, Template};
use thiserror::Error;

/// S3 rejects multipart parts below 5 MiB (except the last)
const MIN_S3_PART_SIZE: ByteSize = ByteSize::mib(5);

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    InvalidTemplate(#[from] NoidError),

    #[error("Harvest window must be at least one day")]
    EmptyHarvestWindow,

    #[error("dspace.eperson is required to run the packager")]
    MissingEperson,

    #[error("oai.url is required")]
    MissingOaiUrl,

    #[error("oai.handle_prefix is required to extract handles")]
    MissingHandlePrefix,

    #[error("storage.bucket is required")]
    MissingBucket,

    #[error("Storage provider is S3 but missing credentials (access_key or secret_key)")]
    MissingS3Credentials,

    #[error("storage.part_size ({actual}) is below the S3 minimum of {minimum}")]
    PartSizeTooSmall { actual: ByteSize, minimum: ByteSize },

    #[error("At least one checksum algorithm is required")]
    NoChecksums,
}

/// Validate everything needed before the first handle is processed
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_noid(config)?;
    validate_harvest(config)?;
    validate_dspace(config)?;
    validate_storage(config)?;
    validate_pipeline(config)?;
    Ok(())
}

/// Parse the noid template so a typo stops the run before anything is minted
fn validate_noid(config: &Config) -> Result<(), ValidationError> {
    Template::parse(&config.noid.template)?;
    Ok(())
}

fn validate_harvest(config: &Config) -> Result<(), ValidationError> {
    if config.oai.url.trim().is_empty() {
        return Err(ValidationError::MissingOaiUrl);
    }
    if config.oai.days == 0 {
        return Err(ValidationError::EmptyHarvestWindow);
    }
    if config.oai.handle_prefix.is_empty() {
        return Err(ValidationError::MissingHandlePrefix);
    }
    Ok(())
}

fn validate_dspace(config: &Config) -> Result<(), ValidationError> {
    if config.dspace.eperson.trim().is_empty() {
        return Err(ValidationError::MissingEperson);
    }
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.bucket.trim().is_empty() {
        return Err(ValidationError::MissingBucket);
    }

    if config.storage.provider == StorageProvider::S3 {
        if config.storage.access_key.is_none() || config.storage.secret_key.is_none() {
            return Err(ValidationError::MissingS3Credentials);
        }
        if config.storage.part_size < MIN_S3_PART_SIZE {
            return Err(ValidationError::PartSizeTooSmall {
                actual: config.storage.part_size,
                minimum: MIN_S3_PART_SIZE,
            });
        }
    }

    Ok(())
}

fn validate_pipeline(config: &Config) -> Result<(), ValidationError> {
    if config.pipeline.checksums.is_empty() {
        return Err(ValidationError::NoChecksums);
    }
    Ok(())
}
