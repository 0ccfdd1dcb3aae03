use nbmodel_nbformat::NbformatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NbModelError {
    #[error("cell index {index} out of range (length {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("operation on a disposed notebook model")]
    Disposed,
    #[error("notebook decode failed: {0}")]
    Format(#[from] NbformatError),
}
