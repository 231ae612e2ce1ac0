use shared::error::MappingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("dispatch queue is closed; the dispatcher has been shut down")]
    QueueClosed,
}
