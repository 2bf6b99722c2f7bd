use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error("job {0} has no registered waiter")]
    NoWaiter(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, QueueError>;
