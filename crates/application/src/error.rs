use domain::UserId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("user {0} is already connected")]
    AlreadyConnected(UserId),
}
