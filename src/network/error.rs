use crate::routing::NodeAddress;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Transport channels are not open")]
    NotOpen,

    #[error("Transport channels are already open")]
    AlreadyOpen,

    #[error("Address {0} is already attached to the medium")]
    AddressInUse(NodeAddress),

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type NetworkResult<T> = Result<T, NetworkError>;
