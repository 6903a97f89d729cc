use crate::network::NetworkError;
use crate::routing::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Network(#[from] NetworkError),

    #[error("Node has stopped")]
    Stopped,
}

pub type NodeResult<T> = Result<T, NodeError>;
