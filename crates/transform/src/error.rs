use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    MsgPack(#[from] rmp_serde::encode::Error),

    #[error("YAML encode error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Protobuf encode error: {0}")]
    Protobuf(#[from] protobuf::Error),
}

pub type Result<T> = std::result::Result<T, TransformError>;
