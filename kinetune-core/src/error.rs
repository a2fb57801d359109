use thiserror::Error;

/// All errors produced by kinetune-core.
#[derive(Debug, Error)]
pub enum KinetuneError {
    #[error("frame source error: {0}")]
    FrameSource(String),

    #[error("no camera device available")]
    NoCameraDevice,

    #[error("inference error: {0}")]
    Inference(String),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("ONNX session error: {0}")]
    OnnxSession(String),

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("audio output error: {0}")]
    AudioOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, KinetuneError>;
