/// Result alias used across the particle engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Error taxonomy for the particle engine.
///
/// Asset failures are recovered by the engine (it degrades to an empty
/// scene); these values mostly travel as far as a log line.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Image or video could not be fetched or decoded.
    #[error("load error: {0}")]
    Load(String),

    /// Canvas, rendering context or GPU object creation failed.
    #[error("context error: {0}")]
    Context(String),

    /// Shader compile or program link failed.
    #[error("shader error ({stage}): {log}")]
    Shader { stage: &'static str, log: String },

    /// Invalid options passed by the host.
    #[error("config error: {0}")]
    Config(String),

    /// Opaque error raised by a browser API.
    #[error("js error: {0}")]
    Js(String),
}

impl EngineError {
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn context(msg: impl Into<String>) -> Self {
        Self::Context(msg.into())
    }

    pub fn shader(stage: &'static str, log: impl Into<String>) -> Self {
        Self::Shader {
            stage,
            log: log.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap a `JsValue` (or anything debuggable) raised by web-sys.
    pub fn js(value: impl std::fmt::Debug) -> Self {
        Self::Js(format!("{value:?}"))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
