use thiserror::Error;

/// Errors surfaced to callers of the morph engine.
///
/// Numeric drift (levels, control values, panel indices) never ends up
/// here; it is clamped where it happens. What remains are wiring bugs.
#[derive(Error, Debug)]
pub enum MorphError {
    /// A TET system was requested by a name that is not registered.
    #[error("unknown TET system '{0}'")]
    UnknownSystem(String),

    /// JSON config or snapshot text could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration value is outside its legal range.
    #[error("config error: {0}")]
    Config(String),
}

pub type MorphResult<T> = Result<T, MorphError>;
