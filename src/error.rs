use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the engine.
///
/// Structural errors (shapes, axes, coordinates, weights) are raised while the graph is built.
/// Fetch failures and cancellation abort a whole materialization. Degenerate reductions are only
/// errors under [`DegeneratePolicy::Fail`](crate::config::DegeneratePolicy::Fail).
#[derive(Debug, Error)]
pub enum Error {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("unknown axis: {0}")]
    UnknownAxis(String),

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("undefined reduction in {cells} cell(s)")]
    UndefinedReduction { cells: usize },

    #[error("failed to fetch chunk at offset {offset:?}")]
    ChunkFetchFailure {
        offset: Vec<usize>,
        #[source]
        source: anyhow::Error,
    },

    #[error("materialization was cancelled")]
    Cancelled,

    #[error("configuration: {0}")]
    Config(String),
}

impl From<ndarray::ShapeError> for Error {
    fn from(e: ndarray::ShapeError) -> Self {
        Error::ShapeMismatch(e.to_string())
    }
}

impl Error {
    pub(crate) fn shape(msg: impl Into<String>) -> Error {
        Error::ShapeMismatch(msg.into())
    }

    pub(crate) fn argument(msg: impl Into<String>) -> Error {
        Error::InvalidArgument(msg.into())
    }

    /// Whether this error is a structural error from graph construction.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::ShapeMismatch(_)
                | Error::UnknownAxis(_)
                | Error::InvalidCoordinates(_)
                | Error::InvalidWeights(_)
                | Error::InvalidArgument(_)
        )
    }
}
