use std::{error, fmt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Error type for building a dataset, fitting a tree or a strict prediction.
///
/// We keep a plain owned type (no boxed dyn Error) so the results can be sent across the Rayon
/// threads used for batch prediction.
pub enum FitError {
    /// The data given by the caller can't be used: empty, ragged, wrong arity...
    InvalidInput(String),
    /// A value is outside of what can be stored as a categorical code.
    OutOfRange(String),
    /// Strict prediction only: the observation has a value never seen at this split node.
    NoMatchingBranch { attribute: usize, value: u32 },
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FitError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            FitError::OutOfRange(msg) => write!(f, "value out of range: {}", msg),
            FitError::NoMatchingBranch { attribute, value } => write!(
                f,
                "no branch for value {} of attribute {}",
                value, attribute
            ),
        }
    }
}

// This is important for other errors to wrap this one.
impl error::Error for FitError {}

impl std::convert::From<&str> for FitError {
    fn from(msg: &str) -> Self {
        FitError::InvalidInput(msg.to_string())
    }
}

impl std::convert::From<String> for FitError {
    fn from(msg: String) -> Self {
        FitError::InvalidInput(msg)
    }
}

pub type FitResult<T> = Result<T, FitError>;
