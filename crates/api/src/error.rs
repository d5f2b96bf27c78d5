use crate::models::{DotName, TypePathStep};

/// Raised when a type path cannot be followed through the shape of a type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypePathError {
    #[error("type path step {step:?} does not apply to `{found}`")]
    StepMismatch { step: TypePathStep, found: String },
    #[error("type argument {index} out of range for `{found}` ({count} arguments)")]
    ArgumentOutOfRange {
        index: u8,
        count: usize,
        found: String,
    },
    #[error("nested step past the outermost enclosing type of {0}")]
    NestingTooDeep(DotName),
}

pub type PathResult<T> = std::result::Result<T, TypePathError>;
