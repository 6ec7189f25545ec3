use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    #[error("Invalid assumptions: {0}")]
    InvalidAssumptions(String),

    #[error("Invalid deal structure: {0}")]
    InvalidStructure(String),

    #[error("Empty peer set: {0}")]
    EmptyPeerSet(String),

    #[error("Incompatible periods: acquirer has {acquirer} annual records, target has {target}")]
    IncompatiblePeriods { acquirer: usize, target: usize },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}
