/// State machines for deals and the vendor pipeline
///
/// Both are plain transition tables checked before the conditional update in
/// the model layer runs.

pub mod deal_status;
pub mod pipeline;

/// Rejected workflow move
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Only an admin can move from {from} to {to}")]
    AdminRequired { from: &'static str, to: &'static str },

    #[error("This role cannot change workflow state")]
    NotPermitted,
}
