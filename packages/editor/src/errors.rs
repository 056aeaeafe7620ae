//! Error types for the editor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Mutation error: {0}")]
    Mutation(#[from] crate::mutations::MutationError),

    #[error("No drag gesture is active")]
    NoActiveDrag,

    #[error("A drag gesture is already active")]
    DragInProgress,
}
