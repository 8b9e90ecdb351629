//! # Flow Error Types Module
//!
//! Error types shared by the validator, the formula engine and the step sequencer.
//! Validation failures are recovered locally by re-prompting; the other kinds are
//! reported to the user and end or pause the conversation.

use std::fmt;

use crate::profile::Field;

/// Why a raw answer was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Text could not be parsed as the expected number
    NotANumber,
    /// Number parsed but lies outside the accepted range
    OutOfRange,
    /// Text is not one of the listed options
    UnknownOption,
}

/// Field-level validation failure, recoverable by asking again
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidInputError {
    pub field: Field,
    pub reason: InvalidReason,
    pub raw: String,
}

impl fmt::Display for InvalidInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.reason {
            InvalidReason::NotANumber => "not a number",
            InvalidReason::OutOfRange => "out of range",
            InvalidReason::UnknownOption => "unknown option",
        };
        write!(f, "Invalid {} input '{}': {reason}", self.field, self.raw)
    }
}

impl std::error::Error for InvalidInputError {}

/// A calculation was requested before all seven fields were set
#[derive(Debug, Clone, PartialEq)]
pub struct IncompleteProfileError {
    pub missing: Vec<Field>,
}

impl fmt::Display for IncompleteProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let missing: Vec<&str> = self.missing.iter().map(|field| field.key()).collect();
        write!(f, "Incomplete profile, missing: {}", missing.join(", "))
    }
}

impl std::error::Error for IncompleteProfileError {}

/// Errors surfaced by the step sequencer
#[derive(Debug)]
pub enum FlowError {
    /// Answer rejected for the current field
    InvalidInput(InvalidInputError),
    /// Profile is missing fields required by a calculation
    IncompleteProfile(IncompleteProfileError),
    /// Session reached a mode/step combination that cannot occur
    UnexpectedState(String),
    /// Persistence, messaging or AI collaborator failed
    Collaborator(anyhow::Error),
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::InvalidInput(err) => write!(f, "Invalid input: {err}"),
            FlowError::IncompleteProfile(err) => write!(f, "Incomplete profile: {err}"),
            FlowError::UnexpectedState(msg) => write!(f, "Unexpected state: {msg}"),
            FlowError::Collaborator(err) => write!(f, "Collaborator failure: {err}"),
        }
    }
}

impl std::error::Error for FlowError {}

impl From<InvalidInputError> for FlowError {
    fn from(err: InvalidInputError) -> Self {
        FlowError::InvalidInput(err)
    }
}

impl From<IncompleteProfileError> for FlowError {
    fn from(err: IncompleteProfileError) -> Self {
        FlowError::IncompleteProfile(err)
    }
}

impl From<anyhow::Error> for FlowError {
    fn from(err: anyhow::Error) -> Self {
        FlowError::Collaborator(err)
    }
}
