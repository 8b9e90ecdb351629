//! Profile collection dialogue: session state and the step transition table.
//!
//! [`next_transition`] is pure. It looks at the session and one inbound event and
//! decides what should happen; [`crate::flow_engine::FlowEngine`] applies the
//! decision and performs the side effects.

use serde::{Deserialize, Serialize};

use crate::errors::InvalidInputError;
use crate::localization::Language;
use crate::profile::{Field, FieldValue, ProfileDraft};
use crate::validation::parse_and_validate;

/// Selection signal that closes the single-attribute editor
pub const DONE_SIGNAL: &str = "UPDATE_PROFILE_DONE";

/// How the questions are walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowMode {
    /// Every field in the fixed order
    SequentialAll,
    /// Menu driven, one field at a time
    SingleAttribute,
}

/// What the collected data is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowPurpose {
    /// One-off calorie calculation, ends with a report
    Calculation,
    /// Edit of the stored profile, ends with a save
    ProfileUpdate,
}

/// Current position in the dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStep {
    /// Sequential mode, waiting for this field
    Collect(Field),
    /// Single-attribute hub, waiting for a selection signal
    SelectAttribute,
    /// Single-attribute leaf, waiting for the value of this field
    AwaitingInput(Field),
}

/// In-progress conversation for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSession {
    pub mode: FlowMode,
    pub purpose: FlowPurpose,
    pub step: FlowStep,
    pub attribute_being_edited: Option<Field>,
    pub draft: ProfileDraft,
    pub language: Language,
}

impl FlowSession {
    /// Session walking all fields, starting at the first question
    pub fn sequential(purpose: FlowPurpose, draft: ProfileDraft, language: Language) -> Self {
        Self {
            mode: FlowMode::SequentialAll,
            purpose,
            step: FlowStep::Collect(Field::SEQUENCE[0]),
            attribute_being_edited: None,
            draft,
            language,
        }
    }

    /// Profile editor session, starting at the attribute hub
    pub fn single_attribute(draft: ProfileDraft, language: Language) -> Self {
        Self {
            mode: FlowMode::SingleAttribute,
            purpose: FlowPurpose::ProfileUpdate,
            step: FlowStep::SelectAttribute,
            attribute_being_edited: None,
            draft,
            language,
        }
    }
}

/// One inbound event for a user with an active session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent<'a> {
    /// Free text typed by the user
    Text(&'a str),
    /// Callback data of a pressed button
    Selection(&'a str),
}

/// Parsed attribute keyboard signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Attribute(Field),
    Done,
}

impl Selection {
    pub fn parse(signal: &str) -> Option<Self> {
        if signal == DONE_SIGNAL {
            return Some(Selection::Done);
        }
        Field::from_selection_signal(signal).map(Selection::Attribute)
    }
}

/// Why the hub asks for a selection again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubReprompt {
    /// Text arrived where a button press was expected
    FreeText,
    /// Signal does not name an attribute
    UnknownSignal,
}

/// Decision for one event
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Store the value and ask the next field
    Advance { value: FieldValue, next: Field },
    /// Store the last value of the sequential flow and finish
    Complete { value: FieldValue },
    /// Stay on `field`; `error` is set when the answer was rejected
    Reprompt {
        field: Field,
        error: Option<InvalidInputError>,
    },
    /// Leave the hub to edit one field
    BeginAttribute(Field),
    /// Store and persist the edited field, then return to the hub
    SaveAttribute { value: FieldValue },
    /// Stay in the hub and show the attribute keyboard again
    AwaitSelection(HubReprompt),
    /// Close the editor
    Finish,
    /// Mode and step disagree; the session must be dropped
    Unexpected(String),
}

/// Transition table keyed on `(mode, step, event)`
pub fn next_transition(session: &FlowSession, event: FlowEvent<'_>) -> Transition {
    use FlowEvent::{Selection as Signal, Text};
    use FlowMode::{SequentialAll, SingleAttribute};
    use FlowStep::{AwaitingInput, Collect, SelectAttribute};

    match (session.mode, session.step, event) {
        (SequentialAll, Collect(field), Text(raw)) => match parse_and_validate(field, raw) {
            Ok(value) => match field.next() {
                Some(next) => Transition::Advance { value, next },
                None => Transition::Complete { value },
            },
            Err(error) => Transition::Reprompt {
                field,
                error: Some(error),
            },
        },
        // Stale keyboard press during the questionnaire, ask the current question again
        (SequentialAll, Collect(field), Signal(_)) => Transition::Reprompt { field, error: None },

        (SingleAttribute, SelectAttribute, Text(_)) => {
            Transition::AwaitSelection(HubReprompt::FreeText)
        }
        (SingleAttribute, SelectAttribute | AwaitingInput(_), Signal(signal)) => {
            match Selection::parse(signal) {
                Some(Selection::Attribute(field)) => Transition::BeginAttribute(field),
                Some(Selection::Done) => Transition::Finish,
                None => Transition::AwaitSelection(HubReprompt::UnknownSignal),
            }
        }
        (SingleAttribute, AwaitingInput(field), Text(raw)) => {
            if session.attribute_being_edited != Some(field) {
                return Transition::Unexpected(format!(
                    "awaiting {field} but editing {:?}",
                    session.attribute_being_edited
                ));
            }
            match parse_and_validate(field, raw) {
                Ok(value) => Transition::SaveAttribute { value },
                Err(error) => Transition::Reprompt {
                    field,
                    error: Some(error),
                },
            }
        }

        (mode, step, _) => Transition::Unexpected(format!("step {step:?} is not valid in mode {mode:?}")),
    }
}
