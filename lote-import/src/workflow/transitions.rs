//! Import state transition table
//!
//! Pure function of (state, trigger). Side effects such as persistence and
//! event publication belong to the caller.

use crate::models::ImportState;

/// What happened to the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    FileAccepted,
    FileRejected,
    BeginParse,
    ParseFailed,
    Parsed,
    NoValidRecords,
    Validated,
    BeginProcessing,
    AuthenticationFailed,
    Finished,
    /// Valid from every state
    Reset,
}

/// Target state, or `None` when the trigger is not allowed in `from`
pub fn next_state(from: ImportState, trigger: Trigger) -> Option<ImportState> {
    use ImportState::*;

    match (from, trigger) {
        (_, Trigger::Reset) => Some(Idle),

        (Idle | FileSelected | Completed | Error, Trigger::FileAccepted) => Some(FileSelected),
        (Idle | FileSelected | Completed | Error, Trigger::FileRejected) => Some(Error),

        (FileSelected, Trigger::BeginParse) => Some(Parsing),
        (Parsing, Trigger::ParseFailed) => Some(Error),
        (Parsing, Trigger::Parsed) => Some(Validating),

        (Validating, Trigger::NoValidRecords) => Some(Error),
        (Validating, Trigger::Validated) => Some(Preview),

        (Preview, Trigger::BeginProcessing) => Some(Processing),
        (Processing, Trigger::AuthenticationFailed) => Some(Error),
        (Processing, Trigger::Finished) => Some(Completed),

        _ => None,
    }
}
