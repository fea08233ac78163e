//! Error types shared across the drill engine.
//!
//! Configuration errors surface once at load time. The generation and
//! session variants are recoverable states shown to the user; nothing here is
//! produced by grading, which always completes.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EarError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("chord configuration is not valid JSON: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid chord configuration: {0}")]
    InvalidConfig(String),

    /// No root survives the root list and the default roots are empty.
    #[error("no valid roots selected")]
    NoRoots,

    #[error("enable at least one chord type")]
    NoTemplates,

    #[error("no exercise yet (type `start`)")]
    NoExercise,

    /// Advancing requires every slot of the current exercise to be correct.
    #[error("every chord must be answered correctly before moving on")]
    ExerciseNotFinished,

    /// `slot` is 0-based; the message counts from 1.
    #[error("there is no chord {} (exercise has {len} chords)", .slot + 1)]
    SlotOutOfRange { slot: usize, len: usize },

    #[error("audio: {0}")]
    Audio(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(EarError::NoRoots.to_string(), "no valid roots selected");
        let err = EarError::SlotOutOfRange { slot: 7, len: 4 };
        assert_eq!(
            err.to_string(),
            "there is no chord 8 (exercise has 4 chords)"
        );
        assert_eq!(
            EarError::Audio("no output audio device available".into()).to_string(),
            "audio: no output audio device available"
        );
    }
}
