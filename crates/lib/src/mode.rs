//! Persona modes and their system prompts.
//!
//! A mode is one of a closed set of presets. Each maps to a display label, a short description,
//! and the system prompt sent first on every completion call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Persona preset selecting the system prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Tutor,
    Writer,
    Developer,
    Support,
}

/// Returned when a string does not name a known mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode: {0}")]
pub struct UnknownMode(pub String);

impl Mode {
    /// All modes, in display order.
    pub const ALL: [Mode; 4] = [Mode::Tutor, Mode::Writer, Mode::Developer, Mode::Support];

    /// Stored / wire name (lowercase).
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Tutor => "tutor",
            Mode::Writer => "writer",
            Mode::Developer => "developer",
            Mode::Support => "support",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Tutor => "Tutor Mode",
            Mode::Writer => "Content Writer Mode",
            Mode::Developer => "Dev Assistant Mode",
            Mode::Support => "Support Mode",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Mode::Tutor => "For academic-related questions",
            Mode::Writer => "Assists with writing tasks",
            Mode::Developer => "Helps debug and explain code",
            Mode::Support => "Handles customer service inquiries",
        }
    }

    /// System prompt prepended to every completion request made in this mode.
    pub fn system_prompt(self) -> &'static str {
        match self {
            Mode::Tutor => "You are an expert tutor assistant. Explain concepts in detail with examples. Be educational, patient, and encouraging.",
            Mode::Writer => "You are a professional content writer assistant. Help create engaging, well-structured content. Provide creative suggestions and refinements.",
            Mode::Developer => "You are an experienced developer assistant. Provide code explanations, debugging help, and programming advice with code examples when relevant.",
            Mode::Support => "You are a friendly customer support assistant. Be helpful, empathetic, and solution-oriented when addressing user concerns.",
        }
    }

    /// Text of the assistant notice appended to the transcript when the user switches to this mode.
    pub fn change_notice(self) -> String {
        format!("Mode changed to {} mode. How can I help you?", self.as_str())
    }

    /// Parse a value read back from storage. Unknown values fall back to the default mode.
    pub fn from_stored(value: &str) -> Mode {
        match value.parse() {
            Ok(mode) => mode,
            Err(UnknownMode(v)) => {
                log::warn!("stored mode {:?} is not recognized, using {}", v, Mode::default());
                Mode::default()
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownMode(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn prompts_are_non_empty_and_distinct() {
        let prompts: HashSet<&str> = Mode::ALL.iter().map(|m| m.system_prompt()).collect();
        assert_eq!(prompts.len(), Mode::ALL.len());
        assert!(prompts.iter().all(|p| !p.trim().is_empty()));
    }

    #[test]
    fn parse_accepts_known_names() {
        assert_eq!("developer".parse::<Mode>(), Ok(Mode::Developer));
        assert_eq!(" Writer ".parse::<Mode>(), Ok(Mode::Writer));
        for m in Mode::ALL {
            assert_eq!(m.as_str().parse::<Mode>(), Ok(m));
        }
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert_eq!(
            "pirate".parse::<Mode>(),
            Err(UnknownMode("pirate".to_string()))
        );
    }

    #[test]
    fn stored_unknown_falls_back_to_default() {
        assert_eq!(Mode::from_stored("pirate"), Mode::Tutor);
        assert_eq!(Mode::from_stored(""), Mode::Tutor);
        assert_eq!(Mode::from_stored("support"), Mode::Support);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Mode::Developer).unwrap();
        assert_eq!(json, "\"developer\"");
    }

    #[test]
    fn change_notice_names_the_mode() {
        assert_eq!(
            Mode::Writer.change_notice(),
            "Mode changed to writer mode. How can I help you?"
        );
    }
}
