//! Menu commands of the interactive session

use std::fmt;

/// A top-level menu choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Predict species from uploaded images
    Image,
    /// Look up reference information by species name
    Name,
    /// Leave the session
    Exit,
}

impl Command {
    /// Parse a menu choice
    ///
    /// Surrounding whitespace is ignored and matching is case-insensitive.
    /// Anything else is `None`.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "image" => Some(Self::Image),
            "name" => Some(Self::Name),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Name => write!(f, "name"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse("image"), Some(Command::Image));
        assert_eq!(Command::parse("  NAME\n"), Some(Command::Name));
        assert_eq!(Command::parse("Exit"), Some(Command::Exit));
        assert_eq!(Command::parse("quit"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("images"), None);
    }

    #[test]
    fn test_display_round_trips() {
        for cmd in [Command::Image, Command::Name, Command::Exit] {
            assert_eq!(Command::parse(&cmd.to_string()), Some(cmd));
        }
    }
}
