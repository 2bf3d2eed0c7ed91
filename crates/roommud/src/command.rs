//! Input line → command.
//!
//! The first whitespace-delimited token picks the command (case-insensitive); `chat` and
//! `look` take the rest of the line as their argument.

use crate::world::Direction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Chat(String),
    /// `None` renders the room; `Some(keyword)` looks at a feature.
    Look(Option<String>),
    Move(Direction),
    /// Carries the token as typed, for the error message.
    Unknown(String),
}

impl Command {
    /// `None` for a blank line: nothing to do and nothing to answer.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_start();
        let (head, rest) = match line.find(char::is_whitespace) {
            Some(i) => (&line[..i], line[i..].trim_start()),
            None => (line, ""),
        };
        if head.is_empty() {
            return None;
        }

        let cmd = match head.to_ascii_lowercase().as_str() {
            "quit" => Command::Quit,
            "chat" => Command::Chat(rest.to_string()),
            "look" | "l" => {
                let k = rest.trim();
                Command::Look((!k.is_empty()).then(|| k.to_string()))
            }
            lc => match Direction::parse(lc) {
                Some(d) => Command::Move(d),
                None => Command::Unknown(head.to_string()),
            },
        };
        Some(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_no_ops() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("   \t "), None);
    }

    #[test]
    fn chat_keeps_message_text() {
        assert_eq!(
            Command::parse("chat hello  there"),
            Some(Command::Chat("hello  there".to_string()))
        );
        assert_eq!(Command::parse("CHAT"), Some(Command::Chat(String::new())));
        assert_eq!(
            Command::parse("  chat   spaced"),
            Some(Command::Chat("spaced".to_string()))
        );
    }

    #[test]
    fn look_with_and_without_keyword() {
        assert_eq!(Command::parse("look"), Some(Command::Look(None)));
        assert_eq!(Command::parse("look   "), Some(Command::Look(None)));
        assert_eq!(
            Command::parse("l door "),
            Some(Command::Look(Some("door".to_string())))
        );
    }

    #[test]
    fn movement_and_aliases() {
        assert_eq!(Command::parse("north"), Some(Command::Move(Direction::North)));
        assert_eq!(Command::parse("W"), Some(Command::Move(Direction::West)));
        assert_eq!(
            Command::parse("south please"),
            Some(Command::Move(Direction::South))
        );
    }

    #[test]
    fn quit_and_unknown() {
        assert_eq!(Command::parse("quit"), Some(Command::Quit));
        assert_eq!(
            Command::parse("Dance wildly"),
            Some(Command::Unknown("Dance".to_string()))
        );
    }
}
