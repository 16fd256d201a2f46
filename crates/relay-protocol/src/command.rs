//! Interactive client commands.

/// What a line typed by the user means to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    /// `/quit` or `/exit`, in any letter case, surrounded by any whitespace.
    Quit,
    /// Anything else is chat text to forward.
    Message,
}

impl InputCommand {
    /// Classifies one line of user input.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("/quit") || trimmed.eq_ignore_ascii_case("/exit") {
            Self::Quit
        } else {
            Self::Message
        }
    }

    /// Returns true for commands that end the session.
    pub fn is_quit(&self) -> bool {
        matches!(self, Self::Quit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_commands() {
        for line in ["/quit", "/exit", "/QUIT", "  /Exit \n", "/quit\r\n"] {
            assert_eq!(InputCommand::parse(line), InputCommand::Quit, "{line:?}");
        }
    }

    #[test]
    fn test_messages() {
        for line in ["hello", "", "/quitting", "/ quit", "say /quit"] {
            assert_eq!(InputCommand::parse(line), InputCommand::Message, "{line:?}");
        }
    }

    #[test]
    fn test_is_quit() {
        assert!(InputCommand::Quit.is_quit());
        assert!(!InputCommand::Message.is_quit());
    }
}
