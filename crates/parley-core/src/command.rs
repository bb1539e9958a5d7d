//! Slash-command parsing.
//!
//! Commands are thin wrappers around store operations; the orchestrator
//! dispatches them before ordinary message handling. A command token may
//! carry an `@handle` suffix (group chats disambiguate between bots that
//! way), which is ignored here.

/// One parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/getsysprompt` -- show the chat's system prompt override.
    GetSystemPrompt,
    /// `/setsysprompt <text>` -- upsert the chat's system prompt override.
    SetSystemPrompt(String),
    /// `/delsysprompt` -- delete the chat's override row.
    DeleteSystemPrompt,
    /// `/getconfig` -- show the effective configuration.
    GetConfig,
    /// `/amnesia` -- clear the chat's message history.
    Amnesia,
}

impl Command {
    /// Parse a message text into a command, or `None` for ordinary text.
    pub fn parse(text: &str) -> Option<Command> {
        let trimmed = text.trim();
        if !trimmed.starts_with('/') {
            return None;
        }

        let (token, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((token, rest)) => (token, rest.trim()),
            None => (trimmed, ""),
        };
        let name = token.split('@').next().unwrap_or(token);

        match name {
            "/getsysprompt" => Some(Command::GetSystemPrompt),
            "/setsysprompt" => Some(Command::SetSystemPrompt(rest.to_string())),
            "/delsysprompt" => Some(Command::DeleteSystemPrompt),
            "/getconfig" => Some(Command::GetConfig),
            "/amnesia" => Some(Command::Amnesia),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(Command::parse("hello there"), None);
        assert_eq!(Command::parse("what does /amnesia do?"), None);
    }

    #[test]
    fn test_unknown_command_is_ignored() {
        assert_eq!(Command::parse("/start"), None);
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(Command::parse("/getsysprompt"), Some(Command::GetSystemPrompt));
        assert_eq!(Command::parse("/delsysprompt"), Some(Command::DeleteSystemPrompt));
        assert_eq!(Command::parse("/getconfig"), Some(Command::GetConfig));
        assert_eq!(Command::parse("/amnesia"), Some(Command::Amnesia));
    }

    #[test]
    fn test_set_sysprompt_captures_payload() {
        assert_eq!(
            Command::parse("/setsysprompt You are a pirate."),
            Some(Command::SetSystemPrompt("You are a pirate.".to_string()))
        );
        assert_eq!(
            Command::parse("/setsysprompt"),
            Some(Command::SetSystemPrompt(String::new()))
        );
    }

    #[test]
    fn test_handle_suffix_is_stripped() {
        assert_eq!(
            Command::parse("/amnesia@parley_bot"),
            Some(Command::Amnesia)
        );
        assert_eq!(
            Command::parse("/setsysprompt@parley_bot be brief"),
            Some(Command::SetSystemPrompt("be brief".to_string()))
        );
    }
}
