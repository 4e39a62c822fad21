/// Slash commands understood by the chat REPL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatCommand {
    Analyze,
    Context,
    ClearContext,
    Model,
    Metrics,
    History,
    Help,
}

impl ChatCommand {
    pub const ALL: [Self; 7] = [
        Self::Analyze,
        Self::Context,
        Self::ClearContext,
        Self::Model,
        Self::Metrics,
        Self::History,
        Self::Help,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Context => "context",
            Self::ClearContext => "clear_context",
            Self::Model => "model",
            Self::Metrics => "metrics",
            Self::History => "history",
            Self::Help => "help",
        }
    }

    /// Case-insensitive lookup by the word after the slash.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(name))
    }

    pub fn usage(self) -> &'static str {
        match self {
            Self::Analyze => "/analyze <path>...",
            Self::Context => "/context [text]",
            Self::ClearContext => "/clear_context",
            Self::Model => "/model [name]",
            Self::Metrics => "/metrics",
            Self::History => "/history",
            Self::Help => "/help",
        }
    }
}

pub fn chat_help() -> String {
    ChatCommand::ALL
        .iter()
        .map(|command| command.usage())
        .collect::<Vec<_>>()
        .join("  ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_round_trips_through_its_name() {
        for command in ChatCommand::ALL {
            assert_eq!(ChatCommand::from_name(command.name()), Some(command));
        }
        assert_eq!(ChatCommand::from_name("Clear_Context"), Some(ChatCommand::ClearContext));
        assert_eq!(ChatCommand::from_name("magic"), None);
    }

    #[test]
    fn help_lists_usage_in_order() {
        let help = chat_help();
        assert!(help.starts_with("/analyze <path>..."));
        assert!(help.ends_with("/help"));
    }
}
