use super::command_registry::ChatCommand;

/// One REPL line, resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Noop,
    /// Plain text: a chat turn.
    Ask(String),
    Analyze(Vec<String>),
    SetContext(String),
    ShowContext,
    ClearContext,
    /// `None` asks for the current model.
    Model(Option<String>),
    Metrics,
    History,
    Help,
    Unknown { command: String, arg: String },
}

/// Quoted paths are honored; an unbalanced quote falls back to whitespace.
fn split_paths(arg: &str) -> Vec<String> {
    shell_words::split(arg)
        .unwrap_or_else(|_| arg.split_whitespace().map(str::to_string).collect())
        .into_iter()
        .filter(|path| !path.is_empty())
        .collect()
}

pub fn parse_intent(line: &str) -> Intent {
    let text = line.trim();
    if text.is_empty() {
        return Intent::Noop;
    }
    let Some(tail) = text.strip_prefix('/') else {
        return Intent::Ask(text.to_string());
    };

    let (name, arg) = tail
        .split_once(char::is_whitespace)
        .map(|(name, arg)| (name, arg.trim()))
        .unwrap_or((tail, ""));
    if name.is_empty() {
        return Intent::Ask(text.to_string());
    }

    match ChatCommand::from_name(name) {
        Some(ChatCommand::Analyze) => Intent::Analyze(split_paths(arg)),
        Some(ChatCommand::Context) if arg.is_empty() => Intent::ShowContext,
        Some(ChatCommand::Context) => Intent::SetContext(arg.to_string()),
        Some(ChatCommand::ClearContext) => Intent::ClearContext,
        Some(ChatCommand::Model) => Intent::Model((!arg.is_empty()).then(|| arg.to_string())),
        Some(ChatCommand::Metrics) => Intent::Metrics,
        Some(ChatCommand::History) => Intent::History,
        Some(ChatCommand::Help) => Intent::Help,
        None => Intent::Unknown {
            command: name.to_ascii_lowercase(),
            arg: arg.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_becomes_a_question() {
        assert_eq!(
            parse_intent("  ¿Qué significa esto?  "),
            Intent::Ask("¿Qué significa esto?".to_string())
        );
        assert_eq!(parse_intent("/ dolor"), Intent::Ask("/ dolor".to_string()));
    }

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_intent("   "), Intent::Noop);
    }

    #[test]
    fn analyze_honors_quoted_paths() {
        assert_eq!(
            parse_intent("/analyze \"/tmp/rx torax.png\" /tmp/eco.jpg"),
            Intent::Analyze(vec!["/tmp/rx torax.png".to_string(), "/tmp/eco.jpg".to_string()])
        );
        assert_eq!(
            parse_intent("/analyze \"a.png b.png"),
            Intent::Analyze(vec!["\"a.png".to_string(), "b.png".to_string()])
        );
        assert_eq!(parse_intent("/analyze"), Intent::Analyze(Vec::new()));
    }

    #[test]
    fn context_command_sets_or_shows() {
        assert_eq!(
            parse_intent("/context Hallazgos: fractura de radio"),
            Intent::SetContext("Hallazgos: fractura de radio".to_string())
        );
        assert_eq!(parse_intent("/context   "), Intent::ShowContext);
    }

    #[test]
    fn model_and_no_arg_commands() {
        assert_eq!(
            parse_intent("/model  gemini-2.5-flash "),
            Intent::Model(Some("gemini-2.5-flash".to_string()))
        );
        assert_eq!(parse_intent("/model"), Intent::Model(None));
        assert_eq!(parse_intent("/METRICS"), Intent::Metrics);
        assert_eq!(parse_intent("/clear_context"), Intent::ClearContext);
        assert_eq!(parse_intent("/history"), Intent::History);
        assert_eq!(parse_intent("/help"), Intent::Help);
    }

    #[test]
    fn unknown_command_keeps_its_argument() {
        assert_eq!(
            parse_intent("/Magic foo bar"),
            Intent::Unknown {
                command: "magic".to_string(),
                arg: "foo bar".to_string(),
            }
        );
    }
}
