use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start, or show the terms of use")]
    Start,
    #[command(description = "Show this help")]
    Help,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "intakebot").ok(), Some(Command::Start));
        assert_eq!(Command::parse("/help@intakebot", "intakebot").ok(), Some(Command::Help));
        assert!(Command::parse("/sub 1", "intakebot").is_err());
    }
}
