//! Command surface definitions.

use teloxide::utils::command::BotCommands;

/// Public commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum UserCommand {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "find a chat partner")]
    Chat,
    #[command(description = "end the chat or leave the queue")]
    Stop,
    #[command(description = "switch to a new partner")]
    Next,
    #[command(description = "show help")]
    Help,
    #[command(description = "report your current partner")]
    Report(String),
    #[command(description = "show your profile")]
    Profile,
    #[command(description = "show your preferences")]
    Preferences,
    #[command(description = "show your rating")]
    Rating,
}

/// Admin commands. Parsed for everyone, authorized in the handlers.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
pub enum AdminCommand {
    Ban(String),
    Unban(String),
    Warn(String),
    Checkban(String),
    Bannedlist,
    Warninglist,
    Forcematch(String),
    Enablegender,
    Disablegender,
    Enableregional,
    Disableregional,
    Matchstatus,
    Blockmedia(String),
    Unblockmedia(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_commands_parse() {
        let cmd = UserCommand::parse("/chat", "testbot").unwrap();
        assert_eq!(cmd, UserCommand::Chat);

        let cmd = UserCommand::parse("/report", "testbot").unwrap();
        assert_eq!(cmd, UserCommand::Report(String::new()));
    }

    #[test]
    fn test_admin_commands_capture_rest() {
        let cmd = AdminCommand::parse("/ban 12345 7d spam", "testbot").unwrap();
        assert_eq!(cmd, AdminCommand::Ban("12345 7d spam".into()));

        let cmd = AdminCommand::parse("/forcematch 1 2", "testbot").unwrap();
        assert_eq!(cmd, AdminCommand::Forcematch("1 2".into()));
    }
}
