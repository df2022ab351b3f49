//! Chat command parsing.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    List,
    Add(String),
    Remove(String),
    /// `/check CODE` or the `/check_CODE` shortcut.
    Check(String),
    Unknown(String),
    /// Anything that is not a command.
    Text(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if !text.starts_with('/') {
            return Command::Text(text.to_string());
        }

        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (text, ""),
        };
        // Group chats address commands as `/cmd@bot_name`
        let head = head.split('@').next().unwrap_or(head);

        match head {
            "/start" => Command::Start,
            "/help" => Command::Help,
            "/list" => Command::List,
            "/add" => Command::Add(rest.to_string()),
            "/remove" => Command::Remove(rest.to_string()),
            "/check" => Command::Check(rest.to_string()),
            _ => match head.strip_prefix("/check_") {
                Some(code) => Command::Check(code.to_string()),
                None => Command::Unknown(head.to_string()),
            },
        }
    }

    /// Commands that probe the registration site and may take a while.
    pub fn is_slow(&self) -> bool {
        matches!(self, Command::Add(_) | Command::Check(_))
    }
}
