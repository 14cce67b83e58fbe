/// A slash command sent by a user.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    List,
    Add(Vec<String>),
    Remove(Vec<String>),
    MuteAll,
    UnmuteAll,
    MuteWaitlist,
    UnmuteWaitlist,
    Unknown(String),
}

/// Command menu registered with the chat platform.
pub const COMMAND_MENU: &[(&str, &str)] = &[
    ("list", "List all class CRNs being tracked"),
    ("add", "Add CRNs to the tracker (e.g., /add 12345, 67890)"),
    ("rem", "Remove CRNs from the tracker (e.g., /rem 12345)"),
    ("mute_all", "Mute all notifications"),
    ("unmute_all", "Unmute all notifications"),
    ("mute_waitlist", "Mute waitlist notifications"),
    ("unmute_waitlist", "Unmute waitlist notifications"),
    ("help", "Show available commands"),
];

impl Command {
    /// Returns `None` for plain text that is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }

        let (head, args) = match text.find(char::is_whitespace) {
            Some(idx) => (&text[..idx], &text[idx..]),
            None => (text, ""),
        };
        // Group chats address commands as "/add@SomeBot".
        let name = head[1..].split('@').next().unwrap_or_default().to_ascii_lowercase();

        let command = match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "list" => Command::List,
            "add" => Command::Add(parse_crns(args)),
            "rem" | "remove" => Command::Remove(parse_crns(args)),
            "mute_all" => Command::MuteAll,
            "unmute_all" => Command::UnmuteAll,
            "mute_waitlist" => Command::MuteWaitlist,
            "unmute_waitlist" => Command::UnmuteWaitlist,
            _ => Command::Unknown(head.to_string()),
        };
        Some(command)
    }
}

/// A button press on a message sent by the bot.
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    Course(String),
    Remove(String),
    BackToList,
}

impl Callback {
    pub fn parse(data: &str) -> Option<Self> {
        if data == "back_to_list" {
            return Some(Callback::BackToList);
        }
        if let Some(crn) = data.strip_prefix("course_") {
            return Some(Callback::Course(crn.to_string()));
        }
        if let Some(crn) = data.strip_prefix("remove_") {
            return Some(Callback::Remove(crn.to_string()));
        }
        None
    }
}

/// Splits "111, 222 333" into individual CRNs.
pub fn parse_crns(args: &str) -> Vec<String> {
    args.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn help_text() -> String {
    let mut text = String::from("Course tracker commands:\n");
    for (command, description) in COMMAND_MENU {
        text.push_str(&format!("/{} - {}\n", command, description));
    }
    text.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_batch() {
        assert_eq!(
            Command::parse("/add 111, 222"),
            Some(Command::Add(vec!["111".to_string(), "222".to_string()]))
        );
        assert_eq!(
            Command::parse("/add 111,222,,333"),
            Some(Command::Add(vec!["111".to_string(), "222".to_string(), "333".to_string()]))
        );
        assert_eq!(Command::parse("/add"), Some(Command::Add(vec![])));
    }

    #[test]
    fn test_parse_remove_and_bot_suffix() {
        assert_eq!(
            Command::parse("/rem@GTCourseBot 12345"),
            Some(Command::Remove(vec!["12345".to_string()]))
        );
        assert_eq!(Command::parse("/LIST"), Some(Command::List));
    }

    #[test]
    fn test_parse_prefs_and_unknown() {
        assert_eq!(Command::parse("/mute_waitlist"), Some(Command::MuteWaitlist));
        assert_eq!(Command::parse("/unmute_all"), Some(Command::UnmuteAll));
        assert_eq!(Command::parse("/frobnicate 1"), Some(Command::Unknown("/frobnicate".to_string())));
        assert_eq!(Command::parse("hello there"), None);
    }

    #[test]
    fn test_parse_callbacks() {
        assert_eq!(Callback::parse("course_12345"), Some(Callback::Course("12345".to_string())));
        assert_eq!(Callback::parse("remove_12345"), Some(Callback::Remove("12345".to_string())));
        assert_eq!(Callback::parse("back_to_list"), Some(Callback::BackToList));
        assert_eq!(Callback::parse("something_else"), None);
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = help_text();
        for (command, _) in COMMAND_MENU {
            assert!(help.contains(&format!("/{}", command)));
        }
    }
}
