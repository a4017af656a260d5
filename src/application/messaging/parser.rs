//! Message parser - splits a prefixed message into command name and arguments

/// A message addressed to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    /// Whitespace-split arguments
    pub args: Vec<String>,
    /// Everything after the name with its line breaks intact, for code bodies
    pub raw_args: String,
}

pub struct MessageParser {
    prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// `None` unless the body starts with the prefix followed by a name
    pub fn parse(&self, body: &str) -> Option<ParsedCommand> {
        let text = body.trim_start().strip_prefix(self.prefix.as_str())?;
        let text = text.trim_start();
        let name_end = text.find(char::is_whitespace).unwrap_or(text.len());
        let name = &text[..name_end];
        if name.is_empty() {
            return None;
        }
        let raw_args = text[name_end..].trim_start_matches([' ', '\t']);
        let raw_args = raw_args.strip_prefix('\n').unwrap_or(raw_args);

        Some(ParsedCommand {
            name: name.to_lowercase(),
            args: raw_args.split_whitespace().map(str::to_string).collect(),
            raw_args: raw_args.trim_end().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_and_args() {
        let parser = MessageParser::new("/");
        let parsed = parser.parse("/Admin ban user 42 being rude").unwrap();
        assert_eq!(parsed.name, "admin");
        assert_eq!(parsed.args, vec!["ban", "user", "42", "being", "rude"]);
    }

    #[test]
    fn test_raw_args_keep_line_breaks() {
        let parser = MessageParser::new("!");
        let parsed = parser.parse("!code create poll\nname: poll\nreply: hi").unwrap();
        assert_eq!(parsed.args[0], "create");
        assert_eq!(parsed.raw_args, "create poll\nname: poll\nreply: hi");
    }

    #[test]
    fn test_non_command_text() {
        let parser = MessageParser::new("/");
        assert!(parser.parse("hello /help").is_none());
        assert!(parser.parse("/").is_none());
        assert!(parser.parse("/   ").is_none());
    }

    #[test]
    fn test_multi_char_prefix() {
        let parser = MessageParser::new(">>");
        assert_eq!(parser.parse(">> help").unwrap().name, "help");
        assert!(parser.parse(">help").is_none());
    }
}
