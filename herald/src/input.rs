//! Raw input tokenizer
//!
//! Turns a line such as `!kick bob "spamming links"` into the command
//! identifier and its raw string values.

use thiserror::Error;

use crate::config::DispatchConfig;

/// Errors that can occur while splitting an input line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("No command given after the prefix")]
    Empty,

    #[error("Unterminated quote starting at character {position}")]
    UnterminatedQuote { position: usize },
}

/// A line split into a command identifier and raw values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInvocation {
    pub command: String,
    pub values: Vec<String>,
}

/// Split `line` into a [`RawInvocation`].
///
/// Returns `Ok(None)` when the line does not start with the configured prefix.
/// Values are separated by whitespace; double quotes group a value and allow
/// `\"` and `\\` escapes inside them.
pub fn split_input(line: &str, config: &DispatchConfig) -> Result<Option<RawInvocation>, InputError> {
    let line = line.trim_start();
    let Some(rest) = strip_prefix(line, &config.prefix, config.case_sensitive_prefix) else {
        return Ok(None);
    };

    let mut tokens = tokenize(rest)?.into_iter();
    let command = tokens.next().ok_or(InputError::Empty)?;
    Ok(Some(RawInvocation {
        command,
        values: tokens.collect(),
    }))
}

fn strip_prefix<'a>(line: &'a str, prefix: &str, case_sensitive: bool) -> Option<&'a str> {
    if case_sensitive {
        return line.strip_prefix(prefix);
    }
    // Char by char, since case folding can change a char's UTF-8 length.
    let mut chars = line.chars();
    for expected in prefix.chars() {
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    Some(chars.as_str())
}

fn tokenize(input: &str) -> Result<Vec<String>, InputError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // A token exists once anything, even an empty quoted string, was read.
    let mut in_token = false;
    let mut quote_start: Option<usize> = None;
    let mut chars = input.chars().enumerate();

    while let Some((index, c)) = chars.next() {
        match (quote_start, c) {
            (Some(_), '"') => quote_start = None,
            (Some(start), '\\') => match chars.next() {
                Some((_, escaped @ ('"' | '\\'))) => current.push(escaped),
                Some((_, other)) => {
                    current.push('\\');
                    current.push(other);
                }
                None => return Err(InputError::UnterminatedQuote { position: start }),
            },
            (Some(_), c) => current.push(c),
            (None, '"') => {
                quote_start = Some(index);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if let Some(position) = quote_start {
        return Err(InputError::UnterminatedQuote { position });
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(line: &str) -> Result<Option<RawInvocation>, InputError> {
        split_input(line, &DispatchConfig::default())
    }

    fn values(line: &str) -> Vec<String> {
        split(line).unwrap().unwrap().values
    }

    #[test]
    fn test_plain_words() {
        let raw = split("!kick bob now").unwrap().unwrap();
        assert_eq!(raw.command, "kick");
        assert_eq!(raw.values, vec!["bob", "now"]);
    }

    #[test]
    fn test_without_prefix_is_ignored() {
        assert_eq!(split("kick bob").unwrap(), None);
        assert_eq!(split("").unwrap(), None);
    }

    #[test]
    fn test_prefix_only_is_empty() {
        assert_eq!(split("!").unwrap_err(), InputError::Empty);
        assert_eq!(split("!   ").unwrap_err(), InputError::Empty);
    }

    #[test]
    fn test_quotes_and_escapes() {
        assert_eq!(values(r#"!kick bob "spamming links""#), vec!["bob", "spamming links"]);
        assert_eq!(values(r#"!say "she said \"hi\"""#), vec![r#"she said "hi""#]);
        assert_eq!(values(r#"!say "back\\slash""#), vec![r"back\slash"]);
        assert_eq!(values(r#"!say "" x"#), vec!["", "x"]);
        assert_eq!(values(r#"!say pre"fix mid"post"#), vec!["prefix midpost"]);
    }

    #[test]
    fn test_extra_whitespace() {
        assert_eq!(values("  !mute   bob \t 10  "), vec!["bob", "10"]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(
            split(r#"!kick bob "spamming"#).unwrap_err(),
            InputError::UnterminatedQuote { position: 9 }
        );
        assert!(split(r#"!kick "trailing\"#).is_err());
    }

    #[test]
    fn test_prefix_case() {
        let config = DispatchConfig::default().with_prefix("bot:");
        assert!(split_input("BOT: ping", &config).unwrap().is_none());

        let relaxed = config.with_case_sensitive_prefix(false);
        let raw = split_input("BOT: ping", &relaxed).unwrap().unwrap();
        assert_eq!(raw.command, "ping");
    }

    #[test]
    fn test_case_insensitive_prefix_beyond_ascii() {
        let config = DispatchConfig::default()
            .with_prefix("k!")
            .with_case_sensitive_prefix(false);

        // KELVIN SIGN is three bytes and lowercases to a one-byte 'k'.
        let raw = split_input("\u{212A}! ping", &config).unwrap().unwrap();
        assert_eq!(raw.command, "ping");

        let accented = DispatchConfig::default()
            .with_prefix("été:")
            .with_case_sensitive_prefix(false);
        let raw = split_input("ÉTÉ: roll 6", &accented).unwrap().unwrap();
        assert_eq!(raw.values, vec!["6"]);

        assert!(split_input("ÉTA: roll", &accented).unwrap().is_none());
        assert!(split_input("k", &config).unwrap().is_none());
    }
}
