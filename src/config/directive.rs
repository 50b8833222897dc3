//! Parser for the `pocketbase { ... }` configuration block.
//!
//! ```text
//! pocketbase {
//!     data_dir <path>
//!     listen   <host:port>
//!     origins  <origin> ...
//! }
//! ```
//!
//! Arguments end at the line break. Double quotes group whitespace, `\"`
//! escapes a quote inside them, and `#` starts a comment. `origins` may be
//! repeated; every line appends.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// Name of the block.
pub const BLOCK_NAME: &str = "pocketbase";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct DirectiveError {
    pub line: usize,
    pub message: String,
}

impl DirectiveError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    fn arg_count(line: usize, directive: &str) -> Self {
        Self::new(
            line,
            format!("wrong argument count or unexpected line ending after '{}'", directive),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    line: usize,
    quoted: bool,
}

impl Token {
    fn is(&self, s: &str) -> bool {
        !self.quoted && self.text == s
    }
}

/// Parse a complete `pocketbase` block. A bare `pocketbase` with no block
/// yields the defaults.
pub fn parse_block(input: &str) -> Result<ServiceConfig, DirectiveError> {
    let tokens = tokenize(input)?;
    let mut iter = tokens.into_iter().peekable();

    let head = iter
        .next()
        .ok_or_else(|| DirectiveError::new(1, format!("expected '{}' block", BLOCK_NAME)))?;
    if !head.is(BLOCK_NAME) {
        return Err(DirectiveError::new(
            head.line,
            format!("expected '{}', got '{}'", BLOCK_NAME, head.text),
        ));
    }

    let mut config = ServiceConfig::default();
    let open = match iter.next() {
        None => return Ok(config),
        Some(t) => t,
    };
    if !open.is("{") || open.line != head.line {
        return Err(DirectiveError::new(
            open.line,
            format!("unexpected token '{}', expecting '{{'", open.text),
        ));
    }

    let mut closed = false;
    while let Some(directive) = iter.next() {
        if directive.is("}") {
            closed = true;
            break;
        }

        let mut args = Vec::new();
        while let Some(next) = iter.peek() {
            if next.line != directive.line || next.is("}") {
                break;
            }
            if let Some(arg) = iter.next() {
                args.push(arg);
            }
        }

        apply(&mut config, &directive, args)?;
    }

    if !closed {
        return Err(DirectiveError::new(
            open.line,
            format!("unclosed '{}' block", BLOCK_NAME),
        ));
    }
    if let Some(extra) = iter.next() {
        return Err(DirectiveError::new(
            extra.line,
            format!("unexpected token '{}' after block", extra.text),
        ));
    }

    Ok(config)
}

fn apply(config: &mut ServiceConfig, directive: &Token, args: Vec<Token>) -> Result<(), DirectiveError> {
    let line = directive.line;
    match directive.text.as_str() {
        "data_dir" => {
            let [path] = single(args).ok_or_else(|| DirectiveError::arg_count(line, "data_dir"))?;
            config.data_dir = Some(PathBuf::from(path.text));
        }
        "listen" => {
            let [addr] = single(args).ok_or_else(|| DirectiveError::arg_count(line, "listen"))?;
            config.listen = Some(addr.text);
        }
        "origins" => {
            if args.is_empty() {
                return Err(DirectiveError::arg_count(line, "origins"));
            }
            config.origins.extend(args.into_iter().map(|t| t.text));
        }
        other => {
            return Err(DirectiveError::new(
                line,
                format!("unrecognized subdirective '{}'", other),
            ));
        }
    }
    Ok(())
}

fn single(args: Vec<Token>) -> Option<[Token; 1]> {
    <[Token; 1]>::try_from(args).ok()
}

fn tokenize(input: &str) -> Result<Vec<Token>, DirectiveError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '"' => {
                let start_line = line;
                chars.next();
                let mut text = String::new();
                let mut terminated = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' if chars.peek() == Some(&'"') => {
                            text.push('"');
                            chars.next();
                        }
                        '"' => {
                            terminated = true;
                            break;
                        }
                        '\n' => {
                            line += 1;
                            text.push('\n');
                        }
                        c => text.push(c),
                    }
                }
                if !terminated {
                    return Err(DirectiveError::new(start_line, "unterminated quoted string"));
                }
                tokens.push(Token {
                    text,
                    line: start_line,
                    quoted: true,
                });
            }
            _ => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '"' {
                        break;
                    }
                    text.push(c);
                    chars.next();
                }
                tokens.push(Token {
                    text,
                    line,
                    quoted: false,
                });
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_block() {
        let config = parse_block(
            r#"
            pocketbase {
                data_dir "/var/lib/pb data"   # quoted path
                listen   127.0.0.1:8090
                origins  https://a.example https://b.example
                origins  https://c.example
            }
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/pb data")));
        assert_eq!(config.listen.as_deref(), Some("127.0.0.1:8090"));
        assert_eq!(
            config.origins,
            vec!["https://a.example", "https://b.example", "https://c.example"]
        );
    }

    #[test]
    fn test_bare_and_empty_block() {
        assert_eq!(parse_block("pocketbase").unwrap(), ServiceConfig::default());
        assert_eq!(parse_block("pocketbase {\n}\n").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_unknown_key_is_named() {
        let err = parse_block("pocketbase {\n    listen_on :8090\n}").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("'listen_on'"), "{}", err);
    }

    #[test]
    fn test_argument_count() {
        let err = parse_block("pocketbase {\n  data_dir\n}").unwrap_err();
        assert!(err.message.contains("data_dir"));

        let err = parse_block("pocketbase {\n  listen a:1 b:2\n}").unwrap_err();
        assert!(err.message.contains("listen"));

        let err = parse_block("pocketbase {\n  origins\n}").unwrap_err();
        assert!(err.message.contains("origins"));
    }

    #[test]
    fn test_structure_errors() {
        assert!(parse_block("").is_err());
        assert!(parse_block("caddy {\n}").is_err());
        assert!(parse_block("pocketbase {\n  listen :1\n").is_err());
        assert!(parse_block("pocketbase {\n}\nextra").is_err());
        assert!(parse_block("pocketbase {\n  data_dir \"/x\n}").is_err());
    }
}
