//! Command parser

use crate::command::Command;
use crate::error::{ProtocolError, ProtocolResult};
use bytes::BytesMut;
use linesync_core::Patch;
use tracing::trace;

/// Maximum message size (1MB)
const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Incremental, line-oriented command parser
pub struct Parser {
    buffer: BytesMut,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data to the parser buffer
    pub fn feed(&mut self, data: &[u8]) -> ProtocolResult<()> {
        if self.buffer.len() + data.len() > MAX_MESSAGE_SIZE {
            let size = self.buffer.len() + data.len();
            self.buffer.clear();
            return Err(ProtocolError::MessageTooLarge {
                size,
                max: MAX_MESSAGE_SIZE,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Try to parse a complete command from the buffer
    pub fn parse(&mut self) -> ProtocolResult<Option<Command>> {
        let line_end = match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None => return Ok(None), // Incomplete
        };

        // Extract line (excluding \r\n or \n)
        let line_len = if line_end > 0 && self.buffer[line_end - 1] == b'\r' {
            line_end - 1
        } else {
            line_end
        };

        // Remove the line from buffer even if it fails to decode
        let raw = self.buffer.split_to(line_end + 1);
        let line = std::str::from_utf8(&raw[..line_len]).map_err(|e| {
            ProtocolError::InvalidArgument(format!(
                "invalid UTF-8 at byte {}",
                e.valid_up_to()
            ))
        })?;

        trace!(line = %line, "Parsing command line");
        Self::parse_line(line).map(Some)
    }

    /// Parse a single command line
    fn parse_line(line: &str) -> ProtocolResult<Command> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::InvalidCommand("Empty command".into()));
        }

        let mut tokens = Tokenizer::new(line);
        let cmd = tokens
            .next()
            .ok_or_else(|| ProtocolError::InvalidCommand("Empty command".into()))?
            .to_uppercase();

        match cmd.as_str() {
            "AUTH" => Self::parse_auth(&mut tokens),
            "CREATE" => Self::parse_create(&mut tokens),
            "PATCH" => Self::parse_patch(&mut tokens),
            "CONTENT" | "GET" => Self::parse_content(&mut tokens),
            "DIFF" => Self::parse_diff(&mut tokens),
            "KEYS" => Self::parse_keys(&mut tokens),
            "INFO" => Ok(Command::info()),
            "PING" => Ok(Command::ping()),
            "QUIT" => Ok(Command::quit()),
            _ => Err(ProtocolError::InvalidCommand(format!("Unknown command: {}", cmd))),
        }
    }

    fn parse_auth(tokens: &mut Tokenizer) -> ProtocolResult<Command> {
        let password = tokens
            .next()
            .ok_or_else(|| ProtocolError::MissingArgument("password".into()))?;

        Ok(Command::auth(password.to_string()))
    }

    fn parse_create(tokens: &mut Tokenizer) -> ProtocolResult<Command> {
        let id = document_id(tokens)?;
        no_trailing(tokens)?;
        Ok(Command::create(id.to_string()))
    }

    fn parse_patch(tokens: &mut Tokenizer) -> ProtocolResult<Command> {
        let id = document_id(tokens)?;
        let json = tokens
            .rest()
            .ok_or_else(|| ProtocolError::MissingArgument("patch".into()))?;

        let patch: Patch =
            serde_json::from_str(&json).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

        Ok(Command::patch(id.to_string(), patch))
    }

    fn parse_content(tokens: &mut Tokenizer) -> ProtocolResult<Command> {
        let id = document_id(tokens)?;
        no_trailing(tokens)?;
        Ok(Command::content(id.to_string()))
    }

    fn parse_diff(tokens: &mut Tokenizer) -> ProtocolResult<Command> {
        let id = document_id(tokens)?;
        let revision_str = tokens
            .next()
            .ok_or_else(|| ProtocolError::MissingArgument("revision".into()))?;
        let revision: usize = revision_str
            .parse()
            .map_err(|_| ProtocolError::InvalidArgument(format!("Invalid revision: {}", revision_str)))?;
        no_trailing(tokens)?;

        Ok(Command::diff(id.to_string(), revision))
    }

    fn parse_keys(tokens: &mut Tokenizer) -> ProtocolResult<Command> {
        let pattern = tokens.next().map(|s| s.to_string());
        Ok(Command::keys(pattern))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn document_id<'a>(tokens: &mut Tokenizer<'a>) -> ProtocolResult<&'a str> {
    tokens
        .next()
        .ok_or_else(|| ProtocolError::MissingArgument("document_id".into()))
}

fn no_trailing(tokens: &mut Tokenizer) -> ProtocolResult<()> {
    match tokens.next() {
        Some(extra) => Err(ProtocolError::InvalidArgument(format!("Unexpected argument: {}", extra))),
        None => Ok(()),
    }
}

/// Simple tokenizer that handles quoted strings
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos..].starts_with(' ') {
            self.pos += 1;
        }
    }

    fn next(&mut self) -> Option<&'a str> {
        self.skip_whitespace();

        if self.pos >= self.input.len() {
            return None;
        }

        let remaining = &self.input[self.pos..];

        // Handle quoted string
        if let Some(quoted) = remaining.strip_prefix('"') {
            if let Some(end) = quoted.find('"') {
                self.pos += end + 2;
                return Some(&quoted[..end]);
            }
        }

        // Handle regular token
        let end = remaining.find(' ').unwrap_or(remaining.len());
        let token = &remaining[..end];
        self.pos += end;

        Some(token)
    }

    fn rest(&mut self) -> Option<String> {
        self.skip_whitespace();

        if self.pos >= self.input.len() {
            return None;
        }

        let remaining = self.input[self.pos..].to_string();
        self.pos = self.input.len();
        Some(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;
    use linesync_core::{ContentOperation, Operation};

    fn parse_one(input: &[u8]) -> ProtocolResult<Command> {
        let mut parser = Parser::new();
        parser.feed(input).unwrap();
        parser.parse().map(|cmd| cmd.expect("complete line"))
    }

    #[test]
    fn test_parse_create() {
        let cmd = parse_one(b"CREATE notes:123\r\n").unwrap();
        assert!(matches!(cmd.kind, CommandKind::Create));
        assert_eq!(cmd.document_id, Some("notes:123".to_string()));
    }

    #[test]
    fn test_parse_patch() {
        let line = concat!(
            r#"PATCH notes:1 {"id": "p 1", "baseRevision": 2, "operations": "#,
            r#"[{"type": "change-line", "lineIndex": 0, "#,
            r#""operation": {"type": "insert-text", "column": 0, "text": "a b"}}]}"#,
            "\n"
        );
        let cmd = parse_one(line.as_bytes()).unwrap();

        match cmd.kind {
            CommandKind::Patch { patch } => {
                assert_eq!(patch.id, "p 1");
                assert_eq!(patch.base_revision, 2);
                assert_eq!(
                    patch.operations,
                    vec![Operation::change_line(0, ContentOperation::insert_text(0, "a b"))]
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_patch_bad_json() {
        let result = parse_one(b"PATCH notes:1 {\"id\": \"p\"}\n");
        assert!(matches!(result, Err(ProtocolError::InvalidJson(_))));

        let result = parse_one(b"PATCH notes:1\n");
        assert!(matches!(result, Err(ProtocolError::MissingArgument(_))));
    }

    #[test]
    fn test_parse_diff() {
        let cmd = parse_one(b"DIFF notes:1 4\r\n").unwrap();
        assert!(matches!(cmd.kind, CommandKind::Diff { revision: 4 }));

        assert!(matches!(
            parse_one(b"DIFF notes:1 -1\r\n"),
            Err(ProtocolError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_one(b"DIFF notes:1\r\n"),
            Err(ProtocolError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_parse_content_and_keys() {
        let cmd = parse_one(b"content notes:1\n").unwrap();
        assert!(matches!(cmd.kind, CommandKind::Content));

        let cmd = parse_one(b"KEYS notes:*\n").unwrap();
        assert!(matches!(cmd.kind, CommandKind::Keys { pattern: Some(ref p) } if p == "notes:*"));
    }

    #[test]
    fn test_parse_unknown() {
        assert!(matches!(
            parse_one(b"SET a b c\n"),
            Err(ProtocolError::InvalidCommand(_))
        ));
        assert!(matches!(
            parse_one(b"CREATE a extra\n"),
            Err(ProtocolError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parse_ping() {
        let cmd = parse_one(b"PING\r\n").unwrap();
        assert!(matches!(cmd.kind, CommandKind::Ping));
    }

    #[test]
    fn test_incomplete_command() {
        let mut parser = Parser::new();
        parser.feed(b"CONTENT notes:123").unwrap();

        assert!(parser.parse().unwrap().is_none());

        parser.feed(b"\r\n").unwrap();
        assert!(parser.parse().unwrap().is_some());
    }

    #[test]
    fn test_message_too_large() {
        let mut parser = Parser::new();
        let chunk = vec![b'a'; MAX_MESSAGE_SIZE];

        parser.feed(&chunk).unwrap();
        assert!(matches!(
            parser.feed(b"a"),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut parser = Parser::new();
        parser
            .feed(b"PATCH d {\"id\":\"p\",\"baseRevision\":0,\"operations\":[{\"type\":\"change-line\",\"lineIndex\":0,\"operation\":{\"type\":\"insert-text\",\"column\":0,\"text\":\"a\xFF\"}}]}\r\nPING\r\n")
            .unwrap();

        assert!(matches!(
            parser.parse(),
            Err(ProtocolError::InvalidArgument(_))
        ));
        let next = parser.parse().unwrap().unwrap();
        assert!(matches!(next.kind, CommandKind::Ping));
    }
}
