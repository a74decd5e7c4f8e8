//! Folding operations into line-delimited text.
//!
//! Lines are the `\n`-separated pieces of the content, so the empty string is a
//! single empty line. Columns count chars, not bytes.

use crate::error::{Error, Result};
use crate::operation::{ContentOperation, Operation};

/// Apply `operations` to `content` in order
pub fn apply_operations(content: &str, operations: &[Operation]) -> Result<String> {
    if operations.is_empty() {
        return Ok(content.to_string());
    }

    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    for operation in operations {
        apply_operation(&mut lines, operation)?;
    }
    Ok(lines.join("\n"))
}

fn apply_operation(lines: &mut Vec<String>, operation: &Operation) -> Result<()> {
    match operation {
        Operation::InsertLine { line_index } => {
            if *line_index > lines.len() {
                return Err(line_out_of_range(operation, lines.len()));
            }
            lines.insert(*line_index, String::new());
        }
        Operation::DeleteLine { line_index } => {
            if *line_index >= lines.len() {
                return Err(line_out_of_range(operation, lines.len()));
            }
            lines.remove(*line_index);
        }
        Operation::ChangeLine {
            line_index,
            operation: content_op,
        } => {
            let line_count = lines.len();
            let line = lines
                .get_mut(*line_index)
                .ok_or_else(|| line_out_of_range(operation, line_count))?;
            *line = apply_content_operation(line, content_op)?;
        }
    }
    Ok(())
}

/// Apply a single content operation to one line
pub fn apply_content_operation(line: &str, operation: &ContentOperation) -> Result<String> {
    let length = line.chars().count();

    match operation {
        ContentOperation::InsertText { column, text } => {
            if *column > length {
                return Err(Error::InvalidOperation(format!(
                    "insert at column {} past end of line of length {}",
                    column, length
                )));
            }
            let at = byte_offset(line, *column);
            let mut result = String::with_capacity(line.len() + text.len());
            result.push_str(&line[..at]);
            result.push_str(text);
            result.push_str(&line[at..]);
            Ok(result)
        }
        ContentOperation::DeleteRange {
            from_column,
            to_column,
        } => {
            if from_column > to_column || *to_column >= length {
                return Err(Error::InvalidOperation(format!(
                    "delete range {}..={} invalid for line of length {}",
                    from_column, to_column, length
                )));
            }
            let start = byte_offset(line, *from_column);
            let end = byte_offset(line, *to_column + 1);
            let mut result = String::with_capacity(line.len());
            result.push_str(&line[..start]);
            result.push_str(&line[end..]);
            Ok(result)
        }
    }
}

fn byte_offset(line: &str, column: usize) -> usize {
    line.char_indices()
        .nth(column)
        .map(|(offset, _)| offset)
        .unwrap_or(line.len())
}

fn line_out_of_range(operation: &Operation, line_count: usize) -> Error {
    Error::InvalidOperation(format!(
        "{:?} out of range for document with {} lines",
        operation, line_count
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_from_empty() {
        let content = apply_operations(
            "",
            &[
                Operation::change_line(0, ContentOperation::insert_text(0, "Hello")),
                Operation::insert_line(1),
                Operation::change_line(1, ContentOperation::insert_text(0, "World")),
            ],
        )
        .unwrap();

        assert_eq!(content, "Hello\nWorld");
    }

    #[test]
    fn test_delete_line() {
        let content = apply_operations("a\nb\nc", &[Operation::delete_line(1)]).unwrap();
        assert_eq!(content, "a\nc");

        let content = apply_operations("a", &[Operation::delete_line(0)]).unwrap();
        assert_eq!(content, "");
    }

    #[test]
    fn test_insert_text_middle() {
        let line = apply_content_operation("0123", &ContentOperation::insert_text(2, "ab")).unwrap();
        assert_eq!(line, "01ab23");

        let line = apply_content_operation("0123", &ContentOperation::insert_text(4, "!")).unwrap();
        assert_eq!(line, "0123!");
    }

    #[test]
    fn test_delete_range_inclusive() {
        let line = apply_content_operation("0123456789", &ContentOperation::delete_range(4, 7)).unwrap();
        assert_eq!(line, "012389");
    }

    #[test]
    fn test_insert_then_delete_restores_line() {
        let original = "the quick fox";
        let inserted =
            apply_content_operation(original, &ContentOperation::insert_text(4, "very ")).unwrap();
        assert_eq!(inserted, "the very quick fox");

        let restored =
            apply_content_operation(&inserted, &ContentOperation::delete_range(4, 4 + 5 - 1)).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_columns_are_chars() {
        let line = apply_content_operation("héllo", &ContentOperation::insert_text(2, "_")).unwrap();
        assert_eq!(line, "hé_llo");

        let line = apply_content_operation("héllo", &ContentOperation::delete_range(1, 1)).unwrap();
        assert_eq!(line, "hllo");
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(apply_operations("", &[Operation::delete_line(1)]).is_err());
        assert!(apply_operations("a", &[Operation::insert_line(3)]).is_err());
        assert!(apply_operations(
            "a",
            &[Operation::change_line(1, ContentOperation::insert_text(0, "x"))]
        )
        .is_err());
        assert!(apply_content_operation("abc", &ContentOperation::insert_text(4, "x")).is_err());
        assert!(apply_content_operation("abc", &ContentOperation::delete_range(2, 3)).is_err());
        assert!(apply_content_operation("abc", &ContentOperation::delete_range(2, 1)).is_err());
    }
}
