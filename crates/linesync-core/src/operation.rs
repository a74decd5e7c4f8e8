//! Line and content operations

use serde::{Deserialize, Serialize};

/// A line-level edit, addressed by line index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Operation {
    /// Insert an empty line at `line_index`
    #[serde(rename_all = "camelCase")]
    InsertLine { line_index: usize },
    /// Remove the line at `line_index`
    #[serde(rename_all = "camelCase")]
    DeleteLine { line_index: usize },
    /// Apply a content operation to the line at `line_index`
    #[serde(rename_all = "camelCase")]
    ChangeLine {
        line_index: usize,
        operation: ContentOperation,
    },
}

impl Operation {
    pub fn insert_line(line_index: usize) -> Self {
        Operation::InsertLine { line_index }
    }

    pub fn delete_line(line_index: usize) -> Self {
        Operation::DeleteLine { line_index }
    }

    pub fn change_line(line_index: usize, operation: ContentOperation) -> Self {
        Operation::ChangeLine {
            line_index,
            operation,
        }
    }

    pub fn line_index(&self) -> usize {
        match self {
            Operation::InsertLine { line_index }
            | Operation::DeleteLine { line_index }
            | Operation::ChangeLine { line_index, .. } => *line_index,
        }
    }

    /// Same operation, retargeted at another line
    pub fn with_line_index(&self, new_index: usize) -> Self {
        match self {
            Operation::InsertLine { .. } => Operation::InsertLine {
                line_index: new_index,
            },
            Operation::DeleteLine { .. } => Operation::DeleteLine {
                line_index: new_index,
            },
            Operation::ChangeLine { operation, .. } => Operation::ChangeLine {
                line_index: new_index,
                operation: operation.clone(),
            },
        }
    }

    /// Whether the operation changes the line count
    pub fn is_structural(&self) -> bool {
        !matches!(self, Operation::ChangeLine { .. })
    }
}

/// An edit scoped to a single line, addressed by character column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentOperation {
    /// Insert `text` before `column`
    InsertText { column: usize, text: String },
    /// Delete the inclusive column range `from_column..=to_column`
    #[serde(rename_all = "camelCase")]
    DeleteRange { from_column: usize, to_column: usize },
}

impl ContentOperation {
    pub fn insert_text(column: usize, text: impl Into<String>) -> Self {
        ContentOperation::InsertText {
            column,
            text: text.into(),
        }
    }

    pub fn delete_range(from_column: usize, to_column: usize) -> Self {
        ContentOperation::DeleteRange {
            from_column,
            to_column,
        }
    }
}
