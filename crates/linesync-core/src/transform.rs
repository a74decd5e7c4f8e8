//! Operational transform engine.
//!
//! Reconciles a patch authored against an older revision with everything that
//! was committed since. Two levels of transform are involved:
//!
//! - structural: line indices move past concurrent line insertions and
//!   deletions ([`transform_operation`])
//! - content: character columns move past concurrent edits of the same line
//!   ([`transform_content`])
//!
//! A committed batch always lists its structural operations before its line
//! edits, so every line edit is additionally moved past the structural
//! operations that followed it in its own batch. Both passes are required;
//! collapsing them changes the outcome of multi-operation patches.
//!
//! Everything here is pure: no locking, no I/O.

use crate::document::{Document, Patch};
use crate::error::{Error, Result};
use crate::operation::{ContentOperation, Operation};
use crate::text;
use tracing::debug;

/// Operations to commit for a patch, and the content they produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub operations: Vec<Operation>,
    pub content: String,
}

/// A `ChangeLine` taken apart, for the content merge
#[derive(Debug, Clone)]
struct LineEdit {
    line_index: usize,
    operation: ContentOperation,
}

impl LineEdit {
    fn from_operation(operation: Operation) -> Option<Self> {
        match operation {
            Operation::ChangeLine {
                line_index,
                operation,
            } => Some(Self {
                line_index,
                operation,
            }),
            Operation::InsertLine { .. } | Operation::DeleteLine { .. } => None,
        }
    }
}

/// Compute the operations to commit for `patch` and the resulting content.
///
/// Fails with [`Error::InvalidRevision`] when the patch's base revision is
/// ahead of the document, and with [`Error::InvalidOperation`] when the
/// resulting operations do not fit the current content.
pub fn reconcile(document: &Document, patch: &Patch) -> Result<Reconciled> {
    check_ranges(&patch.operations)?;

    let concurrent: Vec<Operation> = document
        .commits_since(patch.base_revision)?
        .into_iter()
        .flat_map(|commit| commit.operations.iter().cloned())
        .collect();

    if concurrent.is_empty() {
        let content = text::apply_operations(document.content(), &patch.operations)?;
        return Ok(Reconciled {
            operations: patch.operations.clone(),
            content,
        });
    }

    // Rebase the patch onto the current line numbering
    let rebased_patch: Vec<Operation> = patch
        .operations
        .iter()
        .map(|op| transform_through(op.clone(), &concurrent))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();

    // Concurrent line edits move past the rest of their history and the rebased patch
    let concurrent_edits: Vec<LineEdit> = concurrent
        .iter()
        .enumerate()
        .filter(|(_, op)| !op.is_structural())
        .map(|(i, op)| {
            transform_through(
                op.clone(),
                concurrent[i + 1..].iter().chain(rebased_patch.iter()),
            )
        })
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .filter_map(LineEdit::from_operation)
        .collect();

    // Patch line edits move past the structural operations that followed them
    let patch_edits: Vec<LineEdit> = rebased_patch
        .iter()
        .enumerate()
        .filter(|(_, op)| !op.is_structural())
        .map(|(i, op)| transform_through(op.clone(), &rebased_patch[i + 1..]))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .filter_map(LineEdit::from_operation)
        .collect();

    let mut merged = Vec::with_capacity(patch_edits.len());
    for edit in patch_edits {
        if let Some(operation) = merge_edit(edit, &concurrent_edits)? {
            merged.push(operation);
        }
    }

    let operations: Vec<Operation> = rebased_patch
        .into_iter()
        .filter(Operation::is_structural)
        .chain(merged)
        .collect();

    debug!(
        patch = %patch.id,
        base_revision = patch.base_revision,
        concurrent = concurrent.len(),
        submitted = patch.operations.len(),
        committed = operations.len(),
        "Reconciled patch"
    );

    let content = text::apply_operations(document.content(), &operations)?;
    Ok(Reconciled {
        operations,
        content,
    })
}

/// Column arithmetic below assumes every range runs forwards
fn check_ranges(operations: &[Operation]) -> Result<()> {
    for op in operations {
        if let Operation::ChangeLine {
            line_index,
            operation: ContentOperation::DeleteRange {
                from_column,
                to_column,
            },
        } = op
        {
            if from_column > to_column {
                return Err(Error::InvalidOperation(format!(
                    "delete range {}..={} on line {} is reversed",
                    from_column, to_column, line_index
                )));
            }
        }
    }
    Ok(())
}

/// Fold one patch edit through every concurrent edit of the same line
fn merge_edit(edit: LineEdit, concurrent: &[LineEdit]) -> Result<Option<Operation>> {
    let LineEdit {
        line_index,
        operation,
    } = edit;

    let mut current = Some(operation);
    for other in concurrent.iter().filter(|other| other.line_index == line_index) {
        current = match current {
            Some(op) => transform_content(op, &other.operation)?,
            None => break,
        };
    }

    Ok(current.map(|op| Operation::change_line(line_index, op)))
}

/// Transform `op` through `history` in order; `None` once it is voided
pub fn transform_through<'a>(
    op: Operation,
    history: impl IntoIterator<Item = &'a Operation>,
) -> Result<Option<Operation>> {
    let mut current = op;
    for against in history {
        current = match transform_operation(current, against)? {
            Some(op) => op,
            None => return Ok(None),
        };
    }
    Ok(Some(current))
}

/// Move `op` past one concurrent operation `against`.
///
/// Returns `Ok(None)` when `against` deleted the line `op` targets, and
/// [`Error::InvalidOperation`] when the shifted index does not fit in a `usize`.
pub fn transform_operation(op: Operation, against: &Operation) -> Result<Option<Operation>> {
    let line = op.line_index();

    let transformed = match against {
        Operation::InsertLine { line_index } if *line_index <= line => {
            op.with_line_index(shifted(line, 1)?)
        }
        Operation::DeleteLine { line_index } if *line_index < line => {
            op.with_line_index(line - 1)
        }
        Operation::DeleteLine { line_index } if *line_index == line => match op {
            // index 0 has no slot before it
            Operation::InsertLine { .. } => op.with_line_index(line.saturating_sub(1)),
            Operation::DeleteLine { .. } | Operation::ChangeLine { .. } => return Ok(None),
        },
        _ => op,
    };

    Ok(Some(transformed))
}

fn shifted(index: usize, by: usize) -> Result<usize> {
    index
        .checked_add(by)
        .ok_or_else(|| Error::InvalidOperation(format!("index {} is out of range", index)))
}

/// Move content operation `op` past a concurrent edit `against` of the same line.
///
/// Returns `Ok(None)` when `against` deleted everything `op` applied to.
pub fn transform_content(
    op: ContentOperation,
    against: &ContentOperation,
) -> Result<Option<ContentOperation>> {
    use ContentOperation::{DeleteRange, InsertText};

    let transformed = match against {
        InsertText {
            column: idx,
            text: inserted,
        } => {
            let shift = inserted.chars().count();
            match op {
                InsertText { column, text } if *idx <= column => InsertText {
                    column: shifted(column, shift)?,
                    text,
                },
                InsertText { column, text } => InsertText { column, text },
                DeleteRange {
                    from_column,
                    to_column,
                } if *idx <= from_column => DeleteRange {
                    from_column: shifted(from_column, shift)?,
                    to_column: shifted(to_column, shift)?,
                },
                // insertion landed inside the range
                DeleteRange {
                    from_column,
                    to_column,
                } if *idx < to_column => DeleteRange {
                    from_column,
                    to_column: shifted(to_column, shift)?,
                },
                DeleteRange {
                    from_column,
                    to_column,
                } => DeleteRange {
                    from_column,
                    to_column,
                },
            }
        }
        DeleteRange {
            from_column: cf,
            to_column: ct,
        } => {
            let (cf, ct) = (*cf, *ct);
            let size = ct - cf + 1;
            match op {
                InsertText { column, .. } if cf <= column && column < ct => return Ok(None),
                InsertText { column, text } if column >= ct => InsertText {
                    column: column.saturating_sub(size),
                    text,
                },
                InsertText { column, text } => InsertText { column, text },
                DeleteRange {
                    from_column: pf,
                    to_column: pt,
                } => {
                    if pf > ct {
                        // disjoint, right of the concurrent range
                        DeleteRange {
                            from_column: pf - size,
                            to_column: pt - size,
                        }
                    } else if pt < cf {
                        // disjoint, left of the concurrent range
                        DeleteRange {
                            from_column: pf,
                            to_column: pt,
                        }
                    } else if cf <= pf && ct >= pt {
                        // already deleted
                        return Ok(None);
                    } else if pf <= cf && pt >= ct {
                        DeleteRange {
                            from_column: pf,
                            to_column: pt - size,
                        }
                    } else if pf <= cf && pt >= cf {
                        // tail overlaps the concurrent range
                        DeleteRange {
                            from_column: pf,
                            to_column: pt - (pt - cf + 1),
                        }
                    } else if cf <= pf && pf <= ct {
                        // head overlaps the concurrent range
                        DeleteRange {
                            from_column: pf + (ct - pf + 1) - size,
                            to_column: pt - size,
                        }
                    } else {
                        return Err(Error::InternalInvariantViolation(format!(
                            "unhandled overlap of delete {}..={} against concurrent delete {}..={}",
                            pf, pt, cf, ct
                        )));
                    }
                }
            }
        }
    };

    Ok(Some(transformed))
}
