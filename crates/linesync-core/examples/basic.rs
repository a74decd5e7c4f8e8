//! Basic linesync Example
//!
//! Two clients edit the same document without seeing each other's changes;
//! the service reconciles both patches into one history.
//!
//! Run with: cargo run -p linesync-core --example basic

use linesync_core::{ContentOperation, DocumentId, EditorService, Operation, Patch};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let service = EditorService::new();
    let id = DocumentId::new("notes:shared")?;
    service.create_document(id.clone())?;

    // Both clients start from revision 0
    service.apply_patch(
        &id,
        Patch::new(
            "alice-1",
            0,
            vec![Operation::change_line(0, ContentOperation::insert_text(0, "Hello"))],
        ),
    )?;
    service.apply_patch(
        &id,
        Patch::new(
            "bob-1",
            0,
            vec![
                Operation::insert_line(1),
                Operation::change_line(1, ContentOperation::insert_text(0, "World")),
            ],
        ),
    )?;

    let snapshot = service.content(&id)?;
    println!("Revision {}:\n{}", snapshot.revision, snapshot.content);

    // Alice catches up on what she missed
    let diff = service.diff(&id, 1)?;
    println!("\nDiff since revision 1:\n{}", serde_json::to_string_pretty(&diff)?);

    Ok(())
}
