//! linesync wire protocol
//!
//! A text-based protocol inspired by Redis RESP. Operation payloads are JSON,
//! tagged by a `type` field.
//!
//! ## Command Format
//! ```text
//! COMMAND <document_id> [ARGS] [JSON]
//! ```
//!
//! ## Response Format
//! ```text
//! +OK                      # Success
//! -ERR <code> <message>    # Error
//! $<length>\r\n<data>      # Bulk data
//! *<count>\r\n<items>      # Array
//! :<integer>               # Integer (new revision after PATCH)
//! ```

pub mod command;
pub mod error;
pub mod parser;
pub mod response;

pub use command::{Command, CommandKind};
pub use error::{ProtocolError, ProtocolResult};
pub use parser::Parser;
pub use response::Response;
