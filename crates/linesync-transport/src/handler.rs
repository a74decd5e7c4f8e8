//! Connection handler - authenticates a client and runs its commands

use linesync_core::{DocumentId, EditorService, Patch};
use linesync_protocol::{Command, CommandKind, Parser, Response};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handles a single client connection
pub struct ConnectionHandler {
    /// Unique client ID
    pub client_id: String,
    /// Shared editor service
    service: Arc<EditorService>,
    /// Protocol parser
    parser: Parser,
    /// Whether client is authenticated
    authenticated: bool,
    /// Server password (if auth required)
    password: Option<String>,
    /// Set once the client sent QUIT
    closed: bool,
}

impl ConnectionHandler {
    pub fn new(client_id: String, service: Arc<EditorService>) -> Self {
        Self {
            client_id,
            service,
            parser: Parser::new(),
            authenticated: true, // No auth required by default
            password: None,
            closed: false,
        }
    }

    /// Create a new handler with authentication required
    pub fn with_auth(client_id: String, service: Arc<EditorService>, password: String) -> Self {
        Self {
            client_id,
            service,
            parser: Parser::new(),
            authenticated: false,
            password: Some(password),
            closed: false,
        }
    }

    /// Whether the client asked to close the connection
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Process incoming data and return responses
    ///
    /// A malformed line yields one PARSE_ERROR reply; the lines after it
    /// are still processed. Nothing is processed after QUIT.
    pub fn process(&mut self, data: &[u8]) -> Vec<Response> {
        let mut responses = Vec::new();

        if let Err(e) = self.parser.feed(data) {
            responses.push(Response::error("PARSE_ERROR", e.to_string()));
            return responses;
        }

        while !self.closed {
            match self.parser.parse() {
                Ok(Some(cmd)) => {
                    let response = self.handle_command(cmd);
                    responses.push(response);
                }
                Ok(None) => break, // Need more data
                Err(e) => {
                    debug!(client = %self.client_id, error = %e, "Malformed command");
                    responses.push(Response::error("PARSE_ERROR", e.to_string()));
                }
            }
        }

        responses
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: Command) -> Response {
        debug!(client = %self.client_id, cmd = ?cmd.kind, "Processing command");

        // AUTH, PING and QUIT are always allowed
        match cmd.kind {
            CommandKind::Auth { password } => return self.handle_auth(password),
            CommandKind::Ping => return Response::pong(),
            CommandKind::Quit => {
                self.closed = true;
                return Response::ok_with_message("Goodbye");
            }
            _ => {}
        }

        if !self.authenticated {
            return Response::error("NOAUTH", "Authentication required. Use AUTH <password>");
        }

        match cmd.kind {
            CommandKind::Create => self.handle_create(cmd.document_id),
            CommandKind::Patch { patch } => self.handle_patch(cmd.document_id, patch),
            CommandKind::Content => self.handle_content(cmd.document_id),
            CommandKind::Diff { revision } => self.handle_diff(cmd.document_id, revision),
            CommandKind::Keys { pattern } => self.handle_keys(pattern),
            CommandKind::Info => self.handle_info(),
            // Handled above
            CommandKind::Auth { .. } | CommandKind::Ping | CommandKind::Quit => Response::ok(),
        }
    }

    fn handle_auth(&mut self, password: String) -> Response {
        match &self.password {
            Some(expected) if expected == &password => {
                self.authenticated = true;
                info!(client = %self.client_id, "Client authenticated");
                Response::ok()
            }
            Some(_) => {
                warn!(client = %self.client_id, "Authentication failed");
                Response::error("WRONGPASS", "Invalid password")
            }
            None => {
                // No password required
                Response::ok_with_message("No authentication required")
            }
        }
    }

    fn handle_create(&self, doc_id: Option<String>) -> Response {
        let id = match parse_id(doc_id) {
            Ok(id) => id,
            Err(response) => return response,
        };

        match self.service.create_document(id) {
            Ok(()) => Response::ok(),
            Err(e) => Response::from_core_error(&e),
        }
    }

    fn handle_patch(&self, doc_id: Option<String>, patch: Patch) -> Response {
        let id = match parse_id(doc_id) {
            Ok(id) => id,
            Err(response) => return response,
        };

        match self.service.apply_patch(&id, patch) {
            Ok(applied) => Response::integer(applied.revision as i64),
            Err(e) => Response::from_core_error(&e),
        }
    }

    fn handle_content(&self, doc_id: Option<String>) -> Response {
        let id = match parse_id(doc_id) {
            Ok(id) => id,
            Err(response) => return response,
        };

        match self.service.content(&id) {
            Ok(snapshot) => Response::json(&snapshot),
            Err(e) => Response::from_core_error(&e),
        }
    }

    fn handle_diff(&self, doc_id: Option<String>, revision: usize) -> Response {
        let id = match parse_id(doc_id) {
            Ok(id) => id,
            Err(response) => return response,
        };

        match self.service.diff(&id, revision) {
            Ok(diff) => Response::json(&diff),
            Err(e) => Response::from_core_error(&e),
        }
    }

    fn handle_keys(&self, pattern: Option<String>) -> Response {
        let mut ids = self.service.list(pattern.as_deref());
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        let keys: Vec<Response> = ids
            .into_iter()
            .map(|id| Response::bulk(id.as_str().as_bytes().to_vec()))
            .collect();
        Response::array(keys)
    }

    fn handle_info(&self) -> Response {
        let stats = self.service.stats();
        let info = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "documents": stats.document_count,
            "client_id": self.client_id,
        });
        Response::json(&info)
    }
}

fn parse_id(doc_id: Option<String>) -> Result<DocumentId, Response> {
    let id_str = doc_id.ok_or_else(|| Response::error("MISSING_ARG", "Document ID required"))?;
    DocumentId::new(id_str).map_err(|e| Response::from_core_error(&e))
}
