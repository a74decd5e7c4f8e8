//! linesync Transport Layer
//!
//! Serves the line protocol over raw TCP connections. Each connection gets
//! its own [`ConnectionHandler`]; all of them share one editor service.

pub mod handler;
pub mod tcp;

pub use handler::ConnectionHandler;
pub use tcp::TcpServer;
