//! Protocol response types

use bytes::{BufMut, BytesMut};
use serde::Serialize;

/// A protocol response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// +OK [message]
    Ok(Option<String>),

    /// -ERR <code> <message>
    Error { code: String, message: String },

    /// $<length>\r\n<data>
    Bulk(Vec<u8>),

    /// *<count>\r\n<items>
    Array(Vec<Response>),

    /// :<integer>
    Integer(i64),

    /// PONG
    Pong,
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok(None)
    }

    pub fn ok_with_message(msg: impl Into<String>) -> Self {
        Response::Ok(Some(msg.into()))
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Error reply for a core failure, coded by error kind
    pub fn from_core_error(err: &linesync_core::Error) -> Self {
        Response::error(err.code(), err.to_string())
    }

    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        Response::Bulk(data.into())
    }

    /// Bulk reply carrying `value` as JSON
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(data) => Response::Bulk(data),
            Err(e) => Response::error("INTERNAL", format!("Failed to encode reply: {}", e)),
        }
    }

    pub fn integer(n: i64) -> Self {
        Response::Integer(n)
    }

    pub fn pong() -> Self {
        Response::Pong
    }

    pub fn array(items: Vec<Response>) -> Self {
        Response::Array(items)
    }

    /// Encode the response to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Encode the response into an existing buffer
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Response::Ok(None) => {
                buf.put_slice(b"+OK\r\n");
            }
            Response::Ok(Some(msg)) => {
                buf.put_slice(b"+OK ");
                buf.put_slice(msg.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Error { code, message } => {
                buf.put_slice(b"-ERR ");
                buf.put_slice(code.as_bytes());
                buf.put_slice(b" ");
                // Keep the reply on one line
                buf.put_slice(message.replace(['\r', '\n'], " ").as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Bulk(data) => {
                buf.put_slice(b"$");
                buf.put_slice(data.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                buf.put_slice(data);
                buf.put_slice(b"\r\n");
            }
            Response::Array(items) => {
                buf.put_slice(b"*");
                buf.put_slice(items.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                for item in items {
                    item.encode_into(buf);
                }
            }
            Response::Integer(n) => {
                buf.put_slice(b":");
                buf.put_slice(n.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Pong => {
                buf.put_slice(b"+PONG\r\n");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linesync_core::ContentSnapshot;

    #[test]
    fn test_encode_ok() {
        let resp = Response::ok();
        assert_eq!(resp.encode().as_ref(), b"+OK\r\n");
    }

    #[test]
    fn test_encode_error() {
        let resp = Response::error("NOT_FOUND", "Document not found");
        assert_eq!(resp.encode().as_ref(), b"-ERR NOT_FOUND Document not found\r\n");
    }

    #[test]
    fn test_encode_core_error() {
        let err = linesync_core::Error::InvalidRevision { revision: 7, current: 2 };
        let resp = Response::from_core_error(&err);
        assert_eq!(
            resp.encode().as_ref(),
            b"-ERR INVALID_REVISION Invalid revision 7: document is at revision 2\r\n"
        );
    }

    #[test]
    fn test_encode_json() {
        let resp = Response::json(&ContentSnapshot {
            revision: 1,
            content: "a\nb".into(),
        });
        // JSON escapes the newline, so the body stays on one line
        assert_eq!(
            resp.encode().as_ref(),
            b"$31\r\n{\"revision\":1,\"content\":\"a\\nb\"}\r\n"
        );
    }

    #[test]
    fn test_encode_integer() {
        let resp = Response::integer(42);
        assert_eq!(resp.encode().as_ref(), b":42\r\n");
    }

    #[test]
    fn test_encode_array() {
        let resp = Response::array(vec![Response::ok(), Response::integer(1)]);
        assert_eq!(resp.encode().as_ref(), b"*2\r\n+OK\r\n:1\r\n");
    }
}
