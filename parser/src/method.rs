//! Representation of HTTP request methods.

use std::fmt::Display;

/// Request method. [RFC 9110 Section 9](https://www.rfc-editor.org/rfc/rfc9110#section-9).
///
/// Only `GET` and `HEAD` are ever routed to the file filter; the rest are
/// recognized so a virtual document handler or a 405 response can name the
/// method the client actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// RFC 9110 9.3.1
    Get,
    /// RFC 9110 9.3.2
    Head,
    /// RFC 9110 9.3.3
    Post,
    /// RFC 9110 9.3.4
    Put,
    /// RFC 9110 9.3.5
    Delete,
    /// RFC 9110 9.3.6
    Connect,
    /// RFC 9110 9.3.7
    Options,
    /// RFC 9110 9.3.8
    Trace,
}

impl Method {
    /// Parses a method token, e.g. `b"GET"`. Case-sensitive per RFC 9110 9.1.
    pub fn from_bytes(b: &[u8]) -> Option<Method> {
        Some(match b {
            b"GET" => Method::Get,
            b"HEAD" => Method::Head,
            b"POST" => Method::Post,
            b"PUT" => Method::Put,
            b"DELETE" => Method::Delete,
            b"CONNECT" => Method::Connect,
            b"OPTIONS" => Method::Options,
            b"TRACE" => Method::Trace,
            _ => return None,
        })
    }

    /// True for methods the file/virtspace filters will actually serve a body for.
    pub fn allows_file_response(self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        })
    }
}

#[cfg(test)]
mod test {
    use super::Method;

    #[test]
    fn from_bytes_recognizes_known_methods() {
        assert_eq!(Some(Method::Get), Method::from_bytes(b"GET"));
        assert_eq!(Some(Method::Head), Method::from_bytes(b"HEAD"));
        assert_eq!(Some(Method::Post), Method::from_bytes(b"POST"));
    }

    #[test]
    fn from_bytes_rejects_unknown_or_lowercase() {
        assert_eq!(None, Method::from_bytes(b"get"));
        assert_eq!(None, Method::from_bytes(b"PATCH"));
        assert_eq!(None, Method::from_bytes(b""));
    }

    #[test]
    fn only_get_and_head_serve_files() {
        assert!(Method::Get.allows_file_response());
        assert!(Method::Head.allows_file_response());
        assert!(!Method::Post.allows_file_response());
    }
}
