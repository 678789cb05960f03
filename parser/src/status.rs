//! HTTP status codes. [RFC 9110 Section 15](https://www.rfc-editor.org/rfc/rfc9110#section-15).

use std::fmt::Display;

/// Status code, restricted to the set the response filter is ever asked to emit.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 15.3.1
    Ok = 200,
    /// 15.3.7
    PartialContent = 206,
    /// 15.4.2
    MovedPermanently = 301,
    /// 15.4.3
    Found = 302,
    /// 15.4.5
    NotModified = 304,
    /// 15.5.1
    BadRequest = 400,
    /// 15.5.4
    Forbidden = 403,
    /// 15.5.5
    NotFound = 404,
    /// 15.5.6
    MethodNotAllowed = 405,
    /// 15.5.14
    ContentTooLarge = 413,
    /// 15.5.16
    UnsupportedMediaType = 415,
    /// 15.5.17
    RangeNotSatisfiable = 416,
    /// 15.6.1
    InternalServerError = 500,
    /// 15.6.2
    NotImplemented = 501,
    /// 15.6.3
    BadGateway = 502,
    /// 15.6.5
    GatewayTimeout = 504,
}

impl Status {
    /// Reason phrase as sent on the status line and, for error responses,
    /// reused verbatim as the `text/plain` error body.
    pub fn reason_phrase(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::PartialContent => "Partial Content",
            Status::MovedPermanently => "Moved Permanently",
            Status::Found => "Found",
            Status::NotModified => "Not Modified",
            Status::BadRequest => "Bad Request",
            Status::Forbidden => "Forbidden",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::ContentTooLarge => "Content Too Large",
            Status::UnsupportedMediaType => "Unsupported Media Type",
            Status::RangeNotSatisfiable => "Range Not Satisfiable",
            Status::InternalServerError => "Internal Server Error",
            Status::NotImplemented => "Not Implemented",
            Status::BadGateway => "Bad Gateway",
            Status::GatewayTimeout => "Gateway Timeout",
        }
    }

    /// True for status codes that never carry a body (no entity).
    pub fn is_error(self) -> bool {
        (self as u16) >= 400
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}", *self as u16))
    }
}

#[cfg(test)]
mod test {
    use super::Status;

    #[test]
    fn reason_phrase_matches_status_line_conventions() {
        assert_eq!("OK", Status::Ok.reason_phrase());
        assert_eq!("Not Found", Status::NotFound.reason_phrase());
    }

    #[test]
    fn display_prints_numeric_code() {
        assert_eq!("404", Status::NotFound.to_string());
        assert_eq!("200", Status::Ok.to_string());
    }

    #[test]
    fn is_error_follows_the_400_boundary() {
        assert!(!Status::Ok.is_error());
        assert!(!Status::MovedPermanently.is_error());
        assert!(Status::BadRequest.is_error());
    }
}
