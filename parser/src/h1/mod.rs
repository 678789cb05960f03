// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP/1.1 request-line and header-line tokenizing.
//!
//! These functions never block and never allocate: each returns as soon as
//! it can tell whether it has a complete line, a malformed one, or needs
//! more bytes from the socket. The caller (the request filter) is
//! responsible for re-invoking with a longer buffer once more data arrives.

use core::fmt::Display;

use crate::method::Method;
use crate::raw_request::ByteRange;
use crate::version::Version;

/// Represents possible failures while parsing a request line or header line.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Invalid byte in method.
    Method,
    /// Invalid byte in target.
    Target,
    /// Invalid or unsupported HTTP version.
    Version,
    /// Header line has no `:` separator.
    HeaderName,
    /// Invalid byte in header value.
    HeaderValue,
}

impl ParseError {
    fn description_str(&self) -> &'static str {
        match *self {
            ParseError::Method => "invalid token in method",
            ParseError::Target => "invalid token in target",
            ParseError::Version => "invalid or unsupported HTTP version",
            ParseError::HeaderName => "header line missing ':' separator",
            ParseError::HeaderValue => "invalid byte in header value",
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description_str())
    }
}

impl std::error::Error for ParseError {}

/// The parsed request line: method, target (request path + optional query
/// string, not yet unescaped), and version.
#[derive(Debug, Clone, Copy)]
pub struct RequestLine {
    /// Request method.
    pub method: Method,
    /// Raw request-target range, as sent on the wire (percent-escapes intact).
    pub target: ByteRange,
    /// HTTP version.
    pub version: Version,
}

/// One parsed header: `name` excludes the trailing `:`, `value` has leading
/// whitespace stripped (trailing whitespace is left for the caller, since
/// callers compare values verbatim against `Last-Modified`-style strings
/// that never carry it in practice).
#[derive(Debug, Clone, Copy)]
pub struct HeaderLine {
    /// Header name, e.g. `Host`.
    pub name: ByteRange,
    /// Header value.
    pub value: ByteRange,
}

/// Outcome of attempting to parse one header line.
#[derive(Debug)]
pub enum HeaderParse {
    /// Not enough bytes buffered yet to know where this line ends.
    Incomplete,
    /// The blank line terminating the header block. `next` is the offset of
    /// the first body byte (or of the next pipelined request).
    End {
        /// Offset immediately after the terminator.
        next: usize,
    },
    /// A parsed header. `next` is the offset of the following line.
    Header {
        /// The header.
        header: HeaderLine,
        /// Offset immediately after this line's terminator.
        next: usize,
    },
}

/// Scans for a strict `\r\n`-terminated line starting at `start`.
/// Returns `(content_end, next)`: bytes in `start..content_end` are the
/// line's content, and `next` is the offset right after the terminator.
fn find_line(buf: &[u8], start: usize) -> Option<(usize, usize)> {
    let mut i = start;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Some((i, i + 2));
        }
        i += 1;
    }
    None
}

/// If the header block's blank terminator begins exactly at `start`,
/// returns the offset just past it. A bare `\n` is tolerated here (and only
/// here) even though every other line requires `\r\n`.
fn terminator_at(buf: &[u8], start: usize) -> Option<usize> {
    match buf.get(start) {
        Some(b'\n') => Some(start + 1),
        Some(b'\r') if buf.get(start + 1) == Some(&b'\n') => Some(start + 2),
        _ => None,
    }
}

/// Parses the request line (`METHOD SP target SP HTTP-version CRLF`) from
/// the start of `buf`. Returns `Ok(None)` if the buffer doesn't yet contain
/// a full line.
pub fn parse_request_line(buf: &[u8]) -> Result<Option<(RequestLine, usize)>, ParseError> {
    let (content_end, next) = match find_line(buf, 0) {
        Some(v) => v,
        None => return Ok(None),
    };
    let line = &buf[..content_end];

    let sp1 = line.iter().position(|&b| b == b' ').ok_or(ParseError::Method)?;
    let method = Method::from_bytes(&line[..sp1]).ok_or(ParseError::Method)?;

    let rest = &line[sp1 + 1..];
    let sp2 = rest.iter().position(|&b| b == b' ').ok_or(ParseError::Target)?;
    if sp2 == 0 {
        return Err(ParseError::Target);
    }
    let target = ByteRange::new(sp1 + 1, sp1 + 1 + sp2);

    let version_bytes = &rest[sp2 + 1..];
    let version = Version::parse(version_bytes).ok_or(ParseError::Version)?;

    Ok(Some((
        RequestLine {
            method,
            target,
            version,
        },
        next,
    )))
}

/// Parses one header line (or recognizes the terminating blank line) at
/// offset `start`.
pub fn parse_header_line(buf: &[u8], start: usize) -> Result<HeaderParse, ParseError> {
    if let Some(next) = terminator_at(buf, start) {
        return Ok(HeaderParse::End { next });
    }

    let (content_end, next) = match find_line(buf, start) {
        Some(v) => v,
        None => return Ok(HeaderParse::Incomplete),
    };

    let line = &buf[start..content_end];
    let colon = line.iter().position(|&b| b == b':').ok_or(ParseError::HeaderName)?;
    if colon == 0 {
        return Err(ParseError::HeaderName);
    }
    let name = ByteRange::new(start, start + colon);

    let mut value_start = start + colon + 1;
    while value_start < content_end && (buf[value_start] == b' ' || buf[value_start] == b'\t') {
        value_start += 1;
    }
    if buf[value_start..content_end].iter().any(|&b| b == b'\0') {
        return Err(ParseError::HeaderValue);
    }
    let value = ByteRange::new(value_start, content_end);

    Ok(HeaderParse::Header {
        header: HeaderLine { name, value },
        next,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_request_line_reads_method_target_version() {
        let buf = b"GET /hello.txt HTTP/1.1\r\nHost: h\r\n\r\n";
        let (line, next) = parse_request_line(buf).unwrap().unwrap();
        assert_eq!(Method::Get, line.method);
        assert_eq!(b"/hello.txt", line.target.as_bytes(buf));
        assert_eq!(Version::Http11, line.version);
        assert_eq!(b"Host: h\r\n\r\n", &buf[next..]);
    }

    #[test]
    fn parse_request_line_incomplete_without_crlf() {
        let buf = b"GET /hello.txt HTTP/1.1";
        assert!(parse_request_line(buf).unwrap().is_none());
    }

    #[test]
    fn parse_request_line_rejects_bad_method() {
        let buf = b"get / HTTP/1.1\r\n";
        assert_eq!(Err(ParseError::Method), parse_request_line(buf));
    }

    #[test]
    fn parse_request_line_rejects_bad_version() {
        let buf = b"GET / HTTP/2\r\n";
        assert_eq!(Err(ParseError::Version), parse_request_line(buf));
    }

    #[test]
    fn parse_header_line_reads_name_and_value_trimming_leading_space() {
        let buf = b"Host:   example.com\r\n\r\n";
        match parse_header_line(buf, 0).unwrap() {
            HeaderParse::Header { header, next } => {
                assert_eq!(b"Host", header.name.as_bytes(buf));
                assert_eq!(b"example.com", header.value.as_bytes(buf));
                assert_eq!(b"\r\n", &buf[next..]);
            }
            other => panic!("expected Header, got {other:?}"),
        }
    }

    #[test]
    fn parse_header_line_recognizes_crlf_terminator() {
        let buf = b"\r\nbody";
        match parse_header_line(buf, 0).unwrap() {
            HeaderParse::End { next } => assert_eq!(2, next),
            other => panic!("expected End, got {other:?}"),
        }
    }

    #[test]
    fn parse_header_line_tolerates_bare_lf_terminator() {
        let buf = b"\nbody";
        match parse_header_line(buf, 0).unwrap() {
            HeaderParse::End { next } => assert_eq!(1, next),
            other => panic!("expected End, got {other:?}"),
        }
    }

    #[test]
    fn parse_header_line_requires_strict_crlf_for_non_terminal_lines() {
        let buf = b"Host: h\nX-Other: y\n";
        // no "\r\n" anywhere in the buffer -> Incomplete, since a bare LF
        // is only tolerated for the blank terminator, not an ordinary header line
        match parse_header_line(buf, 0).unwrap() {
            HeaderParse::Incomplete => {}
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn parse_header_line_incomplete_without_crlf() {
        let buf = b"Host: example.com";
        assert!(matches!(
            parse_header_line(buf, 0).unwrap(),
            HeaderParse::Incomplete
        ));
    }

    #[test]
    fn parse_header_line_rejects_missing_colon() {
        let buf = b"not-a-header\r\n";
        assert_eq!(Err(ParseError::HeaderName), parse_header_line(buf, 0));
    }
}
