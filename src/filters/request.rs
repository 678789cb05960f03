//! Parses the request line and headers out of whatever Receive has
//! buffered so far, resolves keep-alive disposition, and normalizes the
//! request path.

use wayside_parser::h1::{parse_header_line, parse_request_line, HeaderParse};
use wayside_parser::{ByteRange, Status, Version};

use crate::conn::{ConnectionPref, ConnState, DataSource};
use crate::engine::{Filter, FilterCtx, FilterResult};

#[derive(Debug)]
pub struct Request;

fn header_name_is(buf: &[u8], range: ByteRange, name: &str) -> bool {
    range.as_bytes(buf).eq_ignore_ascii_case(name.as_bytes())
}

/// Percent-decodes `path`, rejecting `..` path-traversal segments and any
/// escape that doesn't resolve to two hex digits. Returns `None` on
/// malformed input.
fn normalize_path(raw: &[u8]) -> Option<String> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'%' => {
                let hi = *raw.get(i + 1)?;
                let lo = *raw.get(i + 2)?;
                let byte = (hex_val(hi)? << 4) | hex_val(lo)?;
                out.push(byte);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    let decoded = String::from_utf8(out).ok()?;
    if decoded.split('/').any(|seg| seg == "..") {
        return None;
    }
    Some(decoded)
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

impl Filter for Request {
    fn name(&self) -> &'static str {
        "request"
    }

    fn process(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
        let buf = &conn.recv_buf[..conn.recv_filled];

        if conn.req.version.is_none() {
            match parse_request_line(buf) {
                Ok(None) => {
                    return if conn.recv_filled >= ctx.config.receive.buf_size {
                        conn.resp.set_error(Status::ContentTooLarge);
                        FilterResult::Err
                    } else {
                        FilterResult::Back
                    };
                }
                Err(_) => {
                    conn.resp.set_error(Status::BadRequest);
                    return FilterResult::Err;
                }
                Ok(Some((line, next))) => {
                    conn.req.method = Some(line.method);
                    conn.req.target = line.target;
                    conn.req.version = Some(line.version);
                    conn.req.line = ByteRange::new(0, next.saturating_sub(2));
                    conn.req.parse_pos = next;
                    conn.req.start_time_msec = ctx.now_ms;

                    let target_bytes = line.target.as_bytes(buf);
                    if let Some(q) = target_bytes.iter().position(|&b| b == b'?') {
                        conn.req.path = ByteRange::new(
                            line.target.start as usize,
                            line.target.start as usize + q,
                        );
                        conn.req.query = Some(ByteRange::new(
                            line.target.start as usize + q + 1,
                            line.target.start as usize + target_bytes.len(),
                        ));
                    } else {
                        conn.req.path = line.target;
                        conn.req.query = None;
                    }
                }
            }
        }

        loop {
            match parse_header_line(buf, conn.req.parse_pos) {
                Ok(HeaderParse::Incomplete) => {
                    return if conn.recv_filled >= ctx.config.receive.buf_size {
                        conn.resp.set_error(Status::ContentTooLarge);
                        FilterResult::Err
                    } else {
                        FilterResult::Back
                    };
                }
                Err(_) => {
                    conn.resp.set_error(Status::BadRequest);
                    return FilterResult::Err;
                }
                Ok(HeaderParse::End { next }) => {
                    conn.req.consumed_to = next;
                    break;
                }
                Ok(HeaderParse::Header { header, next }) => {
                    if header_name_is(buf, header.name, "host") {
                        conn.req.host = Some(header.value);
                    } else if header_name_is(buf, header.name, "connection") {
                        let v = header.value.as_bytes(buf);
                        if v.eq_ignore_ascii_case(b"close") {
                            conn.req.connection = ConnectionPref::Close;
                        } else if v.eq_ignore_ascii_case(b"keep-alive") {
                            conn.req.connection = ConnectionPref::KeepAlive;
                        }
                    } else if header_name_is(buf, header.name, "if-modified-since") {
                        conn.req.if_modified_since = Some(header.value);
                    }
                    conn.req.parse_pos = next;
                }
            }
        }

        let version = conn.req.version.expect("version set above");
        if version.requires_host() && conn.req.host.is_none() {
            conn.resp.set_error(Status::BadRequest);
            return FilterResult::Err;
        }

        conn.ka = match conn.req.connection {
            ConnectionPref::KeepAlive => true,
            ConnectionPref::Close => false,
            ConnectionPref::Unspecified => version.default_keepalive(),
        };
        if conn.keep_alive_n + 1 >= ctx.config.max_keep_alive_reqs {
            conn.ka = false;
        }

        let path_bytes = conn.req.path.as_bytes(buf);
        match normalize_path(path_bytes) {
            Some(p) => conn.req.unescaped_path = Some(p),
            None => {
                conn.resp.set_error(Status::BadRequest);
                return FilterResult::Err;
            }
        }

        conn.engine.output = DataSource::Empty;
        FilterResult::Done
    }
}
