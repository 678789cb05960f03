//! Composes the status line and header block into `resp_buf`. Runs once
//! per request (on the first chunk); later chunks of a streamed body pass
//! straight through.

use std::fmt::Write as _;

use crate::conn::ConnState;
use crate::engine::{Filter, FilterCtx, FilterResult, TRANSFER_FILTER_INDEX};

#[derive(Debug)]
pub struct Response;

impl Filter for Response {
    fn name(&self) -> &'static str {
        "response"
    }

    fn process(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
        if !conn.resp.headers_written {
            build_headers(conn, ctx);
            conn.resp.headers_written = true;
        }

        conn.engine.output = conn.engine.input;
        if conn.engine.done[TRANSFER_FILTER_INDEX] {
            FilterResult::Done
        } else {
            FilterResult::Fwd
        }
    }
}

fn build_headers(conn: &mut ConnState, ctx: &FilterCtx<'_>) {
    let status = conn.resp.status;
    let version = conn.req.version.unwrap_or(wayside_parser::Version::Http11);
    let keepalive = conn.ka && conn.resp.content_length.is_some();
    conn.resp.connection_keepalive = keepalive;
    if conn.resp.content_length.is_none() {
        conn.ka = false;
    }

    let buf = &mut conn.resp_buf;
    buf.clear();
    let mut head = String::with_capacity(256);
    let _ = write!(head, "{version} {status} {}\r\n", status.reason_phrase());
    let _ = write!(head, "Date: {}\r\n", ctx.date);
    let _ = write!(head, "Server: {}\r\n", ctx.config.response.server_name);
    if let Some(ct) = conn.resp.content_type {
        let _ = write!(head, "Content-Type: {ct}\r\n");
    }
    if let Some(len) = conn.resp.content_length {
        let _ = write!(head, "Content-Length: {len}\r\n");
    }
    if let Some(lm) = &conn.resp.last_modified {
        let _ = write!(head, "Last-Modified: {lm}\r\n");
    }
    if let Some(loc) = &conn.resp.location {
        let _ = write!(head, "Location: {loc}\r\n");
    }
    let _ = write!(head, "Connection: {}\r\n\r\n", if keepalive { "keep-alive" } else { "close" });

    buf.extend_from_slice(head.as_bytes());
}
