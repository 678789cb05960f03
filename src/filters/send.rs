//! Writes the composed response headers, then the current body chunk, to
//! the socket, non-blocking, tracking partial writes across calls.

use std::io::{self, Write};

use crate::conn::{ConnState, DataSource};
use crate::engine::{Filter, FilterCtx, FilterResult, TRANSFER_FILTER_INDEX};

#[derive(Debug)]
pub struct Send;

impl Filter for Send {
    fn name(&self) -> &'static str {
        "send"
    }

    fn process(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
        if !conn.send_init {
            let _ = conn.stream.set_nodelay(ctx.config.send.tcp_nodelay);
            conn.send_init = true;
        }

        while conn.send_header_pos < conn.resp_buf.len() {
            match conn.stream.write(&conn.resp_buf[conn.send_header_pos..]) {
                Ok(0) => return FilterResult::Fin,
                Ok(n) => {
                    conn.send_header_pos += n;
                    conn.bytes_tx += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return FilterResult::Async,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("connection {}: send error writing headers: {e}", conn.id);
                    return FilterResult::Fin;
                }
            }
        }

        let body_len = conn.engine.input.len();
        while conn.send_body_pos < body_len {
            let write_result = match conn.engine.input {
                DataSource::Empty => break,
                DataSource::Recv(s) => conn.stream.write(&conn.recv_buf[s.start + conn.send_body_pos..s.start + s.len]),
                DataSource::Static(s) => conn.stream.write(&s.as_bytes()[conn.send_body_pos..]),
                DataSource::File(s) => conn.stream.write(&conn.file.buf[s.start + conn.send_body_pos..s.start + s.len]),
                DataSource::AutoIndex(s) => {
                    conn.stream.write(&conn.autoindex_buf[s.start + conn.send_body_pos..s.start + s.len])
                }
                DataSource::AccessLog(s) => {
                    conn.stream.write(&conn.acclog_buf[s.start + conn.send_body_pos..s.start + s.len])
                }
            };
            match write_result {
                Ok(0) => return FilterResult::Fin,
                Ok(n) => {
                    conn.send_body_pos += n;
                    conn.bytes_tx += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return FilterResult::Async,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("connection {}: send error writing body: {e}", conn.id);
                    return FilterResult::Fin;
                }
            }
        }

        conn.send_body_pos = 0;
        if conn.engine.done[TRANSFER_FILTER_INDEX] {
            FilterResult::Done
        } else {
            FilterResult::Back
        }
    }
}
