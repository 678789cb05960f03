//! Fills `recv_buf` from the socket, non-blocking. Always the first filter.

use std::io::{self, Read};

use crate::conn::{ConnState, DataSource, Span};
use crate::engine::{Filter, FilterCtx, FilterResult};

#[derive(Debug)]
pub struct Receive;

impl Filter for Receive {
    fn name(&self) -> &'static str {
        "receive"
    }

    fn process(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
        if conn.recv_buf.len() < ctx.config.receive.buf_size {
            conn.recv_buf.resize(ctx.config.receive.buf_size, 0);
        }
        if conn.recv_filled >= conn.recv_buf.len() {
            // buffer already full of unconsumed bytes; let Request decide
            // whether that's "too large" before asking for more.
            conn.engine.output = DataSource::Recv(Span::new(0, conn.recv_filled));
            return FilterResult::Fwd;
        }

        match conn.stream.read(&mut conn.recv_buf[conn.recv_filled..]) {
            Ok(0) => {
                if conn.recv_filled == 0 {
                    FilterResult::Fin
                } else {
                    // peer closed mid-request; let Request see what we have
                    // and reject it rather than hanging forever.
                    conn.engine.output = DataSource::Recv(Span::new(0, conn.recv_filled));
                    FilterResult::Fwd
                }
            }
            Ok(n) => {
                conn.recv_filled += n;
                conn.bytes_rx += n as u64;
                conn.recv_forwarded = conn.recv_filled;
                conn.engine.output = DataSource::Recv(Span::new(0, conn.recv_filled));
                FilterResult::Fwd
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if conn.recv_filled > conn.recv_forwarded {
                    // Bytes came in since the last time we forwarded (e.g. a
                    // second pipelined request already sitting in the
                    // buffer); let Request look at them before we suspend.
                    conn.recv_forwarded = conn.recv_filled;
                    conn.engine.output = DataSource::Recv(Span::new(0, conn.recv_filled));
                    FilterResult::Fwd
                } else {
                    // Nothing new since last time: Request stepped back
                    // wanting more than we have. Arm the receive timeout via
                    // `EngineOutcome::Suspended` and wait for the socket.
                    FilterResult::Async
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => FilterResult::Back,
            Err(e) => {
                log::debug!("connection {}: receive error: {e}", conn.id);
                FilterResult::Fin
            }
        }
    }
}
