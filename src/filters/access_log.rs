//! Formats and offloads one combined-log-format-style line per completed
//! request. The write itself goes through the offload pool since a slow
//! log destination shouldn't stall the reactor.

use std::fmt::Write as _;

use crate::conn::{ConnState, OffloadKind};
use crate::engine::{Filter, FilterCtx, FilterResult};
use crate::offload::OffloadRequest;

#[derive(Debug)]
pub struct AccessLog;

impl Filter for AccessLog {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn process(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
        if !conn.acclog_buf.is_empty() {
            // already formatted and submitted; a non-empty buffer here
            // means the worker's completion dispatch just cleared
            // `conn.offload` and re-entered us after the write landed
            return FilterResult::Fin;
        }

        let buf = &conn.recv_buf[..conn.recv_filled];
        let method = conn.req.method.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string());
        let path = conn.req.path.as_bytes(buf);
        let elapsed = ctx.now_ms.saturating_sub(conn.req.start_time_msec);

        let mut line = String::with_capacity(128);
        let _ = write!(
            line,
            "{}\t{} \"{} {}\" {} {} {} {}ms\n",
            conn.peer.ip(),
            ctx.date,
            method,
            String::from_utf8_lossy(path),
            conn.resp.status,
            conn.bytes_rx,
            conn.bytes_tx,
            elapsed
        );

        conn.acclog_buf = line.into_bytes();
        conn.offload = Some(OffloadKind::AccessLogWrite);
        ctx.offload.submit(
            OffloadRequest::WriteAccessLog {
                token: conn.token,
                line: conn.acclog_buf.clone(),
            },
            ctx.complete_tx.clone(),
            ctx.waker.clone(),
        );
        FilterResult::Async
    }
}
