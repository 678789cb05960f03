//! The filter pipeline: a fixed, ordered chain of request-processing
//! stages that hand data forward and backward until a response has been
//! fully sent.
//!
//! Each filter is a [`Filter`] trait object; [`FilterEngine`] drives the
//! chain exactly like the reference server's `ffchain`: a stage returns one
//! of a small set of verdicts ([`FilterResult`]) telling the engine whether
//! to move forward, step back to pull more input, suspend until an
//! offloaded operation or socket event completes, or divert straight to
//! error handling.

use std::sync::Arc;

use crossbeam_channel::Sender;
use mio::Waker;

use crate::config::Config;
use crate::conn::{ConnState, NUM_FILTERS};
use crate::offload::{OffloadHandle, OffloadResult};

/// Index of the Error filter in the fixed pipeline; jumped to directly
/// whenever a filter reports [`FilterResult::Err`].
pub const ERROR_FILTER_INDEX: usize = 6;
/// Index of the Transfer filter; Send and Response consult
/// `conn.engine.done[TRANSFER_FILTER_INDEX]` to know whether more body
/// chunks are still coming.
pub const TRANSFER_FILTER_INDEX: usize = 7;
/// Index of the File filter; Transfer consults this to know whether to
/// pull another chunk or declare the body finished.
pub const FILE_FILTER_INDEX: usize = 5;

/// What a filter's `open`/`process` step wants the engine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// This stage is completely finished for the current request; advance
    /// and never call it again until the next request.
    Done,
    /// This stage produced output and wants to be re-entered for more once
    /// downstream has consumed it (streaming).
    Fwd,
    /// This stage needs more input than it has; step back to the previous
    /// filter.
    Back,
    /// Suspended on an offloaded syscall or on socket readiness; the engine
    /// stops driving this connection until woken.
    Async,
    /// This stage doesn't apply to the current request; pass `input`
    /// through unchanged.
    Skip,
    /// Something went wrong; divert straight to the Error filter.
    Err,
    /// The whole request/response cycle is finished.
    Fin,
}

/// Shared, read-only context every filter needs: configuration, a way to
/// offload blocking work, and the reactor's waker to arm for completions.
pub struct FilterCtx<'a> {
    /// Effective worker configuration.
    pub config: &'a Config,
    /// Handle to submit blocking work to the offload pool.
    pub offload: &'a OffloadHandle,
    /// Where this worker's offload completions are delivered; handed to
    /// every submission so results route back without a dispatch table.
    pub complete_tx: &'a Sender<OffloadResult>,
    /// Waker tied to this worker's `Poll`, handed to offloaded operations
    /// so their completion can interrupt a blocking `poll()`.
    pub waker: &'a Arc<Waker>,
    /// Cached RFC-1123 date string for `Date`/`Last-Modified` headers.
    pub date: &'a str,
    /// Milliseconds since the worker's timer wheel started, for the access
    /// log's elapsed-time field.
    pub now_ms: u64,
}

/// One pipeline stage.
pub trait Filter: std::fmt::Debug + Send + Sync {
    /// Name used only for logging.
    fn name(&self) -> &'static str;

    /// Called once per request, the first time the engine reaches this
    /// filter. The default does no setup and forwards.
    fn open(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
        let _ = (conn, ctx);
        FilterResult::Fwd
    }

    /// Called every time the engine is at this filter's index, after `open`
    /// has run.
    fn process(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult;

    /// Called once when the connection is torn down (not once per
    /// request); lets a filter release resources it owns directly (the
    /// File filter's open handle, notably).
    fn close(&self, conn: &mut ConnState) {
        let _ = conn;
    }
}

/// What the caller (the worker's reactor loop) should do after a call to
/// [`FilterEngine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOutcome {
    /// Waiting on a socket readiness event or an offload completion;
    /// nothing more to do right now.
    Suspended,
    /// The request finished and the connection resets for the next
    /// pipelined/keep-alive request. The caller should call `run` again
    /// immediately in case more bytes are already buffered.
    KeepAliveReset,
    /// The connection should be closed.
    Close,
}

/// Drives the fixed filter chain for one connection.
pub struct FilterEngine {
    filters: [Box<dyn Filter>; NUM_FILTERS],
}

impl FilterEngine {
    /// Builds an engine from the fixed, ordered set of filters.
    pub fn new(filters: [Box<dyn Filter>; NUM_FILTERS]) -> FilterEngine {
        FilterEngine { filters }
    }

    /// Runs the chain until it needs to suspend or the request/connection
    /// is finished.
    pub fn run(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> EngineOutcome {
        loop {
            let idx = conn.engine.index;
            let filter = &self.filters[idx];

            if !conn.engine.opened[idx] {
                let opened_result = filter.open(conn, ctx);
                conn.engine.opened[idx] = true;
                match opened_result {
                    FilterResult::Async => return EngineOutcome::Suspended,
                    FilterResult::Err => {
                        jump_to_error(conn);
                        continue;
                    }
                    FilterResult::Skip => {
                        conn.engine.done[idx] = true;
                        conn.engine.output = conn.engine.input;
                        match advance_forward(conn) {
                            Some(()) => continue,
                            None => return finish(conn),
                        }
                    }
                    _ => {}
                }
            }

            match filter.process(conn, ctx) {
                FilterResult::Done => {
                    conn.engine.done[idx] = true;
                    conn.engine.input = std::mem::take(&mut conn.engine.output);
                    match advance_forward(conn) {
                        Some(()) => {}
                        None => return finish(conn),
                    }
                }
                FilterResult::Fwd => {
                    conn.engine.input = std::mem::take(&mut conn.engine.output);
                    match advance_forward(conn) {
                        Some(()) => {}
                        None => return finish(conn),
                    }
                }
                FilterResult::Back => {
                    if advance_backward(conn).is_none() {
                        return EngineOutcome::Suspended;
                    }
                }
                FilterResult::Async => return EngineOutcome::Suspended,
                FilterResult::Skip => {
                    conn.engine.done[idx] = true;
                    conn.engine.output = conn.engine.input;
                    match advance_forward(conn) {
                        Some(()) => {}
                        None => return finish(conn),
                    }
                }
                FilterResult::Err => jump_to_error(conn),
                FilterResult::Fin => return finish(conn),
            }
        }
    }

    /// Invoked once at connection teardown, forward order, to let every
    /// filter release any resources it holds directly.
    pub fn close_all(&self, conn: &mut ConnState) {
        for filter in &self.filters {
            filter.close(conn);
        }
    }
}

fn jump_to_error(conn: &mut ConnState) {
    conn.engine.back = false;
    // Whatever reached this jump, File will never produce another chunk for
    // this request; without this, Transfer/Response/Send would wait forever
    // on a filter that's no longer going to run.
    conn.engine.done[FILE_FILTER_INDEX] = true;
    conn.engine.index = ERROR_FILTER_INDEX;
}

fn advance_forward(conn: &mut ConnState) -> Option<()> {
    conn.engine.back = false;
    if conn.engine.index + 1 >= NUM_FILTERS {
        None
    } else {
        conn.engine.index += 1;
        Some(())
    }
}

fn advance_backward(conn: &mut ConnState) -> Option<()> {
    if conn.engine.index == 0 {
        None
    } else {
        conn.engine.back = true;
        conn.engine.index -= 1;
        Some(())
    }
}

fn finish(conn: &mut ConnState) -> EngineOutcome {
    if conn.ka {
        conn.reset_for_keep_alive();
        EngineOutcome::KeepAliveReset
    } else {
        EngineOutcome::Close
    }
}
