//! Relays body chunks from whichever filter produced them (File,
//! Autoindex, VirtSpace, Error) down toward Response/Send, and pulls
//! another chunk from File when Send has drained the current one and more
//! is still coming.

use crate::conn::ConnState;
use crate::engine::{Filter, FilterCtx, FilterResult, FILE_FILTER_INDEX};

#[derive(Debug)]
pub struct Transfer;

impl Filter for Transfer {
    fn name(&self) -> &'static str {
        "transfer"
    }

    fn process(&self, conn: &mut ConnState, _ctx: &FilterCtx<'_>) -> FilterResult {
        if !conn.engine.input.is_empty() {
            conn.engine.output = conn.engine.input;
            return if conn.engine.done[FILE_FILTER_INDEX] {
                FilterResult::Done
            } else {
                FilterResult::Fwd
            };
        }

        if conn.engine.done[FILE_FILTER_INDEX] {
            conn.engine.output = conn.engine.input;
            FilterResult::Done
        } else {
            FilterResult::Back
        }
    }
}
