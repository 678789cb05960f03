//! Renders a plain-text body for any response a prior filter marked as an
//! error. Reached either by falling through the chain normally (in which
//! case it's a no-op) or by a direct jump from anywhere in the chain.

use wayside_parser::Status;

use crate::conn::{ConnState, DataSource};
use crate::engine::{Filter, FilterCtx, FilterResult};

#[derive(Debug)]
pub struct Error;

impl Filter for Error {
    fn name(&self) -> &'static str {
        "error"
    }

    fn process(&self, conn: &mut ConnState, _ctx: &FilterCtx<'_>) -> FilterResult {
        if !conn.resp.err {
            conn.engine.output = conn.engine.input;
            return FilterResult::Skip;
        }

        if matches!(conn.resp.status, Status::BadRequest | Status::ContentTooLarge) {
            conn.ka = false;
        }

        let body = conn.resp.status.reason_phrase();
        conn.resp.content_type = Some("text/plain");
        conn.resp.content_length = Some(body.len() as u64);
        conn.resp.err = false;
        conn.engine.output = DataSource::Static(body);
        FilterResult::Done
    }
}
