//! Dispatches to an in-process virtual-document handler when `(path,
//! method)` matches one registered on the worker's [`Config`].

use crate::conn::{ConnState, DataSource};
use crate::engine::{Filter, FilterCtx, FilterResult};

#[derive(Debug)]
pub struct VirtSpace;

impl Filter for VirtSpace {
    fn name(&self) -> &'static str {
        "virtspace"
    }

    fn process(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
        if conn.req.is_directory_request {
            conn.engine.output = conn.engine.input;
            return FilterResult::Skip;
        }

        let buf = &conn.recv_buf[..conn.recv_filled];
        let path_bytes = conn.req.path.as_bytes(buf).to_vec();
        let method = match conn.req.method {
            Some(m) => m,
            None => {
                conn.engine.output = conn.engine.input;
                return FilterResult::Skip;
            }
        };
        let method_str = method.to_string();

        let handler = match ctx.config.virtspace.lookup(&path_bytes, method_str.as_bytes()) {
            Some(h) => h,
            None => {
                conn.engine.output = conn.engine.input;
                return FilterResult::Skip;
            }
        };

        handler(conn);
        if conn.resp.content_length.is_none() {
            conn.resp.content_length = Some(0);
        }
        conn.engine.output = DataSource::Empty;
        FilterResult::Done
    }
}
