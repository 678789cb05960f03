//! Rewrites a directory-style request (path ending in `/`) to the
//! configured index filename; marks the request so Autoindex and File know
//! it's a directory request. A request for an existing directory *without*
//! the trailing slash is still handed to the File filter as a plain path —
//! it's the File filter's stat step that notices the opened path is a
//! directory and redirects (see `filters::file`), the same way it notices
//! any other "not actually a regular file" condition.

use crate::conn::ConnState;
use crate::engine::{Filter, FilterCtx, FilterResult};

#[derive(Debug)]
pub struct Index;

impl Filter for Index {
    fn name(&self) -> &'static str {
        "index"
    }

    fn process(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
        let path = conn.req.unescaped_path.clone().unwrap_or_else(|| "/".to_string());
        if path.ends_with('/') {
            conn.req.is_directory_request = true;
            conn.req.resolved_path = Some(format!("{path}{}", ctx.config.fs.index_filename));
        } else {
            conn.req.resolved_path = Some(path);
        }
        FilterResult::Done
    }
}
