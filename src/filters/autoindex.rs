//! Renders a directory listing when a directory-style request has no
//! index file. The existence check and the listing itself are done
//! directly on the reactor thread rather than offloaded: both are cheap,
//! bounded metadata/readdir calls against a document root that's expected
//! to be a local filesystem, unlike the potentially large file reads the
//! File filter offloads.

use std::fmt::Write as _;

use wayside_parser::Status;

use crate::conn::{ConnState, DataSource, Span};
use crate::engine::{Filter, FilterCtx, FilterResult};

#[derive(Debug)]
pub struct Autoindex;

impl Filter for Autoindex {
    fn name(&self) -> &'static str {
        "autoindex"
    }

    fn process(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
        if !conn.req.is_directory_request {
            conn.engine.output = conn.engine.input;
            return FilterResult::Skip;
        }

        let resolved = conn.req.resolved_path.clone().unwrap_or_default();
        let full_index_path = std::path::Path::new(&ctx.config.fs.www).join(resolved.trim_start_matches('/'));
        if full_index_path.is_file() {
            conn.engine.output = conn.engine.input;
            return FilterResult::Skip;
        }

        if !ctx.config.fs.autoindex_enabled {
            conn.resp.set_error(Status::NotFound);
            return FilterResult::Err;
        }

        let dir_path = conn.req.unescaped_path.clone().unwrap_or_else(|| "/".to_string());
        let full_dir_path = std::path::Path::new(&ctx.config.fs.www).join(dir_path.trim_start_matches('/'));

        let mut names: Vec<String> = match std::fs::read_dir(&full_dir_path) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| {
                    let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    let name = e.file_name().to_string_lossy().into_owned();
                    if is_dir {
                        format!("{name}/")
                    } else {
                        name
                    }
                })
                .collect(),
            Err(_) => {
                conn.resp.set_error(Status::NotFound);
                return FilterResult::Err;
            }
        };
        names.sort();

        let mut html = String::new();
        let _ = write!(html, "<html><head><title>Index of {dir_path}</title></head><body>");
        let _ = write!(html, "<h1>Index of {dir_path}</h1><ul>");
        let _ = write!(html, "<li><a href=\"../\">../</a></li>");
        for name in &names {
            let _ = write!(html, "<li><a href=\"{name}\">{name}</a></li>");
        }
        html.push_str("</ul></body></html>");

        conn.autoindex_buf = html.into_bytes();
        conn.resp.content_type = Some("text/html");
        conn.resp.content_length = Some(conn.autoindex_buf.len() as u64);
        conn.engine.output = DataSource::AutoIndex(Span::new(0, conn.autoindex_buf.len()));
        FilterResult::Done
    }
}
