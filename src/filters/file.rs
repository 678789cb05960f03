//! Serves a file from the document root. Opens, stats, and reads are all
//! offloaded to the blocking-syscall pool (see `crate::offload`); this
//! filter only ever touches already-completed results, handed to it by the
//! worker's offload-completion dispatch before it re-enters the engine.

use wayside_parser::Status;

use crate::conn::{ConnState, DataSource, FileStep, OffloadKind, Span};
use crate::engine::{Filter, FilterCtx, FilterResult};
use crate::offload::OffloadRequest;

#[derive(Debug)]
pub struct File;

impl Filter for File {
    fn name(&self) -> &'static str {
        "file"
    }

    fn open(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
        if conn.req.is_directory_request {
            return FilterResult::Skip;
        }
        let method = match conn.req.method {
            Some(m) => m,
            None => return FilterResult::Skip,
        };
        if !method.allows_file_response() {
            conn.resp.set_error(Status::MethodNotAllowed);
            return FilterResult::Err;
        }

        let resolved = conn.req.resolved_path.clone().unwrap_or_default();
        let path = std::path::Path::new(&ctx.config.fs.www).join(resolved.trim_start_matches('/'));

        conn.offload = Some(OffloadKind::FileOpen);
        ctx.offload.submit(
            OffloadRequest::OpenAndStat { token: conn.token, path },
            ctx.complete_tx.clone(),
            ctx.waker.clone(),
        );
        FilterResult::Async
    }

    fn process(&self, conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
        match conn.file.step {
            FileStep::Open | FileStep::Stat => {
                // The OpenAndStat completion wasn't applied; the worker is
                // expected to have set step to Read and populated
                // `conn.file` before re-entering the engine. A `None`
                // file handle here means the open actually failed.
                if conn.file.file.is_none() {
                    let status = match conn.file.open_error {
                        Some(std::io::ErrorKind::NotFound) => Status::NotFound,
                        _ => Status::InternalServerError,
                    };
                    conn.resp.set_error(status);
                    return FilterResult::Err;
                }
                if conn.file.is_dir {
                    let host = conn
                        .req
                        .host
                        .map(|r| String::from_utf8_lossy(r.as_bytes(&conn.recv_buf[..conn.recv_filled])).into_owned())
                        .unwrap_or_default();
                    let path = conn.req.resolved_path.as_deref().unwrap_or("/");
                    conn.resp.location = Some(format!("http://{host}{path}/"));
                    conn.resp.set_error(Status::MovedPermanently);
                    return FilterResult::Err;
                }
                conn.file.step = FileStep::Read;
                finish_headers(conn, ctx);
                if conn.req.method == Some(wayside_parser::Method::Head) || conn.file.remaining == 0 {
                    conn.engine.output = DataSource::Empty;
                    return FilterResult::Done;
                }
                request_chunk(conn, ctx)
            }
            FileStep::Read => {
                if !conn.file.buf.is_empty() {
                    let len = conn.file.buf.len();
                    conn.engine.output = DataSource::File(Span::new(0, len));
                    return if conn.file.remaining == 0 {
                        FilterResult::Done
                    } else {
                        FilterResult::Fwd
                    };
                }
                if conn.file.remaining == 0 {
                    conn.engine.output = DataSource::Empty;
                    return FilterResult::Done;
                }
                request_chunk(conn, ctx)
            }
        }
    }

    fn close(&self, conn: &mut ConnState) {
        conn.file.file = None;
    }
}

fn finish_headers(conn: &mut ConnState, ctx: &FilterCtx<'_>) {
    if let Some(mtime) = conn.file.mtime {
        let formatted = crate::http_date::format_http_date(mtime);
        if let Some(ims) = conn.req.if_modified_since {
            let buf = &conn.recv_buf[..conn.recv_filled];
            if ims.as_bytes(buf) == formatted.as_bytes() {
                conn.resp.status = Status::NotModified;
                conn.resp.content_length = Some(0);
                conn.file.remaining = 0;
            }
        }
        conn.resp.last_modified = Some(formatted);
    }
    if conn.resp.content_length.is_none() {
        conn.resp.content_length = Some(conn.file.remaining);
    }
    if conn.resp.content_type.is_none() {
        let resolved = conn.req.resolved_path.as_deref().unwrap_or("");
        conn.resp.content_type = Some(ctx.config.content_types.lookup(resolved));
    }
}

fn request_chunk(conn: &mut ConnState, ctx: &FilterCtx<'_>) -> FilterResult {
    let file = match conn.file.file.take() {
        Some(f) => f,
        None => {
            conn.resp.set_error(Status::InternalServerError);
            return FilterResult::Err;
        }
    };
    let max_len = (ctx.config.fs.file_buf_size as u64).min(conn.file.remaining) as usize;
    conn.offload = Some(OffloadKind::FileRead);
    ctx.offload.submit(
        OffloadRequest::ReadChunk {
            token: conn.token,
            file,
            max_len,
        },
        ctx.complete_tx.clone(),
        ctx.waker.clone(),
    );
    FilterResult::Async
}
