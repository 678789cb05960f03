//! Per-connection state: everything the filter pipeline reads and writes
//! for one client, from the raw request bytes through the composed
//! response.

use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::time::SystemTime;

use mio::net::TcpStream;
use mio::Token;

use wayside_parser::{ByteRange, Method, Status, Version};

/// Number of filters in the fixed pipeline (see `crate::engine`).
pub const NUM_FILTERS: usize = 11;

/// A `(start, len)` span into one of the connection's several owned
/// buffers. Unlike [`ByteRange`] (which is 16-bit and scoped to the request
/// buffer), spans here can point into the file-read buffer, the autoindex
/// HTML buffer, or the access-log buffer, none of which share the request
/// buffer's size constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    /// Start offset.
    pub start: usize,
    /// Length in bytes.
    pub len: usize,
}

impl Span {
    /// Builds a span from absolute `start..end` offsets.
    pub fn new(start: usize, end: usize) -> Span {
        Span {
            start,
            len: end - start,
        }
    }

    /// Resolves the span against `buf`.
    #[inline]
    pub fn as_bytes<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.start..self.start + self.len]
    }

    /// True if the span covers zero bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Identifies which of a connection's buffers the pipeline's current
/// `input`/`output` bytes currently live in. Filters hand data forward by
/// writing a new `DataSource`, not by copying bytes between buffers.
#[derive(Debug, Clone, Copy, Default)]
pub enum DataSource {
    /// No data staged.
    #[default]
    Empty,
    /// A span of `conn.recv_buf`.
    Recv(Span),
    /// A `'static` string, e.g. an error reason phrase.
    Static(&'static str),
    /// A span of `conn.file.buf`.
    File(Span),
    /// A span of `conn.autoindex_buf`.
    AutoIndex(Span),
    /// A span of `conn.acclog_buf`.
    AccessLog(Span),
}

impl DataSource {
    /// Number of bytes described by this source, without resolving it.
    pub fn len(&self) -> usize {
        match self {
            DataSource::Empty => 0,
            DataSource::Recv(s) | DataSource::File(s) | DataSource::AutoIndex(s) | DataSource::AccessLog(s) => s.len,
            DataSource::Static(s) => s.len(),
        }
    }

    /// True if this source describes zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether the `Connection` header forces a disposition, or is absent
/// (in which case the HTTP version decides).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPref {
    #[default]
    Unspecified,
    KeepAlive,
    Close,
}

/// Parsed request state: byte ranges into `conn.recv_buf`.
#[derive(Debug, Clone, Default)]
pub struct RequestState {
    /// Method.
    pub method: Option<Method>,
    /// Raw request-target (path + optional query string), percent-escaped.
    pub target: ByteRange,
    /// `target` split at `?`: the path portion only.
    pub path: ByteRange,
    /// `target` split at `?`: the query portion (excludes the `?`), if any.
    pub query: Option<ByteRange>,
    /// HTTP version.
    pub version: Option<Version>,
    /// `Host` header value, if present.
    pub host: Option<ByteRange>,
    /// `If-Modified-Since` header value, if present.
    pub if_modified_since: Option<ByteRange>,
    /// `Connection` header disposition.
    pub connection: ConnectionPref,
    /// The full request line (for the access log), as a span of `recv_buf`.
    pub line: ByteRange,
    /// Offset in `recv_buf` where header parsing should resume on the next
    /// `process()` call (keeps the parser from re-scanning completed lines).
    pub parse_pos: usize,
    /// Offset in `recv_buf` marking the end of this request (start of any
    /// pipelined residual, or of unread data).
    pub consumed_to: usize,
    /// Wall-clock start time in milliseconds, captured on first entry to
    /// the request filter, used for the access log's elapsed-time field.
    pub start_time_msec: u64,
    /// URL-unescaped, normalized path. Lives outside `recv_buf` because
    /// unescaping can only shrink percent-sequences, never reuse the
    /// original bytes in place without a scratch copy.
    pub unescaped_path: Option<String>,
    /// True once the Index filter has recognized this as a directory-style
    /// request (path ends in `/`).
    pub is_directory_request: bool,
    /// Filesystem path the File filter should open, relative to `fs.www`.
    /// Set by the Index filter (appending the index filename for
    /// directory-style requests) or left as the raw unescaped path.
    pub resolved_path: Option<String>,
}

/// Response state being composed for the current request.
#[derive(Debug, Clone)]
pub struct ResponseState {
    /// Status code.
    pub status: Status,
    /// `Location` header value, if any (redirects).
    pub location: Option<String>,
    /// `Content-Type` header value, if any.
    pub content_type: Option<&'static str>,
    /// `Last-Modified` header value, if any.
    pub last_modified: Option<String>,
    /// `Content-Length`. `None` is the "unknown" sentinel: forces
    /// `Connection: close` and skips the transfer filter's byte budget.
    pub content_length: Option<u64>,
    /// Set once a filter has fully determined the response body.
    pub done: bool,
    /// Set when any filter wants the Error filter to take over.
    pub err: bool,
    /// Final keep-alive disposition for the `Connection` header.
    pub connection_keepalive: bool,
    /// The Response filter has already composed `resp_buf`; further entries
    /// into that filter for this request are pure passthrough.
    pub headers_written: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        ResponseState {
            status: Status::Ok,
            location: None,
            content_type: None,
            last_modified: None,
            content_length: None,
            done: false,
            err: false,
            connection_keepalive: false,
            headers_written: false,
        }
    }
}

impl ResponseState {
    /// Sets an error status; the Error filter will render its reason phrase.
    pub fn set_error(&mut self, status: Status) {
        self.status = status;
        self.err = true;
    }
}

/// Which async step the File filter is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileStep {
    #[default]
    Open,
    Stat,
    Read,
}

/// State for the File filter's open/stat/read state machine.
#[derive(Debug, Default)]
pub struct FileState {
    /// Open file handle, once opened.
    pub file: Option<File>,
    /// Read buffer.
    pub buf: Vec<u8>,
    /// Bytes still to be read from the file.
    pub remaining: u64,
    /// Current async step.
    pub step: FileStep,
    /// Modification time, captured at stat time, for `Last-Modified`.
    pub mtime: Option<SystemTime>,
    /// The stat that came back from `OpenAndStat` described a directory,
    /// not a regular file.
    pub is_dir: bool,
    /// Set when `OpenAndStat` failed, so the File filter can tell a missing
    /// file (404) apart from a permission or other open failure (500).
    pub open_error: Option<io::ErrorKind>,
}

/// Per-filter `{opened, done}` pair plus the pipeline's current position
/// and direction.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Index of the filter currently executing.
    pub index: usize,
    /// True while traversing backward (pulling more data from an earlier filter).
    pub back: bool,
    /// Per-filter `open()` has run and didn't skip/error.
    pub opened: [bool; NUM_FILTERS],
    /// Per-filter has produced its final result for this request.
    pub done: [bool; NUM_FILTERS],
    /// Data handed from the previous step to the current one.
    pub input: DataSource,
    /// Data the current step is handing to the next one.
    pub output: DataSource,
    /// Set by the Transfer filter to tell Send there's no more body to pull
    /// once the content-length budget is exhausted and we're unwinding BACK.
    pub chain_back: bool,
}

impl Default for EngineState {
    fn default() -> Self {
        EngineState {
            index: 0,
            back: false,
            opened: [false; NUM_FILTERS],
            done: [false; NUM_FILTERS],
            input: DataSource::Empty,
            output: DataSource::Empty,
            chain_back: false,
        }
    }
}

/// Outstanding offloaded syscall, if any. At most one per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffloadKind {
    FileOpen,
    FileStat,
    FileRead,
    AccessLogWrite,
}

/// Everything for one client connection.
pub struct ConnState {
    /// Peer address.
    pub peer: SocketAddr,
    /// Correlation id for log lines (`*<n>`).
    pub id: u32,
    /// The socket.
    pub stream: TcpStream,
    /// Reactor token (slot index + generation bit packed in, see `crate::token`).
    pub token: Token,
    /// Keep-alive is in effect for this connection.
    pub ka: bool,
    /// Requests served so far on this connection.
    pub keep_alive_n: u32,
    /// Request state.
    pub req: RequestState,
    /// Response state.
    pub resp: ResponseState,
    /// File filter state.
    pub file: FileState,
    /// Filter engine state.
    pub engine: EngineState,
    /// Receive buffer.
    pub recv_buf: Vec<u8>,
    /// Bytes valid (received, not yet all consumed) in `recv_buf`.
    pub recv_filled: usize,
    /// `recv_filled` as of the last time Receive forwarded on a `WouldBlock`
    /// (rather than on freshly-read bytes). Lets Receive tell "new bytes
    /// arrived" apart from "Request stepped back and I have nothing new",
    /// so a still-incomplete request suspends instead of spinning.
    pub recv_forwarded: usize,
    /// Response header-formatting buffer.
    pub resp_buf: Vec<u8>,
    /// Rendered directory listing, when the Autoindex filter ran.
    pub autoindex_buf: Vec<u8>,
    /// Formatted access-log line, written by the AccessLog filter.
    pub acclog_buf: Vec<u8>,
    /// Outstanding offload operation, if any.
    pub offload: Option<OffloadKind>,
    /// `TCP_NODELAY` has been applied to this socket.
    pub send_init: bool,
    /// Socket is registered with the reactor's `Poll`.
    pub registered: bool,
    /// Bytes received for the current request (access log).
    pub bytes_rx: u64,
    /// Bytes sent for the current response (access log).
    pub bytes_tx: u64,
    /// Remaining bytes the Transfer filter still owes the Send filter.
    pub content_remaining: u64,
    /// Write cursor into `resp_buf` (headers), reset each request.
    pub send_header_pos: usize,
    /// Write cursor into the current body chunk, reset each request and
    /// each time a fresh chunk is handed to the Send filter.
    pub send_body_pos: usize,
}

impl ConnState {
    /// Constructs fresh per-connection state around an accepted socket.
    pub fn new(stream: TcpStream, peer: SocketAddr, token: Token, id: u32, recv_cap: usize, resp_cap: usize) -> ConnState {
        ConnState {
            peer,
            id,
            stream,
            token,
            ka: false,
            keep_alive_n: 0,
            req: RequestState::default(),
            resp: ResponseState::default(),
            file: FileState::default(),
            engine: EngineState::default(),
            recv_buf: Vec::with_capacity(recv_cap),
            recv_filled: 0,
            recv_forwarded: 0,
            resp_buf: Vec::with_capacity(resp_cap),
            autoindex_buf: Vec::new(),
            acclog_buf: Vec::new(),
            offload: None,
            send_init: false,
            registered: false,
            bytes_rx: 0,
            bytes_tx: 0,
            content_remaining: 0,
            send_header_pos: 0,
            send_body_pos: 0,
        }
    }

    /// Resolves the engine's current `input` to bytes.
    pub fn input_bytes(&self) -> &[u8] {
        match self.engine.input {
            DataSource::Empty => &[],
            DataSource::Recv(s) => s.as_bytes(&self.recv_buf),
            DataSource::Static(s) => s.as_bytes(),
            DataSource::File(s) => s.as_bytes(&self.file.buf),
            DataSource::AutoIndex(s) => s.as_bytes(&self.autoindex_buf),
            DataSource::AccessLog(s) => s.as_bytes(&self.acclog_buf),
        }
    }

    /// Resets all per-request state for a keep-alive reset, preserving any
    /// pipelined bytes already sitting past `req.consumed_to` in `recv_buf`.
    pub fn reset_for_keep_alive(&mut self) {
        let residual_start = self.req.consumed_to.min(self.recv_filled);
        self.recv_buf.drain(0..residual_start);
        self.recv_filled -= residual_start;
        self.recv_forwarded = 0;

        self.req = RequestState::default();
        self.resp = ResponseState::default();
        self.file = FileState::default();
        self.engine = EngineState::default();
        self.autoindex_buf.clear();
        self.acclog_buf.clear();
        self.offload = None;
        self.send_init = false;
        self.bytes_rx = 0;
        self.bytes_tx = 0;
        self.content_remaining = 0;
        self.send_header_pos = 0;
        self.send_body_pos = 0;
        self.resp_buf.clear();
        self.keep_alive_n += 1;
    }
}

impl std::fmt::Debug for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnState")
            .field("peer", &self.peer)
            .field("id", &self.id)
            .field("token", &self.token)
            .field("ka", &self.ka)
            .field("keep_alive_n", &self.keep_alive_n)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn span_resolves_against_a_buffer() {
        let buf = b"hello world".to_vec();
        let span = Span::new(6, 11);
        assert_eq!(b"world", span.as_bytes(&buf));
    }

    #[test]
    fn data_source_len_matches_underlying_span() {
        let src = DataSource::Recv(Span::new(2, 5));
        assert_eq!(3, src.len());
        assert!(!src.is_empty());
        assert!(DataSource::Empty.is_empty());
    }
}
