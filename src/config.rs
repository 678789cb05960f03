//! Worker configuration. Loading this from a CLI or a config file is out of
//! scope for the core — callers build a `Config` directly (or via
//! [`Config::default`] plus field assignment) and pass it to
//! [`crate::worker::Worker::new`].

use std::net::SocketAddr;
use std::sync::Arc;

use crate::content_type::ContentTypeMap;
use crate::error::ConfigError;
use crate::virtspace::{VirtHandler, VirtspaceMap};

/// Receive-side (request) tuning.
#[derive(Debug, Clone)]
pub struct ReceiveConfig {
    /// Size of the per-connection receive buffer.
    pub buf_size: usize,
    /// Seconds of read inactivity before a connection is dropped.
    pub timeout_sec: u64,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        ReceiveConfig {
            buf_size: 4096,
            timeout_sec: 65,
        }
    }
}

/// Response-composition tuning.
#[derive(Debug, Clone)]
pub struct ResponseConfig {
    /// Size of the per-connection header-formatting buffer.
    pub buf_size: usize,
    /// Value sent in the `Server` response header.
    pub server_name: String,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        ResponseConfig {
            buf_size: 4096,
            server_name: "wayside".to_string(),
        }
    }
}

/// Send-side tuning.
#[derive(Debug, Clone)]
pub struct SendConfig {
    /// Whether to set `TCP_NODELAY` on accepted sockets.
    pub tcp_nodelay: bool,
    /// Seconds of write inactivity before a connection is dropped.
    pub timeout_sec: u64,
}

impl Default for SendConfig {
    fn default() -> Self {
        SendConfig {
            tcp_nodelay: true,
            timeout_sec: 65,
        }
    }
}

/// Filesystem / static-file tuning.
#[derive(Debug, Clone)]
pub struct FsConfig {
    /// Document root files are served from.
    pub www: String,
    /// Filename appended to a directory request (e.g. `index.html`).
    pub index_filename: String,
    /// Size of the per-connection file-read buffer.
    pub file_buf_size: usize,
    /// Render a directory listing when a directory-style request has no
    /// index file. When `false`, such requests get a plain 404.
    pub autoindex_enabled: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        FsConfig {
            www: "www".to_string(),
            index_filename: "index.html".to_string(),
            file_buf_size: 16384,
            autoindex_enabled: true,
        }
    }
}

/// Minimum a buffer-size field is allowed to be: smaller can't hold even a
/// bare status line or a one-byte file read.
const MIN_BUF_SIZE: usize = 16;

/// Full worker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Addresses to listen on.
    pub listen: Vec<SocketAddr>,
    /// Max readiness events drained per reactor iteration.
    pub events_num: usize,
    /// Back-off, in seconds, before retrying `accept()` after FD exhaustion.
    pub fdlimit_timeout_sec: u64,
    /// Timer-wheel tick interval, in milliseconds.
    pub timer_interval_msec: u64,
    /// Connection-table capacity for this worker.
    pub max_connections: usize,
    /// Spin the reactor with a zero timeout and poll the offload queue
    /// instead of blocking on it.
    pub polling_mode: bool,
    /// Requests served on one keep-alive connection before it's closed.
    pub max_keep_alive_reqs: u32,
    /// Number of offload worker threads.
    pub offload_workers: usize,
    /// Receive-side tuning.
    pub receive: ReceiveConfig,
    /// Response-composition tuning.
    pub response: ResponseConfig,
    /// Send-side tuning.
    pub send: SendConfig,
    /// Filesystem tuning.
    pub fs: FsConfig,
    /// Extension -> MIME type table.
    pub content_types: Arc<ContentTypeMap>,
    /// `(path, method)` -> handler map for in-process virtual documents.
    pub virtspace: Arc<VirtspaceMap>,
    /// Minimum `log` level the access-log / debug-formatting paths bother
    /// building expensive payloads for (independent of `env_logger`'s own
    /// `RUST_LOG` filter, which still applies on top of this).
    pub log_level: log::LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: Vec::new(),
            events_num: 1024,
            fdlimit_timeout_sec: 10,
            timer_interval_msec: 250,
            max_connections: 10_000,
            polling_mode: false,
            max_keep_alive_reqs: 100,
            offload_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            receive: ReceiveConfig::default(),
            response: ResponseConfig::default(),
            send: SendConfig::default(),
            fs: FsConfig::default(),
            content_types: Arc::new(ContentTypeMap::default_map()),
            virtspace: Arc::new(VirtspaceMap::default()),
            log_level: log::LevelFilter::Info,
        }
    }
}

impl Config {
    /// Registers a virtual-document handler for `(path, method)`, replacing
    /// the default (empty) virtspace map the first time it's called.
    pub fn with_virtual_document(
        mut self,
        path: &str,
        method: wayside_parser::Method,
        handler: VirtHandler,
    ) -> Result<Self, ConfigError> {
        let mut map = (*self.virtspace).clone();
        map.insert(path, method, handler)?;
        self.virtspace = Arc::new(map);
        Ok(self)
    }

    /// Checks the invariants the worker relies on at construction time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.receive.buf_size < MIN_BUF_SIZE {
            return Err(ConfigError::BufferTooSmall {
                field: "receive.buf_size",
            });
        }
        if self.response.buf_size < MIN_BUF_SIZE {
            return Err(ConfigError::BufferTooSmall {
                field: "response.buf_size",
            });
        }
        if self.fs.file_buf_size < MIN_BUF_SIZE {
            return Err(ConfigError::BufferTooSmall {
                field: "fs.file_buf_size",
            });
        }
        if self.fs.www.is_empty() {
            return Err(ConfigError::EmptyDocumentRoot);
        }
        Ok(())
    }
}
