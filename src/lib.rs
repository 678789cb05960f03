// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// `missing_debug_implementations` is deliberately not denied here the way
// `wayside-parser` denies it: `Worker` and a few reactor-adjacent types
// wrap `mio` types that don't implement `Debug`.
#![deny(rust_2018_idioms, unused_imports)]
#![doc(test(attr(deny(warnings))))]

//! A multi-worker, event-driven HTTP/1.1 origin server.
//!
//! Each [`worker::Worker`] owns one `mio` reactor, a pre-allocated
//! connection table, and a timer wheel; several workers bind the same
//! listen address with `SO_REUSEPORT` and run on separate OS threads to
//! spread accepted connections across cores. Requests move through a fixed
//! chain of filters (see [`engine`]) from raw bytes off the wire to bytes
//! back on the wire, with blocking filesystem work handed off to a small
//! thread pool (see [`offload`]) so the reactor thread never blocks.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wayside::config::Config;
//! use wayside::offload;
//! use wayside::worker::Worker;
//!
//! let mut config = Config::default();
//! config.listen.push("0.0.0.0:8080".parse().unwrap());
//! let config = Arc::new(config);
//!
//! let (offload_handle, _offload_threads) =
//!     offload::spawn_workers(config.offload_workers, config.polling_mode);
//! let mut worker = Worker::new(config, offload_handle).unwrap();
//! worker.run().unwrap();
//! ```

pub mod config;
pub mod conn;
pub mod conn_table;
pub mod content_type;
pub mod engine;
pub mod error;
pub mod filters;
pub mod http_date;
pub mod murmur3;
pub mod net;
pub mod offload;
pub mod timer;
pub mod token;
pub mod virtspace;
pub mod worker;
