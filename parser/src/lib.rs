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

#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unused_imports
)]
#![doc(test(attr(deny(warnings))))]

//! Zero-copy HTTP/1.1 request-line and header tokenizer.
//!
//! Nothing in this crate owns request bytes: every parse result is a
//! [`raw_request::ByteRange`] into the caller's buffer, so header and
//! request-line values can be read out lazily across multiple `recv()`
//! calls without copying.

pub mod h1;
pub mod method;
pub mod raw_request;
pub mod status;
pub mod version;

pub use method::Method;
pub use raw_request::{ByteRange, Cursor};
pub use status::Status;
pub use version::Version;
