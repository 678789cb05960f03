//! The eleven fixed pipeline stages, in the order they run.

mod access_log;
mod autoindex;
mod error;
mod file;
mod index;
mod receive;
mod request;
mod response;
mod send;
mod transfer;
mod virtspace;

use crate::conn::NUM_FILTERS;
use crate::engine::Filter;

/// Builds the fixed filter chain in pipeline order. The array position of
/// each filter is load-bearing: `crate::engine` hard-codes a few indices
/// (`ERROR_FILTER_INDEX`, `TRANSFER_FILTER_INDEX`, `FILE_FILTER_INDEX`) that
/// must match this order.
pub fn build() -> [Box<dyn Filter>; NUM_FILTERS] {
    [
        Box::new(receive::Receive),
        Box::new(request::Request),
        Box::new(index::Index),
        Box::new(autoindex::Autoindex),
        Box::new(virtspace::VirtSpace),
        Box::new(file::File),
        Box::new(error::Error),
        Box::new(transfer::Transfer),
        Box::new(response::Response),
        Box::new(send::Send),
        Box::new(access_log::AccessLog),
    ]
}
