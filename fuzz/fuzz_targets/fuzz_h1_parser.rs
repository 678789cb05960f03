#![no_main]

use libfuzzer_sys::fuzz_target;
use wayside_parser::h1::{parse_header_line, parse_request_line, HeaderParse};

fuzz_target!(|data: &[u8]| {
    let (_, mut pos) = match parse_request_line(data) {
        Ok(Some(v)) => v,
        _ => return,
    };
    loop {
        match parse_header_line(data, pos) {
            Ok(HeaderParse::Header { next, .. }) => pos = next,
            _ => break,
        }
    }
});
