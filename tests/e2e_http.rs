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

//! Drives a real loopback worker end to end over TCP, rather than calling
//! into the filter pipeline directly, so these exercise the same code path
//! a real client hits: accept, parse, filesystem offload, and send.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use wayside::config::Config;
use wayside::offload;
use wayside::worker::{Worker, WorkerStopHandle};

struct TestServer {
    addr: SocketAddr,
    stop: WorkerStopHandle,
    handle: Option<JoinHandle<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.stop();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn unique_www_dir(name: &str) -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("wayside-e2e-{}-{}-{n}", std::process::id(), name));
    std::fs::create_dir_all(&dir).expect("create temp www dir");
    dir
}

fn start_server(www: PathBuf) -> TestServer {
    let mut config = Config::default();
    config.fs.www = www.to_string_lossy().into_owned();
    config.listen.push("127.0.0.1:0".parse().unwrap());
    config.validate().expect("valid test config");
    let config = Arc::new(config);

    let (offload_handle, _offload_threads) = offload::spawn_workers(2, false);
    let mut worker = Worker::new(config, offload_handle).expect("worker binds");
    let addr = worker.local_addrs().expect("bound address")[0];
    let stop = worker.stop_handle();

    let handle = std::thread::spawn(move || {
        let _ = worker.run();
    });

    TestServer {
        addr,
        stop,
        handle: Some(handle),
    }
}

fn request(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(raw).unwrap();
    read_response(&mut stream)
}

/// Reads exactly one HTTP response: headers up to the blank line, then
/// `Content-Length` bytes of body (every response in these tests carries an
/// explicit length).
fn read_response(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let header_end = find_subslice(&buf, b"\r\n\r\n");
        if let Some(end) = header_end {
            let headers = String::from_utf8_lossy(&buf[..end]);
            let content_length: usize = headers
                .lines()
                .find_map(|l| l.to_ascii_lowercase().starts_with("content-length:").then(|| l.to_string()))
                .and_then(|l| l.split(':').nth(1).map(|v| v.trim().to_string()))
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let want = end + 4 + content_length;
            if buf.len() >= want {
                buf.truncate(want);
                return buf;
            }
        }
        let n = stream.read(&mut chunk).expect("read response");
        assert!(n > 0, "connection closed before a full response arrived");
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn status_line(resp: &[u8]) -> String {
    String::from_utf8_lossy(resp)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn header(resp: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(resp);
    let lower_name = name.to_ascii_lowercase();
    text.lines().find_map(|l| {
        let (k, v) = l.split_once(':')?;
        (k.trim().to_ascii_lowercase() == lower_name).then(|| v.trim().to_string())
    })
}

fn body(resp: &[u8]) -> Vec<u8> {
    let end = find_subslice(resp, b"\r\n\r\n").expect("header terminator");
    resp[end + 4..].to_vec()
}

#[test]
fn serves_an_existing_file() {
    let www = unique_www_dir("file");
    std::fs::write(www.join("hello.txt"), b"hi\n").unwrap();
    let server = start_server(www);

    let resp = request(server.addr, b"GET /hello.txt HTTP/1.1\r\nHost: h\r\n\r\n");

    assert_eq!("HTTP/1.1 200 OK", status_line(&resp));
    assert_eq!(Some("3".to_string()), header(&resp, "Content-Length"));
    assert_eq!(Some("text/plain".to_string()), header(&resp, "Content-Type"));
    assert_eq!(Some("keep-alive".to_string()), header(&resp, "Connection"));
    assert_eq!(b"hi\n".to_vec(), body(&resp));
}

#[test]
fn missing_file_is_404() {
    let www = unique_www_dir("missing");
    let server = start_server(www);

    let resp = request(server.addr, b"GET /missing HTTP/1.1\r\nHost: h\r\n\r\n");

    assert_eq!("HTTP/1.1 404 Not Found", status_line(&resp));
    assert_eq!(Some("9".to_string()), header(&resp, "Content-Length"));
    assert_eq!(b"Not Found".to_vec(), body(&resp));
}

#[test]
fn directory_without_trailing_slash_redirects() {
    let www = unique_www_dir("redirect");
    std::fs::create_dir_all(www.join("subdir")).unwrap();
    let server = start_server(www);

    let resp = request(server.addr, b"GET /subdir HTTP/1.1\r\nHost: h\r\n\r\n");

    assert_eq!("HTTP/1.1 301 Moved Permanently", status_line(&resp));
    assert_eq!(Some("http://h/subdir/".to_string()), header(&resp, "Location"));
}

#[test]
fn post_to_a_plain_file_is_405() {
    let www = unique_www_dir("method");
    std::fs::write(www.join("x"), b"body").unwrap();
    let server = start_server(www);

    let resp = request(server.addr, b"POST /x HTTP/1.1\r\nHost: h\r\n\r\n");

    assert_eq!("HTTP/1.1 405 Method Not Allowed", status_line(&resp));
}

#[test]
fn pipelined_requests_share_one_connection() {
    let www = unique_www_dir("pipeline");
    std::fs::write(www.join("a"), b"A").unwrap();
    std::fs::write(www.join("b"), b"B").unwrap();
    let server = start_server(www);

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
        .write_all(b"GET /a HTTP/1.1\r\nHost: h\r\n\r\nGET /b HTTP/1.1\r\nHost: h\r\n\r\n")
        .unwrap();

    let first = read_response(&mut stream);
    assert_eq!("HTTP/1.1 200 OK", status_line(&first));
    assert_eq!(b"A".to_vec(), body(&first));

    let second = read_response(&mut stream);
    assert_eq!("HTTP/1.1 200 OK", status_line(&second));
    assert_eq!(b"B".to_vec(), body(&second));
}

#[test]
fn http_1_0_without_host_is_tolerated_and_closes() {
    let www = unique_www_dir("http10");
    std::fs::write(www.join("index.html"), b"<html></html>").unwrap();
    let server = start_server(www);

    let resp = request(server.addr, b"GET / HTTP/1.0\r\n\r\n");

    assert_eq!("HTTP/1.0 200 OK", status_line(&resp));
    assert_eq!(Some("close".to_string()), header(&resp, "Connection"));
}

#[test]
fn head_matches_get_headers_with_no_body() {
    let www = unique_www_dir("head");
    std::fs::write(www.join("hello.txt"), b"hi\n").unwrap();
    let server = start_server(www);

    let resp = request(server.addr, b"HEAD /hello.txt HTTP/1.1\r\nHost: h\r\n\r\n");

    assert_eq!("HTTP/1.1 200 OK", status_line(&resp));
    assert_eq!(Some("3".to_string()), header(&resp, "Content-Length"));
    assert!(body(&resp).is_empty());
}

#[test]
fn if_modified_since_matching_last_modified_is_304() {
    let www = unique_www_dir("ims");
    std::fs::write(www.join("hello.txt"), b"hi\n").unwrap();
    let server = start_server(www);

    let first = request(server.addr, b"GET /hello.txt HTTP/1.1\r\nHost: h\r\n\r\n");
    let last_modified = header(&first, "Last-Modified").expect("Last-Modified present");

    let req = format!("GET /hello.txt HTTP/1.1\r\nHost: h\r\nIf-Modified-Since: {last_modified}\r\n\r\n");
    let second = request(server.addr, req.as_bytes());

    assert_eq!("HTTP/1.1 304 Not Modified", status_line(&second));
    assert_eq!(Some("0".to_string()), header(&second, "Content-Length"));
    assert!(body(&second).is_empty());
}

fn cleanup(www: &Path) {
    let _ = std::fs::remove_dir_all(www);
}

#[test]
fn autoindex_lists_a_directory_with_no_index_file() {
    let www = unique_www_dir("autoindex");
    std::fs::create_dir_all(www.join("assets")).unwrap();
    std::fs::write(www.join("page.html"), b"x").unwrap();
    let server = start_server(www.clone());

    let resp = request(server.addr, b"GET / HTTP/1.1\r\nHost: h\r\n\r\n");

    assert_eq!("HTTP/1.1 200 OK", status_line(&resp));
    let listing = String::from_utf8_lossy(&body(&resp)).into_owned();
    assert!(listing.contains("page.html"));
    assert!(listing.contains("assets/"));

    drop(server);
    cleanup(&www);
}
