//! End-to-end scenarios run against a real listening socket, mirroring the
//! reactor crate's own `tests/server_chunked.rs`: spin the server up on a
//! background thread, drive it with a plain `TcpStream`, assert on the
//! bytes that come back.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use webserv::reactor::Server;
use webserv::router::StaticFileRouter;

fn spawn_server(port: u16, root: &std::path::Path, browse: bool) -> std::sync::Arc<std::sync::atomic::AtomicBool> {
    let router = StaticFileRouter::new(root, browse).expect("router init");
    let mut server = Server::new(port, 0, Box::new(router)).expect("server bind");
    let stop = server.stop_handle();
    thread::spawn(move || {
        let _ = server.run();
    });
    // Give the reactor thread time to enter its poll loop before clients connect.
    thread::sleep(Duration::from_millis(100));
    stop
}

fn read_response(stream: &mut TcpStream) -> String {
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                // Stop once we've read a full response with Content-Length,
                // rather than waiting for the peer to close (keep-alive).
                if let Some(body_start) = find(&buf, b"\r\n\r\n") {
                    if let Some(len) = content_length(&buf[..body_start]) {
                        if buf.len() >= body_start + 4 + len {
                            break;
                        }
                        continue;
                    }
                    break;
                }
            }
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn content_length(head: &[u8]) -> Option<usize> {
    let text = String::from_utf8_lossy(head);
    text.lines().find_map(|l| {
        let (name, value) = l.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

#[test]
fn simple_get_lists_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"abc").unwrap();

    let _stop = spawn_server(18080, dir.path(), true);
    let mut stream = TcpStream::connect("127.0.0.1:18080").unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
        .unwrap();

    let response = read_response(&mut stream);
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("a.txt"), "{response}");
}

#[test]
fn pipelining_across_segments() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"abc").unwrap();

    let _stop = spawn_server(18081, dir.path(), true);
    let mut stream = TcpStream::connect("127.0.0.1:18081").unwrap();

    let request = b"GET /a.txt HTTP/1.1\r\nHost: x\r\nConnection: keep-alive\r\n\r\n\
                     GET /a.txt HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n";
    // Dribble the request out one byte at a time to exercise arbitrary
    // chunking of the byte stream.
    for byte in request {
        stream.write_all(&[*byte]).unwrap();
    }

    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(_) => break,
        }
    }
    let response = String::from_utf8_lossy(&buf);
    assert_eq!(response.matches("HTTP/1.1 200").count(), 2, "{response}");
    assert_eq!(response.matches("abc").count(), 2, "{response}");
}

#[test]
fn post_to_static_router_is_method_not_allowed() {
    let dir = tempfile::tempdir().unwrap();

    let _stop = spawn_server(18082, dir.path(), true);
    let mut stream = TcpStream::connect("127.0.0.1:18082").unwrap();
    stream
        .write_all(b"POST /p HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello")
        .unwrap();

    let response = read_response(&mut stream);
    assert!(response.starts_with("HTTP/1.1 405"), "{response}");
}

#[test]
fn header_overflow_yields_431() {
    let dir = tempfile::tempdir().unwrap();

    let _stop = spawn_server(18083, dir.path(), true);
    let mut stream = TcpStream::connect("127.0.0.1:18083").unwrap();

    let mut oversized = b"GET / HTTP/1.1\r\nHost: x\r\n".to_vec();
    while oversized.len() < 8300 {
        oversized.extend_from_slice(b"X-Pad: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\r\n");
    }
    stream.write_all(&oversized).unwrap();

    let response = read_response(&mut stream);
    assert!(response.starts_with("HTTP/1.1 431"), "{response}");
}

#[test]
fn large_body_spills_to_file_and_still_dispatches() {
    // A 2 MiB body crosses BODY_IN_FILE_THRESHOLD, so the engine spills it
    // to a temp file instead of buffering it. The static router answers
    // every POST with 405 regardless of body content, so a correct 405
    // here (rather than a hang or a 500) is proof the spill-to-file path
    // reads the whole body and still reaches dispatch.
    let dir = tempfile::tempdir().unwrap();

    let _stop = spawn_server(18085, dir.path(), true);
    let mut stream = TcpStream::connect("127.0.0.1:18085").unwrap();

    let body = vec![b'x'; 2 * 1024 * 1024];
    let mut request = format!(
        "POST /p HTTP/1.1\r\nHost: x\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    request.extend_from_slice(&body);
    stream.write_all(&request).unwrap();

    let response = read_response(&mut stream);
    assert!(response.starts_with("HTTP/1.1 405"), "{response}");
}

#[test]
fn malformed_request_line_yields_400() {
    let dir = tempfile::tempdir().unwrap();

    let _stop = spawn_server(18084, dir.path(), true);
    let mut stream = TcpStream::connect("127.0.0.1:18084").unwrap();
    stream.write_all(b"GET\r\nHost:x\r\n\r\n").unwrap();

    let response = read_response(&mut stream);
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
}
