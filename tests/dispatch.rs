//! End-to-end dispatch through the ureq transport.
//!
//! Each test starts a throwaway server on a random local port that answers a
//! fixed number of connections with canned bytes, then drives requests
//! through a real `WorkerPool` or `Session`.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;

use mitter::{
    ApiFailure, Config, Credentials, Payload, Request, RequestError, Session, TransportFailure,
    WorkerPool,
};

/// Serve `connections` requests, answering each with `response`.
///
/// Returns the `host:port` to connect to.
fn serve(response: &'static [u8], connections: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming().take(connections) {
            let mut stream = stream.unwrap();
            read_request(&mut stream);
            let _ = stream.write_all(response);
            let _ = stream.flush();
        }
    });

    addr.to_string()
}

/// Read until the end of the request head and any declared body
fn read_request(stream: &mut impl Read) {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).unwrap_or(0);
        if n == 0 {
            return;
        }
        data.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&data);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let length = text[..head_end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= head_end + 4 + length {
                return;
            }
        }
    }
}

fn fetch(url: &str, decode_json: bool) -> Result<Payload, RequestError> {
    let pool = WorkerPool::new(1);
    let (tx, rx) = mpsc::channel();
    let mut request = Request::new(url, move |r| tx.send(r).unwrap());
    if !decode_json {
        request = request.raw();
    }
    pool.submit(request);
    pool.drain();
    rx.try_recv().unwrap()
}

#[test]
fn json_response_is_decoded() {
    let addr = serve(
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 7\r\nConnection: close\r\n\r\n{\"a\":1}",
        1,
    );
    let result = fetch(&format!("http://{addr}/a.json"), true);
    assert_eq!(result, Ok(Payload::Json(serde_json::json!({"a": 1}))));
}

#[test]
fn raw_response_is_delivered_as_bytes() {
    let addr = serve(
        b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\nGIF8",
        1,
    );
    let result = fetch(&format!("http://{addr}/avatar.gif"), false);
    assert_eq!(result, Ok(Payload::Raw(b"GIF8".to_vec())));
}

#[test]
fn http_error_status_is_reported() {
    let addr = serve(
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found",
        1,
    );
    let result = fetch(&format!("http://{addr}/missing.json"), true);
    assert_eq!(result, Err(RequestError::Status(404)));
}

#[test]
fn not_modified_is_reported_as_status() {
    let addr = serve(
        b"HTTP/1.1 304 Not Modified\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        1,
    );
    let result = fetch(&format!("http://{addr}/a.json"), true);
    assert_eq!(result, Err(RequestError::Status(304)));
}

#[test]
fn truncated_body_is_low_level_error() {
    let addr = serve(
        b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nhello",
        1,
    );
    let result = fetch(&format!("http://{addr}/avatar.gif"), false);
    let error = result.unwrap_err();
    assert_eq!(error, RequestError::Transport(TransportFailure::LowLevel));
    assert_eq!(error.code(), Some(TransportFailure::LOW_LEVEL_ERROR));
}

#[test]
fn connection_closed_without_reply_is_low_level_error() {
    let addr = serve(b"", 1);
    let result = fetch(&format!("http://{addr}/a.json"), true);
    assert_eq!(
        result,
        Err(RequestError::Transport(TransportFailure::LowLevel))
    );
}

#[test]
fn malformed_status_line_is_invalid_response() {
    let addr = serve(b"THIS IS NOT HTTP\r\n\r\n", 1);
    let result = fetch(&format!("http://{addr}/a.json"), true);
    assert_eq!(
        result,
        Err(RequestError::Transport(TransportFailure::InvalidResponse))
    );
}

#[test]
fn refused_connection_is_dns_error() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let result = fetch(&format!("http://{addr}/a.json"), true);
    let error = result.unwrap_err();
    assert_eq!(error, RequestError::Transport(TransportFailure::Dns));
    assert_eq!(error.code(), Some(TransportFailure::DNS_ERROR));
}

#[test]
fn refresh_page_is_treated_as_overload() {
    let addr = serve(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 46\r\nConnection: close\r\n\r\n<META HTTP-EQUIV=\"REFRESH\" CONTENT=\"5\">waiting",
        1,
    );
    let result = fetch(&format!("http://{addr}/a.json"), true);
    assert_eq!(result, Err(RequestError::Status(503)));
}

#[test]
fn threaded_session_completes_every_request_before_close() {
    const REQUESTS: usize = 12;
    let addr = serve(
        b"HTTP/1.1 200 OK\r\nContent-Length: 66\r\nConnection: close\r\n\r\n{\"remaining_hits\":99,\"hourly_limit\":100,\"reset_time_in_seconds\":0}",
        REQUESTS,
    );

    let pool = WorkerPool::new(3);
    let credentials = Credentials::new("julio", "secret", false);
    let mut session = Session::with_pool(credentials, &addr, pool);
    assert!(session.is_threaded());

    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..REQUESTS {
        let done = Arc::clone(&done);
        session.rate_limit_status(move |result| {
            assert_eq!(result.unwrap().remaining_hits, 99);
            done.fetch_add(1, Ordering::SeqCst);
        });
    }

    session.close();
    assert_eq!(done.load(Ordering::SeqCst), REQUESTS);
}

#[test]
fn session_reports_rate_limit_payload() {
    let addr = serve(
        b"HTTP/1.1 200 OK\r\nContent-Length: 52\r\nConnection: close\r\n\r\n{\"error\": \"Rate limit exceeded. Try again later.\"}  ",
        1,
    );
    let config = Config {
        username: "julio".to_string(),
        password: "secret".to_string(),
        server: addr,
        ..Config::default()
    };
    let mut session = config.session(1);

    let (tx, rx) = mpsc::channel();
    session.friends_timeline(move |r| tx.send(r).unwrap());
    assert_eq!(
        rx.try_recv().unwrap(),
        Err(RequestError::Api(ApiFailure::RateLimitExceeded))
    );
    session.close();
}
