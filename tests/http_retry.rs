use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;

use fpl_dashboard::config::Settings;
use fpl_dashboard::error::DataError;
use fpl_dashboard::http_client::{fetch_text, retry_backoff};
use fpl_dashboard::source::{FplApi, RemoteSource};

/// Serves one canned response per connection, in order, then stops.
fn serve(responses: Vec<(u16, &'static str)>) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let served = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&served);
    thread::spawn(move || {
        for (status, body) in responses {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).is_ok_and(|n| n > 0) {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            counter.fetch_add(1, Ordering::SeqCst);
            let reason = if status == 200 { "OK" } else { "Service Unavailable" };
            let reply = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let mut stream = reader.into_inner();
            let _ = stream.write_all(reply.as_bytes());
            let _ = stream.flush();
        }
    });
    (addr, served)
}

#[test]
fn retries_after_server_error_and_returns_body() {
    let (addr, served) = serve(vec![(503, "busy"), (200, r#"{"ok":true}"#)]);
    let client = Client::new();

    let start = Instant::now();
    let body = fetch_text(&client, &format!("http://{addr}/"), 3, Duration::from_millis(20))
        .expect("second attempt succeeds");

    assert_eq!(body, r#"{"ok":true}"#);
    assert_eq!(served.load(Ordering::SeqCst), 2);
    assert!(start.elapsed() >= Duration::from_millis(20));
}

#[test]
fn gives_up_after_configured_attempts() {
    let (addr, served) = serve(vec![(503, "a"), (503, "b"), (503, "c")]);
    let client = Client::new();

    let err = fetch_text(&client, &format!("http://{addr}/"), 3, Duration::from_millis(5))
        .expect_err("every attempt fails");

    assert_eq!(served.load(Ordering::SeqCst), 3);
    assert!(format!("{err:#}").contains("503"));
}

#[test]
fn api_maps_exhausted_retries_to_remote_fetch() {
    let (addr, served) = serve(vec![(503, "down"), (503, "down")]);
    let settings = Settings {
        api_base: format!("http://{addr}/"),
        retry_attempts: 2,
        request_delay: Duration::from_millis(10),
        ..Settings::default()
    };
    let api = FplApi::new(&settings).expect("client");

    match api.bootstrap() {
        Err(DataError::RemoteFetch { url, message }) => {
            assert_eq!(url, format!("http://{addr}/bootstrap-static/"));
            assert!(message.contains("503"));
        }
        other => panic!("expected RemoteFetch, got {other:?}"),
    }
    assert_eq!(served.load(Ordering::SeqCst), 2);
}

#[test]
fn backoff_never_undercuts_request_delay() {
    assert_eq!(retry_backoff(Duration::from_millis(100)), Duration::from_millis(300));
    assert_eq!(retry_backoff(Duration::from_millis(750)), Duration::from_millis(750));
}
