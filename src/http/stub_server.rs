use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Minimal HTTP/1.1 server for dispatcher tests; one thread per connection.
pub(crate) struct StubServer {
    pub(crate) url: String,
    stop: Arc<AtomicBool>,
    hits: Arc<AtomicU64>,
    thread: Option<thread::JoinHandle<()>>,
}

#[derive(Debug, Clone)]
pub(crate) struct StubResponse {
    pub(crate) status: u16,
    pub(crate) delay: Duration,
    pub(crate) body: String,
}

impl Default for StubResponse {
    fn default() -> Self {
        Self {
            status: 200,
            delay: Duration::ZERO,
            body: "OK".to_owned(),
        }
    }
}

impl StubServer {
    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Spawns the stub server on an ephemeral port.
///
/// # Errors
///
/// Returns an error if the listener cannot be created or configured.
pub(crate) fn spawn_stub_server(response: StubResponse) -> Result<StubServer, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let stop = Arc::new(AtomicBool::new(false));
    let hits = Arc::new(AtomicU64::new(0));
    let stop_flag = Arc::clone(&stop);
    let hit_counter = Arc::clone(&hits);

    let handle = thread::spawn(move || {
        loop {
            if stop_flag.load(Ordering::SeqCst) {
                break;
            }

            match listener.accept() {
                Ok((stream, _)) => {
                    let response = response.clone();
                    let hit_counter = Arc::clone(&hit_counter);
                    thread::spawn(move || handle_client(stream, &response, &hit_counter));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(_) => break,
            }
        }
    });

    Ok(StubServer {
        url: format!("http://{}", addr),
        stop,
        hits,
        thread: Some(handle),
    })
}

fn handle_client(mut stream: TcpStream, response: &StubResponse, hits: &AtomicU64) {
    if stream.set_nonblocking(false).is_err() {
        return;
    }
    if read_request(&mut stream).is_err() {
        return;
    }
    hits.fetch_add(1, Ordering::SeqCst);
    if !response.delay.is_zero() {
        thread::sleep(response.delay);
    }
    let payload = format!(
        "HTTP/1.1 {} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );
    if stream.write_all(payload.as_bytes()).is_err() {
        return;
    }
    if stream.flush().is_err() {
        return;
    }
    drop(stream.shutdown(Shutdown::Both));
}

/// Reads headers and, when announced, the full body so closing never resets.
fn read_request(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut received = Vec::new();
    let mut buffer = [0u8; 4096];
    let header_end = loop {
        let read = stream.read(&mut buffer)?;
        if read == 0 {
            return Ok(());
        }
        received.extend_from_slice(buffer.get(..read).unwrap_or_default());
        if let Some(pos) = received.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos.saturating_add(4);
        }
    };
    let headers = String::from_utf8_lossy(received.get(..header_end).unwrap_or_default());
    let content_length = headers
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut body_read = received.len().saturating_sub(header_end);
    while body_read < content_length {
        let read = stream.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        body_read = body_read.saturating_add(read);
    }
    Ok(())
}
