//! Test helpers for the relay end-to-end tests.
//!
//! Provides a line-oriented TestClient and a helper that spawns a relay
//! on an ephemeral port.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use parley::config::ServerConfig;
use parley::ChatListener;

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A relay running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<parley::Result<()>>,
}

/// Spawn a relay bound to 127.0.0.1 on an OS-assigned port.
pub async fn spawn_server() -> TestServer {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let listener = ChatListener::bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(listener.run(shutdown.clone()));

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Line-oriented test client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect without consuming any server output.
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    /// Connect and consume the join preamble (two welcome lines and the
    /// first roster frame), returning the assigned placeholder nickname.
    pub async fn join(addr: SocketAddr) -> (Self, String) {
        let mut client = Self::connect(addr).await;

        let greeting = client.recv_line().await;
        assert!(
            greeting.starts_with("Welcome to the server!"),
            "unexpected greeting: {greeting:?}"
        );

        let nick_line = client.recv_line().await;
        let nickname = nick_line
            .strip_prefix("Your nickname for now is: ")
            .and_then(|rest| rest.split('.').next())
            .unwrap_or_else(|| panic!("unexpected nickname line: {nick_line:?}"))
            .to_string();

        let roster = client.recv_line().await;
        assert!(roster.starts_with("#USERS "), "expected roster: {roster:?}");

        (client, nickname)
    }

    /// Send one line to the server.
    pub async fn send_line(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    /// Receive the next line, failing the test after a timeout.
    pub async fn recv_line(&mut self) -> String {
        let mut buf = String::new();
        let n = timeout(DEFAULT_TIMEOUT, self.reader.read_line(&mut buf))
            .await
            .expect("timed out waiting for a line")
            .expect("read failed");
        assert!(n > 0, "server closed the connection");
        buf.trim_end().to_string()
    }

    /// Receive until the connection is closed by the server.
    pub async fn recv_eof(&mut self) {
        loop {
            let mut buf = String::new();
            let n = timeout(DEFAULT_TIMEOUT, self.reader.read_line(&mut buf))
                .await
                .expect("timed out waiting for EOF")
                .expect("read failed");
            if n == 0 {
                return;
            }
        }
    }

    /// Assert that no line arrives within a short settle window.
    pub async fn expect_silence(&mut self) {
        let mut buf = String::new();
        let result = timeout(Duration::from_millis(200), self.reader.read_line(&mut buf)).await;
        assert!(result.is_err(), "unexpected line: {buf:?}");
    }

    /// Close the client's write side, which the server sees as EOF.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}

/// Rename a client, consuming the announcement and roster frame it
/// receives for its own rename. Other clients drain theirs in the test.
pub async fn rename(client: &mut TestClient, old: &str, new: &str) {
    client.send_line(&format!("/nick {new}")).await;
    assert_eq!(
        client.recv_line().await,
        format!("* {old} -> {new} changed nickname *")
    );
    let roster = client.recv_line().await;
    assert!(roster.starts_with("#USERS "), "expected roster: {roster:?}");
}
