// src/network/pool.rs

//! Mining pool client implementation
//!
//! Monero-style stratum over TCP, optionally wrapped in TLS, with
//! newline-delimited JSON-RPC.
//! A background reader task forwards job notifications to the job stream
//! and routes responses back to waiting submissions; a keepalive task pings
//! the pool while the connection lives.
use crate::config::PoolConfig;
use crate::miner::job::PoolJob;
use crate::network::{PoolConnection, PoolConnector, SubmitResponse};
use crate::network::tls;
use crate::utils::error::MinerError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::sync::{Notify, oneshot};
use tokio::time;
use url::Url;

/// JSON-RPC id used for login
const LOGIN_ID: u64 = 1;
/// JSON-RPC id used for keepalives; never matched to a submission
const KEEPALIVE_ID: u64 = 0;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Host, port and transport of a pool endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Whether the endpoint expects TLS
    pub tls: bool,
}

impl Endpoint {
    /// Parses `host:port`, `stratum+tcp://host:port` or
    /// `stratum+ssl://host:port`. The `tls` flag is OR-ed with the scheme.
    pub fn parse(address: &str, tls: bool) -> Result<Self, MinerError> {
        let with_scheme = if address.contains("://") {
            address.to_string()
        } else {
            format!("stratum+tcp://{}", address)
        };
        let url = Url::parse(&with_scheme)?;

        let scheme_tls = match url.scheme() {
            "stratum+tcp" | "tcp" => false,
            "stratum+ssl" | "stratum+tls" | "ssl" | "tls" => true,
            other => {
                return Err(MinerError::ConfigError(format!(
                    "Unsupported pool scheme '{}' in '{}'",
                    other, address
                )));
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| MinerError::ConfigError(format!("Pool URL '{}' has no host", address)))?
            .to_string();
        let port = url
            .port()
            .ok_or_else(|| MinerError::ConfigError(format!("Pool URL '{}' has no port", address)))?;

        Ok(Endpoint {
            host,
            port,
            tls: tls || scheme_tls,
        })
    }
}

/// Line reader over either transport
type PoolReader = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;
/// Writer over either transport
type PoolWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Any line the pool may send
#[derive(Debug, Deserialize)]
struct RpcMessage {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Result payload of a successful login
#[derive(Debug, Deserialize)]
struct LoginResult {
    id: String,
    #[serde(default)]
    job: Option<PoolJob>,
}

/// Connector for stratum pools
#[derive(Debug, Clone, Default)]
pub struct PoolClient;

impl PoolClient {
    /// Creates a new PoolClient instance
    pub fn new() -> Self {
        PoolClient
    }
}

impl PoolConnector for PoolClient {
    type Connection = StratumConnection;

    async fn connect(
        &self,
        pool: &PoolConfig,
        user_agent: &str,
    ) -> Result<(Arc<StratumConnection>, Receiver<PoolJob>), MinerError> {
        let endpoint = Endpoint::parse(&pool.url, pool.tls)?;
        let (mut lines, mut writer) = time::timeout(
            CONNECT_TIMEOUT,
            open_stream(&endpoint, pool.tls_fingerprint.as_deref()),
        )
        .await
        .map_err(|_| {
            MinerError::ConnectionError(format!(
                "Connection to {}:{} timed out",
                endpoint.host, endpoint.port
            ))
        })??;

        let login = json!({
            "id": LOGIN_ID,
            "jsonrpc": "2.0",
            "method": "login",
            "params": {
                "login": pool.user,
                "pass": pool.pass,
                "agent": user_agent,
                "algo": ["rx/0"],
            },
        });
        write_line(&mut writer, &login).await?;

        let result = time::timeout(RESPONSE_TIMEOUT, read_login(&mut lines))
            .await
            .map_err(|_| MinerError::ConnectionError("Login response timed out".into()))??;
        log::info!("Logged in to {}:{}", endpoint.host, endpoint.port);

        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        if let Some(job) = result.job {
            job_tx.send(job)?;
        }

        let connection = Arc::new(StratumConnection {
            writer: tokio::sync::Mutex::new(writer),
            session_id: result.id,
            alive: AtomicBool::new(true),
            pending: Mutex::new(HashMap::new()),
            shutdown: Notify::new(),
        });

        tokio::spawn(read_loop(connection.clone(), lines, job_tx));
        tokio::spawn(keep_alive(connection.clone()));

        Ok((connection, job_rx))
    }
}

/// A logged-in stratum session
pub struct StratumConnection {
    /// Write half of the transport
    writer: tokio::sync::Mutex<PoolWriter>,
    /// Session id assigned by the pool at login
    session_id: String,
    alive: AtomicBool,
    /// Submissions waiting for a response, by JSON-RPC id
    pending: Mutex<HashMap<u64, oneshot::Sender<SubmitResponse>>>,
    shutdown: Notify,
}

impl StratumConnection {
    /// Session id assigned by the pool.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn send(&self, value: &Value) -> Result<(), MinerError> {
        let mut writer = self.writer.lock().await;
        write_line(&mut *writer, value).await
    }

    /// Handles one line from the pool. Returns false once the job stream
    /// has no receiver.
    fn handle_line(&self, line: &str, jobs: &Sender<PoolJob>) -> bool {
        let message: RpcMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Ignoring malformed pool message: {}", e);
                return true;
            }
        };

        if let Some(method) = message.method.as_deref() {
            return match method {
                "job" => match message.params.map(serde_json::from_value::<PoolJob>) {
                    Some(Ok(job)) => jobs.send(job).is_ok(),
                    Some(Err(e)) => {
                        log::warn!("Ignoring malformed job: {}", e);
                        true
                    }
                    None => {
                        log::warn!("Job notification without params");
                        true
                    }
                },
                other => {
                    log::warn!("Unknown method received: {}", other);
                    true
                }
            };
        }

        if let Some(id) = message.id {
            if let Some(waiter) = self.pending.lock().remove(&id) {
                let _ = waiter.send(SubmitResponse {
                    result: message.result,
                    error: message.error,
                });
            }
        }
        true
    }

    fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
        // Dropping the waiters fails their submissions as transport errors.
        self.pending.lock().clear();
    }
}

impl PoolConnection for StratumConnection {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn submit_work(
        &self,
        nonce: &str,
        job_id: &str,
        hash: &str,
        sequence: u64,
    ) -> Result<SubmitResponse, MinerError> {
        if !self.is_alive() {
            return Err(MinerError::ConnectionError("Not connected".into()));
        }

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(sequence, tx);

        let message = json!({
            "id": sequence,
            "jsonrpc": "2.0",
            "method": "submit",
            "params": {
                "id": self.session_id,
                "job_id": job_id,
                "nonce": nonce,
                "result": hash,
            },
        });
        if let Err(e) = self.send(&message).await {
            self.pending.lock().remove(&sequence);
            return Err(e);
        }

        match time::timeout(RESPONSE_TIMEOUT, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(MinerError::ConnectionError(
                "Connection closed before the pool answered".into(),
            )),
            Err(_) => {
                self.pending.lock().remove(&sequence);
                Err(MinerError::ConnectionError("Submit response timed out".into()))
            }
        }
    }

    fn close(&self) {
        self.mark_dead();
        self.shutdown.notify_one();
    }
}

/// Opens TCP to `endpoint` and runs the TLS handshake when it asks for one.
async fn open_stream(
    endpoint: &Endpoint,
    fingerprint: Option<&str>,
) -> Result<(PoolReader, PoolWriter), MinerError> {
    let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|e| {
            MinerError::ConnectionError(format!(
                "Connection to {}:{} failed: {}",
                endpoint.host, endpoint.port, e
            ))
        })?;
    stream.set_nodelay(true)?;

    if !endpoint.tls {
        let (r, w) = stream.into_split();
        return Ok(boxed(r, w));
    }

    let connector = tls::connector(fingerprint)?;
    let stream = tls::handshake(&connector, &endpoint.host, stream).await?;
    log::debug!("TLS established with {}", endpoint.host);
    let (r, w) = tokio::io::split(stream);
    Ok(boxed(r, w))
}

fn boxed<R, W>(reader: R, writer: W) -> (PoolReader, PoolWriter)
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
    (BufReader::new(reader).lines(), Box::new(writer))
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, value: &Value) -> Result<(), MinerError> {
    let mut line = value.to_string();
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

async fn read_login(lines: &mut PoolReader) -> Result<LoginResult, MinerError> {
    loop {
        let line = lines
            .next_line()
            .await?
            .ok_or_else(|| MinerError::ConnectionError("Pool closed the connection during login".into()))?;
        let message: RpcMessage = serde_json::from_str(&line)?;
        if message.id != Some(LOGIN_ID) {
            continue;
        }
        if let Some(error) = message.error {
            return Err(MinerError::ProtocolError(format!("Login rejected: {}", error)));
        }
        let result = message
            .result
            .ok_or_else(|| MinerError::ProtocolError("Login response without result".into()))?;
        return Ok(serde_json::from_value(result)?);
    }
}

/// Reads pool lines until EOF, an error, or `close`. Dropping `jobs` on
/// exit ends the session's job stream.
async fn read_loop(
    connection: Arc<StratumConnection>,
    mut lines: PoolReader,
    jobs: Sender<PoolJob>,
) {
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !connection.handle_line(&line, &jobs) {
                        break;
                    }
                }
                Ok(None) => {
                    log::warn!("Pool closed the connection");
                    break;
                }
                Err(e) => {
                    log::warn!("Pool read failed: {}", e);
                    break;
                }
            },
            _ = connection.shutdown.notified() => break,
        }
    }

    connection.mark_dead();
    let _ = connection.writer.lock().await.shutdown().await;
}

async fn keep_alive(connection: Arc<StratumConnection>) {
    let mut interval = time::interval(KEEPALIVE_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        if !connection.is_alive() {
            break;
        }
        let message = json!({
            "id": KEEPALIVE_ID,
            "jsonrpc": "2.0",
            "method": "keepalived",
            "params": { "id": connection.session_id },
        });
        if let Err(e) = connection.send(&message).await {
            log::warn!("Keepalive failed: {}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

    fn pool_config(port: u16) -> PoolConfig {
        PoolConfig {
            url: format!("127.0.0.1:{}", port),
            tls: false,
            tls_fingerprint: None,
            user: "wallet".into(),
            pass: "x".into(),
        }
    }

    fn job_json(id: &str) -> Value {
        json!({
            "blob": "0707",
            "job_id": id,
            "target": "b88d0600",
            "algo": "rx/0",
            "height": 10,
            "seed_hash": "aa",
        })
    }

    async fn accept(listener: &TcpListener) -> (Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf) {
        let (socket, _) = listener.accept().await.unwrap();
        let (r, w) = socket.into_split();
        (BufReader::new(r).lines(), w)
    }

    async fn reply(w: &mut OwnedWriteHalf, value: Value) {
        write_line(w, &value).await.unwrap();
    }

    #[test]
    fn parses_endpoints() {
        assert_eq!(
            Endpoint::parse("pool.example.com:3333", false).unwrap(),
            Endpoint { host: "pool.example.com".into(), port: 3333, tls: false }
        );
        assert!(Endpoint::parse("stratum+ssl://pool.example.com:443", false).unwrap().tls);
        assert!(Endpoint::parse("pool.example.com:443", true).unwrap().tls);
        assert!(Endpoint::parse("http://pool.example.com:80", false).is_err());
        assert!(Endpoint::parse("pool.example.com", false).is_err());
    }

    #[tokio::test]
    async fn login_job_and_submit_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut lines, mut w) = accept(&listener).await;

            let login: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            assert_eq!(login["method"], "login");
            assert_eq!(login["params"]["login"], "wallet");
            assert_eq!(login["params"]["agent"], "test-agent");
            reply(&mut w, json!({"id": 1, "jsonrpc": "2.0", "error": null,
                "result": {"id": "sess-1", "job": job_json("first"), "status": "OK"}})).await;

            reply(&mut w, json!({"jsonrpc": "2.0", "method": "job", "params": job_json("second")})).await;

            let submit: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            assert_eq!(submit["method"], "submit");
            assert_eq!(submit["id"], 7);
            assert_eq!(submit["params"]["id"], "sess-1");
            assert_eq!(submit["params"]["job_id"], "second");
            assert_eq!(submit["params"]["nonce"], "01020304");
            reply(&mut w, json!({"id": 7, "jsonrpc": "2.0", "result": {"status": "OK"}})).await;

            let submit: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            reply(&mut w, json!({"id": submit["id"], "jsonrpc": "2.0",
                "error": {"code": -1, "message": "Low difficulty share"}})).await;
        });

        let (connection, jobs) = PoolClient::new()
            .connect(&pool_config(port), "test-agent")
            .await
            .unwrap();
        assert_eq!(connection.session_id(), "sess-1");
        assert!(connection.is_alive());

        assert_eq!(jobs.recv().unwrap().job_id, "first");
        let second = tokio::task::spawn_blocking(move || {
            let job = jobs.recv().unwrap();
            (job, jobs)
        })
        .await
        .unwrap();
        assert_eq!(second.0.job_id, "second");
        let jobs = second.1;

        let accepted = connection.submit_work("01020304", "second", "ff", 7).await.unwrap();
        assert_eq!(accepted.result, Some(json!({"status": "OK"})));
        assert!(accepted.error.is_none());

        let refused = connection.submit_work("01020305", "second", "ff", 8).await.unwrap();
        assert!(refused.error.is_some());

        server.await.unwrap();

        // Server dropped its socket: the stream closes and the session dies.
        let closed = tokio::task::spawn_blocking(move || jobs.recv().is_err()).await.unwrap();
        assert!(closed);
        assert!(!connection.is_alive());
        assert!(connection.submit_work("00", "second", "ff", 9).await.is_err());
    }

    #[tokio::test]
    async fn rejected_login_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut lines, mut w) = accept(&listener).await;
            lines.next_line().await.unwrap();
            reply(&mut w, json!({"id": 1, "error": {"code": -1, "message": "Invalid address"}})).await;
        });

        let result = PoolClient::new().connect(&pool_config(port), "agent").await;
        assert!(matches!(result, Err(MinerError::ProtocolError(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn close_ends_job_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut lines, mut w) = accept(&listener).await;
            lines.next_line().await.unwrap();
            reply(&mut w, json!({"id": 1, "result": {"id": "s"}})).await;
            // Hold the socket open until the client hangs up.
            while let Ok(Some(_)) = lines.next_line().await {}
        });

        let (connection, jobs) = PoolClient::new().connect(&pool_config(port), "agent").await.unwrap();
        connection.close();
        assert!(!connection.is_alive());

        let closed = tokio::task::spawn_blocking(move || jobs.recv().is_err()).await.unwrap();
        assert!(closed);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn tls_handshake_failure_is_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut hello = [0u8; 64];
            let _ = socket.read(&mut hello).await;
            // Plain stratum where a TLS server hello is expected.
            let _ = socket.write_all(b"{\"id\":1}\n").await;
        });

        let mut config = pool_config(port);
        config.url = format!("localhost:{}", port);
        config.tls = true;
        config.tls_fingerprint = Some("ab".repeat(32));
        let result = PoolClient::new().connect(&config, "agent").await;
        assert!(matches!(result, Err(MinerError::ConnectionError(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn tls_with_malformed_fingerprint_is_a_config_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let _ = listener.accept().await.unwrap();
        });

        let mut config = pool_config(port);
        config.tls = true;
        config.tls_fingerprint = Some("abcd".into());
        let result = PoolClient::new().connect(&config, "agent").await;
        assert!(matches!(result, Err(MinerError::ConfigError(_))));
        server.await.unwrap();
    }
}
