//! Minimal Redis client: just enough RESP2 for GET and SETEX
//!
//! One connection, opened on first use. It is taken out of its slot for the
//! duration of a command and only put back once a well-formed reply has been
//! read, so an interrupted command never leaves a stale reply behind for the
//! next caller. Every write waits for its `+OK`, so a completed write is
//! visible to the next read.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::store::KeyValueStore;
use crate::MetroWatchError;

/// Largest bulk string accepted from the server (Redis' own limit)
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// A decoded RESP2 reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
}

/// Encode a command as a RESP array of bulk strings
pub fn encode_command(parts: &[&[u8]]) -> Vec<u8> {
    let mut cmd = Vec::new();
    cmd.extend_from_slice(format!("*{}\r\n", parts.len()).as_bytes());
    for part in parts {
        cmd.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        cmd.extend_from_slice(part);
        cmd.extend_from_slice(b"\r\n");
    }
    cmd
}

async fn read_line<R>(reader: &mut R) -> crate::Result<String>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Err(MetroWatchError::Store(
            "Connection closed by server".to_string(),
        ));
    }
    if !buf.ends_with(b"\r\n") {
        return Err(MetroWatchError::Store("Truncated reply line".to_string()));
    }
    buf.truncate(buf.len() - 2);
    String::from_utf8(buf).map_err(|_| MetroWatchError::Store("Reply is not UTF-8".to_string()))
}

/// Read one reply from the stream
pub async fn read_reply<R>(reader: &mut R) -> crate::Result<Reply>
where
    R: AsyncBufReadExt + Unpin,
{
    let line = read_line(reader).await?;
    let Some(kind) = line.chars().next() else {
        return Err(MetroWatchError::Store("Empty reply line".to_string()));
    };
    let rest = &line[kind.len_utf8()..];

    match kind {
        '+' => Ok(Reply::Simple(rest.to_string())),
        '-' => Ok(Reply::Error(rest.to_string())),
        ':' => rest
            .parse()
            .map(Reply::Integer)
            .map_err(|_| MetroWatchError::Store(format!("Bad integer reply '{}'", rest))),
        '$' => {
            let len: i64 = rest
                .parse()
                .map_err(|_| MetroWatchError::Store(format!("Bad bulk length '{}'", rest)))?;
            if len < 0 {
                return Ok(Reply::Bulk(None));
            }
            if len > MAX_BULK_LEN {
                return Err(MetroWatchError::Store(format!(
                    "Bulk length {} exceeds limit of {} bytes",
                    len, MAX_BULK_LEN
                )));
            }
            let len = len as usize;
            let mut data = vec![0u8; len + 2];
            reader.read_exact(&mut data).await?;
            if !data.ends_with(b"\r\n") {
                return Err(MetroWatchError::Store(
                    "Bulk reply missing terminator".to_string(),
                ));
            }
            data.truncate(len);
            Ok(Reply::Bulk(Some(data)))
        }
        _ => Err(MetroWatchError::Store(format!(
            "Unsupported reply '{}'",
            line
        ))),
    }
}

/// Redis-backed [`KeyValueStore`]
pub struct RedisStore {
    addr: String,
    password: Option<String>,
    database: u32,
    timeout: Duration,
    conn: Mutex<Option<BufStream<TcpStream>>>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("addr", &self.addr)
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisStore {
    pub fn new(
        host: &str,
        port: u16,
        password: Option<String>,
        database: u32,
        timeout: Duration,
    ) -> Self {
        let addr = format!("{}:{}", host, port);
        tracing::debug!(
            "Created RedisStore for {} (db {}, timeout {:?})",
            addr,
            database,
            timeout
        );
        Self {
            addr,
            password,
            database,
            timeout,
            conn: Mutex::new(None),
        }
    }

    async fn connect(&self) -> crate::Result<BufStream<TcpStream>> {
        tracing::debug!("Connecting to Redis at {}", self.addr);
        let stream = TcpStream::connect(&self.addr).await.map_err(|e| {
            MetroWatchError::Store(format!("Connecting to {} failed: {}", self.addr, e))
        })?;
        let mut stream = BufStream::new(stream);

        if let Some(password) = &self.password {
            expect_ok(round_trip(&mut stream, &[b"AUTH", password.as_bytes()]).await?)?;
        }
        if self.database != 0 {
            let db = self.database.to_string();
            expect_ok(round_trip(&mut stream, &[b"SELECT", db.as_bytes()]).await?)?;
        }
        Ok(stream)
    }

    async fn within_deadline<T>(
        &self,
        what: &str,
        fut: impl Future<Output = crate::Result<T>>,
    ) -> crate::Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(MetroWatchError::Store(format!(
                "Redis {} at {} timed out after {:?}",
                what, self.addr, self.timeout
            ))),
        }
    }

    /// Run one command, reconnecting first if needed
    ///
    /// The connection only returns to its slot after a complete reply, so
    /// dropping this future mid-command discards the connection with it.
    pub async fn execute(&self, parts: &[&[u8]]) -> crate::Result<Reply> {
        let mut guard = self.conn.lock().await;
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => self.within_deadline("connect", self.connect()).await?,
        };

        let result = self
            .within_deadline("command", round_trip(&mut stream, parts))
            .await;
        match result {
            Ok(reply) => {
                *guard = Some(stream);
                Ok(reply)
            }
            Err(e) => {
                tracing::debug!("Dropping Redis connection to {}: {}", self.addr, e);
                Err(e)
            }
        }
    }

    /// Forget the current connection after a reply that does not fit the command
    async fn drop_connection(&self, reason: &str) {
        tracing::debug!("Dropping Redis connection to {}: {}", self.addr, reason);
        *self.conn.lock().await = None;
    }
}

async fn round_trip(stream: &mut BufStream<TcpStream>, parts: &[&[u8]]) -> crate::Result<Reply> {
    stream.write_all(&encode_command(parts)).await?;
    stream.flush().await?;
    read_reply(stream).await
}

fn expect_ok(reply: Reply) -> crate::Result<()> {
    match reply {
        Reply::Simple(s) if s == "OK" => Ok(()),
        Reply::Error(e) => Err(MetroWatchError::Store(e)),
        other => Err(MetroWatchError::Store(format!(
            "Expected OK, got {:?}",
            other
        ))),
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> crate::Result<Option<String>> {
        match self.execute(&[b"GET", key.as_bytes()]).await? {
            Reply::Bulk(None) => Ok(None),
            Reply::Bulk(Some(data)) => String::from_utf8(data)
                .map(Some)
                .map_err(|_| MetroWatchError::Store(format!("Value of '{}' is not UTF-8", key))),
            Reply::Error(e) => Err(MetroWatchError::Store(e)),
            other => {
                let msg = format!("Unexpected GET reply {:?}", other);
                self.drop_connection(&msg).await;
                Err(MetroWatchError::Store(msg))
            }
        }
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> crate::Result<()> {
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1).to_string();
        let reply = self
            .execute(&[b"SETEX", key.as_bytes(), seconds.as_bytes(), value.as_bytes()])
            .await?;
        match reply {
            Reply::Simple(_) | Reply::Error(_) => expect_ok(reply),
            other => {
                let msg = format!("Unexpected SETEX reply {:?}", other);
                self.drop_connection(&msg).await;
                Err(MetroWatchError::Store(msg))
            }
        }
    }
}
