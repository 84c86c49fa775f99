//! [`RespClient`]: a single shared TCP connection to a Redis-compatible
//! store.
//!
//! Commands are serialized over the one connection: the connection mutex is
//! held for exactly one request/reply exchange, so concurrent callers
//! interleave at command granularity.
//!
//! A connection whose exchange did not finish (the caller's future was
//! dropped, or the stream failed mid-request) is never reused. The next
//! command discards it and runs the connect handshake again. The command
//! that hit the failure is not retried.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::resp::{self, Frame};
use crate::traits::KvClient;

const READ_CHUNK: usize = 4 * 1024;

struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
    // Set while a request is written but its reply not yet fully read.
    in_flight: bool,
}

impl Connection {
    /// Connect, then authenticate and select the database if configured.
    async fn open(config: &StoreConfig) -> StoreResult<Self> {
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&config.address))
            .await
            .map_err(|_| StoreError::ConnectTimeout {
                address: config.address.clone(),
                timeout_ms: config.connect_timeout_ms,
            })??;
        stream.set_nodelay(true)?;

        let mut conn = Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            in_flight: false,
        };

        if let Some(password) = &config.password {
            let reply = match &config.username {
                Some(user) => {
                    conn.request(&[b"AUTH", user.as_bytes(), password.as_bytes()])
                        .await?
                }
                None => conn.request(&[b"AUTH", password.as_bytes()]).await?,
            };
            expect_ok("AUTH", check_reply(None, reply)?)?;
        }
        if let Some(db) = config.database {
            let db = db.to_string();
            let reply = conn.request(&[b"SELECT", db.as_bytes()]).await?;
            expect_ok("SELECT", check_reply(None, reply)?)?;
        }

        info!(address = %config.address, database = ?config.database, "connected to store");
        Ok(conn)
    }

    async fn request(&mut self, args: &[&[u8]]) -> StoreResult<Frame> {
        let command = resp::encode_command(args);
        self.in_flight = true;
        self.stream.write_all(&command).await?;
        let frame = self.read_frame().await?;
        self.in_flight = false;
        Ok(frame)
    }

    async fn read_frame(&mut self) -> StoreResult<Frame> {
        loop {
            if let Some((frame, used)) = resp::decode(&self.buffer)? {
                self.buffer.advance(used);
                return Ok(frame);
            }
            self.buffer.reserve(READ_CHUNK);
            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                return Err(StoreError::ConnectionClosed);
            }
        }
    }
}

/// A [`KvClient`] speaking RESP2 over one TCP connection, reconnecting
/// lazily after the connection breaks.
pub struct RespClient {
    config: StoreConfig,
    conn: Mutex<Option<Connection>>,
}

impl RespClient {
    /// Connect to `config.address`, then authenticate and select the
    /// database if configured.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let conn = Connection::open(config).await?;
        Ok(Self {
            config: config.clone(),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// The `host:port` this client is connected to.
    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// Round-trip a PING.
    pub async fn ping(&self) -> StoreResult<()> {
        match self.call("PING", None, &[b"PING"]).await? {
            Frame::Simple(s) if s == "PONG" => Ok(()),
            other => Err(unexpected("PING", &other)),
        }
    }

    async fn call(
        &self,
        command: &'static str,
        key: Option<&str>,
        args: &[&[u8]],
    ) -> StoreResult<Frame> {
        let reply = {
            let mut guard = self.conn.lock().await;
            if guard.as_ref().is_some_and(|conn| conn.in_flight) {
                warn!(address = %self.config.address, "discarding connection with an unfinished reply");
                *guard = None;
            }
            if guard.is_none() {
                debug!(address = %self.config.address, "reconnecting to store");
                *guard = Some(Connection::open(&self.config).await?);
            }
            let Some(conn) = guard.as_mut() else {
                return Err(StoreError::ConnectionClosed);
            };
            match conn.request(args).await {
                Ok(reply) => reply,
                Err(error) => {
                    // The stream position is unknown after a failed exchange.
                    warn!(command, %error, "store connection dropped");
                    *guard = None;
                    return Err(error);
                }
            }
        };
        debug!(command, key = ?key, "store command");
        check_reply(key, reply)
    }
}

impl std::fmt::Debug for RespClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RespClient")
            .field("address", &self.config.address)
            .finish_non_exhaustive()
    }
}

fn check_reply(key: Option<&str>, reply: Frame) -> StoreResult<Frame> {
    match reply {
        Frame::Error(msg) if msg.starts_with("WRONGTYPE") => Err(StoreError::WrongType {
            key: key.unwrap_or_default().to_string(),
        }),
        Frame::Error(msg) => Err(StoreError::Server(msg)),
        other => Ok(other),
    }
}

fn unexpected(command: &'static str, frame: &Frame) -> StoreError {
    StoreError::UnexpectedReply {
        command,
        reply: frame.describe(),
    }
}

// Values are text to the layers above; bytes that are not UTF-8 are
// replaced so they surface as decode failures rather than transport errors.
fn text(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn expect_ok(command: &'static str, frame: Frame) -> StoreResult<()> {
    match frame {
        Frame::Simple(s) if s == "OK" => Ok(()),
        other => Err(unexpected(command, &other)),
    }
}

fn expect_int(command: &'static str, frame: Frame) -> StoreResult<i64> {
    match frame {
        Frame::Integer(n) => Ok(n),
        other => Err(unexpected(command, &other)),
    }
}

fn expect_optional_text(command: &'static str, frame: Frame) -> StoreResult<Option<String>> {
    match frame {
        Frame::Bulk(bytes) => Ok(Some(text(&bytes))),
        Frame::Null => Ok(None),
        other => Err(unexpected(command, &other)),
    }
}

fn expect_text_list(command: &'static str, frame: Frame) -> StoreResult<Vec<String>> {
    match frame {
        Frame::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Frame::Bulk(bytes) => Ok(text(&bytes)),
                other => Err(unexpected(command, &other)),
            })
            .collect(),
        Frame::Null => Ok(Vec::new()),
        other => Err(unexpected(command, &other)),
    }
}

#[async_trait]
impl KvClient for RespClient {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let reply = self.call("GET", Some(key), &[b"GET", key.as_bytes()]).await?;
        expect_optional_text("GET", reply)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let reply = self
            .call("SET", Some(key), &[b"SET", key.as_bytes(), value.as_bytes()])
            .await?;
        expect_ok("SET", reply)
    }

    async fn del(&self, key: &str) -> StoreResult<bool> {
        let reply = self.call("DEL", Some(key), &[b"DEL", key.as_bytes()]).await?;
        Ok(expect_int("DEL", reply)? > 0)
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let reply = self
            .call("SMEMBERS", Some(key), &[b"SMEMBERS", key.as_bytes()])
            .await?;
        expect_text_list("SMEMBERS", reply)
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        let reply = self
            .call("SADD", Some(key), &[b"SADD", key.as_bytes(), member.as_bytes()])
            .await?;
        Ok(expect_int("SADD", reply)? > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> StoreResult<bool> {
        let reply = self
            .call("SREM", Some(key), &[b"SREM", key.as_bytes(), member.as_bytes()])
            .await?;
        Ok(expect_int("SREM", reply)? > 0)
    }

    async fn sismember(&self, key: &str, member: &str) -> StoreResult<bool> {
        let reply = self
            .call(
                "SISMEMBER",
                Some(key),
                &[b"SISMEMBER", key.as_bytes(), member.as_bytes()],
            )
            .await?;
        Ok(expect_int("SISMEMBER", reply)? == 1)
    }

    async fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, String)>> {
        let reply = self
            .call("HGETALL", Some(key), &[b"HGETALL", key.as_bytes()])
            .await?;
        let flat = expect_text_list("HGETALL", reply)?;
        if flat.len() % 2 != 0 {
            return Err(StoreError::UnexpectedReply {
                command: "HGETALL",
                reply: format!("odd number of elements ({})", flat.len()),
            });
        }
        let mut pairs = Vec::with_capacity(flat.len() / 2);
        let mut items = flat.into_iter();
        while let (Some(field), Some(value)) = (items.next(), items.next()) {
            pairs.push((field, value));
        }
        Ok(pairs)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        let reply = self
            .call(
                "HSET",
                Some(key),
                &[b"HSET", key.as_bytes(), field.as_bytes(), value.as_bytes()],
            )
            .await?;
        Ok(expect_int("HSET", reply)? > 0)
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let reply = self
            .call("HGET", Some(key), &[b"HGET", key.as_bytes(), field.as_bytes()])
            .await?;
        expect_optional_text("HGET", reply)
    }

    async fn hdel(&self, key: &str, field: &str) -> StoreResult<bool> {
        let reply = self
            .call("HDEL", Some(key), &[b"HDEL", key.as_bytes(), field.as_bytes()])
            .await?;
        Ok(expect_int("HDEL", reply)? > 0)
    }
}
