//! A scripted RESP server backed by [`InMemoryKvClient`], for exercising
//! [`RespClient`](crate::RespClient) and the layers above it over a real
//! socket.
//!
//! Enabled for this crate's tests and, for other crates, by the `test-util`
//! feature.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryKvClient;
use crate::resp::{self, Frame};
use crate::traits::KvClient;

/// How the scripted server misbehaves.
#[derive(Clone, Debug, Default)]
pub struct ServerOptions {
    /// Required AUTH password, if any.
    pub password: Option<String>,
    /// Replies to commands on this key are held back for the duration.
    pub slow_key: Option<(String, Duration)>,
    /// Close the first accepted connection after it sends a command,
    /// without replying.
    pub drop_first: bool,
}

/// A running scripted server.
#[derive(Debug)]
pub struct TestServer {
    pub address: String,
    pub store: Arc<InMemoryKvClient>,
    accepted: Arc<AtomicUsize>,
}

impl TestServer {
    /// Serve with default options on an ephemeral local port.
    pub async fn spawn() -> Self {
        Self::spawn_with(ServerOptions::default()).await
    }

    /// Serve with `options` on an ephemeral local port. Every accepted
    /// connection is served against the same backing store.
    pub async fn spawn_with(options: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let store = Arc::new(InMemoryKvClient::new());
        let accepted = Arc::new(AtomicUsize::new(0));

        let backing = Arc::clone(&store);
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let nth = counter.fetch_add(1, Ordering::SeqCst);
                let backing = Arc::clone(&backing);
                let options = options.clone();
                tokio::spawn(async move {
                    if nth == 0 && options.drop_first {
                        drop_after_first_command(socket).await;
                    } else {
                        serve(socket, &backing, &options).await;
                    }
                });
            }
        });

        Self {
            address,
            store,
            accepted,
        }
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

async fn drop_after_first_command(mut socket: TcpStream) {
    let mut buf = BytesMut::new();
    let _ = socket.read_buf(&mut buf).await;
}

async fn serve(mut socket: TcpStream, store: &InMemoryKvClient, options: &ServerOptions) {
    let mut buf = BytesMut::new();
    let mut authenticated = options.password.is_none();
    loop {
        while let Some((frame, used)) = resp::decode(&buf).unwrap() {
            buf.advance(used);
            let Frame::Array(items) = frame else {
                panic!("command must be an array")
            };
            let args: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Frame::Bulk(b) => String::from_utf8_lossy(b).into_owned(),
                    other => panic!("unexpected argument {other:?}"),
                })
                .collect();
            if let Some((key, delay)) = &options.slow_key {
                if args.get(1) == Some(key) {
                    tokio::time::sleep(*delay).await;
                }
            }
            let is_auth = args.first().is_some_and(|c| c.eq_ignore_ascii_case("AUTH"));
            let reply = if !authenticated && !is_auth {
                Frame::Error("NOAUTH Authentication required.".into())
            } else {
                dispatch(store, options.password.as_deref(), &args).await
            };
            if is_auth && reply == Frame::Simple("OK".into()) {
                authenticated = true;
            }
            let mut out = BytesMut::new();
            encode_frame(&reply, &mut out);
            if socket.write_all(&out).await.is_err() {
                return;
            }
        }
        match socket.read_buf(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// Encode a reply frame the way a server writes it.
pub fn encode_frame(frame: &Frame, out: &mut BytesMut) {
    match frame {
        Frame::Simple(s) => out.put_slice(format!("+{s}\r\n").as_bytes()),
        Frame::Error(e) => out.put_slice(format!("-{e}\r\n").as_bytes()),
        Frame::Integer(n) => out.put_slice(format!(":{n}\r\n").as_bytes()),
        Frame::Bulk(b) => {
            out.put_slice(format!("${}\r\n", b.len()).as_bytes());
            out.put_slice(b);
            out.put_slice(b"\r\n");
        }
        Frame::Null => out.put_slice(b"$-1\r\n"),
        Frame::Array(items) => {
            out.put_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                encode_frame(item, out);
            }
        }
    }
}

fn bulk(s: &str) -> Frame {
    Frame::Bulk(Bytes::copy_from_slice(s.as_bytes()))
}

fn flag(b: bool) -> Frame {
    Frame::Integer(b as i64)
}

fn store_reply<T>(result: StoreResult<T>, ok: impl FnOnce(T) -> Frame) -> Frame {
    match result {
        Ok(v) => ok(v),
        Err(StoreError::WrongType { .. }) => Frame::Error(
            "WRONGTYPE Operation against a key holding the wrong kind of value".into(),
        ),
        Err(e) => Frame::Error(format!("ERR {e}")),
    }
}

async fn dispatch(store: &InMemoryKvClient, password: Option<&str>, args: &[String]) -> Frame {
    let a = |i: usize| args.get(i).map(String::as_str).unwrap_or_default();
    match a(0).to_ascii_uppercase().as_str() {
        "PING" => Frame::Simple("PONG".into()),
        "AUTH" => {
            if args.last().map(String::as_str) == password {
                Frame::Simple("OK".into())
            } else {
                Frame::Error("WRONGPASS invalid username-password pair".into())
            }
        }
        "SELECT" => Frame::Simple("OK".into()),
        "GET" => store_reply(store.get(a(1)).await, |v| v.as_deref().map_or(Frame::Null, bulk)),
        "SET" => store_reply(store.set(a(1), a(2)).await, |_| Frame::Simple("OK".into())),
        "DEL" => store_reply(store.del(a(1)).await, flag),
        "SMEMBERS" => store_reply(store.smembers(a(1)).await, |v| {
            Frame::Array(v.iter().map(|m| bulk(m)).collect())
        }),
        "SADD" => store_reply(store.sadd(a(1), a(2)).await, flag),
        "SREM" => store_reply(store.srem(a(1), a(2)).await, flag),
        "SISMEMBER" => store_reply(store.sismember(a(1), a(2)).await, flag),
        "HGETALL" => store_reply(store.hgetall(a(1)).await, |pairs| {
            Frame::Array(pairs.iter().flat_map(|(f, v)| [bulk(f), bulk(v)]).collect())
        }),
        "HSET" => store_reply(store.hset(a(1), a(2), a(3)).await, flag),
        "HGET" => store_reply(store.hget(a(1), a(2)).await, |v| {
            v.as_deref().map_or(Frame::Null, bulk)
        }),
        "HDEL" => store_reply(store.hdel(a(1), a(2)).await, flag),
        other => Frame::Error(format!("ERR unknown command '{other}'")),
    }
}
