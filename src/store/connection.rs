//! Key-value store client connection.
//!
//! Speaks the RESP request/reply format: commands go out as arrays of bulk
//! strings, replies come back as simple strings, errors, integers, bulk
//! strings or arrays.

use std::io;
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};

use crate::config::Transport;
use crate::store::pool::{DialFn, PoolConnection};

/// Largest bulk string the store may send.
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Any bidirectional byte stream the store can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Errors returned by store commands.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store IO error: {0}")]
    Io(#[from] io::Error),

    #[error("store protocol error: {0}")]
    Protocol(String),

    #[error("store error reply: {0}")]
    Server(String),

    #[error("unexpected reply to {command}: {reply:?}")]
    UnexpectedReply { command: &'static str, reply: Reply },
}

/// A decoded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<Reply>>),
}

/// Encode a command as a RESP array of bulk strings.
pub fn encode_command<S: AsRef<[u8]>>(args: &[S]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        let arg = arg.as_ref();
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// A single connection to the store.
pub struct StoreConnection {
    stream: BufStream<Box<dyn AsyncStream>>,
    broken: bool,
}

impl StoreConnection {
    pub fn new(stream: Box<dyn AsyncStream>) -> Self {
        Self {
            stream: BufStream::new(stream),
            broken: false,
        }
    }

    /// Send one command and read its reply.
    ///
    /// IO and protocol failures mark the connection broken; error replies
    /// from the store do not.
    pub async fn command<S: AsRef<[u8]>>(&mut self, args: &[S]) -> Result<Reply, StoreError> {
        let result = self.round_trip(args).await;
        if matches!(result, Err(StoreError::Io(_)) | Err(StoreError::Protocol(_))) {
            self.broken = true;
        }
        result
    }

    async fn round_trip<S: AsRef<[u8]>>(&mut self, args: &[S]) -> Result<Reply, StoreError> {
        self.stream.write_all(&encode_command(args)).await?;
        self.stream.flush().await?;
        self.read_reply().await
    }

    fn read_reply(&mut self) -> BoxFuture<'_, Result<Reply, StoreError>> {
        Box::pin(async move {
            let line = self.read_line().await?;
            let rest = line
                .get(1..)
                .ok_or_else(|| StoreError::Protocol("malformed reply line".into()))?;
            match line.as_bytes()[0] {
                b'+' => Ok(Reply::Simple(rest.to_string())),
                b'-' => Err(StoreError::Server(rest.to_string())),
                b':' => Ok(Reply::Integer(parse_int(rest)?)),
                b'$' => {
                    let len = parse_int(rest)?;
                    if len < 0 {
                        return Ok(Reply::Bulk(None));
                    }
                    if len > MAX_BULK_LEN {
                        return Err(StoreError::Protocol(format!("bulk length {len} exceeds limit")));
                    }
                    let mut buf = vec![0u8; len as usize + 2];
                    self.stream.read_exact(&mut buf).await?;
                    if !buf.ends_with(b"\r\n") {
                        return Err(StoreError::Protocol("bulk string missing terminator".into()));
                    }
                    buf.truncate(len as usize);
                    Ok(Reply::Bulk(Some(buf)))
                }
                b'*' => {
                    let len = parse_int(rest)?;
                    if len < 0 {
                        return Ok(Reply::Array(None));
                    }
                    // Error elements are drained with the rest so the stream stays in sync.
                    let mut items = Vec::with_capacity(len.min(64) as usize);
                    let mut failed = None;
                    for _ in 0..len {
                        match self.read_reply().await {
                            Ok(item) => items.push(item),
                            Err(StoreError::Server(msg)) => {
                                failed.get_or_insert(msg);
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    match failed {
                        Some(msg) => Err(StoreError::Server(msg)),
                        None => Ok(Reply::Array(Some(items))),
                    }
                }
                other => Err(StoreError::Protocol(format!(
                    "unknown reply type '{}'",
                    other.escape_ascii()
                ))),
            }
        })
    }

    async fn read_line(&mut self) -> Result<String, StoreError> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "store closed connection").into());
        }
        if !buf.ends_with(b"\r\n") || buf.len() < 3 {
            return Err(StoreError::Protocol("malformed reply line".into()));
        }
        buf.truncate(buf.len() - 2);
        String::from_utf8(buf).map_err(|_| StoreError::Protocol("reply line is not UTF-8".into()))
    }

    pub async fn ping(&mut self) -> Result<(), StoreError> {
        match self.command(&["PING"]).await? {
            Reply::Simple(s) if s == "PONG" => Ok(()),
            reply => Err(StoreError::UnexpectedReply { command: "PING", reply }),
        }
    }

    pub async fn del(&mut self, key: &str) -> Result<i64, StoreError> {
        let reply = self.command(&["DEL", key]).await?;
        expect_integer("DEL", reply)
    }

    /// Add members to a set, returning how many were new.
    pub async fn sadd<S: AsRef<str>>(&mut self, key: &str, members: &[S]) -> Result<i64, StoreError> {
        let mut args = Vec::with_capacity(members.len() + 2);
        args.push("SADD");
        args.push(key);
        args.extend(members.iter().map(|m| m.as_ref()));
        let reply = self.command(&args).await?;
        expect_integer("SADD", reply)
    }

    /// Remove members from a set, returning how many were present.
    pub async fn srem<S: AsRef<str>>(&mut self, key: &str, members: &[S]) -> Result<i64, StoreError> {
        let mut args = Vec::with_capacity(members.len() + 2);
        args.push("SREM");
        args.push(key);
        args.extend(members.iter().map(|m| m.as_ref()));
        let reply = self.command(&args).await?;
        expect_integer("SREM", reply)
    }

    pub async fn scard(&mut self, key: &str) -> Result<i64, StoreError> {
        let reply = self.command(&["SCARD", key]).await?;
        expect_integer("SCARD", reply)
    }

    pub async fn incr(&mut self, key: &str) -> Result<i64, StoreError> {
        let reply = self.command(&["INCR", key]).await?;
        expect_integer("INCR", reply)
    }

    pub async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        match self.command(&["GET", key]).await? {
            Reply::Bulk(None) => Ok(None),
            Reply::Bulk(Some(bytes)) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StoreError::Protocol("GET value is not UTF-8".into())),
            reply => Err(StoreError::UnexpectedReply { command: "GET", reply }),
        }
    }

    pub async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        match self.command(&["SET", key, value]).await? {
            Reply::Simple(_) => Ok(()),
            reply => Err(StoreError::UnexpectedReply { command: "SET", reply }),
        }
    }
}

fn parse_int(s: &str) -> Result<i64, StoreError> {
    s.parse()
        .map_err(|_| StoreError::Protocol(format!("invalid integer '{s}'")))
}

fn expect_integer(command: &'static str, reply: Reply) -> Result<i64, StoreError> {
    match reply {
        Reply::Integer(n) => Ok(n),
        reply => Err(StoreError::UnexpectedReply { command, reply }),
    }
}

impl PoolConnection for StoreConnection {
    fn is_broken(&self) -> bool {
        self.broken
    }

    fn close(mut self) -> BoxFuture<'static, io::Result<()>> {
        Box::pin(async move { self.stream.shutdown().await })
    }
}

/// Open one connection to the store.
pub async fn dial(transport: Transport, address: &str, timeout: Duration) -> io::Result<StoreConnection> {
    let connect = async {
        let stream: Box<dyn AsyncStream> = match transport {
            Transport::Tcp => {
                let stream = tokio::net::TcpStream::connect(address).await?;
                stream.set_nodelay(true)?;
                Box::new(stream)
            }
            #[cfg(unix)]
            Transport::Unix => Box::new(tokio::net::UnixStream::connect(address).await?),
            #[cfg(not(unix))]
            Transport::Unix => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "unix sockets are not supported on this platform",
                ))
            }
        };
        Ok::<_, io::Error>(StoreConnection::new(stream))
    };

    tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, format!("dial {address} timed out")))?
}

/// Dial function for [`crate::store::ConnectionPool`].
pub fn dialer(timeout: Duration) -> DialFn<StoreConnection> {
    std::sync::Arc::new(move |transport: Transport, address: String| -> BoxFuture<'static, io::Result<StoreConnection>> {
        Box::pin(async move { dial(transport, &address, timeout).await })
    })
}
