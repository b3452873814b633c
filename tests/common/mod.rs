//! Shared mock backends for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use guildbot::config::BotConfig;

#[derive(Debug, Clone)]
enum Entry {
    Str(String),
    Set(BTreeSet<String>),
}

#[derive(Default)]
struct StoreData {
    entries: HashMap<String, Entry>,
    commands: Vec<Vec<String>>,
    fail: bool,
}

/// In-memory key-value store speaking RESP over TCP.
#[derive(Clone)]
pub struct MockStore {
    pub addr: SocketAddr,
    data: Arc<Mutex<StoreData>>,
}

impl MockStore {
    pub async fn start() -> Self {
        Self::start_with(false).await
    }

    /// A store that answers every command except PING with an error reply.
    pub async fn start_failing() -> Self {
        Self::start_with(true).await
    }

    async fn start_with(fail: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let data = Arc::new(Mutex::new(StoreData {
            fail,
            ..StoreData::default()
        }));

        let shared = data.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let shared = shared.clone();
                tokio::spawn(async move {
                    let _ = serve_store(socket, shared).await;
                });
            }
        });

        Self { addr, data }
    }

    /// Every command received so far, as upper-cased name plus arguments.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.data.lock().unwrap().commands.clone()
    }

    pub fn members(&self, key: &str) -> BTreeSet<String> {
        match self.data.lock().unwrap().entries.get(key) {
            Some(Entry::Set(set)) => set.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub fn value(&self, key: &str) -> Option<String> {
        match self.data.lock().unwrap().entries.get(key) {
            Some(Entry::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn seed_set(&self, key: &str, members: &[&str]) {
        let set = members.iter().map(|m| m.to_string()).collect();
        self.data.lock().unwrap().entries.insert(key.to_string(), Entry::Set(set));
    }

    pub fn seed_value(&self, key: &str, value: &str) {
        self.data
            .lock()
            .unwrap()
            .entries
            .insert(key.to_string(), Entry::Str(value.to_string()));
    }
}

async fn serve_store(socket: TcpStream, data: Arc<Mutex<StoreData>>) -> std::io::Result<()> {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    loop {
        let Some(args) = read_command(&mut reader).await? else {
            return Ok(());
        };
        let reply = {
            let mut data = data.lock().unwrap();
            data.commands.push(args.clone());
            execute(&mut data, &args)
        };
        write.write_all(reply.as_bytes()).await?;
    }
}

async fn read_command<R>(reader: &mut R) -> std::io::Result<Option<Vec<String>>>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let count: usize = line.trim_end().trim_start_matches('*').parse().unwrap_or(0);

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await?;
        let len: usize = line.trim_end().trim_start_matches('$').parse().unwrap_or(0);
        let mut buf = vec![0u8; len + 2];
        reader.read_exact(&mut buf).await?;
        buf.truncate(len);
        args.push(String::from_utf8_lossy(&buf).into_owned());
    }
    if let Some(name) = args.first_mut() {
        *name = name.to_uppercase();
    }
    Ok(Some(args))
}

fn execute(data: &mut StoreData, args: &[String]) -> String {
    let Some(name) = args.first() else {
        return "-ERR empty command\r\n".into();
    };
    if name == "PING" {
        return "+PONG\r\n".into();
    }
    if data.fail {
        return "-ERR injected failure\r\n".into();
    }

    let key = args.get(1).cloned().unwrap_or_default();
    let rest = &args[2.min(args.len())..];
    match name.as_str() {
        "DEL" => {
            let removed = data.entries.remove(&key).is_some() as i64;
            format!(":{removed}\r\n")
        }
        "SADD" | "SREM" => {
            let entry = data
                .entries
                .entry(key)
                .or_insert_with(|| Entry::Set(BTreeSet::new()));
            let Entry::Set(set) = entry else {
                return "-WRONGTYPE\r\n".into();
            };
            let changed = rest
                .iter()
                .filter(|m| {
                    if name == "SADD" {
                        set.insert(m.to_string())
                    } else {
                        set.remove(m.as_str())
                    }
                })
                .count();
            format!(":{changed}\r\n")
        }
        "SCARD" => match data.entries.get(&key) {
            Some(Entry::Set(set)) => format!(":{}\r\n", set.len()),
            _ => ":0\r\n".into(),
        },
        "INCR" => {
            let current = match data.entries.get(&key) {
                Some(Entry::Str(s)) => s.parse::<i64>().unwrap_or(0),
                _ => 0,
            };
            data.entries.insert(key, Entry::Str((current + 1).to_string()));
            format!(":{}\r\n", current + 1)
        }
        "GET" => match data.entries.get(&key) {
            Some(Entry::Str(s)) => format!("${}\r\n{}\r\n", s.len(), s),
            _ => "$-1\r\n".into(),
        },
        "SET" => {
            let value = rest.first().cloned().unwrap_or_default();
            data.entries.insert(key, Entry::Str(value));
            "+OK\r\n".into()
        }
        other => format!("-ERR unknown command '{other}'\r\n"),
    }
}

/// Messages posted through the mock REST API, as (channel id, content).
pub type SentMessages = Arc<Mutex<Vec<(String, String)>>>;

/// Mock chat REST API. Returns the API base URL and the sent-message log.
pub async fn start_mock_api(guilds: &[(&str, &str)]) -> (String, SentMessages) {
    let guilds: Vec<Value> = guilds
        .iter()
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect();
    let sent: SentMessages = Arc::default();

    let router = Router::new()
        .route(
            "/api/users/@me/guilds",
            get(move || {
                let guilds = guilds.clone();
                async move { Json(guilds) }
            }),
        )
        .route("/api/channels/{channel_id}/messages", post(record_message))
        .with_state(sent.clone());

    (serve(router).await, sent)
}

async fn record_message(
    State(sent): State<SentMessages>,
    Path(channel_id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let content = body["content"].as_str().unwrap_or_default().to_string();
    sent.lock().unwrap().push((channel_id, content));
    Json(json!({ "id": "1" }))
}

/// Mock REST API that fails every request with `status`.
pub async fn start_failing_api(status: StatusCode) -> String {
    let router = Router::new().fallback(move || async move { status });
    serve(router).await
}

/// Serve `router` on an ephemeral port and return its base URL with `/api`.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}/api")
}

/// A free local port, released before returning.
pub async fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Configuration pointing at the mocks, with fast retries.
pub fn test_config(store: SocketAddr, api_base: &str) -> BotConfig {
    let mut config = BotConfig::default();
    config.bot.token = "test-token".into();
    config.bot.api_base = api_base.to_string();
    config.bot.max_rest_retries = 0;
    config.store.address = store.to_string();
    config.store.warm_connections = 0;
    config.store.connect_timeout_secs = 1;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 50;
    config
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}
