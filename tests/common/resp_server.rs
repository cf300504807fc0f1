//! A tiny RESP server over a MemoryStore, enough to exercise the store client.

use bytes::{Buf, Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use webstore::protocol::{RespParser, RespValue};
use webstore::storage::MemoryStore;

/// Handle to a running mock server.
pub struct MockRespServer {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    connections: Arc<AtomicUsize>,
    commands: Arc<AtomicUsize>,
    slow_key: SlowKey,
    task: tokio::task::JoinHandle<()>,
}

/// A key whose GET replies are held back, and for how long.
type SlowKey = Arc<Mutex<Option<(String, Duration)>>>;

#[allow(dead_code)]
impl MockRespServer {
    pub async fn start() -> Self {
        Self::start_with_password(None).await
    }

    /// Requires `AUTH password` before any other command when set.
    pub async fn start_with_password(password: Option<&str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(MemoryStore::new());
        let connections = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(AtomicUsize::new(0));
        let password = password.map(str::to_string);
        let slow_key: SlowKey = Arc::default();

        let task = {
            let store = Arc::clone(&store);
            let connections = Arc::clone(&connections);
            let commands = Arc::clone(&commands);
            let slow_key = Arc::clone(&slow_key);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(
                        stream,
                        Arc::clone(&store),
                        Arc::clone(&commands),
                        Arc::clone(&slow_key),
                        password.clone(),
                    ));
                }
            })
        };

        Self {
            addr,
            store,
            connections,
            commands,
            slow_key,
            task,
        }
    }

    /// Holds back every reply to `GET key` by `delay`.
    pub fn delay_gets_of(&self, key: &str, delay: Duration) {
        *self.slow_key.lock().unwrap() = Some((key.to_string(), delay));
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }

    /// Stops accepting. Already open connections keep running.
    pub fn stop_accepting(&self) {
        self.task.abort();
    }
}

impl Drop for MockRespServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    store: Arc<MemoryStore>,
    commands: Arc<AtomicUsize>,
    slow_key: SlowKey,
    password: Option<String>,
) {
    let mut parser = RespParser::new();
    let mut buffer = BytesMut::with_capacity(4096);
    let mut authenticated = password.is_none();

    loop {
        let command = loop {
            match parser.parse(&buffer) {
                Ok(Some((value, consumed))) => {
                    buffer.advance(consumed);
                    break value;
                }
                Ok(None) => match stream.read_buf(&mut buffer).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                },
                Err(_) => return,
            }
        };
        commands.fetch_add(1, Ordering::SeqCst);

        let args: Vec<Bytes> = match command {
            RespValue::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    RespValue::BulkString(b) => Some(b),
                    _ => None,
                })
                .collect(),
            _ => return,
        };
        let name = args
            .first()
            .map(|n| String::from_utf8_lossy(n).to_ascii_uppercase())
            .unwrap_or_default();
        let key = args.get(1).map(|k| String::from_utf8_lossy(k).into_owned());

        let reply = match (name.as_str(), key) {
            ("AUTH", Some(given)) => {
                if password.as_deref() == Some(given.as_str()) {
                    authenticated = true;
                    RespValue::ok()
                } else {
                    RespValue::error("WRONGPASS invalid username-password pair")
                }
            }
            _ if !authenticated => RespValue::error("NOAUTH Authentication required."),
            ("PING", _) => RespValue::simple_string("PONG"),
            ("GET", Some(key)) => {
                let delay = match &*slow_key.lock().unwrap() {
                    Some((slow, delay)) if *slow == key => Some(*delay),
                    _ => None,
                };
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                match store.get_value(&key) {
                    Some(value) => RespValue::BulkString(value),
                    None => RespValue::Null,
                }
            }
            ("SET", Some(key)) if args.len() >= 3 => {
                let ttl = match (args.get(3), args.get(4)) {
                    (Some(ex), Some(secs)) if ex.eq_ignore_ascii_case(b"EX") => {
                        String::from_utf8_lossy(secs)
                            .parse::<u64>()
                            .ok()
                            .map(Duration::from_secs)
                    }
                    _ => None,
                };
                store.set_value(&key, args[2].clone(), ttl);
                RespValue::ok()
            }
            ("INCR", Some(key)) => match store.incr_value(&key) {
                Ok(n) => RespValue::integer(n),
                Err(e) => RespValue::error(format!("ERR {}", e)),
            },
            _ => RespValue::error(format!("ERR unknown command '{}'", name)),
        };

        if stream.write_all(&reply.serialize()).await.is_err() {
            return;
        }
    }
}
