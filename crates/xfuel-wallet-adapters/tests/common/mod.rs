#![allow(dead_code)]

use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use serde_json::{json, Value};
use tiny_http::{Method, Response, Server, StatusCode};

use xfuel_wallet_core::{ClockPort, PortError};

pub const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) Chrome/126.0";
pub const START_MS: u64 = 1_760_000_000_000;

pub fn deterministic_account() -> Address {
    "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("deterministic account")
}

pub fn other_account() -> Address {
    "0x2000000000000000000000000000000000000002"
        .parse()
        .expect("other account")
}

pub fn tfuel(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
}

/// Clock shared between the test and the adapter under test.
#[derive(Debug, Clone)]
pub struct TestClock {
    now: Arc<AtomicU64>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self {
            now: Arc::new(AtomicU64::new(START_MS)),
        }
    }
}

impl TestClock {
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl ClockPort for TestClock {
    fn now_ms(&self) -> Result<u64, PortError> {
        Ok(self.now.load(Ordering::SeqCst))
    }
}

pub struct MockServer {
    pub url: String,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub join: thread::JoinHandle<()>,
}

impl MockServer {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

/// Serves up to `max_requests` requests on a background thread. Each request is
/// logged as its JSON-RPC method when the body carries one, else as its path.
pub fn spawn_mock_server<F>(max_requests: usize, route: F) -> MockServer
where
    F: Fn(&Method, &str, &Value) -> (u16, Value) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("start server");
    let url = format!("http://{}", server.server_addr());
    let calls = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&calls);

    let join = thread::spawn(move || {
        for _ in 0..max_requests {
            let mut req = match server.recv_timeout(Duration::from_secs(10)) {
                Ok(Some(r)) => r,
                Ok(None) | Err(_) => break,
            };
            let method = req.method().clone();
            let path = req.url().to_owned();
            let mut raw = String::new();
            let _ = req.as_reader().read_to_string(&mut raw);
            let body: Value = serde_json::from_str(&raw).unwrap_or(Value::Null);
            let label = body
                .get("method")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| path.clone());
            if let Ok(mut g) = log.lock() {
                g.push(label);
            }

            let (code, payload) = route(&method, &path, &body);
            let response =
                Response::from_string(payload.to_string()).with_status_code(StatusCode(code));
            let _ = req.respond(response);
        }
    });

    MockServer { url, calls, join }
}

pub fn rpc_result(result: Value) -> (u16, Value) {
    (200, json!({"jsonrpc": "2.0", "id": 1, "result": result}))
}

pub fn rpc_error(code: i64, message: &str) -> (u16, Value) {
    (
        200,
        json!({"jsonrpc": "2.0", "id": 1, "error": {"code": code, "message": message}}),
    )
}
