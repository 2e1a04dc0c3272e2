//! In-memory gym API for tests
//!
//! Accepts `correct-password` at `/sessions`, rotates tokens at
//! `/refresh-token` (or rejects, when told to), and answers every other path
//! with 200 only if the bearer matches the currently valid access token.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::sync::Semaphore;
use transport::{ExecuteFuture, RequestBody, RequestSpec, Response, Transport, TransportFailure};

pub(crate) const PASSWORD: &str = "correct-password";
pub(crate) const EMAIL: &str = "user@example.com";

pub(crate) struct ScriptedTransport {
    valid_token: Mutex<String>,
    reject_refresh: AtomicBool,
    offline: AtomicBool,
    /// When set, each refresh waits for one permit
    refresh_gate: Mutex<Option<Arc<Semaphore>>>,
    always_unauthorized: Mutex<HashSet<String>>,
    refresh_calls: AtomicUsize,
    unauthorized: AtomicUsize,
    seen: Mutex<Vec<(RequestSpec, Option<String>)>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            valid_token: Mutex::new("at_1".into()),
            reject_refresh: AtomicBool::new(false),
            offline: AtomicBool::new(false),
            refresh_gate: Mutex::new(None),
            always_unauthorized: Mutex::new(HashSet::new()),
            refresh_calls: AtomicUsize::new(0),
            unauthorized: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Make the server forget the current access token.
    pub(crate) fn expire_access_token(&self) {
        *self.valid_token.lock().unwrap() = "expired".into();
    }

    pub(crate) fn reject_refresh(&self) {
        self.reject_refresh.store(true, Ordering::SeqCst);
    }

    pub(crate) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    /// Hold refreshes until permits are added to the returned semaphore.
    pub(crate) fn gate_refresh(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.refresh_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn always_unauthorized(&self, path: &str) {
        self.always_unauthorized.lock().unwrap().insert(path.to_owned());
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn unauthorized_responses(&self) -> usize {
        self.unauthorized.load(Ordering::SeqCst)
    }

    /// Every request received, with the bearer it carried.
    pub(crate) fn seen(&self) -> Vec<(RequestSpec, Option<String>)> {
        self.seen.lock().unwrap().clone()
    }

    /// Bearers sent to `path`, in arrival order.
    pub(crate) fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
        self.seen()
            .into_iter()
            .filter(|(request, _)| request.path == path)
            .map(|(_, bearer)| bearer)
            .collect()
    }

    async fn respond(&self, request: &RequestSpec, bearer: Option<&str>) -> transport::Result<Response> {
        self.seen
            .lock()
            .unwrap()
            .push((request.clone(), bearer.map(str::to_owned)));

        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportFailure::Connect("connection refused".into()));
        }

        match request.path.as_str() {
            "/sessions" => self.sign_in(request),
            "/refresh-token" => self.refresh().await,
            path => {
                let valid = self.valid_token.lock().unwrap().clone();
                let blocked = self.always_unauthorized.lock().unwrap().contains(path);
                if blocked || bearer != Some(valid.as_str()) {
                    self.unauthorized.fetch_add(1, Ordering::SeqCst);
                    return Err(status(401, "token.invalid"));
                }
                Ok(Response::new(200, format!(r#"{{"path":"{path}"}}"#)))
            }
        }
    }

    fn sign_in(&self, request: &RequestSpec) -> transport::Result<Response> {
        let RequestBody::Json(body) = &request.body else {
            return Err(status(400, "Informe o e-mail e a senha."));
        };
        if body["password"] != PASSWORD {
            return Err(status(401, "E-mail e/ou senha incorreta."));
        }
        let token = self.valid_token.lock().unwrap().clone();
        let body = serde_json::json!({
            "user": {"id": 7, "name": "Ana", "email": body["email"], "avatar": null},
            "token": token,
            "refresh_token": "rt_1",
        });
        Ok(Response::new(200, body.to_string()))
    }

    async fn refresh(&self) -> transport::Result<Response> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 2;
        let gate = self.refresh_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(status(401, "refresh token expired"));
        }
        let token = format!("at_{n}");
        *self.valid_token.lock().unwrap() = token.clone();
        let body = serde_json::json!({"token": token, "refresh_token": format!("rt_{n}")});
        Ok(Response::new(200, body.to_string()))
    }
}

impl Transport for ScriptedTransport {
    fn execute<'a>(&'a self, request: &'a RequestSpec, bearer: Option<&'a str>) -> ExecuteFuture<'a> {
        Box::pin(self.respond(request, bearer))
    }

    fn base_url(&self) -> &str {
        "http://gym.test"
    }
}

fn status(status: u16, message: &str) -> TransportFailure {
    TransportFailure::Status {
        status,
        body: Bytes::from(serde_json::json!({"status": "error", "message": message}).to_string()),
    }
}
