//! In-memory adapters for tests.
//!
//! Each double records what the application asked of it so tests can assert on
//! side effects (requests issued, notifications shown, consent order).

use crate::domain::{
    Accuracy, Capability, DomainError, EndpointConfig, LocationPayload, PermissionStatus, Reading,
    StreamConfig,
};
use crate::ports::{
    ConsentPort, DeliveryTransport, FixSender, LocationProvider, NotifierPort, SettingsPort,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    /// Body exactly as it would go over the wire.
    pub body: String,
}

/// Transport double. Replies from a script, then falls back to `200`.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    script: Mutex<VecDeque<Result<u16, DomainError>>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies in order; once exhausted every request gets `200`.
    pub fn with_script(script: Vec<Result<u16, DomainError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// Every request fails with a transport error carrying `reason`.
    pub fn failing(reason: &str, times: usize) -> Self {
        Self::with_script(vec![Err(DomainError::Transport(reason.to_string())); times])
    }

    /// Hold each request for `delay` before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl DeliveryTransport for MockTransport {
    async fn post_json(&self, url: &str, payload: &LocationPayload) -> Result<u16, DomainError> {
        let body =
            serde_json::to_string(payload).map_err(|e| DomainError::Transport(e.to_string()))?;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                url: url.to_string(),
                body,
            });
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or(Ok(200))
    }
}

/// Positioning double. Single fixes come from a settable result; background fixes are
/// pushed by the test through [`ScriptedLocationProvider::push`].
pub struct ScriptedLocationProvider {
    current: Mutex<Result<Reading, DomainError>>,
    tasks: Mutex<HashMap<String, FixSender>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ScriptedLocationProvider {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Err(DomainError::PositionUnavailable(
                "no fix scripted".to_string(),
            ))),
            tasks: Mutex::new(HashMap::new()),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn with_fix(reading: Reading) -> Self {
        let provider = Self::new();
        provider.set_current(Ok(reading));
        provider
    }

    pub fn set_current(&self, result: Result<Reading, DomainError>) {
        if let Ok(mut current) = self.current.lock() {
            *current = result;
        }
    }

    /// Push a raw fix into the named background task. Returns false when not registered.
    pub async fn push(&self, task_name: &str, fix: Result<Reading, DomainError>) -> bool {
        let tx = self
            .tasks
            .lock()
            .ok()
            .and_then(|t| t.get(task_name).cloned());
        match tx {
            Some(tx) => tx.send(fix).await.is_ok(),
            None => false,
        }
    }

    /// Drop the registration as if the platform revoked it.
    pub fn revoke(&self, task_name: &str) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.remove(task_name);
        }
    }

    pub fn is_registered(&self, task_name: &str) -> bool {
        self.tasks
            .lock()
            .map(|t| t.contains_key(task_name))
            .unwrap_or(false)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedLocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LocationProvider for ScriptedLocationProvider {
    async fn current_fix(&self, _accuracy: Accuracy) -> Result<Reading, DomainError> {
        self.current
            .lock()
            .map_err(|e| DomainError::PositionUnavailable(e.to_string()))?
            .clone()
    }

    async fn start_updates(
        &self,
        task_name: &str,
        _config: StreamConfig,
        tx: FixSender,
    ) -> Result<(), DomainError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.insert(task_name.to_string(), tx);
        }
        Ok(())
    }

    async fn stop_updates(&self, task_name: &str) -> Result<(), DomainError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.revoke(task_name);
        Ok(())
    }
}

/// Notifier double. Records `(title, body)` pairs; can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.shown().into_iter().map(|(_, body)| body).collect()
    }
}

#[async_trait::async_trait]
impl NotifierPort for RecordingNotifier {
    async fn schedule(&self, title: &str, body: &str) -> Result<(), DomainError> {
        if self.fail {
            return Err(DomainError::Notification("notifier offline".to_string()));
        }
        if let Ok(mut shown) = self.shown.lock() {
            shown.push((title.to_string(), body.to_string()));
        }
        Ok(())
    }
}

/// Consent double. Answers per capability (default Granted) and records the ask order.
#[derive(Default)]
pub struct ScriptedConsent {
    answers: HashMap<Capability, Result<PermissionStatus, DomainError>>,
    asked: Mutex<Vec<Capability>>,
}

impl ScriptedConsent {
    pub fn grant_all() -> Self {
        Self::default()
    }

    pub fn answer(mut self, capability: Capability, answer: Result<PermissionStatus, DomainError>) -> Self {
        self.answers.insert(capability, answer);
        self
    }

    pub fn deny(self, capability: Capability) -> Self {
        self.answer(capability, Ok(PermissionStatus::Denied))
    }

    pub fn asked(&self) -> Vec<Capability> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ConsentPort for ScriptedConsent {
    async fn request(&self, capability: Capability) -> Result<PermissionStatus, DomainError> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(capability);
        }
        self.answers
            .get(&capability)
            .cloned()
            .unwrap_or(Ok(PermissionStatus::Granted))
    }
}

/// Settings double held in memory.
#[derive(Default)]
pub struct MemorySettings {
    endpoint: Mutex<Option<EndpointConfig>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> Option<EndpointConfig> {
        self.endpoint.lock().ok().and_then(|e| e.clone())
    }
}

#[async_trait::async_trait]
impl SettingsPort for MemorySettings {
    async fn load_endpoint(&self) -> Result<Option<EndpointConfig>, DomainError> {
        Ok(self.stored())
    }

    async fn save_endpoint(&self, endpoint: &EndpointConfig) -> Result<(), DomainError> {
        let mut stored = self
            .endpoint
            .lock()
            .map_err(|e| DomainError::Settings(e.to_string()))?;
        *stored = Some(endpoint.clone());
        Ok(())
    }
}
