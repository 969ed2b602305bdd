use async_trait::async_trait;
use parley::assistant::ImageAttachment;
use parley::config::AssistantConfig;
use parley::relay::{Completer, CompletionRequest, RelaySettings, RelayState, SledSessionLog};
use parley::session::{SessionPersistence, SqliteKeyValueStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Smallest byte string detected as PNG
#[allow(dead_code)]
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

#[allow(dead_code)]
pub fn create_temp_persistence() -> (SessionPersistence, Arc<SqliteKeyValueStore>, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store = Arc::new(
        SqliteKeyValueStore::new_with_path(tmp.path().join("local.db"))
            .expect("failed to create sqlite store"),
    );
    let persistence = SessionPersistence::new(store.clone());
    (persistence, store, tmp)
}

#[allow(dead_code)]
pub fn png_attachment() -> ImageAttachment {
    ImageAttachment::from_bytes("cat.png", PNG_BYTES.to_vec()).expect("valid png header")
}

#[allow(dead_code)]
pub fn assistant_config(base_url: &str) -> AssistantConfig {
    AssistantConfig {
        base_url: base_url.to_string(),
        timeout_seconds: 5,
        ..Default::default()
    }
}

/// Completion backend returning canned replies and recording requests
#[allow(dead_code)]
#[derive(Clone)]
pub struct FakeCompleter {
    reply: Arc<Mutex<Result<String, String>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Option<Duration>,
}

#[allow(dead_code)]
impl FakeCompleter {
    fn with_reply(reply: Result<String, String>) -> Self {
        Self {
            reply: Arc::new(Mutex::new(reply)),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Wait this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn replying(reply: &str) -> Self {
        Self::with_reply(Ok(reply.to_string()))
    }

    pub fn failing(error: &str) -> Self {
        Self::with_reply(Err(error.to_string()))
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completer for FakeCompleter {
    async fn complete(&self, request: &CompletionRequest) -> parley::Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &*self.reply.lock().unwrap() {
            Ok(reply) => Ok(reply.clone()),
            Err(error) => Err(anyhow::anyhow!(error.clone())),
        }
    }
}

#[allow(dead_code)]
pub fn relay_settings() -> RelaySettings {
    RelaySettings {
        text_model: "text-model".to_string(),
        vision_model: "vision-model".to_string(),
        temperature: 0.7,
        max_tokens: 500,
    }
}

#[allow(dead_code)]
pub fn relay_state(completer: FakeCompleter) -> (RelayState, Arc<SledSessionLog>) {
    let log = Arc::new(SledSessionLog::temporary().expect("temporary sled log"));
    let state = RelayState::new(log.clone(), Arc::new(completer), relay_settings());
    (state, log)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    std::fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
