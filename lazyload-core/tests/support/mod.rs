#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use lazyload_core::{
    FetchRequest, FetchResponse, LoadFailure, Loader, LoaderConfig,
    RecordingSink, Transport, TransportError,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
struct Script {
    status: u16,
    body: String,
    delay: Duration,
}

/// In-memory transport answering from a fixed script. Unknown urls get a
/// 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<FetchRequest>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, body: &str) -> &Self {
        self.script(url, 200, body, Duration::ZERO)
    }

    pub fn serve_after(&self, url: &str, body: &str, delay: Duration) -> &Self {
        self.script(url, 200, body, delay)
    }

    pub fn fail(&self, url: &str, status: u16) -> &Self {
        self.script(url, status, "", Duration::ZERO)
    }

    fn script(&self, url: &str, status: u16, body: &str, delay: Duration) -> &Self {
        self.scripts.lock().insert(
            url.to_string(),
            Script {
                status,
                body: body.to_string(),
                delay,
            },
        );
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }

    pub fn fetches(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }

    pub fn total_fetches(&self) -> usize {
        self.requests.lock().len()
    }

    /// Most fetches that were ever running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(
        &self,
        request: &FetchRequest,
    ) -> Result<FetchResponse, TransportError> {
        self.requests.lock().push(request.clone());
        let script = self.scripts.lock().get(&request.url).cloned();

        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        let response = match script {
            Some(script) => {
                if !script.delay.is_zero() {
                    tokio::time::sleep(script.delay).await;
                }
                FetchResponse {
                    status: script.status,
                    body: script.body,
                }
            }
            None => FetchResponse::status(404),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(response)
    }
}

pub fn loader_with(
    transport: &Arc<ScriptedTransport>,
    config: LoaderConfig,
) -> (Loader, RecordingSink) {
    let sink = RecordingSink::new();
    let loader = Loader::builder(Arc::clone(transport) as Arc<dyn Transport>)
        .config(config)
        .sink(Arc::new(sink.clone()))
        .build()
        .expect("loader should build inside a runtime");
    (loader, sink)
}

pub fn loader(transport: &Arc<ScriptedTransport>) -> (Loader, RecordingSink) {
    loader_with(transport, LoaderConfig::default())
}

pub type Outcome = Result<Vec<String>, LoadFailure>;

/// Collects every outcome delivered to `then` callbacks.
#[derive(Debug)]
pub struct Outcomes {
    tx: mpsc::UnboundedSender<Outcome>,
    rx: mpsc::UnboundedReceiver<Outcome>,
}

impl Outcomes {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn on_success(&self) -> impl FnOnce(&[String]) + Send + 'static {
        let tx = self.tx.clone();
        move |names: &[String]| {
            let _ = tx.send(Ok(names.to_vec()));
        }
    }

    pub fn on_failure(&self) -> impl FnOnce(&LoadFailure) + Send + 'static {
        let tx = self.tx.clone();
        move |failure: &LoadFailure| {
            let _ = tx.send(Err(failure.clone()));
        }
    }

    pub async fn next(&mut self) -> Outcome {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("chain should settle")
            .expect("outcome channel open")
    }

    /// Nothing else was delivered so far.
    pub fn assert_drained(&mut self) {
        assert!(
            self.rx.try_recv().is_err(),
            "a chain settled more than once"
        );
    }
}

/// Test logging; honours `RUST_LOG`.
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("lazyload_core=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| name.to_string()).collect()
}
