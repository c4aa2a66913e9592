use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde_json::json;
use webcheck_core::{
    Channel, CustomTarget, Dispatcher, EndpointRegistry, MessageFormat, Monitor, MonitorConfig,
    PayloadTemplate, Platform, ProbeError, Prober, RefreshOutcome, Target,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Answers each URL from a per-step script; the last entry repeats.
struct ScriptedProber {
    step: Arc<AtomicUsize>,
    script: HashMap<String, Vec<Result<(), ProbeError>>>,
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, url: &str) -> Result<(), ProbeError> {
        let outcomes = self
            .script
            .get(url)
            .unwrap_or_else(|| panic!("ScriptedProber: unexpected URL: {}", url));
        let idx = self.step.load(Ordering::SeqCst).min(outcomes.len() - 1);
        outcomes[idx].clone()
    }
}

fn down(status: u16) -> Result<(), ProbeError> {
    Err(ProbeError::Http { status })
}

fn write_list(file: &Path, names: &[&str], modified: SystemTime) {
    let list: Vec<_> = names
        .iter()
        .map(|n| json!([format!("https://{}.example", n.to_lowercase()), n]))
        .collect();
    std::fs::write(file, json!({ "list": list }).to_string()).unwrap();
    std::fs::File::options()
        .write(true)
        .open(file)
        .unwrap()
        .set_modified(modified)
        .unwrap();
}

fn hook_channel(url: String) -> Channel {
    Channel::new(
        Platform::Custom,
        vec![Target::Custom(CustomTarget {
            url,
            headers: vec![],
            template: PayloadTemplate::resolve(json!({"text": ""}).as_object().unwrap()),
            secret: None,
        })],
    )
    .with_format(MessageFormat::Raw)
}

struct Harness {
    _dir: tempfile::TempDir,
    list: std::path::PathBuf,
    step: Arc<AtomicUsize>,
    monitor: Monitor,
    t0: SystemTime,
}

impl Harness {
    fn new(names: &[&str], script: Vec<(&str, Vec<Result<(), ProbeError>>)>, channels: Vec<Channel>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("url_list.json");
        let t0 = SystemTime::now() - Duration::from_secs(3600);
        write_list(&list, names, t0);

        let step = Arc::new(AtomicUsize::new(0));
        let prober = ScriptedProber {
            step: Arc::clone(&step),
            script: script
                .into_iter()
                .map(|(name, outcomes)| (format!("https://{}.example", name.to_lowercase()), outcomes))
                .collect(),
        };
        let client = Dispatcher::build_client(Duration::from_secs(5)).unwrap();
        let monitor = Monitor::new(
            MonitorConfig::default(),
            EndpointRegistry::load(&list).unwrap(),
            Arc::new(prober),
            Dispatcher::new(channels, client),
        )
        .with_hostname("web-1");

        Self {
            _dir: dir,
            list,
            step,
            monitor,
            t0,
        }
    }

    fn set_step(&self, step: usize) {
        self.step.store(step, Ordering::SeqCst);
    }
}

async fn received_texts(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["text"].as_str().unwrap().to_string()
        })
        .collect()
}

async fn hook_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn unchanged_outcome_sends_nothing() {
    let server = hook_server().await;
    let mut h = Harness::new(
        &["E1", "E2"],
        vec![("E1", vec![Ok(())]), ("E2", vec![down(502)])],
        vec![hook_channel(format!("{}/hook", server.uri()))],
    );

    let first = h.monitor.poll_once().await;
    assert!(first.notified());
    assert_eq!(first.evaluation.bitmap.to_string(), "01");

    for step in 1..4 {
        h.set_step(step);
        let report = h.monitor.poll_once().await;
        assert!(!report.notified());
    }

    assert_eq!(received_texts(&server).await.len(), 1);
}

#[tokio::test]
async fn single_transition_notifies_once_with_only_failing_endpoint() {
    let server = hook_server().await;
    let mut h = Harness::new(
        &["E1", "E2", "E3"],
        vec![
            ("E1", vec![Ok(())]),
            ("E2", vec![Ok(()), down(503)]),
            ("E3", vec![Ok(())]),
        ],
        vec![hook_channel(format!("{}/hook", server.uri()))],
    );

    let first = h.monitor.poll_once().await;
    assert!(!first.notified());
    assert_eq!(h.monitor.tracker().previous().to_string(), "000");

    h.set_step(1);
    let second = h.monitor.poll_once().await;
    assert!(second.notified());
    assert_eq!(second.evaluation.bitmap.to_string(), "010");
    assert_eq!(second.dispatch.unwrap().delivered, 1);

    let texts = received_texts(&server).await;
    assert_eq!(texts.len(), 1);
    assert_eq!(
        texts[0],
        "*web-1* (hosts)\n🔴 *E2:* 503\nmonitoring host(s): ALL - 3, OK - 2, BAD - 1"
    );
    assert!(!texts[0].contains("E1") && !texts[0].contains("E3"));
}

#[tokio::test]
async fn recovery_sends_all_healthy_summary() {
    let server = hook_server().await;
    let mut h = Harness::new(
        &["E1", "E2", "E3"],
        vec![
            ("E1", vec![Ok(())]),
            ("E2", vec![down(500), Ok(())]),
            ("E3", vec![Ok(())]),
        ],
        vec![hook_channel(format!("{}/hook", server.uri()))],
    );

    h.monitor.poll_once().await;
    h.set_step(1);
    let report = h.monitor.poll_once().await;
    assert!(report.notified());

    let texts = received_texts(&server).await;
    assert_eq!(texts.len(), 2);
    assert_eq!(
        texts[1],
        "*web-1* (hosts)\n🟢 monitoring host(s): ALL - 3, OK - 3, BAD - 0"
    );
}

#[tokio::test]
async fn reloaded_list_of_new_size_resets_bitmap() {
    let mut h = Harness::new(
        &["E1", "E2"],
        vec![("E1", vec![Ok(())]), ("E2", vec![down(500)]), ("E3", vec![Ok(())])],
        vec![],
    );

    let first = h.monitor.poll_once().await;
    assert_eq!(first.evaluation.bitmap.to_string(), "01");

    write_list(&h.list, &["E1", "E3", "E1"], h.t0 + Duration::from_secs(60));
    let second = h.monitor.poll_once().await;
    assert_eq!(second.refresh, RefreshOutcome::Reloaded);
    assert_eq!(second.evaluation.previous.to_string(), "000");
    assert_eq!(second.evaluation.bitmap.to_string(), "000");
    assert!(!second.notified());
}

#[tokio::test]
async fn broken_reload_keeps_probing_previous_list() {
    let mut h = Harness::new(
        &["E1", "E2"],
        vec![("E1", vec![Ok(())]), ("E2", vec![Ok(())])],
        vec![],
    );

    std::fs::write(&h.list, "{\"list\": [").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&h.list)
        .unwrap()
        .set_modified(h.t0 + Duration::from_secs(60))
        .unwrap();

    let report = h.monitor.poll_once().await;
    assert_eq!(report.refresh, RefreshOutcome::KeptPrevious);
    assert_eq!(report.evaluation.total, 2);
    assert_eq!(h.monitor.registry().len(), 2);
}

#[tokio::test]
async fn failing_channel_does_not_block_others() {
    let server = hook_server().await;
    let mut h = Harness::new(
        &["E1"],
        vec![("E1", vec![down(404)])],
        vec![
            hook_channel("http://127.0.0.1:1/hook".into()),
            hook_channel(format!("{}/hook", server.uri())),
        ],
    );

    let report = h.monitor.poll_once().await;
    let dispatch = report.dispatch.unwrap();
    assert_eq!(dispatch.delivered, 1);
    assert_eq!(dispatch.failed, 1);
    assert_eq!(received_texts(&server).await.len(), 1);
}

#[tokio::test]
async fn startup_announcement_respects_config() {
    let server = hook_server().await;
    let h = Harness::new(
        &["E1"],
        vec![("E1", vec![Ok(())])],
        vec![hook_channel(format!("{}/hook", server.uri()))],
    );

    let report = h.monitor.announce_startup().await.unwrap();
    assert_eq!(report.delivered, 1);
    let texts = received_texts(&server).await;
    assert!(texts[0].starts_with("*web-1* (hosts)\nhosts monitor:\n- messaging: Custom,"));
}

/// Records when each probe starts and how many run at once.
struct TimedProber {
    delay: Duration,
    starts: Mutex<Vec<tokio::time::Instant>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl TimedProber {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            starts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Prober for TimedProber {
    async fn probe(&self, _url: &str) -> Result<(), ProbeError> {
        self.starts.lock().unwrap().push(tokio::time::Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

fn timed_monitor(prober: Arc<TimedProber>) -> (tempfile::TempDir, Monitor) {
    let dir = tempfile::tempdir().unwrap();
    let list = dir.path().join("url_list.json");
    write_list(&list, &["E1"], SystemTime::now());
    let monitor = Monitor::new(
        MonitorConfig::default().with_poll_minutes(1),
        EndpointRegistry::load(&list).unwrap(),
        prober,
        Dispatcher::new(vec![], reqwest::Client::new()),
    );
    (dir, monitor)
}

#[tokio::test(start_paused = true)]
async fn scheduler_runs_one_cycle_per_interval() {
    let prober = TimedProber::new(Duration::ZERO);
    let (_dir, monitor) = timed_monitor(Arc::clone(&prober));
    let started = tokio::time::Instant::now();

    monitor.run(tokio::time::sleep(Duration::from_secs(210))).await;

    let starts = prober.starts.lock().unwrap().clone();
    let offsets: Vec<u64> = starts.iter().map(|s| (*s - started).as_secs()).collect();
    assert_eq!(offsets, vec![60, 120, 180]);
}

#[tokio::test(start_paused = true)]
async fn overrunning_cycle_is_followed_immediately_without_overlap() {
    let prober = TimedProber::new(Duration::from_secs(90));
    let (_dir, monitor) = timed_monitor(Arc::clone(&prober));
    let started = tokio::time::Instant::now();

    monitor.run(tokio::time::sleep(Duration::from_secs(200))).await;

    let starts = prober.starts.lock().unwrap().clone();
    let offsets: Vec<u64> = starts.iter().map(|s| (*s - started).as_secs()).collect();
    assert_eq!(offsets, vec![60, 150]);
    assert_eq!(prober.max_in_flight.load(Ordering::SeqCst), 1);
}
