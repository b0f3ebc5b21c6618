use std::sync::Arc;
use std::time::Duration;

use scrapeqa_client::{
    IdentityStore, MemoryIdentityStore, RemoteService, RuntimeOptions, SessionRuntime, UiSink,
};
use scrapeqa_core::{
    AppState, AppViewModel, AskRequest, AskResponse, ClientError, ControllerSettings, Msg,
    NoticeLevel, Notification, RemoveUrlRequest, RemoveUrlResponse, ScrapeRequest,
    ScrapeResponse, UrlList,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Backend double: scrapes either succeed at once or hang until cancelled.
struct FakeService {
    hang_scrape: bool,
}

#[async_trait::async_trait]
impl RemoteService for FakeService {
    async fn scrape(
        &self,
        request: &ScrapeRequest,
        _session_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ScrapeResponse, ClientError> {
        if self.hang_scrape {
            cancel.cancelled().await;
            return Err(ClientError::Cancelled);
        }
        Ok(ScrapeResponse {
            session_id: Some("u1".to_string()),
            message: format!("Scraped {} URL(s)", request.urls.len()),
        })
    }

    async fn ask(
        &self,
        _request: &AskRequest,
        _session_id: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<AskResponse, ClientError> {
        Ok(AskResponse::default())
    }

    async fn list_urls(
        &self,
        _session_id: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<UrlList, ClientError> {
        Ok(UrlList {
            urls: vec!["https://a.example/".to_string()],
        })
    }

    async fn remove_url(
        &self,
        request: &RemoveUrlRequest,
        _session_id: Option<&str>,
        _cancel: &CancellationToken,
    ) -> Result<RemoveUrlResponse, ClientError> {
        Ok(RemoveUrlResponse {
            message: format!("Removed {}", request.url),
        })
    }
}

#[derive(Debug)]
enum SinkEvent {
    Render(AppViewModel),
    Notify(Notification),
}

struct ForwardingSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl UiSink for ForwardingSink {
    fn render(&mut self, view: &AppViewModel) {
        let _ = self.tx.send(SinkEvent::Render(view.clone()));
    }

    fn notify(&mut self, notification: &Notification) {
        let _ = self.tx.send(SinkEvent::Notify(notification.clone()));
    }
}

async fn next_notice(rx: &mut mpsc::UnboundedReceiver<SinkEvent>) -> Notification {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("notice in time")
            .expect("sink open");
        if let SinkEvent::Notify(notice) = event {
            return notice;
        }
    }
}

fn runtime(
    service: FakeService,
    identity: MemoryIdentityStore,
    state: AppState,
    stall_sweep_interval: Duration,
) -> (SessionRuntime, mpsc::UnboundedReceiver<SinkEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let options = RuntimeOptions {
        // Nothing listens here, so progress connections fail fast.
        api_base_url: "http://127.0.0.1:9".to_string(),
        stall_sweep_interval,
        ..RuntimeOptions::default()
    };
    let runtime = SessionRuntime::new(
        state,
        Arc::new(service),
        Box::new(identity),
        Box::new(ForwardingSink { tx }),
        options,
    );
    (runtime, rx)
}

#[tokio::test]
async fn scrape_persists_identity_and_reports_success() {
    client_logging::initialize_for_tests();
    let identity = MemoryIdentityStore::default();
    let (runtime, mut rx) = runtime(
        FakeService { hang_scrape: false },
        identity.clone(),
        AppState::new(),
        Duration::ZERO,
    );
    let handle = runtime.handle();
    let task = tokio::spawn(runtime.run());

    assert!(handle.send(Msg::ScrapeSubmitted {
        urls: vec!["https://a.example/".to_string()],
        use_enhanced_rendering: false,
    }));
    let notice = next_notice(&mut rx).await;
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.message, "Scraped 1 URL(s)");
    assert_eq!(identity.get().as_deref(), Some("u1"));

    handle.send(Msg::ShutdownRequested);
    let state = task.await.unwrap();
    assert!(state.session().has_scraped_content);
    assert_eq!(state.session().identity.as_deref(), Some("u1"));
    assert!(state.registry().is_empty());
}

#[tokio::test]
async fn restored_identity_loads_url_list() {
    let identity = MemoryIdentityStore::with_value("u9");
    let (runtime, mut rx) = runtime(
        FakeService { hang_scrape: false },
        identity,
        AppState::new(),
        Duration::ZERO,
    );
    let handle = runtime.handle();
    let task = tokio::spawn(runtime.run());

    let notice = next_notice(&mut rx).await;
    assert_eq!(notice.message, "Loaded your existing scraped content");

    handle.send(Msg::ShutdownRequested);
    let state = task.await.unwrap();
    assert_eq!(
        state.session().scraped_urls,
        vec!["https://a.example/".to_string()]
    );
}

#[tokio::test]
async fn cancel_all_aborts_hanging_scrape() {
    let (runtime, mut rx) = runtime(
        FakeService { hang_scrape: true },
        MemoryIdentityStore::default(),
        AppState::new(),
        Duration::ZERO,
    );
    let handle = runtime.handle();
    let task = tokio::spawn(runtime.run());

    handle.send(Msg::ScrapeSubmitted {
        urls: vec!["https://slow.example/".to_string()],
        use_enhanced_rendering: true,
    });
    handle.send(Msg::CancelAllRequested);

    let notice = next_notice(&mut rx).await;
    assert_eq!(notice.message, "Cancelled 1 pending request(s)");

    handle.send(Msg::ShutdownRequested);
    let state = task.await.unwrap();
    assert!(!state.is_busy());
    assert!(!state.session().has_scraped_content);
}

#[tokio::test]
async fn stalled_scrape_gets_one_notice() {
    let settings = ControllerSettings {
        stall_threshold: Duration::from_millis(50),
        ..ControllerSettings::default()
    };
    let (runtime, mut rx) = runtime(
        FakeService { hang_scrape: true },
        MemoryIdentityStore::default(),
        AppState::with_settings(settings),
        Duration::from_millis(20),
    );
    let handle = runtime.handle();
    let task = tokio::spawn(runtime.run());

    handle.send(Msg::ScrapeSubmitted {
        urls: vec!["https://slow.example/".to_string()],
        use_enhanced_rendering: false,
    });

    let notice = next_notice(&mut rx).await;
    assert_eq!(notice.level, NoticeLevel::Info);
    assert!(notice.message.starts_with("Still waiting for scraping"));

    // Further sweeps stay quiet and the request is still pending.
    tokio::time::sleep(Duration::from_millis(120)).await;
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, SinkEvent::Notify(_)), "unexpected {event:?}");
    }

    handle.send(Msg::ShutdownRequested);
    let state = task.await.unwrap();
    assert!(state.registry().is_empty());
}
