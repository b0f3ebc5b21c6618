//! Effect executor: owns the controller state, runs its effects on tokio and
//! feeds completions back as messages.
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use client_logging::{client_debug, client_error, client_info, short_id};
use scrapeqa_core::{update, AppState, AppViewModel, ChannelCommand, Effect, Msg, Notification};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::identity::IdentityStore;
use crate::service::RemoteService;
use crate::socket::{progress_url, run_progress_socket};

/// Presentation surface driven by the runtime.
pub trait UiSink: Send {
    fn render(&mut self, view: &AppViewModel);
    fn notify(&mut self, notification: &Notification);
}

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub api_base_url: String,
    pub progress_path: String,
    /// Period of the stall sweep. Zero disables it.
    pub stall_sweep_interval: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            progress_path: "/ws".to_string(),
            stall_sweep_interval: Duration::from_secs(5),
        }
    }
}

/// Posts messages into a running [`SessionRuntime`].
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    tx: UnboundedSender<Msg>,
}

impl RuntimeHandle {
    /// Returns false once the runtime has stopped.
    pub fn send(&self, msg: Msg) -> bool {
        self.tx.send(msg).is_ok()
    }
}

pub struct SessionRuntime {
    state: AppState,
    service: Arc<dyn RemoteService>,
    identity: Box<dyn IdentityStore>,
    sink: Box<dyn UiSink>,
    options: RuntimeOptions,
    msg_tx: UnboundedSender<Msg>,
    msg_rx: UnboundedReceiver<Msg>,
    socket: Option<(u64, CancellationToken)>,
}

impl SessionRuntime {
    pub fn new(
        state: AppState,
        service: Arc<dyn RemoteService>,
        identity: Box<dyn IdentityStore>,
        sink: Box<dyn UiSink>,
        options: RuntimeOptions,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            state,
            service,
            identity,
            sink,
            options,
            msg_tx,
            msg_rx,
            socket: None,
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            tx: self.msg_tx.clone(),
        }
    }

    /// Processes messages until a shutdown effect, then returns the final state.
    pub async fn run(mut self) -> AppState {
        let sweep = self.spawn_stall_sweep();
        self.sink.render(&self.state.view());

        let identity = self.identity.get();
        if let Some(id) = identity.as_deref() {
            client_info!("restoring session {}", short_id(id));
        }
        let mut running = self.dispatch(Msg::Started { identity });
        while running {
            let Some(msg) = self.msg_rx.recv().await else {
                break;
            };
            running = self.dispatch(msg);
        }

        if let Some(sweep) = sweep {
            sweep.abort();
        }
        if let Some((_, token)) = self.socket.take() {
            token.cancel();
        }
        client_info!("session runtime stopped");
        self.state
    }

    fn dispatch(&mut self, msg: Msg) -> bool {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;

        let mut running = true;
        for effect in effects {
            running &= self.execute(effect);
        }
        if self.state.consume_dirty() {
            self.sink.render(&self.state.view());
        }
        running
    }

    fn execute(&mut self, effect: Effect) -> bool {
        match effect {
            Effect::Scrape {
                request,
                payload,
                session_id,
            } => {
                client_info!("{} scrape of {} url(s)", request.id(), payload.urls.len());
                let service = Arc::clone(&self.service);
                self.spawn_call(async move {
                    let cancel = request.cancel_token().clone();
                    let result = service
                        .scrape(&payload, session_id.as_deref(), &cancel)
                        .await;
                    Msg::ScrapeFinished { request, result }
                });
            }
            Effect::Ask {
                request,
                payload,
                session_id,
            } => {
                client_info!("{} ask", request.id());
                let service = Arc::clone(&self.service);
                self.spawn_call(async move {
                    let cancel = request.cancel_token().clone();
                    let result = service.ask(&payload, session_id.as_deref(), &cancel).await;
                    Msg::AskFinished { request, result }
                });
            }
            Effect::ListUrls {
                request,
                session_id,
            } => {
                client_debug!("{} list urls", request.id());
                let service = Arc::clone(&self.service);
                self.spawn_call(async move {
                    let cancel = request.cancel_token().clone();
                    let result = service.list_urls(session_id.as_deref(), &cancel).await;
                    Msg::UrlsListed { request, result }
                });
            }
            Effect::RemoveUrl {
                request,
                payload,
                session_id,
            } => {
                client_info!("{} remove {}", request.id(), payload.url);
                let service = Arc::clone(&self.service);
                self.spawn_call(async move {
                    let cancel = request.cancel_token().clone();
                    let result = service
                        .remove_url(&payload, session_id.as_deref(), &cancel)
                        .await;
                    Msg::UrlRemoved { request, result }
                });
            }
            Effect::PersistIdentity { session_id } => {
                if let Err(err) = self.identity.set(&session_id) {
                    client_error!("failed to store session identifier: {}", err);
                    self.sink.notify(&Notification::error(format!(
                        "Could not save your session: {err}"
                    )));
                }
            }
            Effect::Channel(command) => self.execute_channel(command),
            Effect::ScheduleProgressHide { run, delay } => {
                self.post_after(delay, Msg::ProgressHideDue { run });
            }
            Effect::Notify(notification) => self.sink.notify(&notification),
            Effect::Shutdown => return false,
        }
        true
    }

    fn execute_channel(&mut self, command: ChannelCommand) {
        match command {
            ChannelCommand::Connect {
                generation,
                session_id,
            } => {
                if let Some((_, previous)) = self.socket.take() {
                    previous.cancel();
                }
                let url = match progress_url(
                    &self.options.api_base_url,
                    &self.options.progress_path,
                    &session_id,
                ) {
                    Ok(url) => url,
                    Err(err) => {
                        client_error!("cannot build progress url: {}", err);
                        let _ = self.msg_tx.send(Msg::ChannelDropped { generation });
                        return;
                    }
                };
                client_debug!("connecting progress channel {} to {}", generation, url);
                let token = CancellationToken::new();
                self.socket = Some((generation, token.clone()));
                tokio::spawn(run_progress_socket(
                    url,
                    generation,
                    token,
                    self.msg_tx.clone(),
                ));
            }
            ChannelCommand::Disconnect { generation } => match self.socket.take() {
                Some((current, token)) if current == generation => token.cancel(),
                other => self.socket = other,
            },
            ChannelCommand::ScheduleReconnect { generation, delay } => {
                client_info!("progress channel {} reconnecting in {:?}", generation, delay);
                self.post_after(delay, Msg::ReconnectDue { generation });
            }
        }
    }

    fn spawn_call<F>(&self, call: F)
    where
        F: Future<Output = Msg> + Send + 'static,
    {
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let msg = call.await;
            let _ = tx.send(msg);
        });
    }

    fn post_after(&self, delay: Duration, msg: Msg) {
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(msg);
        });
    }

    fn spawn_stall_sweep(&self) -> Option<JoinHandle<()>> {
        let period = self.options.stall_sweep_interval;
        if period.is_zero() {
            return None;
        }
        let tx = self.msg_tx.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(Msg::StallCheck { at: Instant::now() }).is_err() {
                    break;
                }
            }
        }))
    }
}
