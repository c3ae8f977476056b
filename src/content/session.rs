use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use log::{debug, info, warn};
use tokio::{sync::watch, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    error::CoreError,
    history::HistoryStore,
    models::{HealingContent, HistoryLogEntry, Mood},
    settings::Settings,
    subscription::lock,
};

use super::{
    copy::LoadingCopyProvider, generator::ContentGenerator, loading::LoadingMessageCycle,
    state::SessionState,
};

/// Scoped resources of the request in flight. Every transition holds this
/// lock, which also serializes updates to the published state.
struct Resources {
    loading: Option<LoadingMessageCycle>,
    cancel: CancellationToken,
}

/// Drives mood selection, history logging and content generation.
///
/// Requests never queue: a new `select` or `refresh` supersedes the one in
/// flight, and the superseded outcome is dropped when it arrives.
#[derive(Clone)]
pub struct ContentSession {
    tx: Arc<watch::Sender<SessionState>>,
    resources: Arc<Mutex<Resources>>,
    generator: Arc<dyn ContentGenerator>,
    history: Arc<dyn HistoryStore>,
    copy: Arc<dyn LoadingCopyProvider>,
    loading_interval: Duration,
    fallback_error: Arc<str>,
}

impl ContentSession {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        history: Arc<dyn HistoryStore>,
        copy: Arc<dyn LoadingCopyProvider>,
        settings: &Settings,
    ) -> Self {
        let (tx, _rx) = watch::channel(SessionState::new());
        Self {
            tx: Arc::new(tx),
            resources: Arc::new(Mutex::new(Resources {
                loading: None,
                cancel: CancellationToken::new(),
            })),
            generator,
            history,
            copy,
            loading_interval: settings.loading_interval(),
            fallback_error: Arc::from(settings.fallback_error_message.as_str()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.resources)
            .loading
            .as_ref()
            .map(LoadingMessageCycle::is_running)
            .unwrap_or(false)
    }

    /// Log the selection, then start generating content for `mood`.
    ///
    /// The history entry is written before the request is issued and is kept
    /// whatever the outcome. Must be called inside a Tokio runtime.
    pub fn select(&self, mood: Mood) -> HistoryLogEntry {
        let mut resources = lock(&self.resources);
        let entry = self.history.log_selection(mood);
        info!("Mood {mood} selected (history log {})", entry.id);
        self.start_request(&mut resources, mood, entry.id.clone(), false);
        entry
    }

    /// Generate again for the current mood, reusing its history entry.
    pub fn refresh(&self) -> Result<u64> {
        let mut resources = lock(&self.resources);
        let (mood, log_id) = {
            let state = self.tx.borrow();
            if state.is_pending() {
                bail!("a content request is already pending");
            }
            let mood = state.mood.ok_or_else(|| anyhow!("no mood selected"))?;
            let log_id = state
                .history_log_id
                .clone()
                .ok_or_else(|| anyhow!("no history entry for mood {mood}"))?;
            (mood, log_id)
        };

        info!("Refreshing content for {mood} (history log {log_id})");
        Ok(self.start_request(&mut resources, mood, log_id, true))
    }

    /// Return to the mood picker. Valid whenever content is on screen and no
    /// request is outstanding, including after a failed refresh.
    pub fn reset(&self) -> Result<()> {
        let _resources = lock(&self.resources);
        {
            let state = self.tx.borrow();
            if state.is_pending() {
                bail!("a content request is still pending");
            }
            if state.content.is_none() {
                bail!("no content is shown");
            }
        }
        self.tx.send_modify(SessionState::reset);
        Ok(())
    }

    /// Cancel everything in flight and return to idle. No state update from
    /// earlier requests is published after this returns.
    pub fn teardown(&self) {
        let mut resources = lock(&self.resources);
        resources.cancel.cancel();
        resources.cancel = CancellationToken::new();
        if let Some(cycle) = resources.loading.take() {
            cycle.stop();
        }
        self.tx.send_modify(SessionState::reset);
        debug!("Content session torn down");
    }

    fn start_request(
        &self,
        resources: &mut Resources,
        mood: Mood,
        log_id: String,
        keep_content: bool,
    ) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|state| {
            generation = state.begin_request(mood, log_id, keep_content);
        });

        // Replacing the cycle drops the superseded one and its timer.
        resources.loading = Some(LoadingMessageCycle::start(
            mood,
            Arc::clone(&self.copy),
            self.loading_interval,
            loading_sink(Arc::clone(&self.tx), generation),
        ));

        let token = resources.cancel.clone();
        let session = self.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                outcome = session.generator.generate(mood) => outcome,
                _ = token.cancelled() => {
                    debug!("Generation {generation} cancelled");
                    return;
                }
            };
            session.resolve(generation, outcome);
        });

        generation
    }

    fn resolve(&self, generation: u64, outcome: Result<HealingContent, CoreError>) {
        let mut resources = lock(&self.resources);
        let fallback = &self.fallback_error;

        let applied = self.tx.send_if_modified(|state| {
            if state.generation != generation || !state.is_pending() {
                return false;
            }
            match outcome {
                Ok(content) => state.succeed(content),
                Err(err) => {
                    warn!("Content generation failed: {err}");
                    let message = err
                        .user_message()
                        .map(str::to_string)
                        .unwrap_or_else(|| fallback.to_string());
                    state.fail(message);
                }
            }
            true
        });

        if applied {
            if let Some(cycle) = resources.loading.take() {
                cycle.stop();
            }
        } else {
            debug!("Discarding superseded response for generation {generation}");
        }
    }
}

fn loading_sink(tx: Arc<watch::Sender<SessionState>>, generation: u64) -> impl Fn(String) + Send {
    move |message| {
        tx.send_if_modified(|state| {
            if state.generation != generation || !state.is_pending() {
                return false;
            }
            state.loading_message = Some(message);
            true
        });
    }
}
