use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use log::{info, warn};
use serde::Serialize;
use tokio::{runtime::Handle, sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    access::{self, AccessView},
    auth::{AuthObserver, IdentityProvider},
    content::{ContentGenerator, ContentSession, LoadingCopyProvider, SessionState},
    history::HistoryStore,
    models::{HistoryLogEntry, Identity, Mood, Profile},
    profile::{ProfileStore, ProfileView, ProfileWatcher},
    settings::Settings,
    subscription::{lock, Subscription},
};

const FALLBACK_GREETING: &str = "Hamba Allah";

/// Auth state as last reported by the provider.
#[derive(Debug, Clone, PartialEq)]
enum AuthState {
    Unknown,
    SignedOut,
    SignedIn(Identity),
}

impl AuthState {
    fn identity_id(&self) -> Option<&str> {
        match self {
            AuthState::SignedIn(identity) => Some(identity.id.as_str()),
            _ => None,
        }
    }
}

/// What the client should render.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum AppView {
    /// Auth state, or the first profile snapshot for the identity, is not
    /// known yet.
    Connecting,
    SignedOut,
    Pending {
        profile: Option<Profile>,
    },
    Blocked {
        profile: Option<Profile>,
    },
    Granted {
        identity: Identity,
        profile: Profile,
        greeting: String,
    },
}

impl AppView {
    pub fn is_granted(&self) -> bool {
        matches!(self, AppView::Granted { .. })
    }
}

/// External collaborators the controller is wired to.
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub generator: Arc<dyn ContentGenerator>,
    pub history: Arc<dyn HistoryStore>,
    pub copy: Arc<dyn LoadingCopyProvider>,
}

enum Lifecycle {
    Idle,
    Running {
        auth: Subscription,
        reconciler: JoinHandle<()>,
        cancel: CancellationToken,
    },
    Stopped,
}

/// Ties auth, profile approval and the content session together.
///
/// Identity changes flow from the provider into the profile watcher, and a
/// reconciler task folds both into the published [`AppView`]. Content
/// operations are only accepted while the view is granted.
pub struct AppController {
    auth: AuthObserver,
    profiles: Arc<ProfileWatcher>,
    session: ContentSession,
    history: Arc<dyn HistoryStore>,
    history_page_size: usize,
    auth_tx: Arc<watch::Sender<AuthState>>,
    view_tx: Arc<watch::Sender<AppView>>,
    lifecycle: Mutex<Lifecycle>,
}

impl AppController {
    pub fn new(collaborators: Collaborators, settings: &Settings) -> Self {
        let Collaborators {
            identity,
            profiles,
            generator,
            history,
            copy,
        } = collaborators;

        let (auth_tx, _) = watch::channel(AuthState::Unknown);
        let (view_tx, _) = watch::channel(AppView::Connecting);

        Self {
            auth: AuthObserver::new(identity),
            profiles: Arc::new(ProfileWatcher::new(profiles)),
            session: ContentSession::new(generator, Arc::clone(&history), copy, settings),
            history,
            history_page_size: settings.history_page_size.max(1),
            auth_tx: Arc::new(auth_tx),
            view_tx: Arc::new(view_tx),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Subscribe to the identity provider and start publishing views.
    /// Calling it again while running is a no-op. Must be called inside a
    /// Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = lock(&self.lifecycle);
        match *lifecycle {
            Lifecycle::Running { .. } => return Ok(()),
            Lifecycle::Stopped => return Err(anyhow!("controller has been shut down")),
            Lifecycle::Idle => {}
        }

        let cancel = CancellationToken::new();
        let reconciler = tokio::spawn(reconcile(
            self.auth_tx.subscribe(),
            self.profiles.subscribe(),
            Arc::clone(&self.view_tx),
            cancel.clone(),
        ));

        let runtime = Handle::current();
        let auth_tx = Arc::clone(&self.auth_tx);
        let profiles = Arc::clone(&self.profiles);
        let session = self.session.clone();
        let auth = self.auth.subscribe(move |identity| {
            let _runtime = runtime.enter();
            let next = match identity.clone() {
                Some(identity) => AuthState::SignedIn(identity),
                None => AuthState::SignedOut,
            };
            let previous = auth_tx.send_replace(next);
            let next_id = identity.as_ref().map(|i| i.id.as_str());
            if previous.identity_id() != next_id {
                info!("Identity changed: {:?} -> {:?}", previous.identity_id(), next_id);
                session.teardown();
            }
            profiles.set_identity(identity);
        });

        *lifecycle = Lifecycle::Running {
            auth,
            reconciler,
            cancel,
        };
        info!("App controller started");
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<AppView> {
        self.view_tx.subscribe()
    }

    /// The view for the current auth and profile state.
    pub fn view(&self) -> AppView {
        let auth = self.auth_tx.borrow().clone();
        derive_view(&auth, &self.profiles.current())
    }

    pub fn subscribe_session(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub async fn sign_in(&self) -> Result<Identity> {
        match self.auth.provider().sign_in().await {
            Ok(identity) => Ok(identity),
            Err(err) => {
                warn!("Sign-in failed: {err}");
                Err(err.into())
            }
        }
    }

    /// Unwind local state, then ask the provider to end the session. The
    /// profile subscription and any loading timer are released before this
    /// awaits anything.
    pub async fn sign_out(&self) -> Result<()> {
        self.unwind();
        self.auth.provider().sign_out().await.map_err(|err| {
            warn!("Provider sign-out failed: {err}");
            anyhow::Error::from(err)
        })
    }

    pub fn select_mood(&self, mood: Mood) -> Result<HistoryLogEntry> {
        self.ensure_granted()?;
        Ok(self.session.select(mood))
    }

    pub fn refresh(&self) -> Result<u64> {
        self.ensure_granted()?;
        self.session.refresh()
    }

    pub fn reset(&self) -> Result<()> {
        self.ensure_granted()?;
        self.session.reset()
    }

    /// One page of the user's journal, newest first, sized by
    /// `Settings::history_page_size`.
    pub async fn history_page(&self, page: usize) -> Result<Vec<HistoryLogEntry>> {
        self.ensure_granted()?;
        let offset = page.saturating_mul(self.history_page_size);
        let entries = self.history.recent(self.history_page_size, offset).await?;
        Ok(entries)
    }

    /// Release every subscription, task and timer. Idempotent.
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *lock(&self.lifecycle), Lifecycle::Stopped);
        if let Lifecycle::Running {
            auth,
            reconciler,
            cancel,
        } = previous
        {
            auth.unsubscribe();
            cancel.cancel();
            reconciler.abort();
            info!("App controller shut down");
        }
        self.profiles.clear();
        self.session.teardown();
    }

    fn unwind(&self) {
        self.auth_tx.send_replace(AuthState::SignedOut);
        self.profiles.clear();
        self.session.teardown();
    }

    fn ensure_granted(&self) -> Result<()> {
        if self.view().is_granted() {
            Ok(())
        } else {
            Err(anyhow!("access has not been granted"))
        }
    }
}

impl Drop for AppController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn greeting_for(profile: &Profile) -> String {
    profile
        .first_name()
        .unwrap_or(FALLBACK_GREETING)
        .to_string()
}

fn derive_view(auth: &AuthState, profile: &ProfileView) -> AppView {
    let identity = match auth {
        AuthState::Unknown => return AppView::Connecting,
        AuthState::SignedOut => return AppView::SignedOut,
        AuthState::SignedIn(identity) => identity,
    };

    if profile.identity_id.as_deref() != Some(identity.id.as_str())
        || !profile.initial_load_complete
    {
        return AppView::Connecting;
    }

    match access::evaluate(profile.status) {
        AccessView::PendingView => AppView::Pending {
            profile: profile.profile.clone(),
        },
        AccessView::BlockedView => AppView::Blocked {
            profile: profile.profile.clone(),
        },
        AccessView::Granted => match &profile.profile {
            Some(record) => AppView::Granted {
                identity: identity.clone(),
                greeting: greeting_for(record),
                profile: record.clone(),
            },
            None => AppView::Pending { profile: None },
        },
    }
}

async fn reconcile(
    mut auth_rx: watch::Receiver<AuthState>,
    mut profile_rx: watch::Receiver<ProfileView>,
    view_tx: Arc<watch::Sender<AppView>>,
    cancel: CancellationToken,
) {
    loop {
        let view = {
            let auth = auth_rx.borrow_and_update().clone();
            let profile = profile_rx.borrow_and_update().clone();
            derive_view(&auth, &profile)
        };
        view_tx.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });

        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = auth_rx.changed() => if changed.is_err() { break },
            changed = profile_rx.changed() => if changed.is_err() { break },
        }
    }
}
