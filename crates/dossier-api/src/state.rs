//! Application state wiring the services together.
//!
//! `AppState` pins the core's generic ports to the infra implementations:
//! SQLite for drafts, HTTP for submission and the static identity provider
//! for the user. A `Session` runs an orchestrator over an in-process frame
//! bus so commands can talk to it the way a section or review frame would.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use dossier_core::auth::{resolve_identity, AuthOutcome};
use dossier_core::draft::DraftStore;
use dossier_core::frame::{BusPort, FrameBus};
use dossier_core::orchestrator::{Command, Orchestrator, StatusBus, StatusEvent};
use dossier_infra::config::{load_config, resolve_data_dir};
use dossier_infra::identity::StaticIdentityProvider;
use dossier_infra::sqlite::blob::SqliteBlobStore;
use dossier_infra::sqlite::pool::{database_url, DatabasePool};
use dossier_types::config::DossierConfig;
use dossier_types::identity::{UserIdentity, UserProfile};
use dossier_types::protocol::{Envelope, FrameId};

pub type ConcreteDraftStore = DraftStore<SqliteBlobStore>;
pub type ConcreteOrchestrator = Orchestrator<SqliteBlobStore, BusPort>;

/// How long a command waits for the orchestrator to acknowledge something.
const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state for every CLI command.
pub struct AppState {
    pub config: DossierConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub identity: UserIdentity,
    pub profile: UserProfile,
}

impl AppState {
    /// Load configuration, open the database and resolve the user.
    pub async fn init(user: Option<String>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let provider = StaticIdentityProvider::from_env(user);
        let (identity, profile) = match resolve_identity(&provider, "").await? {
            AuthOutcome::Authenticated { identity, profile } => (identity, profile),
            AuthOutcome::LoginRequired => bail!("login required"),
        };

        Ok(Self {
            config,
            data_dir,
            db_pool,
            identity,
            profile,
        })
    }

    pub fn draft_store(&self) -> ConcreteDraftStore {
        DraftStore::new(
            SqliteBlobStore::new(self.db_pool.clone()),
            self.config.draft_namespace.clone(),
        )
    }

    /// Start an orchestrator for the current user.
    pub async fn start_session(&self) -> Session {
        let bus = Arc::new(FrameBus::new());
        let parent = FrameId::new();
        let frame = FrameId::new();
        let parent_mailbox = bus.register(parent, self.config.expected_origin.clone());
        let mailbox = bus.register(frame, self.config.expected_origin.clone());

        let status = StatusBus::default();
        let orchestrator = Orchestrator::load(
            self.config.clone(),
            self.draft_store(),
            BusPort::new(bus.clone(), parent),
            self.identity.clone(),
            status.clone(),
        )
        .await;

        let (commands, command_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(orchestrator.run(parent_mailbox, command_rx, cancel.clone()));

        Session {
            bus,
            parent,
            frame,
            mailbox,
            commands,
            status,
            cancel,
            task,
        }
    }
}

/// A running orchestrator plus one frame attached to it.
pub struct Session {
    pub bus: Arc<FrameBus>,
    pub parent: FrameId,
    pub frame: FrameId,
    /// Mailbox of the attached frame.
    pub mailbox: mpsc::Receiver<Envelope>,
    pub commands: mpsc::Sender<Command>,
    pub status: StatusBus,
    cancel: CancellationToken,
    task: JoinHandle<ConcreteOrchestrator>,
}

impl Session {
    /// Port for the attached frame.
    pub fn port(&self) -> BusPort {
        BusPort::new(self.bus.clone(), self.frame)
    }

    /// Wait until `pred` matches a status event.
    pub async fn wait_for(
        status: &mut broadcast::Receiver<StatusEvent>,
        pred: impl Fn(&StatusEvent) -> bool,
    ) -> anyhow::Result<StatusEvent> {
        let wait = async {
            loop {
                match status.recv().await {
                    Ok(event) if pred(&event) => return Ok(event),
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        bail!("orchestrator stopped")
                    }
                }
            }
        };
        tokio::time::timeout(ACK_TIMEOUT, wait)
            .await
            .context("orchestrator did not answer in time")?
    }

    /// Stop the orchestrator and hand it back.
    pub async fn shutdown(self) -> anyhow::Result<ConcreteOrchestrator> {
        self.cancel.cancel();
        Ok(self.task.await?)
    }
}
