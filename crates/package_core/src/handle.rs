//! Single-writer front door to the package controller.
//!
//! One worker task owns the [`PackageController`]; every public entry point
//! enqueues a [`ControllerCommand`] and, where it needs an answer, waits on a
//! oneshot reply. Bus notifications are forwarded onto the same queue.

use std::{path::Path, sync::Arc};

use anyhow::Context;
use futures::StreamExt;
use shared::{
    protocol::{BusMessage, PackageChanged, PackageHasUpdate},
    settings::AppSettings,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, error, warn};

use crate::{
    bus::NotificationBus,
    controller::{Collaborators, ControllerEvent, ControllerSnapshot, LoadingFlag, PackageController},
    error::ControllerError,
    export,
    view::{ListViewMode, SortSpec},
    ControllerConfig, PackageService, ProgressReporter, SettingsProvider,
};

type Reply = oneshot::Sender<Result<(), ControllerError>>;

pub(crate) enum ControllerCommand {
    Initialize(Reply),
    Refresh(Option<Reply>),
    UpdateAll(Reply),
    ApplyChange {
        change: PackageChanged,
        reply: Option<Reply>,
    },
    MarkUpdate(PackageHasUpdate),
    SettingsChanged(AppSettings),
    SetSearchQuery(String),
    SetMatchWord(bool),
    SetShowOnlyPackagesWithUpdate(bool),
    SetSort(Option<SortSpec>),
    SetListViewMode(ListViewMode),
    Snapshot(oneshot::Sender<ControllerSnapshot>),
}

impl ControllerCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Initialize(_) => "initialize",
            Self::Refresh(_) => "refresh",
            Self::UpdateAll(_) => "update_all",
            Self::ApplyChange { .. } => "apply_change",
            Self::MarkUpdate(_) => "mark_update",
            Self::SettingsChanged(_) => "settings_changed",
            Self::SetSearchQuery(_) => "set_search_query",
            Self::SetMatchWord(_) => "set_match_word",
            Self::SetShowOnlyPackagesWithUpdate(_) => "set_show_only_packages_with_update",
            Self::SetSort(_) => "set_sort",
            Self::SetListViewMode(_) => "set_list_view_mode",
            Self::Snapshot(_) => "snapshot",
        }
    }
}

#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<ControllerCommand>,
    loading: LoadingFlag,
    events: broadcast::Sender<ControllerEvent>,
    bus: NotificationBus,
}

impl ControllerHandle {
    /// Starts the controller worker and the bus forwarder. Must be called from
    /// within a tokio runtime. The worker stops once every handle is dropped.
    pub fn spawn(
        service: Arc<dyn PackageService>,
        progress: Arc<dyn ProgressReporter>,
        settings: Arc<dyn SettingsProvider>,
        bus: NotificationBus,
        config: ControllerConfig,
    ) -> Self {
        let (commands, queue) = mpsc::channel(config.command_queue_capacity.max(1));
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let loading = LoadingFlag::new(events.clone());

        spawn_bus_forwarder(bus.subscribe(), commands.downgrade());

        let controller = PackageController::new(
            Collaborators {
                service,
                progress,
                settings,
                bus: bus.clone(),
            },
            config,
            commands.downgrade(),
            events.clone(),
            loading.clone(),
        );
        tokio::spawn(run_worker(controller, queue));

        Self {
            commands,
            loading,
            events,
            bus,
        }
    }

    pub async fn initialize(&self) -> Result<(), ControllerError> {
        self.request(ControllerCommand::Initialize).await
    }

    /// Full reload. Returns immediately when a load or bulk update is running.
    pub async fn refresh(&self) -> Result<(), ControllerError> {
        if self.loading.is_set() {
            debug!("refresh requested while busy; ignoring");
            return Ok(());
        }
        self.request(|reply| ControllerCommand::Refresh(Some(reply)))
            .await
    }

    /// Bulk update of every updatable, unpinned package. Returns immediately
    /// when a load or bulk update is running.
    pub async fn update_all(&self) -> Result<(), ControllerError> {
        if self.loading.is_set() {
            debug!("bulk update requested while busy; ignoring");
            return Ok(());
        }
        self.request(ControllerCommand::UpdateAll).await
    }

    pub async fn apply_change(&self, change: PackageChanged) -> Result<(), ControllerError> {
        self.request(|reply| ControllerCommand::ApplyChange {
            change,
            reply: Some(reply),
        })
        .await
    }

    pub async fn set_search_query(&self, query: impl Into<String>) -> Result<(), ControllerError> {
        self.send(ControllerCommand::SetSearchQuery(query.into()))
            .await
    }

    pub async fn set_match_word(&self, match_word: bool) -> Result<(), ControllerError> {
        self.send(ControllerCommand::SetMatchWord(match_word)).await
    }

    pub async fn set_show_only_packages_with_update(
        &self,
        enabled: bool,
    ) -> Result<(), ControllerError> {
        self.send(ControllerCommand::SetShowOnlyPackagesWithUpdate(enabled))
            .await
    }

    pub async fn set_sort(&self, sort: Option<SortSpec>) -> Result<(), ControllerError> {
        self.send(ControllerCommand::SetSort(sort)).await
    }

    pub async fn set_list_view_mode(&self, mode: ListViewMode) -> Result<(), ControllerError> {
        self.send(ControllerCommand::SetListViewMode(mode)).await
    }

    pub async fn snapshot(&self) -> Result<ControllerSnapshot, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ControllerCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| ControllerError::WorkerStopped)
    }

    /// Current package list as an XML document.
    pub async fn export_xml(&self) -> Result<String, ControllerError> {
        let snapshot = self.snapshot().await?;
        export::packages_to_xml(&snapshot.packages).map_err(|err| {
            error!(error = %err, "failed to export packages");
            ControllerError::Export(err)
        })
    }

    pub async fn export_to(&self, path: impl AsRef<Path>) -> Result<(), ControllerError> {
        let path = path.as_ref();
        let xml = self.export_xml().await?;
        tokio::fs::write(path, xml)
            .await
            .with_context(|| format!("failed to write package export to '{}'", path.display()))
            .map_err(|err| {
                error!(error = %err, "failed to export packages");
                ControllerError::Export(err)
            })
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: ControllerCommand) -> Result<(), ControllerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ControllerError::WorkerStopped)
    }

    async fn request(
        &self,
        make: impl FnOnce(Reply) -> ControllerCommand,
    ) -> Result<(), ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| ControllerError::WorkerStopped)?
    }
}

async fn run_worker(
    mut controller: PackageController,
    mut queue: mpsc::Receiver<ControllerCommand>,
) {
    while let Some(command) = queue.recv().await {
        debug!(command = command.name(), "processing controller command");
        controller.handle(command).await;
    }
    debug!("controller command queue closed; worker exiting");
}

fn spawn_bus_forwarder(
    messages: broadcast::Receiver<BusMessage>,
    commands: mpsc::WeakSender<ControllerCommand>,
) {
    tokio::spawn(async move {
        let mut messages = BroadcastStream::new(messages);
        while let Some(item) = messages.next().await {
            let command = match item {
                Ok(BusMessage::PackageChanged(change)) => ControllerCommand::ApplyChange {
                    change,
                    reply: None,
                },
                Ok(BusMessage::PackageHasUpdate(notice)) => ControllerCommand::MarkUpdate(notice),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "bus forwarder lagged; notifications dropped");
                    continue;
                }
            };
            let Some(commands) = commands.upgrade() else {
                break;
            };
            if commands.send(command).await.is_err() {
                break;
            }
        }
    });
}

impl PackageController {
    async fn handle(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::Initialize(reply) => {
                let _ = reply.send(self.initialize().await);
            }
            ControllerCommand::Refresh(reply) => {
                let result = self.load().await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            ControllerCommand::UpdateAll(reply) => {
                let _ = reply.send(self.update_all().await);
            }
            ControllerCommand::ApplyChange { change, reply } => {
                let result = self.apply_change(&change).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            ControllerCommand::MarkUpdate(notice) => {
                if self.apply_update_notice(&notice) {
                    self.recompute_view();
                }
            }
            ControllerCommand::SettingsChanged(settings) => {
                self.set_list_view_mode(ListViewMode::from_settings(&settings));
            }
            ControllerCommand::SetSearchQuery(query) => self.set_search_query(query),
            ControllerCommand::SetMatchWord(match_word) => self.set_match_word(match_word),
            ControllerCommand::SetShowOnlyPackagesWithUpdate(enabled) => {
                self.set_show_only_packages_with_update(enabled)
            }
            ControllerCommand::SetSort(sort) => self.set_sort(sort),
            ControllerCommand::SetListViewMode(mode) => self.set_list_view_mode(mode),
            ControllerCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/handle_tests.rs"]
mod tests;
