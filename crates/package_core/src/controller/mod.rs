//! Package state owned by the controller worker, plus the operations that mutate it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use shared::{
    domain::{OutdatedPackage, Package},
    protocol::PackageHasUpdate,
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::debug;

use crate::{
    bus::NotificationBus,
    handle::ControllerCommand,
    store::PackageStore,
    view::{self, FilterCriteria, ListViewMode, SortSpec},
    ControllerConfig, PackageService, ProgressReporter, SettingsProvider,
};

mod events;
mod init;
mod load;
mod update;

/// Change notifications dispatched by the controller's state mutators.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    FilterCriteriaChanged(FilterCriteria),
    ViewModeChanged(ListViewMode),
    SortChanged(Option<SortSpec>),
    ViewRecomputed { visible: usize, total: usize },
    LoadingChanged(bool),
}

#[derive(Debug, Clone)]
pub struct ControllerSnapshot {
    pub packages: Vec<Package>,
    pub view: Vec<Package>,
    pub criteria: FilterCriteria,
    pub sort: Option<SortSpec>,
    pub list_view_mode: ListViewMode,
    pub is_loading: bool,
    pub has_loaded: bool,
    pub first_load_incomplete: bool,
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Re-entrancy guard shared between the handle and the worker.
#[derive(Clone)]
pub(crate) struct LoadingFlag {
    busy: Arc<AtomicBool>,
    events: broadcast::Sender<ControllerEvent>,
}

impl LoadingFlag {
    pub(crate) fn new(events: broadcast::Sender<ControllerEvent>) -> Self {
        Self {
            busy: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn try_acquire(&self) -> Option<LoadingGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let _ = self.events.send(ControllerEvent::LoadingChanged(true));
        Some(LoadingGuard { flag: self.clone() })
    }
}

/// Clears the loading flag when dropped, whichever way the guarded operation ends.
pub(crate) struct LoadingGuard {
    flag: LoadingFlag,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.flag.busy.store(false, Ordering::Release);
        let _ = self.flag.events.send(ControllerEvent::LoadingChanged(false));
    }
}

pub(crate) struct Collaborators {
    pub(crate) service: Arc<dyn PackageService>,
    pub(crate) progress: Arc<dyn ProgressReporter>,
    pub(crate) settings: Arc<dyn SettingsProvider>,
    pub(crate) bus: NotificationBus,
}

#[derive(Default)]
struct Reactions {
    filter: bool,
    view_mode: bool,
}

pub(crate) struct PackageController {
    service: Arc<dyn PackageService>,
    progress: Arc<dyn ProgressReporter>,
    settings: Arc<dyn SettingsProvider>,
    bus: NotificationBus,
    config: ControllerConfig,
    commands: mpsc::WeakSender<ControllerCommand>,
    events: broadcast::Sender<ControllerEvent>,
    loading: LoadingFlag,
    store: PackageStore,
    view: Vec<Package>,
    criteria: FilterCriteria,
    sort: Option<SortSpec>,
    list_view_mode: ListViewMode,
    has_loaded: bool,
    first_load_incomplete: bool,
    last_refreshed: Option<DateTime<Utc>>,
    reactions: Reactions,
    settings_watch: Option<JoinHandle<()>>,
}

impl PackageController {
    pub(crate) fn new(
        collaborators: Collaborators,
        config: ControllerConfig,
        commands: mpsc::WeakSender<ControllerCommand>,
        events: broadcast::Sender<ControllerEvent>,
        loading: LoadingFlag,
    ) -> Self {
        Self {
            service: collaborators.service,
            progress: collaborators.progress,
            settings: collaborators.settings,
            bus: collaborators.bus,
            config,
            commands,
            events,
            loading,
            store: PackageStore::new(),
            view: Vec::new(),
            criteria: FilterCriteria::default(),
            sort: None,
            list_view_mode: ListViewMode::Standard,
            has_loaded: false,
            first_load_incomplete: true,
            last_refreshed: None,
            reactions: Reactions::default(),
            settings_watch: None,
        }
    }

    pub(crate) fn set_search_query(&mut self, query: String) {
        if self.criteria.search_query == query {
            return;
        }
        self.criteria.search_query = query;
        self.dispatch(ControllerEvent::FilterCriteriaChanged(self.criteria.clone()));
    }

    pub(crate) fn set_match_word(&mut self, match_word: bool) {
        if self.criteria.match_word == match_word {
            return;
        }
        self.criteria.match_word = match_word;
        self.dispatch(ControllerEvent::FilterCriteriaChanged(self.criteria.clone()));
    }

    pub(crate) fn set_show_only_packages_with_update(&mut self, enabled: bool) {
        if self.criteria.show_only_packages_with_update == enabled {
            return;
        }
        self.criteria.show_only_packages_with_update = enabled;
        self.dispatch(ControllerEvent::FilterCriteriaChanged(self.criteria.clone()));
    }

    pub(crate) fn set_sort(&mut self, sort: Option<SortSpec>) {
        if sort.is_some() && self.list_view_mode == ListViewMode::Tile {
            debug!("ignoring sort request in tile layout");
            return;
        }
        if self.sort == sort {
            return;
        }
        self.sort = sort;
        self.dispatch(ControllerEvent::SortChanged(sort));
        self.recompute_view();
    }

    pub(crate) fn set_list_view_mode(&mut self, mode: ListViewMode) {
        if self.list_view_mode == mode {
            return;
        }
        self.list_view_mode = mode;
        self.dispatch(ControllerEvent::ViewModeChanged(mode));
    }

    /// Runs the controller's own reactions to `event`, then tells external observers.
    fn dispatch(&mut self, event: ControllerEvent) {
        match &event {
            ControllerEvent::FilterCriteriaChanged(_) if self.reactions.filter => {
                self.recompute_view();
            }
            ControllerEvent::ViewModeChanged(ListViewMode::Tile) if self.reactions.view_mode => {
                if self.sort.take().is_some() {
                    let _ = self.events.send(ControllerEvent::SortChanged(None));
                }
                self.recompute_view();
            }
            _ => {}
        }
        let _ = self.events.send(event);
    }

    pub(crate) fn recompute_view(&mut self) {
        self.view = view::recompute(
            &self.store,
            &self.criteria,
            self.sort.as_ref(),
            self.list_view_mode,
        );
        let _ = self.events.send(ControllerEvent::ViewRecomputed {
            visible: self.view.len(),
            total: self.store.len(),
        });
    }

    /// Records a known newer version. Returns whether the store changed.
    ///
    /// Notices travel back through the bus after the controller published
    /// them, so one can arrive after the package was already updated. A
    /// notice not newer than the installed version is dropped.
    pub(crate) fn apply_update_notice(&mut self, notice: &PackageHasUpdate) -> bool {
        let Some(package) = self.store.find_mut(&notice.id) else {
            debug!(package = %notice.id, "update notice for package not in store");
            return false;
        };
        if notice.latest_version <= package.version {
            debug!(
                package = %notice.id,
                installed = %package.version,
                latest = %notice.latest_version,
                "ignoring stale update notice"
            );
            return false;
        }
        if package.latest_version.as_ref() == Some(&notice.latest_version) {
            return false;
        }
        package.latest_version = Some(notice.latest_version.clone());
        true
    }

    /// Marks each outdated package locally and announces it on the bus.
    fn publish_update_notices(&mut self, outdated: Vec<OutdatedPackage>) {
        for entry in outdated {
            let notice = PackageHasUpdate {
                id: entry.id,
                latest_version: entry.latest_version,
            };
            self.apply_update_notice(&notice);
            self.bus.publish_has_update(notice);
        }
    }

    pub(crate) fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            packages: self.store.snapshot(),
            view: self.view.clone(),
            criteria: self.criteria.clone(),
            sort: self.sort,
            list_view_mode: self.list_view_mode,
            is_loading: self.loading.is_set(),
            has_loaded: self.has_loaded,
            first_load_incomplete: self.first_load_incomplete,
            last_refreshed: self.last_refreshed,
        }
    }
}

impl Drop for PackageController {
    fn drop(&mut self) {
        if let Some(watch) = self.settings_watch.take() {
            watch.abort();
        }
    }
}
