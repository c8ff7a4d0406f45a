//! Filtered and sorted projection of the package store.

use std::cmp::Ordering;

use shared::{domain::Package, settings::AppSettings};

use crate::store::PackageStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub search_query: String,
    pub match_word: bool,
    pub show_only_packages_with_update: bool,
}

impl FilterCriteria {
    pub fn matches(&self, package: &Package) -> bool {
        self.matches_query(package) && self.matches_update_flag(package)
    }

    fn matches_query(&self, package: &Package) -> bool {
        if self.search_query.is_empty() {
            return true;
        }

        let name = package.display_name().to_lowercase();
        let query = self.search_query.to_lowercase();
        if self.match_word {
            name == query
        } else {
            name.contains(&query)
        }
    }

    fn matches_update_flag(&self, package: &Package) -> bool {
        !self.show_only_packages_with_update || package.is_update_candidate()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListViewMode {
    #[default]
    Standard,
    Tile,
}

impl ListViewMode {
    pub fn from_settings(settings: &AppSettings) -> Self {
        if settings.default_to_tile_view_for_local_source {
            Self::Tile
        } else {
            Self::Standard
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Title,
    Id,
    Version,
    LatestVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: SortColumn,
    pub descending: bool,
}

impl SortSpec {
    pub fn ascending(column: SortColumn) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub fn descending(column: SortColumn) -> Self {
        Self {
            column,
            descending: true,
        }
    }

    pub fn compare(&self, a: &Package, b: &Package) -> Ordering {
        let ordering = match self.column {
            SortColumn::Title => a
                .display_name()
                .to_lowercase()
                .cmp(&b.display_name().to_lowercase()),
            SortColumn::Id => a
                .id
                .as_str()
                .to_lowercase()
                .cmp(&b.id.as_str().to_lowercase()),
            SortColumn::Version => a.version.cmp(&b.version),
            SortColumn::LatestVersion => a.latest_version.cmp(&b.latest_version),
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Applies `criteria` to the store in insertion order, then `sort` unless the
/// view is laid out as tiles.
pub fn recompute(
    store: &PackageStore,
    criteria: &FilterCriteria,
    sort: Option<&SortSpec>,
    mode: ListViewMode,
) -> Vec<Package> {
    let mut view: Vec<Package> = store
        .iter()
        .filter(|pkg| criteria.matches(pkg))
        .cloned()
        .collect();

    if let (Some(sort), ListViewMode::Standard) = (sort, mode) {
        view.sort_by(|a, b| sort.compare(a, b));
    }
    view
}
