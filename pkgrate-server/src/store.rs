//! In-memory registry: packages, audit history and reviews.

use std::io;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{info, warn};
use pkgrate_core::{
    ActionEntry, ActionKind, CorpusEntry, HistorySource, Metadata, PackageCorpus, PkgRateError,
    Result, Review, ReviewSource,
};
use uuid::Uuid;

use crate::models::{PackageData, PackageInfo};

/// User recorded on every audit entry.
pub const DEFAULT_USER: &str = "default user";

/// One stored package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPackage {
    /// Identity; `repository` is kept server-side only.
    pub metadata: Metadata,
    /// Payload as submitted.
    pub data: PackageData,
    /// README text, searched by regex queries.
    pub readme: Option<String>,
}

impl StoredPackage {
    /// Client-facing view of the package.
    pub fn info(&self) -> PackageInfo {
        PackageInfo {
            metadata: self.metadata.clone(),
            data: self.data.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    packages: Vec<StoredPackage>,
    history: Vec<ActionEntry>,
    reviews: Vec<Review>,
}

impl Tables {
    fn record(&mut self, action: ActionKind, metadata: &Metadata) {
        self.history
            .push(ActionEntry::now(DEFAULT_USER, action, metadata.clone()));
    }

    fn find(&self, id: &str) -> Result<&StoredPackage> {
        self.packages
            .iter()
            .find(|package| package.metadata.id == id)
            .ok_or_else(|| PkgRateError::NotFound(format!("package {id}")))
    }
}

/// Shared registry state; clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct RegistryStore {
    tables: Arc<RwLock<Tables>>,
}

fn unavailable() -> PkgRateError {
    PkgRateError::Io(io::Error::other("registry store unavailable"))
}

impl RegistryStore {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| unavailable())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| unavailable())
    }

    /// Store a new package version and assign its id.
    pub fn create(
        &self,
        mut metadata: Metadata,
        data: PackageData,
        readme: Option<String>,
    ) -> Result<Metadata> {
        if metadata.name.trim().is_empty() || metadata.version.trim().is_empty() {
            return Err(PkgRateError::MalformedInput(
                "package name and version are required".to_string(),
            ));
        }
        let mut tables = self.write()?;
        let duplicate = tables.packages.iter().any(|package| {
            package.metadata.name == metadata.name && package.metadata.version == metadata.version
        });
        if duplicate {
            return Err(PkgRateError::Conflict(format!(
                "{}@{} already exists",
                metadata.name, metadata.version
            )));
        }
        metadata.id = Uuid::new_v4().simple().to_string();
        tables.record(ActionKind::Create, &metadata);
        tables.packages.push(StoredPackage {
            metadata: metadata.clone(),
            data,
            readme,
        });
        info!(
            "created {}@{} as {}",
            metadata.name, metadata.version, metadata.id
        );
        Ok(metadata)
    }

    /// Package by id without touching the history.
    pub fn get(&self, id: &str) -> Result<StoredPackage> {
        self.read()?.find(id).cloned()
    }

    /// Package by id, recorded as a download.
    pub fn download(&self, id: &str) -> Result<StoredPackage> {
        let mut tables = self.write()?;
        let package = tables.find(id)?.clone();
        tables.record(ActionKind::Download, &package.metadata);
        Ok(package)
    }

    /// Replace the payload of package `id`. `metadata` must name the stored
    /// record exactly.
    pub fn update(
        &self,
        id: &str,
        metadata: &Metadata,
        data: PackageData,
        readme: Option<String>,
        repository: String,
    ) -> Result<Metadata> {
        let mut tables = self.write()?;
        let package = tables
            .packages
            .iter_mut()
            .find(|package| {
                package.metadata.id == id
                    && metadata.id == id
                    && package.metadata.name == metadata.name
                    && package.metadata.version == metadata.version
            })
            .ok_or_else(|| {
                PkgRateError::NotFound(format!(
                    "package {id} matching {}@{}",
                    metadata.name, metadata.version
                ))
            })?;
        package.data = data;
        package.metadata.repository = repository;
        if readme.is_some() {
            package.readme = readme;
        }
        let updated = package.metadata.clone();
        tables.record(ActionKind::Update, &updated);
        Ok(updated)
    }

    /// Remove package `id`.
    pub fn delete(&self, id: &str) -> Result<Metadata> {
        let mut tables = self.write()?;
        let index = tables
            .packages
            .iter()
            .position(|package| package.metadata.id == id)
            .ok_or_else(|| PkgRateError::NotFound(format!("package {id}")))?;
        Ok(tables.packages.remove(index).metadata)
    }

    /// Remove every version of `name`; returns how many were removed.
    pub fn delete_by_name(&self, name: &str) -> Result<usize> {
        let mut tables = self.write()?;
        let before = tables.packages.len();
        tables.packages.retain(|package| package.metadata.name != name);
        let removed = before - tables.packages.len();
        if removed == 0 {
            return Err(PkgRateError::NotFound(format!("package {name}")));
        }
        Ok(removed)
    }

    /// Audit entries about packages named `name`.
    pub fn history_by_name(&self, name: &str) -> Result<Vec<ActionEntry>> {
        let entries: Vec<ActionEntry> = self
            .read()?
            .history
            .iter()
            .filter(|entry| entry.metadata.name == name)
            .cloned()
            .collect();
        if entries.is_empty() {
            return Err(PkgRateError::NotFound(format!("history for {name}")));
        }
        Ok(entries)
    }

    /// Append an audit entry.
    pub fn record(&self, action: ActionKind, metadata: &Metadata) -> Result<()> {
        self.write()?.record(action, metadata);
        Ok(())
    }

    /// Any stored version of `name`, preferring one with a known repository.
    pub fn package_named(&self, name: &str) -> Result<Metadata> {
        let tables = self.read()?;
        let mut versions = tables
            .packages
            .iter()
            .filter(|package| package.metadata.name == name);
        let first = versions
            .clone()
            .next()
            .ok_or_else(|| PkgRateError::NotFound(format!("package {name}")))?;
        let preferred = versions
            .find(|package| !package.metadata.repository.is_empty())
            .unwrap_or(first);
        Ok(preferred.metadata.clone())
    }

    /// Store a review; one per (user, package).
    pub fn add_review(&self, review: Review) -> Result<()> {
        let mut tables = self.write()?;
        let metadata = tables
            .packages
            .iter()
            .find(|package| package.metadata.name == review.package_name)
            .map(|package| package.metadata.clone())
            .ok_or_else(|| PkgRateError::NotFound(format!("package {}", review.package_name)))?;
        let duplicate = tables.reviews.iter().any(|existing| {
            existing.user_name == review.user_name && existing.package_name == review.package_name
        });
        if duplicate {
            return Err(PkgRateError::Conflict(format!(
                "{} already reviewed {}",
                review.user_name, review.package_name
            )));
        }
        tables.reviews.push(review);
        tables.record(ActionKind::Review, &metadata);
        Ok(())
    }

    /// Remove the review of `package_name` by `user_name`.
    pub fn remove_review(&self, user_name: &str, package_name: &str) -> Result<Review> {
        let mut tables = self.write()?;
        let index = tables
            .reviews
            .iter()
            .position(|review| review.user_name == user_name && review.package_name == package_name)
            .ok_or_else(|| {
                PkgRateError::NotFound(format!("review of {package_name} by {user_name}"))
            })?;
        Ok(tables.reviews.remove(index))
    }

    /// Drop every package, audit entry and review.
    pub fn reset(&self) -> Result<()> {
        let mut tables = self.write()?;
        *tables = Tables::default();
        info!("registry reset");
        Ok(())
    }
}

impl PackageCorpus for RegistryStore {
    fn snapshot(&self) -> Vec<CorpusEntry> {
        match self.read() {
            Ok(tables) => tables
                .packages
                .iter()
                .map(|package| CorpusEntry {
                    metadata: package.metadata.clone(),
                    readme: package.readme.clone(),
                })
                .collect(),
            Err(err) => {
                warn!("package snapshot failed: {err}");
                Vec::new()
            }
        }
    }
}

impl HistorySource for RegistryStore {
    fn history(&self) -> Vec<ActionEntry> {
        match self.read() {
            Ok(tables) => tables.history.clone(),
            Err(err) => {
                warn!("history read failed: {err}");
                Vec::new()
            }
        }
    }
}

impl ReviewSource for RegistryStore {
    fn reviews_for(&self, package_name: &str) -> Vec<Review> {
        match self.read() {
            Ok(tables) => tables
                .reviews
                .iter()
                .filter(|review| review.package_name == package_name)
                .cloned()
                .collect(),
            Err(err) => {
                warn!("review read failed: {err}");
                Vec::new()
            }
        }
    }
}
