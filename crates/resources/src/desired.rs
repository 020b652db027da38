//! The desired set: resources grouped into ordered dependency levels.

use std::fmt;

use crate::resource::{ManagedResource, ResourceId};

/// Dependency levels, resolved in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Identity,
    SearchEngine,
    Aggregator,
    Collector,
    Dashboard,
}

impl Level {
    pub const ALL: [Self; 5] = [
        Self::Identity,
        Self::SearchEngine,
        Self::Aggregator,
        Self::Collector,
        Self::Dashboard,
    ];

    /// Levels that can be resolved before the search endpoint is known.
    pub const FOUNDATION: [Self; 2] = [Self::Identity, Self::SearchEngine];

    pub fn is_foundation(self) -> bool {
        Self::FOUNDATION.contains(&self)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Identity => "identity",
            Self::SearchEngine => "search-engine",
            Self::Aggregator => "aggregator",
            Self::Collector => "collector",
            Self::Dashboard => "dashboard",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DesiredEntry {
    /// The resource must exist with this content. A payload update also
    /// deletes `dependent` so its pods remount the new content.
    Present {
        resource: ManagedResource,
        dependent: Option<ResourceId>,
    },
    /// The resource must not exist (its component is disabled).
    Absent(ResourceId),
}

impl DesiredEntry {
    pub const fn present(resource: ManagedResource) -> Self {
        Self::Present {
            resource,
            dependent: None,
        }
    }

    pub const fn with_dependent(resource: ManagedResource, dependent: ResourceId) -> Self {
        Self::Present {
            resource,
            dependent: Some(dependent),
        }
    }

    pub fn id(&self) -> ResourceId {
        match self {
            Self::Present { resource, .. } => resource.id(),
            Self::Absent(id) => id.clone(),
        }
    }

    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesiredLevel {
    pub level: Level,
    pub entries: Vec<DesiredEntry>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredSet {
    levels: Vec<DesiredLevel>,
}

impl DesiredSet {
    pub const fn new() -> Self {
        Self { levels: Vec::new() }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level, entries: Vec<DesiredEntry>) -> Self {
        self.levels.push(DesiredLevel { level, entries });
        self
    }

    pub fn levels(&self) -> &[DesiredLevel] {
        &self.levels
    }

    pub fn level(&self, level: Level) -> Option<&DesiredLevel> {
        self.levels.iter().find(|l| l.level == level)
    }

    pub fn entries(&self) -> impl Iterator<Item = &DesiredEntry> {
        self.levels.iter().flat_map(|l| l.entries.iter())
    }

    /// Resources that must exist, in resolution order.
    pub fn present(&self) -> impl Iterator<Item = &ManagedResource> {
        self.entries().filter_map(|entry| match entry {
            DesiredEntry::Present { resource, .. } => Some(resource),
            DesiredEntry::Absent(_) => None,
        })
    }

    pub fn get(&self, id: &ResourceId) -> Option<&DesiredEntry> {
        self.entries().find(|entry| &entry.id() == id)
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(|l| l.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
