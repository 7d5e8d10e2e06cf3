//! Settings synchronizer.
//!
//! Holds the live configuration next to `last_synced`, the copy taken at the
//! last load or successful save. Save transmits only the sections whose
//! canonical form differs from that baseline.

mod edit;

pub use edit::*;

use crate::gateway::{Backend, FieldError, GatewayError, PersistPayload};
use crate::model::{ConfigSnapshot, KernelSettings, Section};

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("failed to load settings: {0}")]
    Load(GatewayError),
    #[error("failed to persist {section} settings: {source}")]
    Persist {
        section: Section,
        #[source]
        source: GatewayError,
    },
    #[error("invalid edit: {0}")]
    Field(#[from] FieldError),
}

/// Per-section dirty flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirtySections {
    pub ai: bool,
    pub kernel: bool,
    pub general: bool,
    pub prompts: bool,
    pub channels: bool,
}

impl DirtySections {
    pub fn get(&self, section: Section) -> bool {
        match section {
            Section::Ai => self.ai,
            Section::Kernel => self.kernel,
            Section::General => self.general,
            Section::Prompts => self.prompts,
            Section::Channels => self.channels,
        }
    }

    fn set(&mut self, section: Section, dirty: bool) {
        match section {
            Section::Ai => self.ai = dirty,
            Section::Kernel => self.kernel = dirty,
            Section::General => self.general = dirty,
            Section::Prompts => self.prompts = dirty,
            Section::Channels => self.channels = dirty,
        }
    }

    pub fn any(&self) -> bool {
        Section::ALL.iter().any(|s| self.get(*s))
    }

    /// Dirty sections in persistence order.
    pub fn sections(&self) -> Vec<Section> {
        Section::ALL.into_iter().filter(|s| self.get(*s)).collect()
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    /// Sections transmitted, in order.
    pub sent: Vec<Section>,
    /// A process-level kernel setting changed; a restart is needed for it to apply.
    pub restart_advised: bool,
    /// Whether the post-save reload succeeded.
    pub reloaded: bool,
}

/// Canonical serialized form of one section.
pub fn section_fingerprint(snapshot: &ConfigSnapshot, section: Section) -> Value {
    let value = match section {
        Section::Ai => serde_json::to_value(&snapshot.ai).map(|mut v| {
            if let Some(map) = v.as_object_mut() {
                map.remove("prompts");
            }
            v
        }),
        Section::Kernel => serde_json::to_value(&snapshot.kernel),
        Section::General => serde_json::to_value(&snapshot.general),
        Section::Prompts => serde_json::to_value(&snapshot.ai.prompts),
        Section::Channels => serde_json::to_value(&snapshot.integration.channels),
    };
    value.unwrap_or_default()
}

/// Kernel changes that only take effect after a restart.
pub fn restart_required(before: &KernelSettings, after: &KernelSettings) -> bool {
    before.worker_threads != after.worker_threads || before.io_buffer_size != after.io_buffer_size
}

/// Live configuration plus its last-synchronized baseline.
pub struct SettingsSync {
    backend: Arc<dyn Backend>,
    live: ConfigSnapshot,
    last_synced: ConfigSnapshot,
}

impl SettingsSync {
    /// Start from hard-coded defaults; nothing is dirty.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            live: ConfigSnapshot::default(),
            last_synced: ConfigSnapshot::default(),
        }
    }

    pub fn live(&self) -> &ConfigSnapshot {
        &self.live
    }

    #[cfg(test)]
    pub fn baseline(&self) -> &ConfigSnapshot {
        &self.last_synced
    }

    /// Replace the live snapshot with the backend's and re-baseline.
    pub async fn load(&mut self) -> Result<&ConfigSnapshot, SyncError> {
        let fresh = self.backend.fetch_settings().await.map_err(SyncError::Load)?;
        self.rebaseline(fresh);
        tracing::info!("Settings loaded from backend");
        Ok(&self.live)
    }

    fn rebaseline(&mut self, snapshot: ConfigSnapshot) {
        self.last_synced = snapshot.clone();
        self.live = snapshot;
    }

    pub fn mutate(&mut self, edit: SettingsEdit) -> Result<Section, SyncError> {
        Ok(edit.apply(&mut self.live)?)
    }

    pub fn is_dirty(&self) -> DirtySections {
        let mut dirty = DirtySections::default();
        for section in Section::ALL {
            let changed = section_fingerprint(&self.live, section) != section_fingerprint(&self.last_synced, section);
            dirty.set(section, changed);
        }
        dirty
    }

    /// Persist every dirty section, then reload to pick up server-assigned ids.
    ///
    /// On a persist failure neither the live snapshot nor the baseline moves,
    /// so the save can simply be retried.
    pub async fn save(&mut self) -> Result<SaveOutcome, SyncError> {
        let dirty = self.is_dirty();
        if !dirty.any() {
            self.last_synced = self.live.clone();
            return Ok(SaveOutcome {
                sent: Vec::new(),
                restart_advised: false,
                reloaded: false,
            });
        }

        let restart_advised = restart_required(&self.last_synced.kernel, &self.live.kernel);
        let sent = dirty.sections();

        for section in &sent {
            let payload = PersistPayload::for_section(&self.live, *section);
            if let Err(source) = self.backend.persist(payload).await {
                tracing::error!("Failed to persist {} settings: {}", section, source);
                return Err(SyncError::Persist {
                    section: *section,
                    source,
                });
            }
            tracing::info!("Persisted {} settings", section);
        }

        let reloaded = match self.backend.fetch_settings().await {
            Ok(fresh) => {
                self.rebaseline(fresh);
                true
            }
            Err(e) => {
                tracing::warn!("Settings saved but reload failed, keeping local copy: {}", e);
                self.last_synced = self.live.clone();
                false
            }
        };

        if restart_advised {
            tracing::info!("Kernel change requires a restart to take effect");
        }

        Ok(SaveOutcome {
            sent,
            restart_advised,
            reloaded,
        })
    }
}
