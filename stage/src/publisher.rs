//! Hands computed mix parameters to the audio mixer.

use crate::registry::PairParams;
use log::trace;
use stage_core::{Connection, EntityId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Engine-wide switches carried alongside the per-entity parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotFlags {
    /// The local stream is not being published
    pub local_muted: bool,
    /// Blur sources that are behind the listener
    pub blur: bool,
    /// Apply air absorption to distant sources
    pub air_absorb: bool,
}

/// Complete mix state for one connection at one revision
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MixSnapshot {
    pub connection: Connection,
    /// Increases by one with every publish
    pub revision: u64,
    pub flags: SnapshotFlags,
    /// Every stream the listener receives
    pub params: BTreeMap<EntityId, PairParams>,
}

impl MixSnapshot {
    /// Gain for `id`, zero when the stream is not received.
    pub fn gain(&self, id: EntityId) -> f32 {
        self.params.get(&id).map_or(0.0, |pair| pair.gain)
    }

    pub fn is_audible(&self, id: EntityId) -> bool {
        self.gain(id) > 0.0
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Consumer of mix snapshots, typically the audio renderer
#[cfg_attr(test, mockall::automock)]
pub trait MixSink: Send {
    fn apply(&mut self, snapshot: &MixSnapshot);
}

/// Publishes whole snapshots so readers never see a half-applied update.
#[derive(Debug)]
pub struct MixPublisher {
    tx: watch::Sender<Arc<MixSnapshot>>,
}

impl MixPublisher {
    pub fn new(connection: Connection) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(MixSnapshot {
            connection,
            ..MixSnapshot::default()
        }));
        Self { tx }
    }

    /// Replace the current snapshot and return its revision.
    pub fn publish(&self, params: BTreeMap<EntityId, PairParams>, flags: SnapshotFlags) -> u64 {
        let current = self.tx.borrow().clone();
        let snapshot = MixSnapshot {
            connection: current.connection.clone(),
            revision: current.revision + 1,
            flags,
            params,
        };
        let revision = snapshot.revision;
        trace!(
            "Publishing r{} on {} with {} streams",
            revision,
            snapshot.connection,
            snapshot.params.len()
        );
        // Stored even with no live receivers, so later subscribers see it
        self.tx.send_replace(Arc::new(snapshot));
        revision
    }

    pub fn snapshot(&self) -> Arc<MixSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<MixSnapshot>> {
        self.tx.subscribe()
    }

    /// Hand the current snapshot to `sink`.
    pub fn publish_to(&self, sink: &mut dyn MixSink) {
        let snapshot = self.snapshot();
        sink.apply(&snapshot);
    }
}
