// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint identity allocation and lookup.
//!
//! Four indices (all/user x writer/reader) plus the monotonic id counter.
//! Listener threads resolve entity ids against this registry on every
//! delivery, so deletion is observed cleanly under concurrent I/O.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::types::guid::{
    KIND_READER_NO_KEY, KIND_READER_WITH_KEY, KIND_WRITER_NO_KEY, KIND_WRITER_WITH_KEY,
};
use crate::core::types::{EndpointKind, EntityId, TopicKind};
use crate::participant::endpoint::LocalEndpoint;

#[derive(Default)]
struct Indices {
    all_writers: Vec<Arc<LocalEndpoint>>,
    all_readers: Vec<Arc<LocalEndpoint>>,
    user_writers: Vec<Arc<LocalEndpoint>>,
    user_readers: Vec<Arc<LocalEndpoint>>,
}

/// Identity allocation and lookup over all local endpoints.
pub struct EndpointRegistry {
    indices: RwLock<Indices>,
    id_counter: AtomicU32,
}

impl EndpointRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(Indices::default()),
            id_counter: AtomicU32::new(0),
        }
    }

    /// Allocate an entity id.
    ///
    /// An explicit `requested` id is used verbatim; the caller is responsible
    /// for its correctness. Otherwise byte 3 derives from (kind, topic kind)
    /// and bytes 0..2 take the low 24 bits of `entity_number` (when non-zero)
    /// or of the next counter value.
    pub fn allocate_entity_id(
        &self,
        requested: EntityId,
        kind: EndpointKind,
        topic_kind: TopicKind,
        entity_number: u32,
    ) -> EntityId {
        if !requested.is_unknown() {
            return requested;
        }
        let kind_octet = match (kind, topic_kind) {
            (EndpointKind::Writer, TopicKind::NoKey) => KIND_WRITER_NO_KEY,
            (EndpointKind::Writer, TopicKind::WithKey) => KIND_WRITER_WITH_KEY,
            (EndpointKind::Reader, TopicKind::NoKey) => KIND_READER_NO_KEY,
            (EndpointKind::Reader, TopicKind::WithKey) => KIND_READER_WITH_KEY,
        };
        let idnum = if entity_number > 0 {
            entity_number
        } else {
            self.id_counter.fetch_add(1, Ordering::Relaxed) + 1
        };
        EntityId::from_counter(idnum, kind_octet)
    }

    /// Whether a user endpoint of `kind` already carries `entity_id`.
    #[must_use]
    pub fn exists(&self, entity_id: EntityId, kind: EndpointKind) -> bool {
        let indices = self.indices.read();
        let list = match kind {
            EndpointKind::Writer => &indices.user_writers,
            EndpointKind::Reader => &indices.user_readers,
        };
        list.iter().any(|ep| ep.entity_id() == entity_id)
    }

    pub(crate) fn register(&self, endpoint: Arc<LocalEndpoint>, is_builtin: bool) {
        let mut indices = self.indices.write();
        match endpoint.kind() {
            EndpointKind::Writer => {
                if !is_builtin {
                    indices.user_writers.push(Arc::clone(&endpoint));
                }
                indices.all_writers.push(endpoint);
            }
            EndpointKind::Reader => {
                if !is_builtin {
                    indices.user_readers.push(Arc::clone(&endpoint));
                }
                indices.all_readers.push(endpoint);
            }
        }
    }

    /// Remove a user endpoint from both its indices.
    pub(crate) fn remove_user(
        &self,
        entity_id: EntityId,
        kind: EndpointKind,
    ) -> Option<Arc<LocalEndpoint>> {
        let mut indices = self.indices.write();
        let indices = &mut *indices;
        let (user, all) = match kind {
            EndpointKind::Writer => (&mut indices.user_writers, &mut indices.all_writers),
            EndpointKind::Reader => (&mut indices.user_readers, &mut indices.all_readers),
        };
        let position = user.iter().position(|ep| ep.entity_id() == entity_id)?;
        let endpoint = user.remove(position);
        all.retain(|ep| ep.entity_id() != entity_id);
        Some(endpoint)
    }

    /// Remove any endpoint (built-in teardown path).
    pub(crate) fn remove_any(
        &self,
        entity_id: EntityId,
        kind: EndpointKind,
    ) -> Option<Arc<LocalEndpoint>> {
        let mut indices = self.indices.write();
        let indices = &mut *indices;
        let (user, all) = match kind {
            EndpointKind::Writer => (&mut indices.user_writers, &mut indices.all_writers),
            EndpointKind::Reader => (&mut indices.user_readers, &mut indices.all_readers),
        };
        user.retain(|ep| ep.entity_id() != entity_id);
        let position = all.iter().position(|ep| ep.entity_id() == entity_id)?;
        Some(all.remove(position))
    }

    #[must_use]
    pub fn writer_by_id(&self, entity_id: EntityId) -> Option<Arc<LocalEndpoint>> {
        self.indices
            .read()
            .all_writers
            .iter()
            .find(|ep| ep.entity_id() == entity_id)
            .cloned()
    }

    #[must_use]
    pub fn reader_by_id(&self, entity_id: EntityId) -> Option<Arc<LocalEndpoint>> {
        self.indices
            .read()
            .all_readers
            .iter()
            .find(|ep| ep.entity_id() == entity_id)
            .cloned()
    }

    #[must_use]
    pub fn user_writer_count(&self) -> usize {
        self.indices.read().user_writers.len()
    }

    #[must_use]
    pub fn user_reader_count(&self) -> usize {
        self.indices.read().user_readers.len()
    }

    #[must_use]
    pub fn writer_count(&self) -> usize {
        self.indices.read().all_writers.len()
    }

    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.indices.read().all_readers.len()
    }

    /// Any user endpoint, writers first (teardown order helper).
    pub(crate) fn first_user_endpoint(&self) -> Option<Arc<LocalEndpoint>> {
        let indices = self.indices.read();
        indices
            .user_writers
            .first()
            .or_else(|| indices.user_readers.first())
            .cloned()
    }

    /// All registered endpoints (built-in teardown path).
    pub(crate) fn all_endpoints(&self) -> Vec<Arc<LocalEndpoint>> {
        let indices = self.indices.read();
        indices
            .all_writers
            .iter()
            .chain(indices.all_readers.iter())
            .cloned()
            .collect()
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}
