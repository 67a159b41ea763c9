// Copyright (C) 2025 Joseph Sacchini
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use thiserror::Error;
use tracing::{info, warn};
use wiregen_types::PeerRecord;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("failed to find generated server")]
    ServerNotFound,

    #[error("invalid configured server id 0")]
    ZeroId,

    #[error("configured server has empty public/private key")]
    MissingKeys,

    #[error("configured server has empty ip address")]
    MissingAddress,

    #[error("record id {id} is outside 1..={size}")]
    OutOfBounds { id: u64, size: usize },

    #[error("cannot allocate {size} peer records: {source}")]
    Allocation {
        size: usize,
        #[source]
        source: std::collections::TryReserveError,
    },
}

/// Id-indexed arena of peer records for one run. Slot `i` holds id `i + 1`.
#[derive(Debug)]
pub struct PeerStore {
    slots: Vec<Option<PeerRecord>>,
}

impl PeerStore {
    /// Fit the previous run's records to an address space of `size` usable
    /// addresses. Records past the new bound are dropped and every server
    /// flag is cleared; the current run decides which record is the server.
    pub fn reconcile(
        previous: Vec<PeerRecord>,
        size: usize,
        reset_all: bool,
    ) -> Result<Self, ValidationError> {
        let mut slots: Vec<Option<PeerRecord>> = Vec::new();
        slots
            .try_reserve_exact(size)
            .map_err(|source| ValidationError::Allocation { size, source })?;

        if reset_all {
            if !previous.is_empty() {
                warn!(count = previous.len(), "reset requested, discarding existing peers");
            }
        } else {
            let kept = previous.len().min(size);
            if previous.len() > size {
                warn!(
                    dropped = previous.len() - size,
                    size, "dropping peers beyond the new address space"
                );
            }
            slots.extend(previous.into_iter().take(kept).map(|mut record| {
                record.is_server = false;
                Some(record)
            }));
        }
        slots.resize_with(size, || None);

        info!(size, "peer store ready");
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Remove and return the stored record for `id`, or an empty record when
    /// the slot is vacant or out of range.
    pub fn take(&mut self, id: u64) -> PeerRecord {
        self.index(id)
            .and_then(|i| self.slots[i].take())
            .unwrap_or_default()
    }

    pub fn put(&mut self, record: PeerRecord) -> Result<(), ValidationError> {
        let i = self.index(record.id).ok_or(ValidationError::OutOfBounds {
            id: record.id,
            size: self.slots.len(),
        })?;
        self.slots[i] = Some(record);
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<&PeerRecord> {
        self.index(id).and_then(|i| self.slots[i].as_ref())
    }

    /// First record flagged as the server, validated.
    pub fn resolve_server(&self) -> Result<&PeerRecord, ValidationError> {
        let server = self
            .slots
            .iter()
            .flatten()
            .find(|record| record.is_server)
            .ok_or(ValidationError::ServerNotFound)?;
        validate_server(server)?;
        Ok(server)
    }

    /// All records in id order. Vacant slots come back as empty records
    /// carrying their id.
    pub fn into_records(self) -> Vec<PeerRecord> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.unwrap_or_else(|| PeerRecord {
                    id: i as u64 + 1,
                    ..PeerRecord::default()
                })
            })
            .collect()
    }

    fn index(&self, id: u64) -> Option<usize> {
        let i = usize::try_from(id).ok()?.checked_sub(1)?;
        (i < self.slots.len()).then_some(i)
    }
}

pub fn validate_server(server: &PeerRecord) -> Result<(), ValidationError> {
    // ids are 1-based
    if server.id == 0 {
        return Err(ValidationError::ZeroId);
    }
    if server.public_key.is_empty() || server.private_key.is_empty() {
        return Err(ValidationError::MissingKeys);
    }
    if server.ip.is_empty() {
        return Err(ValidationError::MissingAddress);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn record(id: u64, name: &str) -> PeerRecord {
        PeerRecord {
            id,
            name: name.into(),
            ..PeerRecord::default()
        }
    }

    fn server(id: u64) -> PeerRecord {
        PeerRecord {
            id,
            ip: "10.0.0.1".into(),
            is_server: true,
            private_key: "priv".into(),
            public_key: "pub".into(),
            ..PeerRecord::default()
        }
    }

    #[test]
    fn reconcile_drops_out_of_range_and_clears_server() {
        let previous = vec![server(1), record(2, "b"), record(3, "c")];
        let mut store = PeerStore::reconcile(previous, 2, false).unwrap();
        assert_eq!(store.len(), 2);
        assert!(!store.get(1).unwrap().is_server);
        assert_eq!(store.take(2).name, "b");
        assert_eq!(store.take(3), PeerRecord::default());
    }

    #[test]
    fn reconcile_grows_with_vacant_slots() {
        let store = PeerStore::reconcile(vec![record(1, "a")], 3, false).unwrap();
        assert_eq!(store.len(), 3);
        assert!(store.get(2).is_none());
        let records = store.into_records();
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn reset_discards_everything() {
        let store = PeerStore::reconcile(vec![record(1, "a"), record(2, "b")], 2, true).unwrap();
        assert!(store.get(1).is_none());
        assert!(store.get(2).is_none());
    }

    #[test]
    fn take_leaves_slot_vacant() {
        let mut store = PeerStore::reconcile(vec![record(1, "a")], 1, false).unwrap();
        assert_eq!(store.take(1).name, "a");
        assert!(store.get(1).is_none());
    }

    #[test]
    fn impossible_size_is_an_error() {
        assert!(matches!(
            PeerStore::reconcile(vec![], usize::MAX, false),
            Err(ValidationError::Allocation { .. })
        ));
    }

    #[test_case(0 ; "zero id")]
    #[test_case(4 ; "past the end")]
    fn put_rejects_out_of_bounds(id: u64) {
        let mut store = PeerStore::reconcile(vec![], 3, false).unwrap();
        assert!(matches!(
            store.put(record(id, "x")),
            Err(ValidationError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn resolves_first_server() {
        let mut store = PeerStore::reconcile(vec![], 3, false).unwrap();
        store.put(record(1, "a")).unwrap();
        store.put(server(2)).unwrap();
        store.put(server(3)).unwrap();
        assert_eq!(store.resolve_server().unwrap().id, 2);
    }

    #[test]
    fn missing_server_is_an_error() {
        let store = PeerStore::reconcile(vec![record(1, "a")], 1, false).unwrap();
        assert!(matches!(store.resolve_server(), Err(ValidationError::ServerNotFound)));
    }

    #[test_case(PeerRecord { id: 0, ..server(1) } ; "zero id")]
    #[test_case(PeerRecord { public_key: String::new(), ..server(1) } ; "no public key")]
    #[test_case(PeerRecord { private_key: String::new(), ..server(1) } ; "no private key")]
    #[test_case(PeerRecord { ip: String::new(), ..server(1) } ; "no address")]
    fn invalid_server(server: PeerRecord) {
        assert!(validate_server(&server).is_err());
    }
}
