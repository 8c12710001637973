//! Durable session state.
//!
//! The fields that survive a session re-open after reconnect or rank
//! failover: who the client is, which inos it holds, and which of its
//! transactions already completed. The record layout is a serde_json
//! document; framing and journal placement belong to the layers above.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{ClientId, InoSet};

use super::completed::CompletedRequests;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed session record: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },

    #[error("encoding session record: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },

    #[error("session record for {client} has overlapping prealloc/used ino sets")]
    OverlappingInos { client: ClientId },
}

/// Durable bits of one session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub client: ClientId,
    pub prealloc_inos: InoSet,
    pub used_inos: InoSet,
    pub completed_requests: CompletedRequests,
    pub client_metadata: BTreeMap<String, String>,
}

impl SessionInfo {
    pub fn new(client: ClientId) -> Self {
        Self {
            client,
            ..Self::default()
        }
    }

    /// Reset the durable identity's soft fields: ino accounting and the
    /// idempotency ledger. Client identity and metadata persist with the
    /// connection.
    pub fn clear_meta(&mut self) {
        self.prealloc_inos.clear();
        self.used_inos.clear();
        self.completed_requests.clear();
    }

    /// Decode a durable record. Decoding the same bytes twice yields the
    /// same value; the prealloc/used disjointness invariant is checked on
    /// the way in.
    pub fn from_record_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        let info: SessionInfo =
            serde_json::from_slice(bytes).map_err(|source| RecordError::Malformed { source })?;
        if info.prealloc_inos.intersects(&info.used_inos) {
            return Err(RecordError::OverlappingInos {
                client: info.client,
            });
        }
        Ok(info)
    }

    pub fn to_record_bytes(&self) -> Result<Vec<u8>, RecordError> {
        serde_json::to_vec(self).map_err(|source| RecordError::Encode { source })
    }
}

/// Derive the friendly display name from client metadata.
///
/// Soft state only: shown in admin output, never part of any invariant.
pub(crate) fn derive_human_name(client: ClientId, metadata: &BTreeMap<String, String>) -> String {
    match metadata.get("hostname") {
        Some(hostname) => match metadata.get("entity_id") {
            Some(entity) => format!("{hostname}:{entity}"),
            None => hostname.clone(),
        },
        None => client.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Ino, Tid};

    fn sample() -> SessionInfo {
        let mut info = SessionInfo::new(ClientId::new(7));
        info.prealloc_inos.insert_span(Ino::new(0x100), 8);
        info.used_inos.insert_span(Ino::new(0x90), 2);
        info.completed_requests.insert(Tid::new(3), Some(Ino::new(0x91)));
        info.client_metadata
            .insert("hostname".into(), "node-a".into());
        info
    }

    #[test]
    fn record_roundtrip_is_idempotent() {
        let info = sample();
        let bytes = info.to_record_bytes().expect("encode");
        let once = SessionInfo::from_record_bytes(&bytes).expect("decode");
        let twice = SessionInfo::from_record_bytes(&bytes).expect("decode again");
        assert_eq!(once, info);
        assert_eq!(once, twice);
    }

    #[test]
    fn overlapping_ino_sets_are_rejected() {
        let mut info = sample();
        info.used_inos.insert(Ino::new(0x104));
        let bytes = info.to_record_bytes().expect("encode");
        let err = SessionInfo::from_record_bytes(&bytes).expect_err("overlap");
        assert!(matches!(err, RecordError::OverlappingInos { .. }));
    }

    #[test]
    fn clear_meta_keeps_identity_and_metadata() {
        let mut info = sample();
        info.clear_meta();
        assert!(info.prealloc_inos.is_empty());
        assert!(info.used_inos.is_empty());
        assert!(info.completed_requests.is_empty());
        assert_eq!(info.client, ClientId::new(7));
        assert_eq!(
            info.client_metadata.get("hostname").map(String::as_str),
            Some("node-a")
        );
    }

    #[test]
    fn human_name_prefers_hostname() {
        let mut meta = BTreeMap::new();
        assert_eq!(derive_human_name(ClientId::new(9), &meta), "client.9");

        meta.insert("hostname".into(), "node-b".into());
        assert_eq!(derive_human_name(ClientId::new(9), &meta), "node-b");

        meta.insert("entity_id".into(), "fuse-0".into());
        assert_eq!(derive_human_name(ClientId::new(9), &meta), "node-b:fuse-0");
    }
}
