// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Media store — append-only registry of image parts referenced by drawings.
//
// Parts are keyed by the SHA-256 digest of their bytes, so the same QR code
// substituted into ten tags is stored once and referenced ten times.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Relationship id of a media part (`rId1`, `rId2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub String);

const RELATIONSHIP_PREFIX: &str = "rId";

impl MediaId {
    /// Numeric suffix of an `rIdN` id.
    pub fn number(&self) -> Option<u64> {
        self.0.strip_prefix(RELATIONSHIP_PREFIX)?.parse().ok()
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image bytes waiting to be registered with a document.
///
/// The replacement builder produces these without touching any store; the
/// splicer registers them when the replacement is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRequest {
    pub bytes: Arc<[u8]>,
    pub content_type: String,
}

/// One stored media part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPart {
    pub id: MediaId,
    pub content_type: String,
    /// Hex-encoded SHA-256 of `bytes`.
    pub digest: String,
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaStore {
    parts: Vec<MediaPart>,
}

impl MediaStore {
    /// Store the requested bytes, or return the id of an identical part that
    /// is already present.
    pub fn register(&mut self, request: &MediaRequest) -> MediaId {
        let digest = digest_hex(&request.bytes);
        if let Some(existing) = self.parts.iter().find(|part| part.digest == digest) {
            debug!(id = %existing.id, "Media already registered");
            return existing.id.clone();
        }

        let id = self.next_free_id();
        debug!(
            %id,
            content_type = %request.content_type,
            bytes_len = request.bytes.len(),
            "Media registered"
        );
        self.parts.push(MediaPart {
            id: id.clone(),
            content_type: request.content_type.clone(),
            digest,
            bytes: request.bytes.to_vec(),
        });
        id
    }

    /// Store a part under an id chosen by the caller, as when loading a
    /// package that already holds images. An existing part with the same id
    /// is replaced.
    pub fn insert_part(&mut self, id: MediaId, content_type: impl Into<String>, bytes: Vec<u8>) {
        let part = MediaPart {
            id,
            content_type: content_type.into(),
            digest: digest_hex(&bytes),
            bytes,
        };
        match self.parts.iter_mut().find(|existing| existing.id == part.id) {
            Some(existing) => *existing = part,
            None => self.parts.push(part),
        }
    }

    /// First `rIdN` past the highest numbered id in the store and not in use.
    ///
    /// Loaded stores may hold sparse or foreign ids, so the part count alone
    /// is not a safe source.
    fn next_free_id(&self) -> MediaId {
        let highest = self
            .parts
            .iter()
            .filter_map(|part| part.id.number())
            .max()
            .unwrap_or(0);
        let mut n = highest + 1;
        loop {
            let id = MediaId(format!("{RELATIONSHIP_PREFIX}{n}"));
            if self.get(&id).is_none() {
                return id;
            }
            n += 1;
        }
    }

    pub fn get(&self, id: &MediaId) -> Option<&MediaPart> {
        self.parts.iter().find(|part| &part.id == id)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaPart> {
        self.parts.iter()
    }
}

/// Compute the hex-encoded SHA-256 digest of `data`.
fn digest_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Serialize raw bytes as one hex string instead of a JSON number array.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}
