//! Fixed-width big-endian key encoding for LMDB storage.
//!
//! - entities:    [kind_tag][id]              (9 bytes)
//! - links:       [link_tag][target][source]  (17 bytes)
//! - link_counts: [link_tag][target]          (9 bytes, also the `links` scan prefix)
//!
//! Big-endian ids keep prefix scans ordered by id.

use crate::constants::Link;
use crate::model::{EntityKind, Id};

#[inline]
fn tagged(tag: u8, id: u64) -> [u8; 9] {
    let mut k = [0u8; 9];
    k[0] = tag;
    k[1..].copy_from_slice(&id.to_be_bytes());
    k
}

#[inline]
pub fn entity_key(kind: EntityKind, id: Id) -> [u8; 9] {
    tagged(kind.tag(), id)
}

/// Prefix covering every record of one kind
#[inline]
pub fn kind_prefix(kind: EntityKind) -> [u8; 1] {
    [kind.tag()]
}

#[inline]
pub fn link_prefix(link: Link, target: Id) -> [u8; 9] {
    tagged(link.tag(), target)
}

#[inline]
pub fn link_key(link: Link, target: Id, source: Id) -> [u8; 17] {
    let mut k = [0u8; 17];
    k[..9].copy_from_slice(&link_prefix(link, target));
    k[9..].copy_from_slice(&source.to_be_bytes());
    k
}

/// Read the trailing id out of an entity or link key
#[inline]
pub fn trailing_id(key: &[u8]) -> Option<Id> {
    if key.len() < 9 {
        return None;
    }
    let tail: [u8; 8] = key[key.len() - 8..].try_into().ok()?;
    Some(u64::from_be_bytes(tail))
}

// ============================================================================
// Tests
// ============================================================================
