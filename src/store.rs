//! Entity Store contract
//!
//! The engine only talks to storage through these traits. Every `write`
//! closure is one unit of work: it commits when the closure returns `Ok` and
//! leaves the store untouched otherwise.

use crate::error::{Error, Result};
use crate::model::{Entity, EntityKind, Id, Record, User};

/// Queries available inside any transaction
pub trait StoreRead {
    fn find_by_id(&self, kind: EntityKind, id: Id) -> Result<Option<Entity>>;

    fn find_all(&self, kind: EntityKind) -> Result<Vec<Entity>>;

    fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>>;

    /// Records of `kind` whose director is `user`. O(1).
    fn count_by_director(&self, kind: EntityKind, user: Id) -> Result<u64>;

    /// Projects sponsored by `user`. O(1).
    fn count_by_sponsor(&self, user: Id) -> Result<u64>;

    /// Records of `kind` contained in `parent` (users: members of a project). O(1).
    fn count_by_parent(&self, kind: EntityKind, parent: Id) -> Result<u64>;

    fn find_all_by_director(&self, kind: EntityKind, user: Id) -> Result<Vec<Entity>>;

    fn find_all_by_parent(&self, kind: EntityKind, parent: Id) -> Result<Vec<Entity>>;
}

/// Mutations, only available inside a write transaction
pub trait StoreWrite: StoreRead {
    /// Insert or replace a record. Records without an id get the next id
    /// from the store's sequence; the saved record is returned.
    fn save(&mut self, entity: Entity) -> Result<Entity>;

    /// Remove a record and its outbound references. Inbound references are
    /// the caller's responsibility.
    fn delete_by_id(&mut self, kind: EntityKind, id: Id) -> Result<bool>;

    /// Clear the director of every record of `kind` directed by `user`.
    fn unassign_director(&mut self, kind: EntityKind, user: Id) -> Result<u64>;

    /// Clear the sponsor of every project sponsored by `user`.
    fn unassign_sponsor(&mut self, user: Id) -> Result<u64>;

    /// Clear the membership of every user in `project`.
    fn unassign_users_from_project(&mut self, project: Id) -> Result<u64>;
}

/// A store that hands out transactions
pub trait EntityStore {
    fn read<T>(&self, f: impl FnOnce(&dyn StoreRead) -> Result<T>) -> Result<T>;

    fn write<T>(&self, f: impl FnOnce(&mut dyn StoreWrite) -> Result<T>) -> Result<T>;
}

impl<T: EntityStore> EntityStore for &T {
    fn read<R>(&self, f: impl FnOnce(&dyn StoreRead) -> Result<R>) -> Result<R> {
        (**self).read(f)
    }

    fn write<R>(&self, f: impl FnOnce(&mut dyn StoreWrite) -> Result<R>) -> Result<R> {
        (**self).write(f)
    }
}

/// Typed point lookup
pub fn fetch<R: Record, S: StoreRead + ?Sized>(tx: &S, id: Id) -> Result<Option<R>> {
    Ok(tx.find_by_id(R::KIND, id)?.and_then(R::from_entity))
}

/// Typed point lookup that treats a miss as `NotFound`
pub fn require<R: Record, S: StoreRead + ?Sized>(tx: &S, id: Id) -> Result<R> {
    fetch(tx, id)?.ok_or(Error::NotFound { kind: R::KIND, id })
}

/// Typed relationship-scoped query
pub fn children<R: Record, S: StoreRead + ?Sized>(tx: &S, parent: Id) -> Result<Vec<R>> {
    Ok(tx
        .find_all_by_parent(R::KIND, parent)?
        .into_iter()
        .filter_map(R::from_entity)
        .collect())
}
