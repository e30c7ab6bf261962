//! Read operations (no permission checks, direct LMDB access)

use heed::RoTxn;

use crate::constants::Link;
use crate::db::Dbs;
use crate::error::{err, Result};
use crate::keys::{entity_key, kind_prefix, link_prefix, trailing_id};
use crate::model::{Entity, EntityKind, Id, User};
use crate::store::StoreRead;

pub(crate) fn decode(bytes: &[u8]) -> Result<Entity> {
    serde_json::from_slice(bytes).map_err(err)
}

pub(crate) fn get_entity(d: &Dbs, tx: &RoTxn, kind: EntityKind, id: Id) -> Result<Option<Entity>> {
    match d.entities.get(tx, &entity_key(kind, id)).map_err(err)? {
        Some(bytes) => decode(bytes).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn list_kind(d: &Dbs, tx: &RoTxn, kind: EntityKind) -> Result<Vec<Entity>> {
    let mut r = Vec::new();
    for item in d.entities.prefix_iter(tx, &kind_prefix(kind)).map_err(err)? {
        let (_, v) = item.map_err(err)?;
        r.push(decode(v)?);
    }
    Ok(r)
}

/// Number of `link` references pointing at `target`
#[inline]
pub(crate) fn count_link(d: &Dbs, tx: &RoTxn, link: Link, target: Id) -> Result<u64> {
    Ok(d.link_counts.get(tx, &link_prefix(link, target)).map_err(err)?.unwrap_or(0))
}

/// Ids of every record referencing `target` through `link`
pub(crate) fn sources(d: &Dbs, tx: &RoTxn, link: Link, target: Id) -> Result<Vec<Id>> {
    let mut r = Vec::new();
    for item in d.links.prefix_iter(tx, &link_prefix(link, target)).map_err(err)? {
        let (k, _) = item.map_err(err)?;
        if let Some(id) = trailing_id(k) {
            r.push(id);
        }
    }
    Ok(r)
}

pub(crate) fn load_sources(d: &Dbs, tx: &RoTxn, link: Link, target: Id) -> Result<Vec<Entity>> {
    let kind = link.source_kind();
    let mut r = Vec::new();
    for id in sources(d, tx, link, target)? {
        if let Some(e) = get_entity(d, tx, kind, id)? {
            r.push(e);
        }
    }
    Ok(r)
}

pub(crate) fn user_by_identifier(d: &Dbs, tx: &RoTxn, identifier: &str) -> Result<Option<User>> {
    let Some(id) = d.identifiers.get(tx, identifier).map_err(err)? else {
        return Ok(None);
    };
    Ok(match get_entity(d, tx, EntityKind::User, id)? {
        Some(Entity::User(u)) => Some(u),
        _ => None,
    })
}

/// Read-only transaction handle
pub(crate) struct ReadTxn<'a, 'e> {
    pub dbs: &'a Dbs,
    pub tx: &'a RoTxn<'e>,
}

impl StoreRead for ReadTxn<'_, '_> {
    fn find_by_id(&self, kind: EntityKind, id: Id) -> Result<Option<Entity>> {
        get_entity(self.dbs, self.tx, kind, id)
    }

    fn find_all(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        list_kind(self.dbs, self.tx, kind)
    }

    fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>> {
        user_by_identifier(self.dbs, self.tx, identifier)
    }

    fn count_by_director(&self, kind: EntityKind, user: Id) -> Result<u64> {
        match kind.director_link() {
            Some(link) => count_link(self.dbs, self.tx, link, user),
            None => Ok(0),
        }
    }

    fn count_by_sponsor(&self, user: Id) -> Result<u64> {
        count_link(self.dbs, self.tx, Link::ProjectSponsor, user)
    }

    fn count_by_parent(&self, kind: EntityKind, parent: Id) -> Result<u64> {
        match kind.parent_link() {
            Some(link) => count_link(self.dbs, self.tx, link, parent),
            None => Ok(0),
        }
    }

    fn find_all_by_director(&self, kind: EntityKind, user: Id) -> Result<Vec<Entity>> {
        match kind.director_link() {
            Some(link) => load_sources(self.dbs, self.tx, link, user),
            None => Ok(Vec::new()),
        }
    }

    fn find_all_by_parent(&self, kind: EntityKind, parent: Id) -> Result<Vec<Entity>> {
        match kind.parent_link() {
            Some(link) => load_sources(self.dbs, self.tx, link, parent),
            None => Ok(Vec::new()),
        }
    }
}
