//! Write transaction: record storage plus reference index maintenance

use heed::RwTxn;

use crate::constants::{Link, META_NEXT_ID};
use crate::db::Dbs;
use crate::error::{err, Error, Result};
use crate::keys::{entity_key, link_key, link_prefix};
use crate::model::{Entity, EntityKind, Id, Role, User};
use crate::read::{self, ReadTxn};
use crate::store::{StoreRead, StoreWrite};

/// Transaction wrapper for batched writes
pub(crate) struct WriteTxn<'a, 'e> {
    dbs: &'a Dbs,
    tx: RwTxn<'e>,
}

impl<'a, 'e> WriteTxn<'a, 'e> {
    #[inline]
    pub(crate) fn new(dbs: &'a Dbs, tx: RwTxn<'e>) -> Self {
        WriteTxn { dbs, tx }
    }

    #[inline]
    pub(crate) fn commit(self) -> Result<()> {
        self.tx.commit().map_err(err)
    }

    #[inline]
    fn reader(&self) -> ReadTxn<'_, 'e> {
        ReadTxn { dbs: self.dbs, tx: &*self.tx }
    }

    fn next_id(&mut self) -> Result<Id> {
        let id = self.dbs.meta.get(&self.tx, META_NEXT_ID).map_err(err)?.unwrap_or(1);
        self.dbs.meta.put(&mut self.tx, META_NEXT_ID, &(id + 1)).map_err(err)?;
        Ok(id)
    }

    fn add_link(&mut self, link: Link, target: Id, source: Id) -> Result<()> {
        let k = link_key(link, target, source);
        if self.dbs.links.get(&self.tx, &k).map_err(err)?.is_some() {
            return Ok(());
        }
        self.dbs.links.put(&mut self.tx, &k, &source).map_err(err)?;
        let ck = link_prefix(link, target);
        let n = self.dbs.link_counts.get(&self.tx, &ck).map_err(err)?.unwrap_or(0);
        self.dbs.link_counts.put(&mut self.tx, &ck, &(n + 1)).map_err(err)
    }

    fn remove_link(&mut self, link: Link, target: Id, source: Id) -> Result<()> {
        if !self.dbs.links.delete(&mut self.tx, &link_key(link, target, source)).map_err(err)? {
            return Ok(());
        }
        let ck = link_prefix(link, target);
        match self.dbs.link_counts.get(&self.tx, &ck).map_err(err)?.unwrap_or(0) {
            0 | 1 => {
                self.dbs.link_counts.delete(&mut self.tx, &ck).map_err(err)?;
            }
            n => self.dbs.link_counts.put(&mut self.tx, &ck, &(n - 1)).map_err(err)?,
        }
        Ok(())
    }

    /// Write `new` over `old`, keeping the link index in step
    fn replace(&mut self, old: Option<&Entity>, new: &Entity, id: Id) -> Result<()> {
        let old_links = old.map(Entity::links).unwrap_or_default();
        let new_links = new.links();
        for &(link, target) in old_links.iter().filter(|l| !new_links.contains(l)) {
            self.remove_link(link, target, id)?;
        }
        for &(link, target) in new_links.iter().filter(|l| !old_links.contains(l)) {
            self.add_link(link, target, id)?;
        }
        let bytes = serde_json::to_vec(new).map_err(err)?;
        self.dbs.entities.put(&mut self.tx, &entity_key(new.kind(), id), &bytes).map_err(err)
    }

    fn index_identifier(&mut self, old: Option<&Entity>, user: &User, id: Id) -> Result<()> {
        if user.role == Role::System {
            return Err(Error::invalid("the SYSTEM role is never persisted"));
        }
        match self.dbs.identifiers.get(&self.tx, &user.identifier).map_err(err)? {
            Some(owner) if owner != id => {
                return Err(Error::invalid(format!("identifier '{}' is already taken", user.identifier)));
            }
            _ => {}
        }
        if let Some(Entity::User(prev)) = old {
            if prev.identifier != user.identifier {
                self.dbs.identifiers.delete(&mut self.tx, &prev.identifier).map_err(err)?;
            }
        }
        self.dbs.identifiers.put(&mut self.tx, &user.identifier, &id).map_err(err)
    }

    fn unassign(&mut self, link: Link, target: Id) -> Result<u64> {
        let kind = link.source_kind();
        let ids = read::sources(self.dbs, &self.tx, link, target)?;
        let mut n = 0;
        for id in ids {
            let Some(old) = read::get_entity(self.dbs, &self.tx, kind, id)? else {
                continue;
            };
            let mut new = old.clone();
            if new.clear_link(link) {
                self.replace(Some(&old), &new, id)?;
                n += 1;
            }
        }
        Ok(n)
    }
}

impl StoreRead for WriteTxn<'_, '_> {
    fn find_by_id(&self, kind: EntityKind, id: Id) -> Result<Option<Entity>> {
        self.reader().find_by_id(kind, id)
    }

    fn find_all(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        self.reader().find_all(kind)
    }

    fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>> {
        self.reader().find_user_by_identifier(identifier)
    }

    fn count_by_director(&self, kind: EntityKind, user: Id) -> Result<u64> {
        self.reader().count_by_director(kind, user)
    }

    fn count_by_sponsor(&self, user: Id) -> Result<u64> {
        self.reader().count_by_sponsor(user)
    }

    fn count_by_parent(&self, kind: EntityKind, parent: Id) -> Result<u64> {
        self.reader().count_by_parent(kind, parent)
    }

    fn find_all_by_director(&self, kind: EntityKind, user: Id) -> Result<Vec<Entity>> {
        self.reader().find_all_by_director(kind, user)
    }

    fn find_all_by_parent(&self, kind: EntityKind, parent: Id) -> Result<Vec<Entity>> {
        self.reader().find_all_by_parent(kind, parent)
    }
}

impl StoreWrite for WriteTxn<'_, '_> {
    fn save(&mut self, mut entity: Entity) -> Result<Entity> {
        let kind = entity.kind();
        let (id, old) = match entity.id() {
            Some(id) => (id, read::get_entity(self.dbs, &self.tx, kind, id)?),
            None => {
                let id = self.next_id()?;
                entity.set_id(id);
                (id, None)
            }
        };

        if let Entity::Project(p) = &entity {
            if let Some(director) = p.director {
                let held = read::sources(self.dbs, &self.tx, Link::ProjectDirector, director)?;
                if held.iter().any(|&other| other != id) {
                    return Err(Error::invalid(format!("user {} already directs a project", director)));
                }
            }
        }
        if let Entity::User(u) = &entity {
            self.index_identifier(old.as_ref(), u, id)?;
        }

        self.replace(old.as_ref(), &entity, id)?;
        Ok(entity)
    }

    fn delete_by_id(&mut self, kind: EntityKind, id: Id) -> Result<bool> {
        let Some(old) = read::get_entity(self.dbs, &self.tx, kind, id)? else {
            return Ok(false);
        };
        for (link, target) in old.links() {
            self.remove_link(link, target, id)?;
        }
        if let Entity::User(u) = &old {
            self.dbs.identifiers.delete(&mut self.tx, &u.identifier).map_err(err)?;
        }
        self.dbs.entities.delete(&mut self.tx, &entity_key(kind, id)).map_err(err)
    }

    fn unassign_director(&mut self, kind: EntityKind, user: Id) -> Result<u64> {
        match kind.director_link() {
            Some(link) => self.unassign(link, user),
            None => Ok(0),
        }
    }

    fn unassign_sponsor(&mut self, user: Id) -> Result<u64> {
        self.unassign(Link::ProjectSponsor, user)
    }

    fn unassign_users_from_project(&mut self, project: Id) -> Result<u64> {
        self.unassign(Link::UserProject, project)
    }
}
