//! Authority Resolver
//!
//! Answers "is this principal the director of that entity (or of its parent)?"
//! straight from the store. Absent principals, missing entities and vacant
//! directorships all resolve to `false`; only storage faults are errors.

use crate::error::Result;
use crate::model::{Entity, EntityKind, Id, Role};
use crate::principal::Principal;
use crate::store::StoreRead;

pub struct Authority<'s, S: StoreRead + ?Sized> {
    store: &'s S,
    bootstrap: bool,
}

impl<'s, S: StoreRead + ?Sized> Authority<'s, S> {
    /// `bootstrap` must come from an explicit engine flag, never a default
    pub fn new(store: &'s S, bootstrap: bool) -> Self {
        Authority { store, bootstrap }
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    /// Bootstrap bypass applies only while the flag is set, and only to the
    /// system identity or to a call with no identity at all.
    pub fn is_bootstrap(&self, principal: Option<&Principal>) -> bool {
        if !self.bootstrap {
            return false;
        }
        let eligible = principal.map_or(true, Principal::is_system);
        if eligible {
            tracing::warn!(
                principal = principal.map(|p| p.identifier.as_str()).unwrap_or("<none>"),
                "bootstrap mode: authorization bypassed"
            );
        }
        eligible
    }

    /// Role as currently stored for the principal's user record
    pub fn current_role(&self, principal: Option<&Principal>) -> Result<Option<Role>> {
        let Some(p) = principal else {
            return Ok(None);
        };
        if p.is_system() {
            return Ok(Some(Role::System));
        }
        Ok(match self.store.find_by_id(EntityKind::User, p.id)? {
            Some(Entity::User(u)) if u.identifier == p.identifier => Some(u.role),
            _ => None,
        })
    }

    pub fn is_director_of(&self, principal: Option<&Principal>, kind: EntityKind, id: Id) -> Result<bool> {
        let Some(p) = principal.filter(|p| !p.is_system()) else {
            return Ok(false);
        };
        Ok(self.store.find_by_id(kind, id)?.and_then(|e| e.director()) == Some(p.id))
    }

    /// Director of the container the entity lives in (a user's container is its project)
    pub fn is_director_of_parent(&self, principal: Option<&Principal>, kind: EntityKind, id: Id) -> Result<bool> {
        let Some(entity) = self.store.find_by_id(kind, id)? else {
            return Ok(false);
        };
        match (kind.parent_kind(), entity.parent()) {
            (Some(parent_kind), Some(parent)) => self.is_director_of(principal, parent_kind, parent),
            _ => Ok(false),
        }
    }

    pub fn is_sponsor_of(&self, principal: Option<&Principal>, project: Id) -> Result<bool> {
        let Some(p) = principal.filter(|p| !p.is_system()) else {
            return Ok(false);
        };
        Ok(match self.store.find_by_id(EntityKind::Project, project)? {
            Some(Entity::Project(pr)) => pr.sponsor == Some(p.id),
            _ => false,
        })
    }

    /// Whether the principal directs at least one record of `kind`
    pub fn directs_any(&self, principal: Option<&Principal>, kind: EntityKind) -> Result<bool> {
        let Some(p) = principal.filter(|p| !p.is_system()) else {
            return Ok(false);
        };
        Ok(self.store.count_by_director(kind, p.id)? > 0)
    }

    /// The one project the principal directs, if any
    pub fn directed_project(&self, principal: Option<&Principal>) -> Result<Option<Id>> {
        let Some(p) = principal.filter(|p| !p.is_system()) else {
            return Ok(None);
        };
        Ok(self
            .store
            .find_all_by_director(EntityKind::Project, p.id)?
            .first()
            .and_then(Entity::id))
    }
}
