//! Lifecycle Engine: hard, cascade and safe removal
//!
//! These functions run inside a write transaction the caller has already
//! authorized for the top-level target. Children removed by a cascade are
//! not re-authorized. Leaves and their back-references always go before
//! their owner, so no step leaves a dangling id behind.

use crate::error::{Error, Result};
use crate::model::{Entity, EntityKind, Id};
use crate::store::{StoreRead, StoreWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Refuse while anything depends on the target
    Hard,
    /// Remove everything that only exists inside the target, then the target
    Cascade,
    /// Null every inbound reference, then remove the target
    Safe,
}

/// What a removal touched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// Removed records, leaves first, the requested target last
    pub removed: Vec<(EntityKind, Id)>,
    /// References nulled along the way (memberships, directorships, sponsorships)
    pub cleared: u64,
}

/// Number of records that would be left dangling by a hard delete.
/// A fixed number of O(1) counter reads per kind.
pub fn dependent_count<S: StoreRead + ?Sized>(tx: &S, kind: EntityKind, id: Id) -> Result<u64> {
    Ok(match kind {
        EntityKind::Portfolio => {
            tx.count_by_parent(EntityKind::Program, id)? + tx.count_by_parent(EntityKind::Pmo, id)?
        }
        EntityKind::Program => tx.count_by_parent(EntityKind::Project, id)?,
        EntityKind::Project => tx.count_by_parent(EntityKind::User, id)?,
        EntityKind::Pmo => 0,
        EntityKind::User => {
            let mut n = tx.count_by_sponsor(id)?;
            for k in EntityKind::ALL {
                n += tx.count_by_director(k, id)?;
            }
            n
        }
    })
}

pub fn remove<S: StoreWrite + ?Sized>(tx: &mut S, kind: EntityKind, id: Id, strategy: Strategy) -> Result<Removal> {
    let mut out = Removal::default();
    match strategy {
        Strategy::Hard => hard(tx, kind, id, &mut out)?,
        Strategy::Cascade => cascade(tx, kind, id, &mut out)?,
        Strategy::Safe => safe(tx, kind, id, &mut out)?,
    }
    Ok(out)
}

fn delete_one<S: StoreWrite + ?Sized>(tx: &mut S, kind: EntityKind, id: Id, out: &mut Removal) -> Result<()> {
    if !tx.delete_by_id(kind, id)? {
        return Err(Error::NotFound { kind, id });
    }
    out.removed.push((kind, id));
    Ok(())
}

fn hard<S: StoreWrite + ?Sized>(tx: &mut S, kind: EntityKind, id: Id, out: &mut Removal) -> Result<()> {
    let dependents = dependent_count(&*tx, kind, id)?;
    if dependents > 0 {
        return Err(Error::IntegrityViolation { kind, id, dependents });
    }
    delete_one(tx, kind, id, out)
}

fn child_ids<S: StoreRead + ?Sized>(tx: &S, kind: EntityKind, parent: Id) -> Result<Vec<Id>> {
    Ok(tx.find_all_by_parent(kind, parent)?.iter().filter_map(Entity::id).collect())
}

fn cascade<S: StoreWrite + ?Sized>(tx: &mut S, kind: EntityKind, id: Id, out: &mut Removal) -> Result<()> {
    match kind {
        EntityKind::Portfolio => {
            for program in child_ids(&*tx, EntityKind::Program, id)? {
                cascade(tx, EntityKind::Program, program, out)?;
            }
            for pmo in child_ids(&*tx, EntityKind::Pmo, id)? {
                delete_one(tx, EntityKind::Pmo, pmo, out)?;
            }
            delete_one(tx, kind, id, out)
        }
        EntityKind::Program => {
            for project in child_ids(&*tx, EntityKind::Project, id)? {
                cascade(tx, EntityKind::Project, project, out)?;
            }
            delete_one(tx, kind, id, out)
        }
        EntityKind::Project => {
            out.cleared += tx.unassign_users_from_project(id)?;
            delete_one(tx, kind, id, out)
        }
        EntityKind::Pmo => delete_one(tx, kind, id, out),
        // nothing exists only in relation to a user
        EntityKind::User => safe(tx, kind, id, out),
    }
}

fn safe<S: StoreWrite + ?Sized>(tx: &mut S, kind: EntityKind, id: Id, out: &mut Removal) -> Result<()> {
    match kind {
        EntityKind::Portfolio | EntityKind::Program => {
            if dependent_count(&*tx, kind, id)? > 0 {
                return Err(Error::invalid(format!(
                    "children of {} {} hold required references; use cascade delete",
                    kind, id
                )));
            }
            delete_one(tx, kind, id, out)
        }
        EntityKind::Project => {
            out.cleared += tx.unassign_users_from_project(id)?;
            delete_one(tx, kind, id, out)
        }
        EntityKind::Pmo => delete_one(tx, kind, id, out),
        EntityKind::User => {
            for k in EntityKind::ALL {
                out.cleared += tx.unassign_director(k, id)?;
            }
            out.cleared += tx.unassign_sponsor(id)?;
            delete_one(tx, kind, id, out)
        }
    }
}
