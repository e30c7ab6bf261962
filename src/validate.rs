//! Reference validation run before any write
//!
//! Surfaces broken references as `ValidationFailed` instead of letting the
//! store write a dangling id.

use crate::error::{Error, Result};
use crate::model::{Entity, EntityKind, Id, Role};
use crate::store::StoreRead;

fn exists<S: StoreRead + ?Sized>(tx: &S, kind: EntityKind, id: Id, field: &str) -> Result<()> {
    match tx.find_by_id(kind, id)? {
        Some(_) => Ok(()),
        None => Err(Error::invalid(format!("{} references missing {} {}", field, kind, id))),
    }
}

fn user_role<S: StoreRead + ?Sized>(tx: &S, id: Id, field: &str) -> Result<Role> {
    match tx.find_by_id(EntityKind::User, id)? {
        Some(Entity::User(u)) => Ok(u.role),
        _ => Err(Error::invalid(format!("{} references missing user {}", field, id))),
    }
}

fn privileged_user<S: StoreRead + ?Sized>(tx: &S, id: Id, field: &str) -> Result<()> {
    if user_role(tx, id, field)?.is_privileged() {
        Ok(())
    } else {
        Err(Error::invalid(format!("{} must be a MANAGER or ADMIN (user {})", field, id)))
    }
}

/// A USER-role user may not hold references reserved for MANAGER/ADMIN
fn demotable<S: StoreRead + ?Sized>(tx: &S, id: Id) -> Result<()> {
    let mut held = Vec::new();
    for kind in [EntityKind::Portfolio, EntityKind::Program, EntityKind::Pmo] {
        let n = tx.count_by_director(kind, id)?;
        if n > 0 {
            held.push(format!("{} {} directorship(s)", n, kind));
        }
    }
    let n = tx.count_by_sponsor(id)?;
    if n > 0 {
        held.push(format!("{} project sponsorship(s)", n));
    }
    if held.is_empty() {
        Ok(())
    } else {
        Err(Error::invalid(format!("user {} must stay MANAGER or ADMIN while holding {}", id, held.join(", "))))
    }
}

/// Check required fields and every outbound reference of `entity`
pub fn validate<S: StoreRead + ?Sized>(tx: &S, entity: &Entity) -> Result<()> {
    if entity.name().trim().is_empty() {
        return Err(Error::invalid(format!("{} name must not be blank", entity.kind())));
    }
    match entity {
        Entity::Portfolio(p) => {
            if let Some(d) = p.director {
                privileged_user(tx, d, "portfolio.director")?;
            }
        }
        Entity::Program(p) => {
            exists(tx, EntityKind::Portfolio, p.portfolio, "program.portfolio")?;
            if let Some(d) = p.director {
                privileged_user(tx, d, "program.director")?;
            }
        }
        Entity::Project(p) => {
            exists(tx, EntityKind::Program, p.program, "project.program")?;
            if let Some(d) = p.director {
                user_role(tx, d, "project.director")?;
                let held = tx.find_all_by_director(EntityKind::Project, d)?;
                if held.iter().any(|other| other.id() != p.id) {
                    return Err(Error::invalid(format!("user {} already directs a project", d)));
                }
            }
            if let Some(s) = p.sponsor {
                privileged_user(tx, s, "project.sponsor")?;
            }
        }
        Entity::Pmo(p) => {
            exists(tx, EntityKind::Portfolio, p.portfolio, "pmo.portfolio")?;
            match p.director {
                Some(d) => privileged_user(tx, d, "pmo.director")?,
                None => return Err(Error::invalid("pmo.director is required")),
            }
        }
        Entity::User(u) => {
            if u.identifier.trim().is_empty() {
                return Err(Error::invalid("user identifier must not be blank"));
            }
            if u.role == Role::System {
                return Err(Error::invalid("the SYSTEM role is never persisted"));
            }
            if let Some(other) = tx.find_user_by_identifier(&u.identifier)? {
                if other.id != u.id {
                    return Err(Error::invalid(format!("identifier '{}' is already taken", u.identifier)));
                }
            }
            if let Some(project) = u.project {
                exists(tx, EntityKind::Project, project, "user.project")?;
            }
            if let (Role::User, Some(id)) = (u.role, u.id) {
                demotable(tx, id)?;
            }
        }
    }
    Ok(())
}
