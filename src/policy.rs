//! Permission Policy
//!
//! One declarative table decides create/update/delete for every entity type.
//! A request is allowed when any rule in its row holds; everything not listed
//! is denied. Two guards run before the table on user deletion: nobody
//! deletes themselves, and ADMIN users are never deleted. Bootstrap mode
//! bypasses all of it.

use std::fmt;

use crate::authority::Authority;
use crate::error::{Denial, Error, Result};
use crate::model::{Entity, EntityKind, Id, Role};
use crate::principal::Principal;
use crate::store::StoreRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        })
    }
}

/// Row selector of the decision table. Users split by the role they hold
/// (or are being given).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Portfolio,
    Pmo,
    Program,
    Project,
    PrivilegedUser,
    MemberUser,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Target::Portfolio => "portfolio",
            Target::Pmo => "pmo",
            Target::Program => "program",
            Target::Project => "project",
            Target::PrivilegedUser => "MANAGER/ADMIN user",
            Target::MemberUser => "USER user",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Caller holds the ADMIN role
    Admin,
    /// Caller directs the program's portfolio (old and new, when moved)
    PortfolioDirector,
    /// Caller directs the project's program (old and new, when moved)
    ProgramDirector,
    /// Caller sponsors the project; program, sponsor and director stay as they are
    ProjectSponsor,
    /// Caller directs any PMO
    PmoDirector,
    /// Caller directs a project and only moves the user's membership into it
    /// (or out of it)
    OwnProjectMembership,
    /// Caller is MANAGER or ADMIN and the target is neither ADMIN nor the caller
    PrivilegedOnNonAdmin,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Rule::Admin => "admin",
            Rule::PortfolioDirector => "portfolio director",
            Rule::ProgramDirector => "program director",
            Rule::ProjectSponsor => "project sponsor",
            Rule::PmoDirector => "pmo director",
            Rule::OwnProjectMembership => "director of the assigned project",
            Rule::PrivilegedOnNonAdmin => "manager or admin",
        })
    }
}

use Action::{Create, Delete, Update};
use Rule::*;

/// The authorization matrix
pub const RULES: &[(Target, Action, &[Rule])] = &[
    (Target::Portfolio, Create, &[Admin]),
    (Target::Portfolio, Update, &[Admin]),
    (Target::Portfolio, Delete, &[Admin]),
    (Target::Pmo, Create, &[Admin]),
    (Target::Pmo, Update, &[Admin]),
    (Target::Pmo, Delete, &[Admin]),
    (Target::Program, Create, &[Admin, PortfolioDirector]),
    (Target::Program, Update, &[Admin, PortfolioDirector]),
    (Target::Program, Delete, &[Admin, PortfolioDirector]),
    (Target::Project, Create, &[Admin, ProgramDirector]),
    (Target::Project, Update, &[Admin, ProgramDirector, ProjectSponsor]),
    (Target::Project, Delete, &[Admin, ProgramDirector]),
    (Target::PrivilegedUser, Create, &[Admin]),
    (Target::PrivilegedUser, Update, &[Admin]),
    (Target::PrivilegedUser, Delete, &[Admin]),
    (Target::MemberUser, Create, &[Admin, PmoDirector]),
    (Target::MemberUser, Update, &[Admin, PmoDirector, OwnProjectMembership]),
    (Target::MemberUser, Delete, &[Admin, PrivilegedOnNonAdmin, PmoDirector]),
];

/// Rules that can grant `action` on `target`
pub fn rules_for(target: Target, action: Action) -> &'static [Rule] {
    RULES
        .iter()
        .find(|(t, a, _)| *t == target && *a == action)
        .map(|(_, _, rules)| *rules)
        .unwrap_or(&[])
}

/// A mutation to be judged: the stored state (update/delete) and the
/// proposed state (create/update).
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub action: Action,
    pub existing: Option<&'a Entity>,
    pub proposed: Option<&'a Entity>,
}

impl<'a> Request<'a> {
    pub fn create(proposed: &'a Entity) -> Self {
        Request { action: Create, existing: None, proposed: Some(proposed) }
    }

    pub fn update(existing: &'a Entity, proposed: &'a Entity) -> Self {
        Request { action: Update, existing: Some(existing), proposed: Some(proposed) }
    }

    pub fn delete(existing: &'a Entity) -> Self {
        Request { action: Delete, existing: Some(existing), proposed: None }
    }

    pub fn kind(&self) -> Option<EntityKind> {
        self.proposed.or(self.existing).map(Entity::kind)
    }

    pub fn target(&self) -> Option<Target> {
        Some(match self.kind()? {
            EntityKind::Portfolio => Target::Portfolio,
            EntityKind::Pmo => Target::Pmo,
            EntityKind::Program => Target::Program,
            EntityKind::Project => Target::Project,
            EntityKind::User => {
                let privileged = [self.existing, self.proposed]
                    .into_iter()
                    .flatten()
                    .any(|e| matches!(e, Entity::User(u) if u.role != Role::User));
                if privileged {
                    Target::PrivilegedUser
                } else {
                    Target::MemberUser
                }
            }
        })
    }

    /// Distinct container ids across the stored and proposed state
    fn parents(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = [self.existing, self.proposed]
            .into_iter()
            .flatten()
            .filter_map(Entity::parent)
            .collect();
        ids.dedup();
        ids
    }
}

enum Outcome {
    Allow,
    Deny,
    DenyWith(Denial),
}

pub struct Policy<'s, S: StoreRead + ?Sized> {
    authority: Authority<'s, S>,
}

impl<'s, S: StoreRead + ?Sized> Policy<'s, S> {
    pub fn new(authority: Authority<'s, S>) -> Self {
        Policy { authority }
    }

    pub fn authority(&self) -> &Authority<'s, S> {
        &self.authority
    }

    /// `Ok(())` or `PermissionDenied` naming the rule that failed
    pub fn authorize(&self, principal: Option<&Principal>, req: &Request<'_>) -> Result<()> {
        if self.authority.is_bootstrap(principal) {
            return Ok(());
        }
        let (Some(p), Some(target)) = (principal, req.target()) else {
            return Err(Error::denied(Denial::Unauthenticated));
        };
        let Some(role) = self.authority.current_role(Some(p))? else {
            tracing::debug!(principal = %p.identifier, "unknown principal");
            return Err(Error::denied(Denial::Unauthenticated));
        };

        if req.action == Delete {
            if let Some(Entity::User(u)) = req.existing {
                if u.role == Role::Admin {
                    return Err(self.deny(p, req, Denial::AdminTarget));
                }
                if u.id == Some(p.id) {
                    return Err(self.deny(p, req, Denial::SelfDelete));
                }
            }
        }

        let mut denial = None;
        for &rule in rules_for(target, req.action) {
            match self.check(rule, p, role, req)? {
                Outcome::Allow => {
                    tracing::debug!(
                        principal = %p.identifier,
                        action = %req.action,
                        target = %target,
                        id = ?req.existing.and_then(Entity::id),
                        rule = %rule,
                        "allowed"
                    );
                    return Ok(());
                }
                Outcome::Deny => {}
                Outcome::DenyWith(d) => {
                    denial.get_or_insert(d);
                }
            }
        }
        Err(self.deny(p, req, denial.unwrap_or(Denial::NoMatchingRule { target, action: req.action })))
    }

    /// Same decision as [`authorize`](Self::authorize), as a boolean
    pub fn permits(&self, principal: Option<&Principal>, req: &Request<'_>) -> Result<bool> {
        match self.authorize(principal, req) {
            Ok(()) => Ok(true),
            Err(Error::PermissionDenied(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn deny(&self, p: &Principal, req: &Request<'_>, denial: Denial) -> Error {
        tracing::debug!(
            principal = %p.identifier,
            action = %req.action,
            kind = ?req.kind(),
            id = ?req.existing.and_then(Entity::id),
            %denial,
            "denied"
        );
        Error::denied(denial)
    }

    fn check(&self, rule: Rule, p: &Principal, role: Role, req: &Request<'_>) -> Result<Outcome> {
        let who = Some(p);
        let allow = |ok: bool| if ok { Outcome::Allow } else { Outcome::Deny };
        Ok(match rule {
            Admin => allow(role == Role::Admin),
            PortfolioDirector => allow(self.directs_all(who, EntityKind::Portfolio, &req.parents())?),
            ProgramDirector => allow(self.directs_all(who, EntityKind::Program, &req.parents())?),
            ProjectSponsor => match (req.action, req.existing, req.proposed) {
                (Update, Some(Entity::Project(old)), Some(Entity::Project(new))) => {
                    let unchanged =
                        old.program == new.program && old.sponsor == new.sponsor && old.director == new.director;
                    match old.id {
                        Some(id) if unchanged => allow(self.authority.is_sponsor_of(who, id)?),
                        _ => Outcome::Deny,
                    }
                }
                _ => Outcome::Deny,
            },
            PmoDirector => allow(self.authority.directs_any(who, EntityKind::Pmo)?),
            OwnProjectMembership => match (req.action, req.existing, req.proposed) {
                (Update, Some(Entity::User(old)), Some(Entity::User(new))) => {
                    let Some(mine) = self.authority.directed_project(who)? else {
                        return Ok(Outcome::Deny);
                    };
                    if old.name != new.name || old.identifier != new.identifier || new.role != Role::User {
                        Outcome::Deny
                    } else if new.project == Some(mine) || (new.project.is_none() && old.project == Some(mine)) {
                        Outcome::Allow
                    } else {
                        Outcome::DenyWith(Denial::ForeignProject { project: new.project })
                    }
                }
                _ => Outcome::Deny,
            },
            PrivilegedOnNonAdmin => match req.existing {
                Some(Entity::User(u)) => allow(role.is_privileged() && u.role != Role::Admin && u.id != Some(p.id)),
                _ => Outcome::Deny,
            },
        })
    }

    fn directs_all(&self, who: Option<&Principal>, kind: EntityKind, ids: &[Id]) -> Result<bool> {
        if ids.is_empty() {
            return Ok(false);
        }
        for &id in ids {
            if !self.authority.is_director_of(who, kind, id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
