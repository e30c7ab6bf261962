//! Hierarchy records: Portfolio → Program → Project, plus PMOs and Users
//!
//! References between records are plain ids. A record with `id: None` has not
//! been saved yet; the store assigns ids from one global sequence.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{Link, TAG_PMO, TAG_PORTFOLIO, TAG_PROGRAM, TAG_PROJECT, TAG_USER};

pub type Id = u64;

/// Global role. Privileges are context-dependent: a MANAGER only gains
/// authority through directorships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Bootstrap-only pseudo role, never persisted.
    System,
    Admin,
    Manager,
    User,
}

impl Role {
    /// ADMIN or MANAGER
    #[inline]
    pub fn is_privileged(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::System => "SYSTEM",
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::User => "USER",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Portfolio,
    Program,
    Project,
    Pmo,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Portfolio,
        EntityKind::Program,
        EntityKind::Project,
        EntityKind::Pmo,
        EntityKind::User,
    ];

    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            EntityKind::Portfolio => TAG_PORTFOLIO,
            EntityKind::Program => TAG_PROGRAM,
            EntityKind::Project => TAG_PROJECT,
            EntityKind::Pmo => TAG_PMO,
            EntityKind::User => TAG_USER,
        }
    }

    /// The link from a record of this kind to its container, if it has one
    pub fn parent_link(self) -> Option<Link> {
        match self {
            EntityKind::Portfolio => None,
            EntityKind::Program => Some(Link::ProgramPortfolio),
            EntityKind::Project => Some(Link::ProjectProgram),
            EntityKind::Pmo => Some(Link::PmoPortfolio),
            EntityKind::User => Some(Link::UserProject),
        }
    }

    /// The link from a record of this kind to its director, if it has one
    pub fn director_link(self) -> Option<Link> {
        match self {
            EntityKind::Portfolio => Some(Link::PortfolioDirector),
            EntityKind::Program => Some(Link::ProgramDirector),
            EntityKind::Project => Some(Link::ProjectDirector),
            EntityKind::Pmo => Some(Link::PmoDirector),
            EntityKind::User => None,
        }
    }

    /// The kind one level up the containment hierarchy
    pub fn parent_kind(self) -> Option<EntityKind> {
        match self {
            EntityKind::Portfolio => None,
            EntityKind::Program | EntityKind::Pmo => Some(EntityKind::Portfolio),
            EntityKind::Project => Some(EntityKind::Program),
            EntityKind::User => Some(EntityKind::Project),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Portfolio => "portfolio",
            EntityKind::Program => "program",
            EntityKind::Project => "project",
            EntityKind::Pmo => "pmo",
            EntityKind::User => "user",
        })
    }
}

/// Root of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Option<Id>,
    pub name: String,
    pub director: Option<Id>,
}

impl Portfolio {
    pub fn new(name: impl Into<String>) -> Self {
        Portfolio { id: None, name: name.into(), director: None }
    }

    pub fn with_director(mut self, director: Id) -> Self {
        self.director = Some(director);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: Option<Id>,
    pub name: String,
    pub portfolio: Id,
    pub director: Option<Id>,
}

impl Program {
    pub fn new(name: impl Into<String>, portfolio: Id) -> Self {
        Program { id: None, name: name.into(), portfolio, director: None }
    }

    pub fn with_director(mut self, director: Id) -> Self {
        self.director = Some(director);
        self
    }
}

/// A project is directed by at most one user, and a user directs at most one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Option<Id>,
    pub name: String,
    pub program: Id,
    pub director: Option<Id>,
    pub sponsor: Option<Id>,
}

impl Project {
    pub fn new(name: impl Into<String>, program: Id) -> Self {
        Project { id: None, name: name.into(), program, director: None, sponsor: None }
    }

    pub fn with_director(mut self, director: Id) -> Self {
        self.director = Some(director);
        self
    }

    pub fn with_sponsor(mut self, sponsor: Id) -> Self {
        self.sponsor = Some(sponsor);
        self
    }
}

/// Project management office scoped to one portfolio.
///
/// `director` is required on create and update; it only becomes vacant when
/// its director is safe-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pmo {
    pub id: Option<Id>,
    pub name: String,
    pub portfolio: Id,
    pub director: Option<Id>,
}

impl Pmo {
    pub fn new(name: impl Into<String>, portfolio: Id, director: Id) -> Self {
        Pmo { id: None, name: name.into(), portfolio, director: Some(director) }
    }
}

/// `project` is membership and is independent of `Project::director`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<Id>,
    pub name: String,
    pub identifier: String,
    pub role: Role,
    pub project: Option<Id>,
}

impl User {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>, role: Role) -> Self {
        User { id: None, name: name.into(), identifier: identifier.into(), role, project: None }
    }

    pub fn in_project(mut self, project: Id) -> Self {
        self.project = Some(project);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Portfolio(Portfolio),
    Program(Program),
    Project(Project),
    Pmo(Pmo),
    User(User),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Portfolio(_) => EntityKind::Portfolio,
            Entity::Program(_) => EntityKind::Program,
            Entity::Project(_) => EntityKind::Project,
            Entity::Pmo(_) => EntityKind::Pmo,
            Entity::User(_) => EntityKind::User,
        }
    }

    pub fn id(&self) -> Option<Id> {
        match self {
            Entity::Portfolio(e) => e.id,
            Entity::Program(e) => e.id,
            Entity::Project(e) => e.id,
            Entity::Pmo(e) => e.id,
            Entity::User(e) => e.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: Id) {
        match self {
            Entity::Portfolio(e) => e.id = Some(id),
            Entity::Program(e) => e.id = Some(id),
            Entity::Project(e) => e.id = Some(id),
            Entity::Pmo(e) => e.id = Some(id),
            Entity::User(e) => e.id = Some(id),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Portfolio(e) => &e.name,
            Entity::Program(e) => &e.name,
            Entity::Project(e) => &e.name,
            Entity::Pmo(e) => &e.name,
            Entity::User(e) => &e.name,
        }
    }

    pub fn director(&self) -> Option<Id> {
        match self {
            Entity::Portfolio(e) => e.director,
            Entity::Program(e) => e.director,
            Entity::Project(e) => e.director,
            Entity::Pmo(e) => e.director,
            Entity::User(_) => None,
        }
    }

    /// The container this record lives in
    pub fn parent(&self) -> Option<Id> {
        match self {
            Entity::Portfolio(_) => None,
            Entity::Program(e) => Some(e.portfolio),
            Entity::Project(e) => Some(e.program),
            Entity::Pmo(e) => Some(e.portfolio),
            Entity::User(e) => e.project,
        }
    }

    /// Every outbound reference as (link, target id)
    pub(crate) fn links(&self) -> Vec<(Link, Id)> {
        let mut out = Vec::with_capacity(3);
        let kind = self.kind();
        if let (Some(link), Some(p)) = (kind.parent_link(), self.parent()) {
            out.push((link, p));
        }
        if let (Some(link), Some(d)) = (kind.director_link(), self.director()) {
            out.push((link, d));
        }
        if let Entity::Project(Project { sponsor: Some(s), .. }) = self {
            out.push((Link::ProjectSponsor, *s));
        }
        out
    }

    /// Drop the reference held through `link`, if this record holds one.
    /// Only optional references can be cleared.
    pub(crate) fn clear_link(&mut self, link: Link) -> bool {
        let slot = match (self, link) {
            (Entity::Portfolio(e), Link::PortfolioDirector) => &mut e.director,
            (Entity::Program(e), Link::ProgramDirector) => &mut e.director,
            (Entity::Project(e), Link::ProjectDirector) => &mut e.director,
            (Entity::Project(e), Link::ProjectSponsor) => &mut e.sponsor,
            (Entity::Pmo(e), Link::PmoDirector) => &mut e.director,
            (Entity::User(e), Link::UserProject) => &mut e.project,
            _ => return false,
        };
        slot.take().is_some()
    }
}

/// Typed view over [`Entity`].
pub trait Record: Clone + Into<Entity> {
    const KIND: EntityKind;

    fn from_entity(e: Entity) -> Option<Self>;

    fn id(&self) -> Option<Id>;

    fn into_entity(self) -> Entity {
        self.into()
    }
}

macro_rules! record {
    ($ty:ident) => {
        impl From<$ty> for Entity {
            fn from(r: $ty) -> Self {
                Entity::$ty(r)
            }
        }

        impl Record for $ty {
            const KIND: EntityKind = EntityKind::$ty;

            fn from_entity(e: Entity) -> Option<Self> {
                match e {
                    Entity::$ty(r) => Some(r),
                    _ => None,
                }
            }

            fn id(&self) -> Option<Id> {
                self.id
            }
        }
    };
}

record!(Portfolio);
record!(Program);
record!(Project);
record!(Pmo);
record!(User);

impl Link {
    /// Kind of the record that holds this reference
    pub fn source_kind(self) -> EntityKind {
        match self {
            Link::PortfolioDirector => EntityKind::Portfolio,
            Link::ProgramPortfolio | Link::ProgramDirector => EntityKind::Program,
            Link::ProjectProgram | Link::ProjectDirector | Link::ProjectSponsor => EntityKind::Project,
            Link::PmoPortfolio | Link::PmoDirector => EntityKind::Pmo,
            Link::UserProject => EntityKind::User,
        }
    }
}
