//! hierarchy-authz - delegated authorization and lifecycle for a
//! Portfolio → Program → Project hierarchy
//!
//! Authority flows from directorships: the director of a container may manage
//! what it contains. Every mutation passes through one decision table
//! ([`policy::RULES`]), and deletions pick one of three strategies (hard,
//! cascade, safe) that never leave a dangling reference behind.
//!
//! ```ignore
//! let engine = Engine::open(&Config::default())?;
//! let admin = engine.principal_for("root")?;
//! let portfolio = engine.create(admin.as_ref(), Portfolio::new("Platform"))?;
//! ```

pub mod authority;
pub mod config;
pub mod constants;
pub mod db;
pub mod engine;
pub mod error;
pub mod keys;
pub mod lifecycle;
pub mod model;
pub mod notify;
pub mod policy;
pub mod principal;
pub mod store;
pub mod validate;

mod read;
mod tx;

pub use authority::Authority;
pub use config::{Config, EngineConfig, StoreConfig};
pub use db::LmdbStore;
pub use engine::Engine;
pub use error::{Denial, Error, Result};
pub use lifecycle::{Removal, Strategy};
pub use model::{Entity, EntityKind, Id, Pmo, Portfolio, Program, Project, Record, Role, User};
pub use notify::{LogNotifier, Notifier, NotifyError};
pub use policy::{Action, Policy, Request, Rule, Target};
pub use principal::{FixedPrincipal, Principal, PrincipalProvider};
pub use store::{EntityStore, StoreRead, StoreWrite};
