//! Public API: policy-gated mutations and hierarchy queries
//!
//! Each mutation is a single store transaction covering target lookup,
//! authorization, validation and the write (an entire cascade included).

use std::sync::atomic::{AtomicBool, Ordering};

use crate::authority::Authority;
use crate::config::{Config, EngineConfig};
use crate::db::LmdbStore;
use crate::error::{Denial, Error, Result};
use crate::lifecycle::{self, Removal, Strategy};
use crate::model::{Entity, EntityKind, Id, Pmo, Program, Project, Record, Role, User};
use crate::notify::Notifier;
use crate::policy::{Policy, Request};
use crate::principal::{Principal, PrincipalProvider};
use crate::store::{self, EntityStore, StoreRead};
use crate::validate::validate;

pub struct Engine<S: EntityStore> {
    store: S,
    bootstrap: AtomicBool,
    notifier: Option<Box<dyn Notifier>>,
}

impl Engine<LmdbStore> {
    /// Open the LMDB store named in `config`
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Engine::new(LmdbStore::open(&config.store)?, &config.engine))
    }
}

impl<S: EntityStore> Engine<S> {
    pub fn new(store: S, config: &EngineConfig) -> Self {
        if config.allow_bootstrap {
            tracing::warn!("engine started with bootstrap mode open");
        }
        Engine { store, bootstrap: AtomicBool::new(config.allow_bootstrap), notifier: None }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_bootstrap_open(&self) -> bool {
        self.bootstrap.load(Ordering::SeqCst)
    }

    /// Close bootstrap mode for good
    pub fn end_bootstrap(&self) {
        if self.bootstrap.swap(false, Ordering::SeqCst) {
            tracing::info!("bootstrap mode closed");
        }
    }

    fn policy<'s, T: StoreRead + ?Sized>(&self, tx: &'s T) -> Policy<'s, T> {
        Policy::new(Authority::new(tx, self.is_bootstrap_open()))
    }

    /// Seed the first ADMIN while bootstrap mode is open
    pub fn bootstrap(&self, name: &str, identifier: &str) -> Result<Principal> {
        if !self.is_bootstrap_open() {
            return Err(Error::denied(Denial::BootstrapClosed));
        }
        let admin = self.store.write(|tx| {
            let seeded = tx
                .find_all(EntityKind::User)?
                .iter()
                .any(|e| matches!(e, Entity::User(u) if u.role == Role::Admin));
            if seeded {
                return Err(Error::invalid("an ADMIN already exists"));
            }
            let user = Entity::User(User::new(name, identifier, Role::Admin));
            validate(&*tx, &user)?;
            tx.save(user)
        })?;
        tracing::warn!(identifier, "bootstrap admin seeded");
        let Entity::User(admin) = admin else {
            return Err(Error::Storage("bootstrap admin was not stored as a user".into()));
        };
        self.notify(&admin);
        Principal::from_user(&admin).ok_or_else(|| Error::Storage("bootstrap admin has no id".into()))
    }

    fn notify(&self, user: &User) {
        if let Some(n) = &self.notifier {
            if let Err(e) = n.user_created(user) {
                tracing::warn!(identifier = %user.identifier, error = %e, "user created but notification failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn create<R: Record>(&self, principal: Option<&Principal>, record: R) -> Result<R> {
        let entity: Entity = record.into();
        if entity.id().is_some() {
            return Err(Error::invalid(format!("a new {} must not carry an id", entity.kind())));
        }
        let saved = self.store.write(|tx| {
            self.policy(&*tx).authorize(principal, &Request::create(&entity))?;
            validate(&*tx, &entity)?;
            tx.save(entity.clone())
        })?;
        tracing::debug!(kind = %saved.kind(), id = ?saved.id(), "created");
        if let Entity::User(u) = &saved {
            self.notify(u);
        }
        R::from_entity(saved).ok_or_else(|| Error::Storage("record kind changed on save".into()))
    }

    pub fn update<R: Record>(&self, principal: Option<&Principal>, record: R) -> Result<R> {
        let entity: Entity = record.into();
        let kind = entity.kind();
        let Some(id) = entity.id() else {
            return Err(Error::invalid(format!("updating a {} requires its id", kind)));
        };
        let saved = self.store.write(|tx| {
            let existing = tx.find_by_id(kind, id)?.ok_or(Error::NotFound { kind, id })?;
            self.policy(&*tx).authorize(principal, &Request::update(&existing, &entity))?;
            validate(&*tx, &entity)?;
            tx.save(entity.clone())
        })?;
        tracing::debug!(%kind, id, "updated");
        R::from_entity(saved).ok_or_else(|| Error::Storage("record kind changed on save".into()))
    }

    /// Hard delete: fails with `IntegrityViolation` while dependents exist
    pub fn delete(&self, principal: Option<&Principal>, kind: EntityKind, id: Id) -> Result<Removal> {
        self.remove(principal, kind, id, Strategy::Hard)
    }

    pub fn delete_with_cascade(&self, principal: Option<&Principal>, kind: EntityKind, id: Id) -> Result<Removal> {
        self.remove(principal, kind, id, Strategy::Cascade)
    }

    pub fn delete_safe(&self, principal: Option<&Principal>, kind: EntityKind, id: Id) -> Result<Removal> {
        self.remove(principal, kind, id, Strategy::Safe)
    }

    /// Authorize the top-level target once, then run `strategy` in the same transaction
    pub fn remove(&self, principal: Option<&Principal>, kind: EntityKind, id: Id, strategy: Strategy) -> Result<Removal> {
        let removal = self.store.write(|tx| {
            let existing = tx.find_by_id(kind, id)?.ok_or(Error::NotFound { kind, id })?;
            self.policy(&*tx).authorize(principal, &Request::delete(&existing))?;
            lifecycle::remove(tx, kind, id, strategy)
        })?;
        tracing::info!(
            %kind,
            id,
            ?strategy,
            removed = removal.removed.len(),
            cleared = removal.cleared,
            "removal committed"
        );
        Ok(removal)
    }

    // ------------------------------------------------------------------
    // Decisions without side effects
    // ------------------------------------------------------------------

    pub fn can_create(&self, principal: Option<&Principal>, entity: &Entity) -> Result<bool> {
        self.store.read(|tx| self.policy(tx).permits(principal, &Request::create(entity)))
    }

    /// `NotFound` when the entity has no stored counterpart
    pub fn can_update(&self, principal: Option<&Principal>, entity: &Entity) -> Result<bool> {
        let kind = entity.kind();
        let Some(id) = entity.id() else {
            return Err(Error::invalid(format!("updating a {} requires its id", kind)));
        };
        self.store.read(|tx| {
            let existing = tx.find_by_id(kind, id)?.ok_or(Error::NotFound { kind, id })?;
            self.policy(tx).permits(principal, &Request::update(&existing, entity))
        })
    }

    pub fn can_delete(&self, principal: Option<&Principal>, kind: EntityKind, id: Id) -> Result<bool> {
        self.store.read(|tx| {
            let existing = tx.find_by_id(kind, id)?.ok_or(Error::NotFound { kind, id })?;
            self.policy(tx).permits(principal, &Request::delete(&existing))
        })
    }

    pub fn has_dependents(&self, kind: EntityKind, id: Id) -> Result<bool> {
        Ok(self.dependent_count(kind, id)? > 0)
    }

    pub fn dependent_count(&self, kind: EntityKind, id: Id) -> Result<u64> {
        self.store.read(|tx| lifecycle::dependent_count(tx, kind, id))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get<R: Record>(&self, id: Id) -> Result<R> {
        self.store.read(|tx| store::require(tx, id))
    }

    pub fn find<R: Record>(&self, id: Id) -> Result<Option<R>> {
        self.store.read(|tx| store::fetch(tx, id))
    }

    pub fn list<R: Record>(&self) -> Result<Vec<R>> {
        self.store
            .read(|tx| Ok(tx.find_all(R::KIND)?.into_iter().filter_map(R::from_entity).collect()))
    }

    pub fn programs_in_portfolio(&self, portfolio: Id) -> Result<Vec<Program>> {
        self.store.read(|tx| store::children(tx, portfolio))
    }

    pub fn projects_in_program(&self, program: Id) -> Result<Vec<Project>> {
        self.store.read(|tx| store::children(tx, program))
    }

    pub fn pmos_in_portfolio(&self, portfolio: Id) -> Result<Vec<Pmo>> {
        self.store.read(|tx| store::children(tx, portfolio))
    }

    pub fn members_of_project(&self, project: Id) -> Result<Vec<User>> {
        self.store.read(|tx| store::children(tx, project))
    }

    /// Users without a project, plus members of projects other than `project`
    pub fn users_available_for_project(&self, project: Option<Id>) -> Result<Vec<User>> {
        Ok(self
            .list::<User>()?
            .into_iter()
            .filter(|u| u.project.is_none() || (project.is_some() && u.project != project))
            .collect())
    }

    pub fn users_by_roles(&self, roles: &[Role]) -> Result<Vec<User>> {
        Ok(self.list::<User>()?.into_iter().filter(|u| roles.contains(&u.role)).collect())
    }

    pub fn user_by_identifier(&self, identifier: &str) -> Result<Option<User>> {
        self.store.read(|tx| tx.find_user_by_identifier(identifier))
    }

    /// Resolve a stored user into a principal
    pub fn principal_for(&self, identifier: &str) -> Result<Option<Principal>> {
        Ok(self.user_by_identifier(identifier)?.as_ref().and_then(Principal::from_user))
    }

    /// Re-resolve whatever the provider reports against the store; unknown
    /// identities resolve to none. The system identity passes through as is.
    pub fn current_principal(&self, provider: &dyn PrincipalProvider) -> Result<Option<Principal>> {
        match provider.current_principal() {
            Some(p) if p.is_system() => Ok(Some(p)),
            Some(p) => self.principal_for(&p.identifier),
            None => Ok(None),
        }
    }

    /// Admins see every program, managers the programs they direct, everyone else all
    pub fn visible_programs(&self, principal: Option<&Principal>) -> Result<Vec<Program>> {
        self.store.read(|tx| {
            let authority = Authority::new(tx, false);
            let entities = match (principal, authority.current_role(principal)?) {
                (Some(p), Some(Role::Manager)) => tx.find_all_by_director(EntityKind::Program, p.id)?,
                _ => tx.find_all(EntityKind::Program)?,
            };
            Ok(entities.into_iter().filter_map(Program::from_entity).collect())
        })
    }
}
