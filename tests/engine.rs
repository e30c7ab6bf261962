//! Engine facade tests: validation, queries, notification and configuration

use std::sync::{Arc, Mutex};

use hierarchy_authz::{
    Config, Engine, EngineConfig, EntityKind, Error, FixedPrincipal, LmdbStore, Notifier, NotifyError, Pmo,
    Portfolio, Principal, Program, Project, Role, StoreConfig, User,
};
use tempfile::TempDir;

fn setup() -> (TempDir, Engine<LmdbStore>, Principal) {
    let dir = TempDir::new().unwrap();
    let engine = Engine::new(LmdbStore::open_path(dir.path()).unwrap(), &EngineConfig { allow_bootstrap: true });
    let admin = engine.bootstrap("Root", "root").unwrap();
    engine.end_bootstrap();
    (dir, engine, admin)
}

fn invalid<T: std::fmt::Debug>(r: Result<T, Error>) -> String {
    match r {
        Err(Error::ValidationFailed(msg)) => msg,
        other => panic!("expected ValidationFailed, got {:?}", other),
    }
}

// ============================================================================
// Create / get
// ============================================================================

#[test]
fn create_then_get() {
    let (_dir, engine, admin) = setup();
    let created = engine.create(Some(&admin), Portfolio::new("Alpha")).unwrap();
    assert!(created.id.is_some());
    assert_eq!(engine.get::<Portfolio>(created.id.unwrap()).unwrap(), created);
    assert_eq!(engine.list::<Portfolio>().unwrap(), vec![created]);
}

#[test]
fn get_wrong_kind_is_not_found() {
    let (_dir, engine, admin) = setup();
    let e = engine.get::<Portfolio>(admin.id).unwrap_err();
    assert_eq!(e, Error::NotFound { kind: EntityKind::Portfolio, id: admin.id });
    assert_eq!(engine.find::<User>(admin.id).unwrap().map(|u| u.role), Some(Role::Admin));
}

#[test]
fn ids_on_create_and_update() {
    let (_dir, engine, admin) = setup();
    let mut preset = Portfolio::new("Preset");
    preset.id = Some(77);
    invalid(engine.create(Some(&admin), preset));
    invalid(engine.update(Some(&admin), Portfolio::new("No id")));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn references_must_resolve() {
    let (_dir, engine, admin) = setup();
    let a = Some(&admin);
    let msg = invalid(engine.create(a, Program::new("Orphan", 999)));
    assert!(msg.contains("portfolio"));
    invalid(engine.create(a, Project::new("Orphan", 999)));
    invalid(engine.create(a, User::new("U", "u", Role::User).in_project(999)));
    invalid(engine.create(a, Portfolio::new("X").with_director(999)));
    assert!(engine.list::<Program>().unwrap().is_empty());
}

#[test]
fn required_fields() {
    let (_dir, engine, admin) = setup();
    let a = Some(&admin);
    invalid(engine.create(a, Portfolio::new("  ")));
    invalid(engine.create(a, User::new("U", "", Role::User)));
    invalid(engine.create(a, User::new("U", "root", Role::User)));
    invalid(engine.create(a, User::new("S", "sys", Role::System)));

    let pf = engine.create(a, Portfolio::new("X")).unwrap().id.unwrap();
    let mut pmo = Pmo::new("PMO", pf, admin.id);
    pmo.director = None;
    invalid(engine.create(a, pmo));
}

/// Directors and sponsors of portfolios, programs and PMOs must be MANAGER or ADMIN
#[test]
fn director_roles() {
    let (_dir, engine, admin) = setup();
    let a = Some(&admin);
    let plain = engine.create(a, User::new("U", "u", Role::User)).unwrap().id.unwrap();
    let mgr = engine.create(a, User::new("M", "m", Role::Manager)).unwrap().id.unwrap();

    invalid(engine.create(a, Portfolio::new("X").with_director(plain)));
    let pf = engine.create(a, Portfolio::new("X").with_director(mgr)).unwrap().id.unwrap();
    invalid(engine.create(a, Program::new("P", pf).with_director(plain)));
    invalid(engine.create(a, Pmo::new("PMO", pf, plain)));
    let prog = engine.create(a, Program::new("P", pf)).unwrap().id.unwrap();
    invalid(engine.create(a, Project::new("A", prog).with_sponsor(plain)));

    // project directors may hold any role, but only one project
    engine.create(a, Project::new("A", prog).with_director(plain)).unwrap();
    let msg = invalid(engine.create(a, Project::new("B", prog).with_director(plain)));
    assert!(msg.contains("already directs"));
}

/// A user cannot be demoted to USER while holding MANAGER/ADMIN-only references
#[test]
fn demotion_blocked_while_directing() {
    let (_dir, engine, admin) = setup();
    let a = Some(&admin);
    let m = engine.create(a, User::new("M", "m", Role::Manager)).unwrap();
    let mid = m.id.unwrap();
    let pf = engine.create(a, Portfolio::new("X").with_director(mid)).unwrap().id.unwrap();
    let pmo = engine.create(a, Pmo::new("PMO", pf, mid)).unwrap().id.unwrap();

    let mut demoted = m.clone();
    demoted.role = Role::User;
    let msg = invalid(engine.update(a, demoted.clone()));
    assert!(msg.contains("portfolio"));
    assert!(msg.contains("pmo"));
    assert_eq!(engine.get::<User>(mid).unwrap().role, Role::Manager);
    assert_eq!(engine.get::<Pmo>(pmo).unwrap().director, Some(mid));

    // sponsorships count too
    let mut pf_rec = engine.get::<Portfolio>(pf).unwrap();
    pf_rec.director = None;
    engine.update(a, pf_rec).unwrap();
    engine.delete(a, EntityKind::Pmo, pmo).unwrap();
    let prog = engine.create(a, Program::new("P", pf)).unwrap().id.unwrap();
    let project = engine.create(a, Project::new("A", prog).with_sponsor(mid)).unwrap();
    let msg = invalid(engine.update(a, demoted.clone()));
    assert!(msg.contains("sponsorship"));

    // once nothing is held the demotion goes through
    let mut unsponsored = project;
    unsponsored.sponsor = None;
    engine.update(a, unsponsored).unwrap();
    assert_eq!(engine.update(a, demoted).unwrap().role, Role::User);
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn hierarchy_queries() {
    let (_dir, engine, admin) = setup();
    let a = Some(&admin);
    let mgr = engine.create(a, User::new("M", "m", Role::Manager)).unwrap().id.unwrap();
    let pf = engine.create(a, Portfolio::new("X")).unwrap().id.unwrap();
    let p1 = engine.create(a, Program::new("P1", pf).with_director(mgr)).unwrap().id.unwrap();
    let p2 = engine.create(a, Program::new("P2", pf)).unwrap().id.unwrap();
    let a1 = engine.create(a, Project::new("A1", p1)).unwrap().id.unwrap();
    let b1 = engine.create(a, Project::new("B1", p2)).unwrap().id.unwrap();
    engine.create(a, Pmo::new("PMO", pf, mgr)).unwrap();
    engine.create(a, User::new("In A", "in-a", Role::User).in_project(a1)).unwrap();
    engine.create(a, User::new("In B", "in-b", Role::User).in_project(b1)).unwrap();
    engine.create(a, User::new("Free", "free", Role::User)).unwrap();

    assert_eq!(engine.programs_in_portfolio(pf).unwrap().len(), 2);
    assert_eq!(engine.projects_in_program(p1).unwrap()[0].name, "A1");
    assert_eq!(engine.pmos_in_portfolio(pf).unwrap().len(), 1);
    assert_eq!(engine.members_of_project(a1).unwrap()[0].identifier, "in-a");

    let available: Vec<String> = engine
        .users_available_for_project(Some(a1))
        .unwrap()
        .into_iter()
        .map(|u| u.identifier)
        .collect();
    assert!(available.contains(&"in-b".to_string()));
    assert!(available.contains(&"free".to_string()));
    assert!(!available.contains(&"in-a".to_string()));

    let privileged = engine.users_by_roles(&[Role::Admin, Role::Manager]).unwrap();
    assert_eq!(privileged.len(), 2);
    assert_eq!(engine.users_by_roles(&[Role::User]).unwrap().len(), 3);

    // managers see what they direct, admins everything
    let mp = engine.principal_for("m").unwrap().unwrap();
    let visible = engine.visible_programs(Some(&mp)).unwrap();
    assert_eq!(visible.iter().map(|p| p.id.unwrap()).collect::<Vec<_>>(), vec![p1]);
    assert_eq!(engine.visible_programs(Some(&admin)).unwrap().len(), 2);
    assert_eq!(engine.visible_programs(None).unwrap().len(), 2);
}

#[test]
fn principal_resolution() {
    let (_dir, engine, admin) = setup();
    assert_eq!(engine.principal_for("root").unwrap(), Some(admin.clone()));
    assert_eq!(engine.principal_for("nobody").unwrap(), None);

    // a provider's stale role is replaced by the stored one
    let mut stale = admin.clone();
    stale.role = Role::User;
    let resolved = engine.current_principal(&FixedPrincipal(Some(stale))).unwrap();
    assert_eq!(resolved.map(|p| p.role), Some(Role::Admin));

    assert_eq!(engine.current_principal(&FixedPrincipal::anonymous()).unwrap(), None);
    assert_eq!(engine.current_principal(&FixedPrincipal::system()).unwrap(), Some(Principal::system()));
}

// ============================================================================
// Notification
// ============================================================================

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Notifier for Recorder {
    fn user_created(&self, user: &User) -> Result<(), NotifyError> {
        self.0.lock().unwrap().push(user.identifier.clone());
        Ok(())
    }
}

struct Broken;

impl Notifier for Broken {
    fn user_created(&self, _: &User) -> Result<(), NotifyError> {
        Err(NotifyError("mail relay down".into()))
    }
}

#[test]
fn notifier_sees_new_users() {
    let dir = TempDir::new().unwrap();
    let rec = Recorder::default();
    let engine = Engine::new(LmdbStore::open_path(dir.path()).unwrap(), &EngineConfig { allow_bootstrap: true })
        .with_notifier(rec.clone());
    let admin = engine.bootstrap("Root", "root").unwrap();
    engine.create(Some(&admin), User::new("Ann", "ann", Role::User)).unwrap();
    engine.create(Some(&admin), Portfolio::new("X")).unwrap();

    // rejected creations are not announced
    let _ = engine.create(Some(&admin), User::new("Dup", "ann", Role::User));
    assert_eq!(*rec.0.lock().unwrap(), vec!["root".to_string(), "ann".to_string()]);
}

/// A failed notification never undoes the creation
#[test]
fn notifier_failure_keeps_user() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::new(LmdbStore::open_path(dir.path()).unwrap(), &EngineConfig { allow_bootstrap: true })
        .with_notifier(Broken);
    let admin = engine.bootstrap("Root", "root").unwrap();
    let ann = engine.create(Some(&admin), User::new("Ann", "ann", Role::User)).unwrap();
    assert_eq!(engine.get::<User>(ann.id.unwrap()).unwrap(), ann);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn config_from_json() {
    let c = Config::from_json(r#"{"store": {"path": "/var/lib/authz"}, "engine": {"allow_bootstrap": true}}"#).unwrap();
    assert_eq!(c.store.path, "/var/lib/authz");
    assert_eq!(c.store.map_size, StoreConfig::default().map_size);
    assert!(c.engine.allow_bootstrap);

    assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    assert!(!Config::default().engine.allow_bootstrap);
    assert!(matches!(Config::from_json("{"), Err(Error::ValidationFailed(_))));
}

#[test]
fn open_from_config() {
    let dir = TempDir::new().unwrap();
    let config = Config { store: StoreConfig::at(dir.path().join("db")), engine: EngineConfig { allow_bootstrap: true } };
    let engine = Engine::open(&config).unwrap();
    assert!(engine.is_bootstrap_open());
    engine.bootstrap("Root", "root").unwrap();
    assert!(engine.store().path().ends_with("db"));
}
