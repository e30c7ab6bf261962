//! LMDB Entity Store tests (no policy involved)

use hierarchy_authz::{
    Entity, EntityKind, EntityStore, Error, LmdbStore, Portfolio, Program, Project, Role, User,
};
use tempfile::TempDir;

fn setup() -> (TempDir, LmdbStore) {
    let dir = TempDir::new().unwrap();
    let store = LmdbStore::open_path(dir.path()).unwrap();
    (dir, store)
}

fn save(store: &LmdbStore, e: impl Into<Entity>) -> Entity {
    store.write(|tx| tx.save(e.into())).unwrap()
}

fn id(e: &Entity) -> u64 {
    e.id().unwrap()
}

#[test]
fn save_then_find() {
    let (_dir, store) = setup();
    let saved = save(&store, Portfolio::new("Alpha"));
    assert_eq!(saved.id(), Some(1));

    let found = store.read(|tx| tx.find_by_id(EntityKind::Portfolio, 1)).unwrap();
    assert_eq!(found, Some(saved));
    // ids are scoped by kind in the key, so a different kind misses
    assert_eq!(store.read(|tx| tx.find_by_id(EntityKind::Program, 1)).unwrap(), None);
}

/// Ids come from one global sequence and are never handed out twice
#[test]
fn ids_not_reused() {
    let (_dir, store) = setup();
    let a = id(&save(&store, Portfolio::new("A")));
    let u = id(&save(&store, User::new("U", "u", Role::User)));
    assert_eq!(u, a + 1);

    assert!(store.write(|tx| tx.delete_by_id(EntityKind::User, u)).unwrap());
    assert!(!store.write(|tx| tx.delete_by_id(EntityKind::User, u)).unwrap());
    let b = id(&save(&store, Portfolio::new("B")));
    assert_eq!(b, u + 1);
}

/// Counts follow every save, move and delete
#[test]
fn counts_track_references() {
    let (_dir, store) = setup();
    let x = id(&save(&store, Portfolio::new("X")));
    let y = id(&save(&store, Portfolio::new("Y")));
    let p1 = save(&store, Program::new("P1", x));
    save(&store, Program::new("P2", x));

    let count = |pf| store.read(|tx| tx.count_by_parent(EntityKind::Program, pf)).unwrap();
    assert_eq!((count(x), count(y)), (2, 0));

    let Entity::Program(mut moved) = p1 else { unreachable!() };
    moved.portfolio = y;
    save(&store, moved.clone());
    assert_eq!((count(x), count(y)), (1, 1));

    // re-saving without changes does not double count
    save(&store, moved.clone());
    assert_eq!(count(y), 1);

    store.write(|tx| tx.delete_by_id(EntityKind::Program, moved.id.unwrap())).unwrap();
    assert_eq!((count(x), count(y)), (1, 0));
    assert_eq!(store.read(|tx| tx.count_by_parent(EntityKind::Portfolio, x)).unwrap(), 0);
}

#[test]
fn director_and_sponsor_queries() {
    let (_dir, store) = setup();
    let m = id(&save(&store, User::new("M", "m", Role::Manager)));
    let x = id(&save(&store, Portfolio::new("X").with_director(m)));
    let p = id(&save(&store, Program::new("P", x).with_director(m)));
    save(&store, Project::new("A", p).with_sponsor(m));
    save(&store, Project::new("B", p).with_sponsor(m));

    store
        .read(|tx| {
            assert_eq!(tx.count_by_director(EntityKind::Portfolio, m)?, 1);
            assert_eq!(tx.count_by_director(EntityKind::Program, m)?, 1);
            assert_eq!(tx.count_by_director(EntityKind::User, m)?, 0);
            assert_eq!(tx.count_by_sponsor(m)?, 2);
            assert_eq!(tx.find_all_by_director(EntityKind::Program, m)?.len(), 1);
            assert_eq!(tx.find_all_by_parent(EntityKind::Project, p)?.len(), 2);
            Ok(())
        })
        .unwrap();

    let cleared = store.write(|tx| tx.unassign_sponsor(m)).unwrap();
    assert_eq!(cleared, 2);
    assert_eq!(store.read(|tx| tx.count_by_sponsor(m)).unwrap(), 0);
}

#[test]
fn unassign_members() {
    let (_dir, store) = setup();
    let x = id(&save(&store, Portfolio::new("X")));
    let p = id(&save(&store, Program::new("P", x)));
    let pr = id(&save(&store, Project::new("A", p)));
    let u1 = id(&save(&store, User::new("U1", "u1", Role::User).in_project(pr)));
    save(&store, User::new("U2", "u2", Role::User).in_project(pr));

    assert_eq!(store.write(|tx| tx.unassign_users_from_project(pr)).unwrap(), 2);
    assert_eq!(store.write(|tx| tx.unassign_users_from_project(pr)).unwrap(), 0);
    let u1 = store.read(|tx| tx.find_by_id(EntityKind::User, u1)).unwrap().unwrap();
    assert_eq!(u1.parent(), None);
}

/// A user directs at most one project, even when validation is bypassed
#[test]
fn one_project_per_director() {
    let (_dir, store) = setup();
    let x = id(&save(&store, Portfolio::new("X")));
    let p = id(&save(&store, Program::new("P", x)));
    let d = id(&save(&store, User::new("D", "d", Role::User)));
    let a = save(&store, Project::new("A", p).with_director(d));

    let e = store.write(|tx| tx.save(Project::new("B", p).with_director(d).into())).unwrap_err();
    assert!(matches!(e, Error::ValidationFailed(_)));
    assert_eq!(store.read(|tx| tx.find_all(EntityKind::Project)).unwrap().len(), 1);

    // re-saving the same project is not a second directorship
    save(&store, a);
}

#[test]
fn identifiers_are_unique() {
    let (_dir, store) = setup();
    let u = save(&store, User::new("A", "alice", Role::User));
    let e = store.write(|tx| tx.save(User::new("B", "alice", Role::User).into())).unwrap_err();
    assert!(matches!(e, Error::ValidationFailed(_)));

    // renaming frees the old identifier
    let Entity::User(mut renamed) = u else { unreachable!() };
    renamed.identifier = "alice2".into();
    save(&store, renamed);
    store
        .read(|tx| {
            assert!(tx.find_user_by_identifier("alice")?.is_none());
            assert_eq!(tx.find_user_by_identifier("alice2")?.map(|u| u.name), Some("A".to_string()));
            Ok(())
        })
        .unwrap();
    save(&store, User::new("C", "alice", Role::User));
}

#[test]
fn system_role_not_persisted() {
    let (_dir, store) = setup();
    let e = store.write(|tx| tx.save(User::new("S", "s", Role::System).into())).unwrap_err();
    assert!(matches!(e, Error::ValidationFailed(_)));
}

/// A failing write closure leaves nothing behind
#[test]
fn failed_write_aborts() {
    let (_dir, store) = setup();
    let r: Result<(), Error> = store.write(|tx| {
        tx.save(Portfolio::new("Gone").into())?;
        Err(Error::invalid("abort"))
    });
    assert_eq!(r, Err(Error::invalid("abort")));
    assert!(store.read(|tx| tx.find_all(EntityKind::Portfolio)).unwrap().is_empty());

    // the sequence rolled back too
    assert_eq!(save(&store, Portfolio::new("Kept")).id(), Some(1));
}

#[test]
fn reopen_keeps_data() {
    let dir = TempDir::new().unwrap();
    {
        let store = LmdbStore::open_path(dir.path()).unwrap();
        save(&store, Portfolio::new("Durable"));
    }
    let store = LmdbStore::open_path(dir.path()).unwrap();
    assert_eq!(store.path(), dir.path());
    let all = store.read(|tx| tx.find_all(EntityKind::Portfolio)).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name(), "Durable");

    store.clear_all().unwrap();
    assert!(store.read(|tx| tx.find_all(EntityKind::Portfolio)).unwrap().is_empty());
}
