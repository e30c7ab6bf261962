//! LMDB-backed Entity Store

use std::path::{Path, PathBuf};

use heed::types::{Bytes, Str, U64};
use heed::{Database, Env, EnvOpenOptions};

use crate::config::StoreConfig;
use crate::constants::{DB_ENTITIES, DB_IDENTIFIERS, DB_LINKS, DB_LINK_COUNTS, DB_META, MAX_DBS};
use crate::error::{err, Result};
use crate::read::ReadTxn;
use crate::store::{EntityStore, StoreRead, StoreWrite};
use crate::tx::WriteTxn;

// Database type aliases
pub type Db = Database<Bytes, U64<byteorder::BigEndian>>;
pub type DbRecords = Database<Bytes, Bytes>;
pub type DbNamed = Database<Str, U64<byteorder::BigEndian>>;

/// All database handles
pub struct Dbs {
    /// [kind][id] -> JSON record
    pub entities: DbRecords,
    /// [link][target][source] -> source
    pub links: Db,
    /// [link][target] -> number of rows under that prefix in `links`
    pub link_counts: Db,
    /// user identifier -> user id
    pub identifiers: DbNamed,
    pub meta: DbNamed,
}

/// Entity Store on a single LMDB environment
pub struct LmdbStore {
    env: Env,
    dbs: Dbs,
    path: PathBuf,
}

impl LmdbStore {
    /// Open (or create) the environment described by `config`
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = Path::new(&config.path);
        std::fs::create_dir_all(path).map_err(err)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size)
                .max_readers(config.max_readers)
                .max_dbs(MAX_DBS)
                .open(path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let dbs = Dbs {
            entities: env.create_database(&mut tx, Some(DB_ENTITIES)).map_err(err)?,
            links: env.create_database(&mut tx, Some(DB_LINKS)).map_err(err)?,
            link_counts: env.create_database(&mut tx, Some(DB_LINK_COUNTS)).map_err(err)?,
            identifiers: env.create_database(&mut tx, Some(DB_IDENTIFIERS)).map_err(err)?,
            meta: env.create_database(&mut tx, Some(DB_META)).map_err(err)?,
        };
        tx.commit().map_err(err)?;
        tracing::debug!(path = %path.display(), "entity store opened");
        Ok(LmdbStore { env, dbs, path: path.to_path_buf() })
    }

    /// Open with default environment options
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&StoreConfig::at(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clear all databases, including the id sequence
    pub fn clear_all(&self) -> Result<()> {
        let mut tx = self.env.write_txn().map_err(err)?;
        self.dbs.entities.clear(&mut tx).map_err(err)?;
        self.dbs.links.clear(&mut tx).map_err(err)?;
        self.dbs.link_counts.clear(&mut tx).map_err(err)?;
        self.dbs.identifiers.clear(&mut tx).map_err(err)?;
        self.dbs.meta.clear(&mut tx).map_err(err)?;
        tx.commit().map_err(err)
    }
}

impl EntityStore for LmdbStore {
    fn read<T>(&self, f: impl FnOnce(&dyn StoreRead) -> Result<T>) -> Result<T> {
        let tx = self.env.read_txn().map_err(err)?;
        f(&ReadTxn { dbs: &self.dbs, tx: &tx })
    }

    /// The transaction is aborted on drop when `f` fails
    fn write<T>(&self, f: impl FnOnce(&mut dyn StoreWrite) -> Result<T>) -> Result<T> {
        let mut w = WriteTxn::new(&self.dbs, self.env.write_txn().map_err(err)?);
        let r = f(&mut w)?;
        w.commit()?;
        Ok(r)
    }
}
