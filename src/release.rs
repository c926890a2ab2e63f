//! Data releases: versioned snapshots of the annotation data in a database.
//!
//! A release maps data kinds (collection names such as `gene` or `clinical_variants`) to the sources that back them.
//! Stored documents are tagged with the releases that contain them, so releases coexist in the same tables.
//!
//! Release ids start from 1.
//! A new release copies the data kinds and the document tags of the previous release.
//! Only the latest release can be modified, and only until it becomes the default release.
//! All other releases are sealed.
//!
//! Release 0 refers to the default release of the database.

use crate::db::{self, AnnotationBase};
use crate::error::{ReleaseError, StoreError};

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, info};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Release number that refers to the default release.
pub const DEFAULT_RELEASE: usize = 0;

/// A versioned source of annotation data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub url: Vec<String>,
}

impl DataSource {
    pub fn new(name: &str, version: &str) -> Self {
        DataSource {
            name: name.to_string(),
            version: version.to_string(),
            date: None,
            url: Vec::new(),
        }
    }
}

/// A data release.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRelease {
    pub release: usize,
    pub date: String,
    pub active_by_default: bool,
    /// Sources for each data kind in the release.
    pub collections: BTreeMap<String, Vec<DataSource>>,
}

impl DataRelease {
    /// Returns `true` if the data kind is present in the release.
    pub fn has_data(&self, data: &str) -> bool {
        self.collections.contains_key(data)
    }

    /// Returns the names of the data kinds in the release.
    pub fn data_kinds(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }
}

//-----------------------------------------------------------------------------

/// A release that has been validated against the database.
///
/// The structure is an immutable snapshot of the release metadata.
/// Later changes to the registry, such as activating another release, do not affect it.
#[derive(Clone, Debug)]
pub struct ValidatedRelease {
    database: Arc<str>,
    path: Arc<Path>,
    data: Arc<DataRelease>,
}

impl ValidatedRelease {
    /// Returns the name of the database.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the path to the database file.
    ///
    /// Source adaptors open their own connections using this path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the release number.
    pub fn release(&self) -> usize {
        self.data.release
    }

    /// Returns the release metadata.
    pub fn data(&self) -> &DataRelease {
        &self.data
    }

    /// Returns `true` if the data kind is present in the release.
    pub fn has_data(&self, data: &str) -> bool {
        self.data.has_data(data)
    }

    /// Returns the sources for the data kind, or [`None`] if the data kind is not in the release.
    pub fn sources(&self, data: &str) -> Option<&[DataSource]> {
        self.data.collections.get(data).map(|x| x.as_slice())
    }
}

//-----------------------------------------------------------------------------

// Cached releases of a database.
#[derive(Debug, Default)]
struct ReleaseSet {
    releases: BTreeMap<usize, Arc<DataRelease>>,
    // File change counter read before loading the releases.
    change_counter: Option<u32>,
}

impl ReleaseSet {
    fn default_release(&self) -> Option<&Arc<DataRelease>> {
        self.releases.values().find(|x| x.active_by_default)
    }

    fn get(&self, release: usize) -> Option<&Arc<DataRelease>> {
        if release == DEFAULT_RELEASE {
            self.default_release()
        } else {
            self.releases.get(&release)
        }
    }

    fn valid(&self) -> Vec<usize> {
        self.releases.keys().copied().collect()
    }
}

/// Registry of the data releases in known databases.
///
/// The registry is constructed explicitly, and databases are registered by file before the registry is shared.
/// Release metadata is cached per database on first use.
/// A cached entry is replaced when a release is created, modified, or activated through the registry.
/// If a requested release is not in the cache, the registry reloads the metadata once before failing, as another process may have created the release.
/// The reload is skipped if the database file has not been modified since the cached metadata was loaded.
/// Reloads are serialized, so the cache never goes back to an earlier state of the database.
///
/// All query methods take `&self` and are safe to call from multiple threads.
///
/// # Examples
///
/// ```
/// use anno_base::{AnnotationBase, DatabaseInfo, DataSource, ReleaseRegistry};
///
/// let dir = tempfile::tempdir().unwrap();
/// let db_file = dir.path().join("example.db");
/// AnnotationBase::create(&db_file, &DatabaseInfo::new("hsapiens_grch38", "hsapiens", "GRCh38")).unwrap();
///
/// let mut registry = ReleaseRegistry::new();
/// let name = registry.add_database(&db_file).unwrap();
/// assert_eq!(name, "hsapiens_grch38");
///
/// let release = registry.create_release(&name).unwrap();
/// assert_eq!(release.release, 1);
/// registry.attach_data(&name, 1, "gene", &[DataSource::new("Ensembl", "110")]).unwrap();
/// registry.activate_by_default(&name, 1).unwrap();
///
/// let validated = registry.resolve_data(&name, 0, "gene").unwrap();
/// assert_eq!(validated.release(), 1);
/// assert!(registry.resolve(&name, 2).is_err());
/// ```
#[derive(Debug, Default)]
pub struct ReleaseRegistry {
    databases: BTreeMap<String, Arc<Path>>,
    cache: RwLock<HashMap<String, Arc<ReleaseSet>>>,
    reload_lock: Mutex<()>,
}

/// Registering databases.
impl ReleaseRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the database in the given file under the name stored in the database.
    ///
    /// Returns the name of the database.
    /// Passes through any database errors.
    pub fn add_database<P: AsRef<Path>>(&mut self, filename: P) -> Result<String, StoreError> {
        let database = AnnotationBase::open(&filename)?;
        let name = database.name().to_string();
        let path: PathBuf = filename.as_ref().to_path_buf();
        info!("Registered database {} ({})", name, path.display());
        self.databases.insert(name.clone(), Arc::from(path.as_path()));
        self.invalidate(&name);
        Ok(name)
    }

    /// Returns the names of the registered databases.
    pub fn databases(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }

    /// Returns the path to the database file.
    pub fn path(&self, database: &str) -> Result<&Path, ReleaseError> {
        self.databases.get(database).map(|x| x.as_ref()).ok_or_else(|| ReleaseError::UnknownDatabase {
            name: database.to_string(),
            available: self.databases(),
        })
    }

    /// Drops the cached releases for the database.
    ///
    /// The next query reloads them from the database.
    pub fn invalidate(&self, database: &str) {
        let mut cache = self.cache.write().unwrap_or_else(|x| x.into_inner());
        cache.remove(database);
    }

    // Loads the releases from the database and replaces the cached entry.
    // The lock is held from reading the database to replacing the entry.
    fn reload(&self, database: &str) -> Result<Arc<ReleaseSet>, ReleaseError> {
        let path = self.path(database)?;
        let _guard = self.reload_lock.lock().unwrap_or_else(|x| x.into_inner());
        let change_counter = AnnotationBase::change_counter(path).ok();
        let store = AnnotationBase::open(path)?;
        let releases = store.releases()?;
        let set = Arc::new(ReleaseSet {
            releases: releases.into_iter().map(|x| (x.release, Arc::new(x))).collect(),
            change_counter,
        });
        debug!("Loaded {} releases for database {}", set.releases.len(), database);

        let mut cache = self.cache.write().unwrap_or_else(|x| x.into_inner());
        cache.insert(database.to_string(), set.clone());
        Ok(set)
    }

    // Returns `true` if the database file may have been modified after the set was loaded.
    fn modified_since(&self, database: &str, set: &ReleaseSet) -> bool {
        let current = self.path(database).ok().and_then(|path| AnnotationBase::change_counter(path).ok());
        match (set.change_counter, current) {
            (Some(loaded), Some(current)) => loaded != current,
            _ => true,
        }
    }

    fn release_set(&self, database: &str) -> Result<Arc<ReleaseSet>, ReleaseError> {
        // Fail before touching the cache if the database is unknown.
        self.path(database)?;
        {
            let cache = self.cache.read().unwrap_or_else(|x| x.into_inner());
            if let Some(set) = cache.get(database) {
                return Ok(set.clone());
            }
        }
        self.reload(database)
    }

    fn validated(&self, database: &str, data: &Arc<DataRelease>) -> Result<ValidatedRelease, ReleaseError> {
        let path = self.databases.get_key_value(database).ok_or_else(|| ReleaseError::UnknownDatabase {
            name: database.to_string(),
            available: self.databases(),
        })?;
        Ok(ValidatedRelease {
            database: Arc::from(path.0.as_str()),
            path: path.1.clone(),
            data: data.clone(),
        })
    }
}

//-----------------------------------------------------------------------------

/// Resolving releases.
impl ReleaseRegistry {
    /// Resolves the release in the database.
    ///
    /// Release [`DEFAULT_RELEASE`] resolves to the default release.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::UnknownDatabase`] if the database is not registered.
    /// Returns [`ReleaseError::InvalidRelease`] with the valid release ids if the release does not exist.
    /// Returns [`ReleaseError::NoDefaultRelease`] if the default release was requested but none has been activated.
    pub fn resolve(&self, database: &str, release: usize) -> Result<ValidatedRelease, ReleaseError> {
        let set = self.release_set(database)?;
        if let Some(data) = set.get(release) {
            return self.validated(database, data);
        }

        // The release may have been created by another process.
        let set = if self.modified_since(database, &set) {
            self.reload(database)?
        } else {
            debug!("Database {} has not been modified; not reloading for release {}", database, release);
            set
        };
        match set.get(release) {
            Some(data) => self.validated(database, data),
            None if release == DEFAULT_RELEASE => Err(ReleaseError::NoDefaultRelease(database.to_string())),
            None => Err(ReleaseError::InvalidRelease {
                database: database.to_string(),
                release,
                valid: set.valid(),
            }),
        }
    }

    /// Resolves the release and checks that it contains the data kind.
    ///
    /// # Errors
    ///
    /// In addition to the errors from [`ReleaseRegistry::resolve`], returns [`ReleaseError::InvalidData`] with the available data kinds if the release does not contain the data kind.
    pub fn resolve_data(&self, database: &str, release: usize, data: &str) -> Result<ValidatedRelease, ReleaseError> {
        let validated = self.resolve(database, release)?;
        if validated.has_data(data) {
            Ok(validated)
        } else {
            Err(ReleaseError::InvalidData {
                database: database.to_string(),
                release: validated.release(),
                data: data.to_string(),
                available: validated.data().data_kinds(),
            })
        }
    }

    /// Returns the number of the default release.
    pub fn active_release(&self, database: &str) -> Result<usize, ReleaseError> {
        Ok(self.resolve(database, DEFAULT_RELEASE)?.release())
    }

    /// Returns all releases in the database, in release order.
    pub fn releases(&self, database: &str) -> Result<Vec<DataRelease>, ReleaseError> {
        let set = self.release_set(database)?;
        Ok(set.releases.values().map(|x| x.as_ref().clone()).collect())
    }
}

//-----------------------------------------------------------------------------

/// Modifying releases.
impl ReleaseRegistry {
    /// Creates a new release and returns it.
    ///
    /// The first release is 1.
    /// Later releases copy the data kinds and the document tags of the previous release.
    /// The new release is not the default release.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::EmptyRelease`] if the previous release has no data.
    /// Passes through any database errors.
    pub fn create_release(&self, database: &str) -> Result<DataRelease, ReleaseError> {
        let path = self.path(database)?;
        let mut connection = AnnotationBase::open_writable(path)?;
        let transaction = connection.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let releases = db::read_releases(&transaction)?;
        let (release, collections) = match releases.last() {
            None => (1, BTreeMap::new()),
            Some(last) => {
                if last.collections.is_empty() {
                    return Err(ReleaseError::EmptyRelease { database: database.to_string(), release: last.release });
                }
                (last.release + 1, last.collections.clone())
            },
        };
        db::insert_release(&transaction, release, &collections)?;
        if let Some(last) = releases.last() {
            let copied = db::copy_release_tags(&transaction, last.release, release)?;
            debug!("Copied {} document tags from release {} to release {}", copied, last.release, release);
        }
        transaction.commit()?;
        info!("Created release {} of database {}", release, database);

        let set = self.reload(database)?;
        set.releases.get(&release).map(|x| x.as_ref().clone()).ok_or_else(|| ReleaseError::InvalidRelease {
            database: database.to_string(),
            release,
            valid: set.valid(),
        })
    }

    /// Makes the release the default release of the database.
    ///
    /// The change is atomic: concurrent queries see either the old or the new default release.
    /// Already resolved releases are not affected.
    pub fn activate_by_default(&self, database: &str, release: usize) -> Result<(), ReleaseError> {
        let path = self.path(database)?;
        let mut connection = AnnotationBase::open_writable(path)?;
        let transaction = connection.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let releases = db::read_releases(&transaction)?;
        if release == DEFAULT_RELEASE || !releases.iter().any(|x| x.release == release) {
            return Err(ReleaseError::InvalidRelease {
                database: database.to_string(),
                release,
                valid: releases.iter().map(|x| x.release).collect(),
            });
        }
        db::set_default_release(&transaction, release)?;
        transaction.commit()?;
        info!("Release {} is now the default release of database {}", release, database);

        self.reload(database)?;
        Ok(())
    }

    /// Attaches sources for the data kind to the release.
    ///
    /// Sources are merged with the existing sources for the data kind.
    /// A source replaces an existing source with the same name; other sources are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the release does not exist or if it is sealed.
    pub fn attach_data(&self, database: &str, release: usize, data: &str, sources: &[DataSource]) -> Result<(), ReleaseError> {
        let path = self.path(database)?;
        let mut connection = AnnotationBase::open_writable(path)?;
        let transaction = connection.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let releases = db::read_releases(&transaction)?;
        db::check_open_release(database, &releases, release)?;

        let mut collections = releases.iter().find(|x| x.release == release).map(|x| x.collections.clone()).unwrap_or_default();
        let existing = collections.entry(data.to_string()).or_default();
        for source in sources {
            match existing.iter_mut().find(|x| x.name == source.name) {
                Some(old) => *old = source.clone(),
                None => existing.push(source.clone()),
            }
        }
        db::update_collections(&transaction, release, &collections)?;
        transaction.commit()?;
        info!("Attached {} sources for {} to release {} of database {}", sources.len(), data, release, database);

        self.reload(database)?;
        Ok(())
    }
}

//-----------------------------------------------------------------------------
