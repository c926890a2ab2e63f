//! Anno-base: a SQLite database storing annotation documents, reference sequence chunks, and data releases.

use crate::chunk::{self, ChunkSize, SequenceChunk, Strand};
use crate::error::{ReleaseError, StoreError};
use crate::release::{DataRelease, DataSource};
use crate::utils;
use crate::variant::{Region, Variant};

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, Statement, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// A document collection in the database.
///
/// The name of the collection is also the name of the data kind in a release.
/// Each collection has a fixed chunk size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Collection {
    Gene,
    Conservation,
    FunctionalScore,
    Variation,
    ClinicalVariants,
}

impl Collection {
    /// All collections.
    pub const ALL: [Collection; 5] = [
        Collection::Gene, Collection::Conservation, Collection::FunctionalScore,
        Collection::Variation, Collection::ClinicalVariants,
    ];

    /// Returns the name of the collection.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Gene => "gene",
            Collection::Conservation => "conservation",
            Collection::FunctionalScore => "functional_score",
            Collection::Variation => "variation",
            Collection::ClinicalVariants => "clinical_variants",
        }
    }

    /// Returns the chunk size used for indexing the collection.
    pub fn chunk_size(&self) -> ChunkSize {
        match self {
            Collection::Gene => chunk::GENE_CHUNK_SIZE,
            Collection::Conservation => chunk::CONSERVATION_CHUNK_SIZE,
            Collection::FunctionalScore => chunk::FUNCTIONAL_SCORE_CHUNK_SIZE,
            Collection::Variation | Collection::ClinicalVariants => chunk::VARIANT_CHUNK_SIZE,
        }
    }

    /// Returns `true` if documents in the collection are keyed by variant alleles.
    pub fn is_variant_keyed(&self) -> bool {
        matches!(self, Collection::Variation | Collection::ClinicalVariants)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL.iter().find(|x| x.name() == s).copied().ok_or_else(|| {
            let valid: Vec<&str> = Collection::ALL.iter().map(|x| x.name()).collect();
            format!("Unknown collection {}. The valid collections are: {:?}", s, valid)
        })
    }
}

/// Name of the data kind for the reference genome sequence.
pub const GENOME_DATA: &str = "genome";

//-----------------------------------------------------------------------------

/// A stored document.
///
/// The coordinates are used for indexing, and variant-keyed documents also store the alleles.
/// The body is an arbitrary JSON value interpreted by the source adaptors.
/// In JSON-lines input, each line is one document in this format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub chromosome: String,
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate: Option<String>,
    pub body: serde_json::Value,
}

impl Document {
    /// Creates a document covering the given interval.
    pub fn interval<T: Serialize>(chromosome: &str, start: usize, end: usize, body: &T) -> Result<Self, StoreError> {
        Ok(Document {
            chromosome: chromosome.to_string(),
            start,
            end: end.max(start),
            reference: None,
            alternate: None,
            body: serde_json::to_value(body)?,
        })
    }

    /// Creates a document keyed by the alleles of the variant.
    ///
    /// The variant should be normalized.
    /// An insertion is indexed as covering its start position.
    pub fn variant<T: Serialize>(variant: &Variant, body: &T) -> Result<Self, StoreError> {
        Ok(Document {
            chromosome: variant.chromosome().to_string(),
            start: variant.start(),
            end: variant.end().max(variant.start()),
            reference: Some(variant.reference().to_string()),
            alternate: Some(variant.alternate().to_string()),
            body: serde_json::to_value(body)?,
        })
    }

    /// Deserializes the body of the document.
    pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(T::deserialize(&self.body)?)
    }

    fn from_row(row: &Row) -> rusqlite::Result<(usize, Self, String)> {
        let id: usize = row.get(0)?;
        let document = Document {
            chromosome: row.get(1)?,
            start: row.get(2)?,
            end: row.get(3)?,
            reference: row.get(4)?,
            alternate: row.get(5)?,
            body: serde_json::Value::Null,
        };
        let body: String = row.get(6)?;
        Ok((id, document, body))
    }
}

//-----------------------------------------------------------------------------

/// Header information for a new database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// Database name used in release resolution, such as `hsapiens_grch38`.
    pub name: String,
    pub species: String,
    pub assembly: String,
}

impl DatabaseInfo {
    pub fn new(name: &str, species: &str, assembly: &str) -> Self {
        DatabaseInfo {
            name: name.to_string(),
            species: species.to_string(),
            assembly: assembly.to_string(),
        }
    }
}

/// A database connection to an Anno-base database.
///
/// This structure stores a read-only database connection and some header information.
/// In multi-threaded applications, each thread should have its own connection.
/// Queries are supported through the [`StoreInterface`] structure.
///
/// # Examples
///
/// ```
/// use anno_base::{AnnotationBase, DatabaseInfo};
///
/// let dir = tempfile::tempdir().unwrap();
/// let db_file = dir.path().join("example.db");
/// let info = DatabaseInfo::new("hsapiens_grch38", "hsapiens", "GRCh38");
/// let result = AnnotationBase::create(&db_file, &info);
/// assert!(result.is_ok());
///
/// let database = AnnotationBase::open(&db_file).unwrap();
/// assert_eq!(database.name(), "hsapiens_grch38");
/// assert_eq!(database.assembly(), "GRCh38");
/// assert_eq!(database.documents(), 0);
/// ```
#[derive(Debug)]
pub struct AnnotationBase {
    connection: Connection,
    version: String,
    name: String,
    species: String,
    assembly: String,
    documents: usize,
    sequence_chunks: usize,
}

/// Using the database.
impl AnnotationBase {
    // Key for database version.
    const KEY_VERSION: &'static str = "version";

    /// Current database version.
    pub const VERSION: &'static str = "Anno-base v0.1.0";

    // Key for database name.
    const KEY_NAME: &'static str = "name";

    // Key for species.
    const KEY_SPECIES: &'static str = "species";

    // Key for assembly.
    const KEY_ASSEMBLY: &'static str = "assembly";

    // How long a writer waits for other connections.
    const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Opens a read-only connection to the database in the given file.
    ///
    /// Reads the header information and passes through any database errors.
    pub fn open<P: AsRef<Path>>(filename: P) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(filename, flags)?;
        connection.busy_timeout(Self::BUSY_TIMEOUT)?;

        // Get some header information.
        let mut get_tag = connection.prepare(
            "SELECT value FROM Tags WHERE key = ?1"
        )?;
        let version = get_string_value(&mut get_tag, Self::KEY_VERSION)?;
        if version != Self::VERSION {
            return Err(StoreError::Version { found: version, expected: Self::VERSION.to_string() });
        }
        let name = get_string_value(&mut get_tag, Self::KEY_NAME)?;
        let species = get_string_value(&mut get_tag, Self::KEY_SPECIES)?;
        let assembly = get_string_value(&mut get_tag, Self::KEY_ASSEMBLY)?;
        drop(get_tag);

        let documents: usize = connection.query_row("SELECT COUNT(*) FROM Documents", (), |row| row.get(0))?;
        let sequence_chunks: usize = connection.query_row("SELECT COUNT(*) FROM SequenceChunks", (), |row| row.get(0))?;

        Ok(AnnotationBase {
            connection,
            version,
            name, species, assembly,
            documents, sequence_chunks,
        })
    }

    /// Returns `true` if the database `filename` exists.
    pub fn exists<P: AsRef<Path>>(filename: P) -> bool {
        utils::file_exists(filename)
    }

    /// Returns the file change counter from the header of the database `filename`.
    ///
    /// SQLite increments the counter whenever a write transaction commits in rollback journal mode, which the store uses.
    /// Reading it does not open a database connection.
    pub fn change_counter<P: AsRef<Path>>(filename: P) -> Result<u32, StoreError> {
        let mut header = [0u8; 28];
        File::open(filename)?.read_exact(&mut header)?;
        Ok(u32::from_be_bytes([header[24], header[25], header[26], header[27]]))
    }

    /// Returns the filename of the database or [`None`] if there is no filename.
    pub fn filename(&self) -> Option<&str> {
        self.connection.path()
    }

    /// Returns the size of the database file in a human-readable format.
    pub fn file_size(&self) -> Option<String> {
        let filename = self.filename()?;
        utils::file_size(filename)
    }

    /// Returns the version of the database.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the name of the database.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    pub fn assembly(&self) -> &str {
        &self.assembly
    }

    /// Returns the number of stored documents over all collections and releases.
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Returns the number of stored sequence chunks.
    pub fn sequence_chunks(&self) -> usize {
        self.sequence_chunks
    }

    /// Returns all data releases in the database, in release order.
    pub fn releases(&self) -> Result<Vec<DataRelease>, StoreError> {
        read_releases(&self.connection)
    }

    // Opens a read-write connection to an existing database and checks the version.
    pub(crate) fn open_writable<P: AsRef<Path>>(filename: P) -> Result<Connection, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(filename, flags)?;
        connection.busy_timeout(Self::BUSY_TIMEOUT)?;
        {
            let mut get_tag = connection.prepare("SELECT value FROM Tags WHERE key = ?1")?;
            let version = get_string_value(&mut get_tag, Self::KEY_VERSION)?;
            if version != Self::VERSION {
                return Err(StoreError::Version { found: version, expected: Self::VERSION.to_string() });
            }
        }
        Ok(connection)
    }

    // Reads the database name from the given connection.
    pub(crate) fn database_name(connection: &Connection) -> Result<String, StoreError> {
        let mut get_tag = connection.prepare("SELECT value FROM Tags WHERE key = ?1")?;
        get_string_value(&mut get_tag, Self::KEY_NAME)
    }
}

//-----------------------------------------------------------------------------

/// Creating the database.
impl AnnotationBase {
    /// Creates a new empty database with the given header information.
    ///
    /// The database contains no releases.
    ///
    /// # Errors
    ///
    /// Returns an error if the database already exists.
    /// Passes through any database errors.
    pub fn create<P: AsRef<Path>>(filename: P, info: &DatabaseInfo) -> Result<(), StoreError> {
        info!("Creating database {}", filename.as_ref().display());
        if utils::file_exists(&filename) {
            return Err(StoreError::AlreadyExists(filename.as_ref().to_path_buf()));
        }

        let mut connection = Connection::open(&filename)?;
        Self::insert_tags(info, &mut connection)?;
        Self::create_tables(&connection)?;
        Ok(())
    }

    fn insert_tags(info: &DatabaseInfo, connection: &mut Connection) -> rusqlite::Result<()> {
        connection.execute(
            "CREATE TABLE Tags (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            ) STRICT",
            (),
        )?;

        let transaction = connection.transaction()?;
        {
            let mut insert = transaction.prepare(
                "INSERT INTO Tags(key, value) VALUES (?1, ?2)"
            )?;
            insert.execute((Self::KEY_VERSION, Self::VERSION))?;
            insert.execute((Self::KEY_NAME, &info.name))?;
            insert.execute((Self::KEY_SPECIES, &info.species))?;
            insert.execute((Self::KEY_ASSEMBLY, &info.assembly))?;
        }
        transaction.commit()?;

        debug!("Inserted header for database {}", info.name);
        Ok(())
    }

    fn create_tables(connection: &Connection) -> rusqlite::Result<()> {
        connection.execute_batch(
            "CREATE TABLE Releases (
                release_id INTEGER PRIMARY KEY,
                date TEXT NOT NULL,
                is_default INTEGER NOT NULL,
                collections TEXT NOT NULL
            ) STRICT;

            CREATE TABLE Documents (
                id INTEGER PRIMARY KEY,
                collection TEXT NOT NULL,
                chromosome TEXT NOT NULL,
                start_pos INTEGER NOT NULL,
                end_pos INTEGER NOT NULL,
                reference TEXT,
                alternate TEXT,
                body TEXT NOT NULL
            ) STRICT;
            CREATE INDEX DocumentsByPosition ON Documents(collection, chromosome, start_pos);

            CREATE TABLE ChunkIds (
                chunk_id TEXT NOT NULL,
                document INTEGER NOT NULL,
                PRIMARY KEY (chunk_id, document)
            ) STRICT, WITHOUT ROWID;

            CREATE TABLE DocumentReleases (
                document INTEGER NOT NULL,
                release_id INTEGER NOT NULL,
                PRIMARY KEY (document, release_id)
            ) STRICT, WITHOUT ROWID;
            CREATE INDEX DocumentsByRelease ON DocumentReleases(release_id);

            CREATE TABLE SequenceChunks (
                chromosome TEXT NOT NULL,
                chunk INTEGER NOT NULL,
                sequence BLOB NOT NULL,
                PRIMARY KEY (chromosome, chunk)
            ) STRICT;"
        )
    }
}

//-----------------------------------------------------------------------------

/// Loading data.
impl AnnotationBase {
    /// Inserts documents into a collection and tags them with the given release.
    ///
    /// Each document is indexed by all chunks it overlaps.
    /// If the release already contains documents from the collection, typically inherited from the previous release, they are removed from this release first.
    /// Returns the number of inserted documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the release does not exist or if it is sealed.
    /// See [`crate::ReleaseRegistry`] for sealed releases.
    /// Passes through any database errors.
    pub fn insert_documents<P: AsRef<Path>>(filename: P, collection: Collection, release: usize, documents: &[Document]) -> Result<usize, ReleaseError> {
        let mut connection = Self::open_writable(&filename)?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let database = Self::database_name(&transaction)?;
        let releases = read_releases(&transaction)?;
        check_open_release(&database, &releases, release)?;

        let replaced = untag_collection(&transaction, collection, release)?;
        if replaced > 0 {
            info!("Replacing {} {} documents in release {} of {}", replaced, collection, release, database);
        }
        info!("Inserting {} {} documents into release {} of {}", documents.len(), collection, release, database);
        let inserted = Self::insert_documents_impl(&transaction, collection, release, documents)?;
        transaction.commit()?;

        info!("Inserted {} documents", inserted);
        Ok(inserted)
    }

    fn insert_documents_impl(connection: &Connection, collection: Collection, release: usize, documents: &[Document]) -> Result<usize, StoreError> {
        let size = collection.chunk_size();
        let mut inserted = 0;
        let mut insert_document = connection.prepare(
            "INSERT INTO
                Documents(collection, chromosome, start_pos, end_pos, reference, alternate, body)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        )?;
        let mut insert_chunk = connection.prepare(
            "INSERT OR IGNORE INTO ChunkIds(chunk_id, document) VALUES (?1, ?2)"
        )?;
        let mut insert_release = connection.prepare(
            "INSERT INTO DocumentReleases(document, release_id) VALUES (?1, ?2)"
        )?;
        for document in documents {
            let body = serde_json::to_string(&document.body)?;
            let end = document.end.max(document.start);
            insert_document.execute((
                collection.name(), &document.chromosome, document.start, end,
                &document.reference, &document.alternate, body
            ))?;
            let id = connection.last_insert_rowid();
            let region = Region::new(&document.chromosome, document.start, end);
            for chunk_id in chunk::chunk_range(&region, size) {
                insert_chunk.execute((chunk_id, id))?;
            }
            insert_release.execute((id, release))?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Inserts the sequence of a chromosome as sequence chunks.
    ///
    /// Existing chunks for the same chromosome are replaced.
    /// Returns the number of inserted chunks.
    pub fn insert_sequence<P: AsRef<Path>>(filename: P, chromosome: &str, sequence: &[u8]) -> Result<usize, StoreError> {
        let mut connection = Self::open_writable(&filename)?;
        let chunks = chunk::split_sequence(chromosome, sequence, chunk::SEQUENCE_CHUNK_SIZE);

        let transaction = connection.transaction()?;
        {
            transaction.execute("DELETE FROM SequenceChunks WHERE chromosome = ?1", (chromosome,))?;
            let mut insert = transaction.prepare(
                "INSERT INTO SequenceChunks(chromosome, chunk, sequence) VALUES (?1, ?2, ?3)"
            )?;
            for chunk in chunks.iter() {
                let encoded = utils::pack_sequence(&chunk.sequence);
                insert.execute((&chunk.chromosome, chunk.index, encoded))?;
            }
        }
        transaction.commit()?;

        info!("Inserted {} bp of chromosome {} as {} chunks", sequence.len(), chromosome, chunks.len());
        Ok(chunks.len())
    }
}

//-----------------------------------------------------------------------------

// Release metadata. Writers pass a transaction, which dereferences to a connection.

pub(crate) fn read_releases(connection: &Connection) -> Result<Vec<DataRelease>, StoreError> {
    let mut statement = connection.prepare(
        "SELECT release_id, date, is_default, collections FROM Releases ORDER BY release_id"
    )?;
    let rows = statement.query_map((), |row| {
        let release: usize = row.get(0)?;
        let date: String = row.get(1)?;
        let active_by_default: bool = row.get(2)?;
        let collections: String = row.get(3)?;
        Ok((release, date, active_by_default, collections))
    })?;

    let mut result = Vec::new();
    for row in rows {
        let (release, date, active_by_default, collections) = row?;
        let collections: BTreeMap<String, Vec<DataSource>> = serde_json::from_str(&collections)?;
        result.push(DataRelease { release, date, active_by_default, collections });
    }
    Ok(result)
}

pub(crate) fn insert_release(connection: &Connection, release: usize, collections: &BTreeMap<String, Vec<DataSource>>) -> Result<(), StoreError> {
    let collections = serde_json::to_string(collections)?;
    connection.execute(
        "INSERT INTO Releases(release_id, date, is_default, collections) VALUES (?1, datetime('now'), FALSE, ?2)",
        (release, collections),
    )?;
    Ok(())
}

pub(crate) fn update_collections(connection: &Connection, release: usize, collections: &BTreeMap<String, Vec<DataSource>>) -> Result<(), StoreError> {
    let collections = serde_json::to_string(collections)?;
    connection.execute(
        "UPDATE Releases SET collections = ?2 WHERE release_id = ?1",
        (release, collections),
    )?;
    Ok(())
}

pub(crate) fn set_default_release(connection: &Connection, release: usize) -> Result<(), StoreError> {
    connection.execute("UPDATE Releases SET is_default = (release_id = ?1)", (release,))?;
    Ok(())
}

// Removes the documents of the collection from the release.
pub(crate) fn untag_collection(connection: &Connection, collection: Collection, release: usize) -> Result<usize, StoreError> {
    let removed = connection.execute(
        "DELETE FROM DocumentReleases
            WHERE release_id = ?1 AND document IN (SELECT id FROM Documents WHERE collection = ?2)",
        (release, collection.name()),
    )?;
    Ok(removed)
}

// Only the latest release can be modified, and only until it becomes the default release.
pub(crate) fn check_open_release(database: &str, releases: &[DataRelease], release: usize) -> Result<(), ReleaseError> {
    let target = releases.iter().find(|x| x.release == release).ok_or_else(|| ReleaseError::InvalidRelease {
        database: database.to_string(),
        release,
        valid: releases.iter().map(|x| x.release).collect(),
    })?;
    let latest = releases.last().map(|x| x.release);
    if target.active_by_default || latest != Some(release) {
        return Err(ReleaseError::SealedRelease { database: database.to_string(), release });
    }
    Ok(())
}

// Tags all documents in release `from` also with release `to`.
pub(crate) fn copy_release_tags(connection: &Connection, from: usize, to: usize) -> Result<usize, StoreError> {
    let copied = connection.execute(
        "INSERT OR IGNORE INTO DocumentReleases(document, release_id)
            SELECT document, ?2 FROM DocumentReleases WHERE release_id = ?1",
        (from, to),
    )?;
    Ok(copied)
}

//-----------------------------------------------------------------------------

/// Database query interface.
///
/// This structure stores prepared statements for accessing the database.
/// Region queries first select candidates by chunk id and then check the exact coordinates.
/// Document queries only return documents tagged with the requested release.
///
/// # Examples
///
/// ```
/// use anno_base::{AnnotationBase, DatabaseInfo, StoreInterface, Region};
/// use anno_base::chunk::Strand;
///
/// let dir = tempfile::tempdir().unwrap();
/// let db_file = dir.path().join("example.db");
/// let info = DatabaseInfo::new("test", "test", "test");
/// AnnotationBase::create(&db_file, &info).unwrap();
/// AnnotationBase::insert_sequence(&db_file, "1", b"GATTACA").unwrap();
///
/// let database = AnnotationBase::open(&db_file).unwrap();
/// let mut interface = StoreInterface::new(&database).unwrap();
/// let region = Region::new("1", 2, 5);
/// assert_eq!(interface.sequence(&region, Strand::Forward).unwrap(), b"ATTA");
/// assert_eq!(interface.sequence(&region, Strand::Reverse).unwrap(), b"TAAT");
/// ```
#[derive(Debug)]
pub struct StoreInterface<'a> {
    get_tag: Statement<'a>,
    documents_by_chunk: Statement<'a>,
    documents_by_variant: Statement<'a>,
    get_sequence_chunk: Statement<'a>,
}

impl<'a> StoreInterface<'a> {
    /// Returns a new interface to the given database.
    ///
    /// Passes through any database errors.
    pub fn new(database: &'a AnnotationBase) -> Result<Self, StoreError> {
        let get_tag = database.connection.prepare(
            "SELECT value FROM Tags WHERE key = ?1"
        )?;

        let documents_by_chunk = database.connection.prepare(
            "SELECT Documents.id, chromosome, start_pos, end_pos, reference, alternate, body
            FROM ChunkIds
                JOIN Documents ON Documents.id = ChunkIds.document
                JOIN DocumentReleases ON DocumentReleases.document = Documents.id
            WHERE ChunkIds.chunk_id = ?1 AND Documents.collection = ?2 AND DocumentReleases.release_id = ?3
                AND Documents.start_pos <= ?4 AND Documents.end_pos >= ?5
            ORDER BY Documents.id"
        )?;

        let documents_by_variant = database.connection.prepare(
            "SELECT Documents.id, chromosome, start_pos, end_pos, reference, alternate, body
            FROM Documents
                JOIN DocumentReleases ON DocumentReleases.document = Documents.id
            WHERE Documents.collection = ?1 AND chromosome = ?2 AND start_pos = ?3
                AND reference = ?4 AND alternate = ?5 AND DocumentReleases.release_id = ?6
            ORDER BY Documents.id"
        )?;

        let get_sequence_chunk = database.connection.prepare(
            "SELECT sequence FROM SequenceChunks WHERE chromosome = ?1 AND chunk = ?2"
        )?;

        Ok(StoreInterface {
            get_tag,
            documents_by_chunk,
            documents_by_variant,
            get_sequence_chunk,
        })
    }

    /// Returns the value of the tag with the given key, or [`None`] if the tag does not exist.
    pub fn get_tag(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self.get_tag.query_row((key,), |row| row.get(0)).optional()?;
        Ok(value)
    }

    /// Returns the documents in the collection overlapping the region in the given release.
    ///
    /// Each document is returned once, in the order the chunks and the documents within a chunk were found.
    pub fn documents_in_region(&mut self, collection: Collection, region: &Region, release: usize) -> Result<Vec<Document>, StoreError> {
        let mut seen: HashSet<usize> = HashSet::new();
        let mut result = Vec::new();
        for chunk_id in chunk::chunk_range(region, collection.chunk_size()) {
            let rows = self.documents_by_chunk.query_map(
                (&chunk_id, collection.name(), release, region.end, region.start),
                Document::from_row
            )?;
            for row in rows {
                let (id, mut document, body) = row?;
                if seen.insert(id) {
                    document.body = serde_json::from_str(&body)?;
                    result.push(document);
                }
            }
        }
        debug!("Found {} {} documents in {} (release {})", result.len(), collection, region, release);
        Ok(result)
    }

    /// Returns the documents in the collection keyed by the alleles of the variant in the given release.
    ///
    /// The variant should be normalized.
    pub fn documents_for_variant(&mut self, collection: Collection, variant: &Variant, release: usize) -> Result<Vec<Document>, StoreError> {
        let rows = self.documents_by_variant.query_map(
            (collection.name(), variant.chromosome(), variant.start(), variant.reference(), variant.alternate(), release),
            Document::from_row
        )?;
        let mut result = Vec::new();
        for row in rows {
            let (_, mut document, body) = row?;
            document.body = serde_json::from_str(&body)?;
            result.push(document);
        }
        Ok(result)
    }

    /// Returns the stored sequence chunks overlapping the region.
    ///
    /// Missing chunks are skipped.
    pub fn sequence_chunks(&mut self, region: &Region) -> Result<Vec<SequenceChunk>, StoreError> {
        let size = chunk::SEQUENCE_CHUNK_SIZE;
        let mut result = Vec::new();
        if region.is_empty() {
            return Ok(result);
        }
        for index in size.index(region.start)..=size.index(region.end) {
            let encoded: Option<Vec<u8>> = self.get_sequence_chunk.query_row(
                (&region.chromosome, index),
                |row| row.get(0)
            ).optional()?;
            match encoded {
                Some(encoded) => result.push(SequenceChunk {
                    chromosome: region.chromosome.clone(),
                    index,
                    sequence: utils::unpack_sequence(&encoded),
                }),
                None => break,
            }
        }
        Ok(result)
    }

    /// Returns the reference sequence of the region on the given strand.
    ///
    /// The sequence is truncated at the end of the chromosome.
    /// Returns an empty sequence if the chromosome does not exist.
    pub fn sequence(&mut self, region: &Region, strand: Strand) -> Result<Vec<u8>, StoreError> {
        let chunks = self.sequence_chunks(region)?;
        Ok(chunk::assemble_sequence(&chunks, region, strand, chunk::SEQUENCE_CHUNK_SIZE))
    }
}

//-----------------------------------------------------------------------------

/// Type of a potential database file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatabaseFileType {
    /// The file does not exist.
    Missing,
    /// The file is not a valid SQLite database.
    NotDatabase,
    /// The file is an unknown SQLite database.
    UnknownDatabase,
    /// The file is a known SQLite database with the given version string.
    Version(String),
}

/// Determines the type of the given file, which may be a SQLite database.
pub fn identify_database<P: AsRef<Path>>(filename: P) -> DatabaseFileType {
    match fs::metadata(&filename) {
        Ok(metadata) if metadata.is_file() => {},
        Ok(_) => return DatabaseFileType::NotDatabase,
        Err(_) => return DatabaseFileType::Missing,
    }

    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let connection = match Connection::open_with_flags(filename, flags) {
        Ok(connection) => connection,
        Err(_) => return DatabaseFileType::NotDatabase,
    };
    let version: rusqlite::Result<String> = connection.query_row(
        "SELECT value FROM Tags WHERE key = 'version'", (), |row| row.get(0)
    );
    match version {
        Ok(version) => DatabaseFileType::Version(version),
        Err(_) => DatabaseFileType::UnknownDatabase,
    }
}

// Executes the statement, which is expected to return a single string value.
// Then returns the value.
fn get_string_value(statement: &mut Statement, key: &str) -> Result<String, StoreError> {
    let result: Option<String> = statement.query_row((key,), |row| row.get(0)).optional()?;
    result.ok_or_else(|| StoreError::MissingKey(key.to_string()))
}

//-----------------------------------------------------------------------------
