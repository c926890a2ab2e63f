use super::*;

use crate::annotation::{Gene, VariationRecord};
use crate::error::ReleaseError;
use crate::internal;
use crate::utils;

//-----------------------------------------------------------------------------

fn create_interface(database: &AnnotationBase) -> StoreInterface<'_> {
    let interface = StoreInterface::new(database);
    assert!(interface.is_ok(), "Failed to create store interface: {}", interface.unwrap_err());
    interface.unwrap()
}

fn region_query(interface: &mut StoreInterface, collection: Collection, region: &str, release: usize) -> Vec<Document> {
    let region: Region = region.parse().unwrap();
    let result = interface.documents_in_region(collection, &region, release);
    assert!(result.is_ok(), "Failed to query {} in {}: {}", collection, region, result.unwrap_err());
    result.unwrap()
}

fn variant_query(interface: &mut StoreInterface, collection: Collection, variant: &str, release: usize) -> Vec<Document> {
    let variant = internal::variant(variant);
    let result = interface.documents_for_variant(collection, &variant, release);
    assert!(result.is_ok(), "Failed to query {} for {}: {}", collection, variant, result.unwrap_err());
    result.unwrap()
}

fn gene_names(documents: &[Document]) -> Vec<String> {
    documents.iter().map(|x| x.parse_body::<Gene>().unwrap().name).collect()
}

fn get_sequence(interface: &mut StoreInterface, region: &str, strand: Strand) -> Vec<u8> {
    let region: Region = region.parse().unwrap();
    let result = interface.sequence(&region, strand);
    assert!(result.is_ok(), "Failed to get sequence for {}: {}", region, result.unwrap_err());
    result.unwrap()
}

//-----------------------------------------------------------------------------

#[test]
fn create_and_open() {
    let (_dir, db_file) = internal::create_empty_database();
    assert!(AnnotationBase::exists(&db_file), "Database {} does not exist", db_file.display());

    let database = internal::open_database(&db_file);
    assert_eq!(database.version(), AnnotationBase::VERSION, "Wrong version");
    assert_eq!(database.name(), internal::TEST_DATABASE, "Wrong name");
    assert_eq!(database.species(), "hsapiens", "Wrong species");
    assert_eq!(database.assembly(), "GRCh38", "Wrong assembly");
    assert_eq!(database.documents(), 0, "Wrong number of documents");
    assert_eq!(database.sequence_chunks(), 0, "Wrong number of sequence chunks");
    assert!(database.file_size().is_some(), "No file size");

    let releases = database.releases();
    assert!(releases.is_ok(), "Failed to read releases: {}", releases.unwrap_err());
    assert!(releases.unwrap().is_empty(), "A new database should have no releases");

    let mut interface = create_interface(&database);
    let tag = interface.get_tag("assembly");
    assert!(tag.is_ok(), "Failed to get tag: {}", tag.unwrap_err());
    assert_eq!(tag.unwrap().as_deref(), Some("GRCh38"), "Wrong assembly tag");
    assert_eq!(interface.get_tag("nonexistent").unwrap(), None, "Found a nonexistent tag");

    let info = DatabaseInfo::new("other", "other", "other");
    let result = AnnotationBase::create(&db_file, &info);
    assert!(matches!(result, Err(StoreError::AlreadyExists(_))), "Created a database over an existing one");
}

#[test]
fn identify_files() {
    let (dir, db_file) = internal::create_empty_database();
    assert_eq!(identify_database(&db_file), DatabaseFileType::Version(AnnotationBase::VERSION.to_string()));
    assert_eq!(identify_database(dir.path().join("missing.db")), DatabaseFileType::Missing);
    assert_eq!(identify_database(dir.path()), DatabaseFileType::NotDatabase);

    let other = dir.path().join("other.db");
    let connection = Connection::open(&other).unwrap();
    connection.execute("CREATE TABLE Other (value INTEGER)", ()).unwrap();
    drop(connection);
    assert_eq!(identify_database(&other), DatabaseFileType::UnknownDatabase);
}

#[test]
fn change_counter() {
    let (dir, db_file) = internal::create_empty_database();
    let before = AnnotationBase::change_counter(&db_file);
    assert!(before.is_ok(), "Failed to read the change counter: {}", before.unwrap_err());
    let before = before.unwrap();

    // Opening the database for reading does not modify it.
    let _ = internal::open_database(&db_file);
    assert_eq!(AnnotationBase::change_counter(&db_file).unwrap(), before, "Reading modified the database");

    let registry = internal::create_registry(&db_file);
    internal::create_release(&registry);
    assert_ne!(AnnotationBase::change_counter(&db_file).unwrap(), before, "Creating a release did not modify the database");

    assert!(AnnotationBase::change_counter(dir.path().join("missing.db")).is_err());
}

#[test]
fn parse_collections() {
    for collection in Collection::ALL {
        assert_eq!(collection.name().parse::<Collection>(), Ok(collection));
    }
    let error = "genes".parse::<Collection>().unwrap_err();
    assert!(error.contains("clinical_variants"), "The error should list the valid collections: {}", error);
}

//-----------------------------------------------------------------------------

#[test]
fn documents_by_region() {
    let (_dir, db_file, _registry) = internal::create_fixture_database();
    let database = internal::open_database(&db_file);
    let mut interface = create_interface(&database);

    // GENE2 is indexed in two chunks but returned once.
    assert_eq!(gene_names(&region_query(&mut interface, Collection::Gene, "1:49990-50010", 1)), vec!["GENE2"]);
    assert_eq!(gene_names(&region_query(&mut interface, Collection::Gene, "1:1-100000", 1)), vec!["GENE1", "GENE2"]);
    assert_eq!(gene_names(&region_query(&mut interface, Collection::Gene, "1:5000-10000", 1)), vec!["GENE1"]);
    assert!(region_query(&mut interface, Collection::Gene, "1:20001-48999", 1).is_empty(), "Found genes between the genes");
    assert!(region_query(&mut interface, Collection::Gene, "2:1-100000", 1).is_empty(), "Found genes on another chromosome");

    // The phastCons record crosses a chunk boundary.
    assert_eq!(region_query(&mut interface, Collection::Conservation, "1:12500", 1).len(), 1);
    assert_eq!(region_query(&mut interface, Collection::Conservation, "1:11505", 1).len(), 2);
    assert!(region_query(&mut interface, Collection::Conservation, "1:11000", 1).is_empty());

    // Nothing in a release without documents.
    assert!(region_query(&mut interface, Collection::Gene, "1:1-100000", 2).is_empty());
}

#[test]
fn documents_by_variant() {
    let (_dir, db_file, _registry) = internal::create_fixture_database();
    let database = internal::open_database(&db_file);
    let mut interface = create_interface(&database);

    let documents = variant_query(&mut interface, Collection::Variation, "1:11500:A:T", 1);
    assert_eq!(documents.len(), 1, "Wrong number of variation documents");
    let record: VariationRecord = documents[0].parse_body().unwrap();
    assert_eq!(record.id.as_deref(), Some("rs1"));

    assert!(variant_query(&mut interface, Collection::Variation, "1:11500:A:G", 1).is_empty(), "Found a different alternate allele");
    assert!(variant_query(&mut interface, Collection::ClinicalVariants, "1:11500:A:T", 1).is_empty(), "Found a document in the wrong collection");
    assert_eq!(variant_query(&mut interface, Collection::ClinicalVariants, "X:100653363:T:C", 1).len(), 1);
}

#[test]
fn insertions() {
    let (_dir, db_file) = internal::create_empty_database();
    let registry = internal::create_registry(&db_file);
    let release = internal::create_release(&registry);
    let insertion = internal::variant("1:1000:-:A");
    let record = VariationRecord { id: Some(String::from("rs2")), population_frequencies: Vec::new() };
    let document = Document::variant(&insertion, &record).unwrap();
    assert_eq!((document.start, document.end), (1000, 1000), "Wrong insertion interval");
    internal::insert_documents(&db_file, Collection::Variation, release, &[document]);

    let database = internal::open_database(&db_file);
    let mut interface = create_interface(&database);
    assert_eq!(variant_query(&mut interface, Collection::Variation, "1:1000:-:A", release).len(), 1);
    assert_eq!(region_query(&mut interface, Collection::Variation, "1:1000", release).len(), 1);
}

//-----------------------------------------------------------------------------

#[test]
fn release_scoping() {
    let (_dir, db_file, registry) = internal::create_fixture_database();
    let second = internal::create_release(&registry);
    assert_eq!(second, 2, "Wrong second release");

    // Replace the variation data in release 2.
    let record = VariationRecord { id: Some(String::from("rs1000")), population_frequencies: Vec::new() };
    let document = Document::variant(&internal::variant("1:11500:A:T"), &record).unwrap();
    internal::insert_documents(&db_file, Collection::Variation, second, &[document]);

    let database = internal::open_database(&db_file);
    let mut interface = create_interface(&database);
    for (release, expected) in [(1, "rs1"), (2, "rs1000")] {
        let documents = variant_query(&mut interface, Collection::Variation, "1:11500:A:T", release);
        assert_eq!(documents.len(), 1, "Wrong number of documents in release {}", release);
        let record: VariationRecord = documents[0].parse_body().unwrap();
        assert_eq!(record.id.as_deref(), Some(expected), "Wrong document in release {}", release);
    }

    // Other data kinds are inherited.
    assert_eq!(region_query(&mut interface, Collection::Gene, "1:1-100000", second).len(), 2);
}

#[test]
fn sealed_releases() {
    let (_dir, db_file, registry) = internal::create_fixture_database();
    let documents = internal::fixture_documents(Collection::Variation);

    // Release 1 is the default release.
    let result = AnnotationBase::insert_documents(&db_file, Collection::Variation, 1, &documents);
    assert!(matches!(result, Err(ReleaseError::SealedRelease { release: 1, .. })), "Modified the default release");

    // Release 1 is no longer the latest release.
    let second = internal::create_release(&registry);
    internal::attach(&registry, second, "variation", "dbSNP", "156");
    let result = AnnotationBase::insert_documents(&db_file, Collection::Variation, 1, &documents);
    assert!(matches!(result, Err(ReleaseError::SealedRelease { release: 1, .. })), "Modified an old release");

    // Nonexistent release.
    let result = AnnotationBase::insert_documents(&db_file, Collection::Variation, 5, &documents);
    match result {
        Err(ReleaseError::InvalidRelease { release, valid, .. }) => {
            assert_eq!(release, 5);
            assert_eq!(valid, vec![1, 2], "Wrong list of valid releases");
        },
        _ => panic!("Inserted documents into a nonexistent release"),
    }

    // The latest release is open.
    internal::insert_documents(&db_file, Collection::Variation, second, &documents);
}

//-----------------------------------------------------------------------------

#[test]
fn sequence() {
    let (_dir, db_file, _registry) = internal::create_fixture_database();
    let truth = internal::fixture_sequence();
    let database = internal::open_database(&db_file);
    assert_eq!(database.sequence_chunks(), truth.len().div_ceil(chunk::SEQUENCE_CHUNK_SIZE.get()), "Wrong number of sequence chunks");
    let mut interface = create_interface(&database);

    assert_eq!(get_sequence(&mut interface, "1:1-7", Strand::Forward), b"GATTACA");
    assert_eq!(get_sequence(&mut interface, "1:1995-2010", Strand::Forward), &truth[1994..2010], "Wrong sequence across a chunk boundary");
    assert_eq!(get_sequence(&mut interface, "1:1995-2010", Strand::Reverse), utils::reverse_complement(&truth[1994..2010]), "Wrong reverse strand sequence");
    assert_eq!(get_sequence(&mut interface, "1:24990-25100", Strand::Forward), &truth[24989..], "Sequence not truncated at the end");
    assert!(get_sequence(&mut interface, "2:1-100", Strand::Forward).is_empty(), "Found sequence for a missing chromosome");

    // Replace the sequence.
    let result = AnnotationBase::insert_sequence(&db_file, "1", b"ACGT");
    assert!(result.is_ok(), "Failed to replace sequence: {}", result.unwrap_err());
    assert_eq!(result.unwrap(), 1, "Wrong number of chunks");
    let database = internal::open_database(&db_file);
    let mut interface = create_interface(&database);
    assert_eq!(get_sequence(&mut interface, "1:1-100", Strand::Forward), b"ACGT");
}

//-----------------------------------------------------------------------------
