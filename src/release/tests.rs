use super::*;

use crate::db::{Collection, Document};
use crate::annotation::VariationRecord;
use crate::internal::{self, TEST_DATABASE};

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

//-----------------------------------------------------------------------------

fn data_kinds(registry: &ReleaseRegistry, release: usize) -> Vec<String> {
    internal::resolve(registry, release).data().data_kinds()
}

//-----------------------------------------------------------------------------

#[test]
fn empty_registry() {
    let registry = ReleaseRegistry::new();
    assert!(registry.databases().is_empty(), "Registry should be empty");
    match registry.resolve("hsapiens_grch38", 1) {
        Err(ReleaseError::UnknownDatabase { name, available }) => {
            assert_eq!(name, "hsapiens_grch38");
            assert!(available.is_empty());
        },
        _ => panic!("Resolved a release in an unknown database"),
    }
}

#[test]
fn unknown_database() {
    let (_dir, _db_file, registry) = internal::create_fixture_database();
    match registry.resolve("mmusculus_grcm39", 1) {
        Err(ReleaseError::UnknownDatabase { name, available }) => {
            assert_eq!(name, "mmusculus_grcm39");
            assert_eq!(available, vec![String::from(TEST_DATABASE)], "Wrong list of available databases");
        },
        _ => panic!("Resolved a release in an unknown database"),
    }
}

#[test]
fn invalid_release_lists_valid_releases() {
    let (_dir, _db_file, registry) = internal::create_fixture_database();
    internal::create_release(&registry);
    match registry.resolve(TEST_DATABASE, 7) {
        Err(ReleaseError::InvalidRelease { database, release, valid }) => {
            assert_eq!(database, TEST_DATABASE);
            assert_eq!(release, 7);
            assert_eq!(valid, vec![1, 2], "Wrong list of valid releases");
        },
        _ => panic!("Resolved a nonexistent release"),
    }
    let error = registry.resolve(TEST_DATABASE, 7).unwrap_err().to_string();
    assert!(error.contains("[1, 2]"), "The message should list the valid releases: {}", error);
}

#[test]
fn invalid_data_lists_available_data() {
    let (_dir, _db_file, registry) = internal::create_fixture_database();
    match registry.resolve_data(TEST_DATABASE, 1, "regulation") {
        Err(ReleaseError::InvalidData { release, data, available, .. }) => {
            assert_eq!(release, 1);
            assert_eq!(data, "regulation");
            assert!(available.contains(&String::from("clinical_variants")), "Missing data kind in {:?}", available);
            assert!(available.contains(&String::from("genome")), "Missing data kind in {:?}", available);
        },
        _ => panic!("Resolved nonexistent data"),
    }
    let validated = registry.resolve_data(TEST_DATABASE, 1, "gene");
    assert!(validated.is_ok(), "Failed to resolve gene data: {}", validated.unwrap_err());
    let validated = validated.unwrap();
    assert_eq!(validated.sources("gene"), Some([DataSource::new("fixture", "1.0")].as_slice()));
    assert_eq!(validated.sources("regulation"), None);
}

//-----------------------------------------------------------------------------

#[test]
fn default_release() {
    let (_dir, db_file) = internal::create_empty_database();
    let registry = internal::create_registry(&db_file);

    // No releases yet.
    assert!(matches!(registry.resolve(TEST_DATABASE, DEFAULT_RELEASE), Err(ReleaseError::NoDefaultRelease(_))));
    let first = internal::create_release(&registry);
    assert!(matches!(registry.active_release(TEST_DATABASE), Err(ReleaseError::NoDefaultRelease(_))), "A new release became the default");

    internal::attach(&registry, first, "gene", "Ensembl", "110");
    internal::activate(&registry, first);
    assert_eq!(registry.active_release(TEST_DATABASE).unwrap(), first);
    assert_eq!(internal::resolve(&registry, DEFAULT_RELEASE).release(), first);

    let second = internal::create_release(&registry);
    assert_eq!(registry.active_release(TEST_DATABASE).unwrap(), first, "Creating a release changed the default");
    internal::activate(&registry, second);
    assert_eq!(registry.active_release(TEST_DATABASE).unwrap(), second);

    let releases = registry.releases(TEST_DATABASE).unwrap();
    let defaults: Vec<bool> = releases.iter().map(|x| x.active_by_default).collect();
    assert_eq!(defaults, vec![false, true], "Exactly one release should be the default");

    assert!(matches!(registry.activate_by_default(TEST_DATABASE, 3), Err(ReleaseError::InvalidRelease { .. })));
    assert!(matches!(registry.activate_by_default(TEST_DATABASE, DEFAULT_RELEASE), Err(ReleaseError::InvalidRelease { .. })));
}

#[test]
fn new_releases_copy_previous_data() {
    let (_dir, db_file) = internal::create_empty_database();
    let registry = internal::create_registry(&db_file);
    let first = internal::create_release(&registry);

    // The first release must have data before the next one can be created.
    assert!(matches!(registry.create_release(TEST_DATABASE), Err(ReleaseError::EmptyRelease { release: 1, .. })));

    internal::attach(&registry, first, "gene", "Ensembl", "110");
    internal::attach(&registry, first, "variation", "dbSNP", "155");
    internal::activate(&registry, first);

    let second = internal::create_release(&registry);
    assert_eq!(second, first + 1, "Release ids should be consecutive");
    assert_eq!(data_kinds(&registry, second), data_kinds(&registry, first), "Data kinds were not copied");

    // Replacing a source in the new release does not affect the old one.
    internal::attach(&registry, second, "variation", "dbSNP", "156");
    internal::attach(&registry, second, "variation", "gnomAD", "4.0");
    let old = internal::resolve(&registry, first);
    let new = internal::resolve(&registry, second);
    assert_eq!(old.sources("variation"), Some([DataSource::new("dbSNP", "155")].as_slice()));
    assert_eq!(new.sources("variation"), Some([DataSource::new("dbSNP", "156"), DataSource::new("gnomAD", "4.0")].as_slice()));
}

#[test]
fn sealed_releases() {
    let (_dir, _db_file, registry) = internal::create_fixture_database();
    let sources = [DataSource::new("ClinVar", "2024-01")];

    // The default release is sealed.
    let result = registry.attach_data(TEST_DATABASE, 1, "clinical_variants", &sources);
    assert!(matches!(result, Err(ReleaseError::SealedRelease { release: 1, .. })), "Modified the default release");

    // So is a release that is no longer the latest.
    let second = internal::create_release(&registry);
    internal::attach(&registry, second, "clinical_variants", "ClinVar", "2024-01");
    internal::create_release(&registry);
    let result = registry.attach_data(TEST_DATABASE, second, "clinical_variants", &sources);
    assert!(matches!(result, Err(ReleaseError::SealedRelease { release: 2, .. })), "Modified an old release");
}

//-----------------------------------------------------------------------------

#[test]
fn resolved_releases_are_snapshots() {
    let (_dir, db_file, registry) = internal::create_fixture_database();
    let before = internal::resolve(&registry, DEFAULT_RELEASE);
    assert_eq!(before.release(), 1);

    let second = internal::create_release(&registry);
    let record = VariationRecord { id: Some(String::from("rs1000")), population_frequencies: Vec::new() };
    let document = Document::variant(&internal::variant("1:11500:A:T"), &record).unwrap();
    internal::insert_documents(&db_file, Collection::Variation, second, &[document]);
    internal::attach(&registry, second, "variation", "dbSNP", "156");
    internal::activate(&registry, second);

    // The earlier resolution still refers to release 1 and its metadata.
    assert_eq!(before.release(), 1, "A resolved release changed");
    assert!(before.data().active_by_default, "The snapshot should not see the new default");
    assert_eq!(before.sources("variation"), Some([DataSource::new("fixture", "1.0")].as_slice()));
    assert_eq!(internal::resolve(&registry, DEFAULT_RELEASE).release(), second);
}

#[test]
fn releases_created_elsewhere() {
    let (_dir, db_file, registry) = internal::create_fixture_database();
    assert_eq!(registry.releases(TEST_DATABASE).unwrap().len(), 1);

    // Another registry stands in for another process.
    let other = internal::create_registry(&db_file);
    let second = internal::create_release(&other);

    // The cache is stale, but a miss triggers a reload.
    assert_eq!(internal::resolve(&registry, second).release(), second);
    assert_eq!(registry.releases(TEST_DATABASE).unwrap().len(), 2);
}

#[test]
fn concurrent_resolution() {
    let (_dir, _db_file, registry) = internal::create_fixture_database();
    let registry = Arc::new(registry);
    let mut handles = Vec::new();
    for i in 0..4 {
        let registry = registry.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..25 {
                let release = if i % 2 == 0 { DEFAULT_RELEASE } else { 1 };
                let validated = registry.resolve_data(TEST_DATABASE, release, "gene");
                assert!(validated.is_ok(), "Failed to resolve release in thread {}: {}", i, validated.unwrap_err());
                assert_eq!(validated.unwrap().release(), 1);
                if i == 3 {
                    registry.invalidate(TEST_DATABASE);
                }
            }
        }));
    }
    for handle in handles {
        assert!(handle.join().is_ok(), "A thread panicked");
    }
}

//-----------------------------------------------------------------------------

// Returns the cached release set for the test database.
fn cached_set(registry: &ReleaseRegistry) -> Arc<ReleaseSet> {
    let cache = registry.cache.read().unwrap();
    let set = cache.get(TEST_DATABASE);
    assert!(set.is_some(), "No cached releases for {}", TEST_DATABASE);
    set.unwrap().clone()
}

#[test]
fn unknown_releases_without_changes() {
    let (_dir, db_file, registry) = internal::create_fixture_database();
    assert!(registry.resolve(TEST_DATABASE, 7).is_err(), "Resolved a nonexistent release");
    let before = cached_set(&registry);
    assert!(before.change_counter.is_some(), "The change counter was not recorded");

    // The database has not changed, so the cached releases are reused.
    for _ in 0..3 {
        assert!(registry.resolve(TEST_DATABASE, 7).is_err(), "Resolved a nonexistent release");
        assert!(Arc::ptr_eq(&before, &cached_set(&registry)), "Releases were reloaded for an unmodified database");
    }

    // A release created elsewhere modifies the database.
    let other = internal::create_registry(&db_file);
    let second = internal::create_release(&other);
    assert_eq!(internal::resolve(&registry, second).release(), second);
    assert!(!Arc::ptr_eq(&before, &cached_set(&registry)), "Releases were not reloaded after a modification");
}

#[test]
fn activation_with_concurrent_reloads() {
    let (_dir, _db_file, registry) = internal::create_fixture_database();
    let second = internal::create_release(&registry);
    let registry = Arc::new(registry);
    let done = Arc::new(AtomicBool::new(false));

    // Misses for a nonexistent release reload the cache after each activation.
    let mut handles = Vec::new();
    for _ in 0..3 {
        let registry = registry.clone();
        let done = done.clone();
        handles.push(thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                let _ = registry.resolve(TEST_DATABASE, 999);
            }
        }));
    }

    let mut stale = Vec::new();
    for i in 0..40 {
        let target = if i % 2 == 0 { second } else { 1 };
        internal::activate(&registry, target);
        let active = registry.active_release(TEST_DATABASE);
        match active {
            Ok(release) if release == target => {},
            Ok(release) => stale.push((target, release)),
            Err(err) => panic!("Failed to resolve the default release: {}", err),
        }
    }
    done.store(true, Ordering::Release);
    for handle in handles {
        assert!(handle.join().is_ok(), "A thread panicked");
    }
    assert!(stale.is_empty(), "Stale default releases (expected, found): {:?}", stale);
}

//-----------------------------------------------------------------------------
