use crate::annotation::{
    ClinicalRecord, ConservationRecord, EvidenceEntry, Exon, Expression, FunctionalScoreRecord, Gene,
    GeneDrugInteraction, GeneTraitAssociation, PopulationFrequency, Transcript, VariationRecord,
};
use crate::db::{AnnotationBase, Collection, DatabaseInfo, Document, GENOME_DATA};
use crate::release::{DataSource, ReleaseRegistry, ValidatedRelease};
use crate::variant::Variant;

use std::path::{Path, PathBuf};

use tempfile::TempDir;

//-----------------------------------------------------------------------------

// Database utilities.

pub(crate) const TEST_DATABASE: &str = "hsapiens_grch38";

// The directory must outlive the database.
pub(crate) fn create_empty_database() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir();
    assert!(dir.is_ok(), "Failed to create a temporary directory: {}", dir.unwrap_err());
    let dir = dir.unwrap();
    let db_file = dir.path().join("annotation.db");
    let info = DatabaseInfo::new(TEST_DATABASE, "hsapiens", "GRCh38");
    let result = AnnotationBase::create(&db_file, &info);
    assert!(result.is_ok(), "Failed to create database: {}", result.unwrap_err());
    (dir, db_file)
}

pub(crate) fn open_database(filename: &Path) -> AnnotationBase {
    let database = AnnotationBase::open(filename);
    assert!(database.is_ok(), "Failed to open database: {}", database.unwrap_err());
    database.unwrap()
}

pub(crate) fn create_registry(filename: &Path) -> ReleaseRegistry {
    let mut registry = ReleaseRegistry::new();
    let name = registry.add_database(filename);
    assert!(name.is_ok(), "Failed to register database: {}", name.unwrap_err());
    assert_eq!(name.unwrap(), TEST_DATABASE, "Wrong database name");
    registry
}

pub(crate) fn create_release(registry: &ReleaseRegistry) -> usize {
    let release = registry.create_release(TEST_DATABASE);
    assert!(release.is_ok(), "Failed to create release: {}", release.unwrap_err());
    release.unwrap().release
}

pub(crate) fn insert_documents(filename: &Path, collection: Collection, release: usize, documents: &[Document]) {
    let result = AnnotationBase::insert_documents(filename, collection, release, documents);
    assert!(result.is_ok(), "Failed to insert {} documents: {}", collection, result.unwrap_err());
    assert_eq!(result.unwrap(), documents.len(), "Wrong number of inserted {} documents", collection);
}

pub(crate) fn attach(registry: &ReleaseRegistry, release: usize, data: &str, source: &str, version: &str) {
    let result = registry.attach_data(TEST_DATABASE, release, data, &[DataSource::new(source, version)]);
    assert!(result.is_ok(), "Failed to attach {} to release {}: {}", data, release, result.unwrap_err());
}

pub(crate) fn activate(registry: &ReleaseRegistry, release: usize) {
    let result = registry.activate_by_default(TEST_DATABASE, release);
    assert!(result.is_ok(), "Failed to activate release {}: {}", release, result.unwrap_err());
}

pub(crate) fn resolve(registry: &ReleaseRegistry, release: usize) -> ValidatedRelease {
    let result = registry.resolve(TEST_DATABASE, release);
    assert!(result.is_ok(), "Failed to resolve release {}: {}", release, result.unwrap_err());
    result.unwrap()
}

//-----------------------------------------------------------------------------

// Fixture data.

pub(crate) fn variant(s: &str) -> Variant {
    let variant = s.parse::<Variant>();
    assert!(variant.is_ok(), "Failed to parse variant {}: {}", s, variant.unwrap_err());
    variant.unwrap()
}

pub(crate) fn fixture_genes() -> Vec<Gene> {
    let coding = Transcript {
        id: String::from("ENST00000000001"),
        biotype: String::from("protein_coding"),
        start: 10_000,
        end: 20_000,
        coding_start: Some(11_000),
        coding_end: Some(19_000),
        exons: vec![Exon { start: 10_000, end: 12_000 }, Exon { start: 18_000, end: 20_000 }],
    };
    let first = Gene {
        id: String::from("ENSG00000000001"),
        name: String::from("GENE1"),
        chromosome: String::from("1"),
        start: 10_000,
        end: 20_000,
        strand: String::from("+"),
        biotype: String::from("protein_coding"),
        transcripts: vec![coding],
        expression: vec![Expression {
            gene_name: String::from("GENE1"),
            experiment_id: String::from("E-MTAB-513"),
            factor_value: String::from("liver"),
            expression: String::from("UP"),
            p_value: Some(0.001),
        }],
        diseases: vec![GeneTraitAssociation {
            id: String::from("umls:C0006142"),
            name: String::from("Malignant neoplasm of breast"),
            source: String::from("disgenet"),
            score: Some(0.3),
        }],
        drugs: vec![GeneDrugInteraction {
            gene_name: String::from("GENE1"),
            drug_name: String::from("OLAPARIB"),
            source: String::from("dgidb"),
            interaction_type: Some(String::from("inhibitor")),
        }],
    };

    // Crosses the gene chunk boundary at 50000.
    let non_coding = Transcript {
        id: String::from("ENST00000000002"),
        biotype: String::from("lncRNA"),
        start: 49_000,
        end: 52_000,
        coding_start: None,
        coding_end: None,
        exons: vec![Exon { start: 49_000, end: 49_500 }, Exon { start: 51_500, end: 52_000 }],
    };
    let second = Gene {
        id: String::from("ENSG00000000002"),
        name: String::from("GENE2"),
        chromosome: String::from("1"),
        start: 49_000,
        end: 52_000,
        strand: String::from("-"),
        biotype: String::from("lncRNA"),
        transcripts: vec![non_coding],
        expression: Vec::new(),
        diseases: Vec::new(),
        drugs: Vec::new(),
    };

    vec![first, second]
}

// Position-dependent conservation values, so that offsets can be checked.
pub(crate) fn phast_cons(position: usize) -> f64 {
    (position % 1000) as f64 / 1000.0
}

pub(crate) fn fixture_documents(collection: Collection) -> Vec<Document> {
    let result = match collection {
        Collection::Gene => fixture_genes().iter()
            .map(|gene| Document::interval(&gene.chromosome, gene.start, gene.end, gene))
            .collect::<Result<Vec<_>, _>>(),
        Collection::Conservation => {
            // Crosses the conservation chunk boundary at 12000.
            let start = 11_001;
            let phast_cons = ConservationRecord {
                source: String::from("phastCons"),
                start,
                values: (start..start + 2000).map(phast_cons).collect(),
            };
            let phylop = ConservationRecord {
                source: String::from("phylop"),
                start: 11_500,
                values: vec![2.5; 10],
            };
            vec![
                Document::interval("1", start, start + 1999, &phast_cons),
                Document::interval("1", 11_500, 11_509, &phylop),
            ].into_iter().collect()
        },
        Collection::FunctionalScore => {
            let cadd = FunctionalScoreRecord {
                source: String::from("cadd_scaled"),
                start: 11_500,
                values: vec![[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]],
            };
            Document::interval("1", 11_500, 11_501, &cadd).map(|x| vec![x])
        },
        Collection::Variation => {
            let record = VariationRecord {
                id: Some(String::from("rs1")),
                population_frequencies: vec![PopulationFrequency {
                    study: String::from("GNOMAD_GENOMES"),
                    population: String::from("ALL"),
                    ref_allele: String::from("A"),
                    alt_allele: String::from("T"),
                    ref_allele_freq: 0.9,
                    alt_allele_freq: 0.1,
                }],
            };
            Document::variant(&variant("1:11500:A:T"), &record).map(|x| vec![x])
        },
        Collection::ClinicalVariants => {
            let mnv = EvidenceEntry {
                id: String::from("RCV000000001"),
                source: String::from("clinvar"),
                traits: vec![String::from("Fabry disease")],
                clinical_significance: Some(String::from("pathogenic")),
                haplotype: Some(String::from("X:100653362:C:T,X:100653363:T:C")),
            };
            let single = EvidenceEntry {
                id: String::from("RCV000000002"),
                source: String::from("clinvar"),
                traits: vec![String::from("Fabry disease")],
                clinical_significance: Some(String::from("likely_benign")),
                haplotype: None,
            };
            let first = ClinicalRecord { trait_associations: vec![single, mnv.clone()] };
            let second = ClinicalRecord { trait_associations: vec![mnv] };
            vec![
                Document::variant(&variant("X:100653362:C:T"), &first),
                Document::variant(&variant("X:100653363:T:C"), &second),
            ].into_iter().collect()
        },
    };
    assert!(result.is_ok(), "Failed to create {} documents: {}", collection, result.unwrap_err());
    result.unwrap()
}

pub(crate) fn fixture_sequence() -> Vec<u8> {
    b"GATTACA".iter().cycle().take(25_000).copied().collect()
}

//-----------------------------------------------------------------------------

// A database with release 1 containing all fixture data as the default release.
pub(crate) fn create_fixture_database() -> (TempDir, PathBuf, ReleaseRegistry) {
    let (dir, db_file) = create_empty_database();
    let registry = create_registry(&db_file);
    let release = create_release(&registry);
    assert_eq!(release, 1, "Wrong first release");

    for collection in Collection::ALL {
        insert_documents(&db_file, collection, release, &fixture_documents(collection));
        attach(&registry, release, collection.name(), "fixture", "1.0");
    }
    let chunks = AnnotationBase::insert_sequence(&db_file, "1", &fixture_sequence());
    assert!(chunks.is_ok(), "Failed to insert sequence: {}", chunks.unwrap_err());
    attach(&registry, release, GENOME_DATA, "fixture", "1.0");
    activate(&registry, release);

    (dir, db_file, registry)
}

//-----------------------------------------------------------------------------
