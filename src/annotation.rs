//! Annotation records.
//!
//! [`VariantAnnotation`] is the merged result for a single variant.
//! The other structures appear both as parts of the result and as bodies of stored documents.
//! Every structure is serialized as JSON with camelCase field names.

use crate::variant::Variant;

use serde::{Deserialize, Serialize};

//-----------------------------------------------------------------------------

/// Predicted effect of a variant on a transcript.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsequenceType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biotype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strand: Option<String>,
    /// Sequence Ontology terms.
    pub sequence_ontology_terms: Vec<String>,
}

/// A numeric score from a named source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub source: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Score {
    pub fn new(source: &str, score: f64) -> Self {
        Score { source: source.to_string(), score, description: None }
    }
}

/// Allele frequencies in a population of a study.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationFrequency {
    pub study: String,
    pub population: String,
    pub ref_allele: String,
    pub alt_allele: String,
    pub ref_allele_freq: f64,
    pub alt_allele_freq: f64,
}

//-----------------------------------------------------------------------------

// Gene-derived data.

/// Expression of a gene in a tissue or an experimental condition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expression {
    pub gene_name: String,
    pub experiment_id: String,
    pub factor_value: String,
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
}

/// Association between a gene and a disease or trait.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneTraitAssociation {
    pub id: String,
    pub name: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Interaction between a gene and a drug.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneDrugInteraction {
    pub gene_name: String,
    pub drug_name: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<String>,
}

/// An exon with 1-based inclusive coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exon {
    pub start: usize,
    pub end: usize,
}

/// A transcript of a gene.
///
/// Coding coordinates are absent for non-coding transcripts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub id: String,
    pub biotype: String,
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding_end: Option<usize>,
    #[serde(default)]
    pub exons: Vec<Exon>,
}

/// A gene with its transcripts and gene-level annotation.
///
/// Stored as the body of a document in the `gene` collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gene {
    pub id: String,
    pub name: String,
    pub chromosome: String,
    pub start: usize,
    pub end: usize,
    /// `+` or `-`.
    pub strand: String,
    pub biotype: String,
    #[serde(default)]
    pub transcripts: Vec<Transcript>,
    #[serde(default)]
    pub expression: Vec<Expression>,
    #[serde(default)]
    pub diseases: Vec<GeneTraitAssociation>,
    #[serde(default)]
    pub drugs: Vec<GeneDrugInteraction>,
}

impl Gene {
    /// Returns `true` if the gene is on the reverse strand.
    pub fn is_reverse(&self) -> bool {
        self.strand == "-" || self.strand == "-1"
    }
}

//-----------------------------------------------------------------------------

/// A clinical evidence entry attached to a stored clinical variant.
///
/// If `haplotype` is present, the entry describes a multi-nucleotide variant.
/// It then lists all variants of the haplotype, including the variant the entry is stored under, as `chr:pos:ref:alt` separated by commas.
/// Such an entry only applies when all of those variants are queried and their alternate alleles may be on the same chromosome copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceEntry {
    pub id: String,
    pub source: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_significance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haplotype: Option<String>,
}

impl EvidenceEntry {
    /// Returns `true` if the entry describes a multi-nucleotide variant.
    pub fn is_haplotype(&self) -> bool {
        self.haplotype.as_deref().is_some_and(|x| !x.trim().is_empty())
    }
}

/// Body of a document in the `clinical_variants` collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalRecord {
    #[serde(default)]
    pub trait_associations: Vec<EvidenceEntry>,
}

/// Body of a document in the `variation` collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub population_frequencies: Vec<PopulationFrequency>,
}

/// Body of a document in the `conservation` collection.
///
/// `values[i]` is the score at position `start + i`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConservationRecord {
    pub source: String,
    pub start: usize,
    pub values: Vec<f64>,
}

/// Body of a document in the `functional_score` collection.
///
/// `values[i]` contains the scores for alternate alleles `A`, `C`, `G`, `T` at position `start + i`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionalScoreRecord {
    pub source: String,
    pub start: usize,
    pub values: Vec<[f64; 4]>,
}

//-----------------------------------------------------------------------------

/// Merged annotation for a single variant.
///
/// A section is [`None`] if it was not requested or could not be computed.
/// A requested section without data is an empty list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantAnnotation {
    pub chromosome: String,
    pub start: usize,
    pub end: usize,
    pub reference: String,
    pub alternate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_consequence_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consequence_types: Option<Vec<ConsequenceType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conservation: Option<Vec<Score>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functional_scores: Option<Vec<Score>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_frequencies: Option<Vec<PopulationFrequency>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene_expression: Option<Vec<Expression>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene_trait_association: Option<Vec<GeneTraitAssociation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene_drug_interaction: Option<Vec<GeneDrugInteraction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trait_association: Option<Vec<EvidenceEntry>>,
}

impl VariantAnnotation {
    /// Creates an annotation with the identity of the variant and no sections.
    pub fn new(variant: &Variant) -> Self {
        VariantAnnotation {
            chromosome: variant.chromosome().to_string(),
            start: variant.start(),
            end: variant.end(),
            reference: variant.reference().to_string(),
            alternate: variant.alternate().to_string(),
            id: variant.id().map(String::from),
            ..Default::default()
        }
    }
}

//-----------------------------------------------------------------------------
