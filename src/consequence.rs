//! Consequence type calculation.
//!
//! The aggregator treats the calculator as a black box behind [`ConsequenceCalculator`].
//! [`OverlapCalculator`] is a simple default based on transcript and exon coordinates.
//! It does not look at the sequence, so it cannot distinguish between e.g. missense and synonymous variants.

use crate::annotation::{ConsequenceType, Gene, Transcript};
use crate::error::AnnotationError;
use crate::variant::{Variant, VariantType};

//-----------------------------------------------------------------------------

/// Sequence Ontology terms from the most severe to the least severe.
pub const SEVERITY_ORDER: [&str; 30] = [
    "transcript_ablation",
    "splice_acceptor_variant",
    "splice_donor_variant",
    "stop_gained",
    "frameshift_variant",
    "stop_lost",
    "start_lost",
    "transcript_amplification",
    "inframe_insertion",
    "inframe_deletion",
    "missense_variant",
    "protein_altering_variant",
    "splice_region_variant",
    "incomplete_terminal_codon_variant",
    "start_retained_variant",
    "stop_retained_variant",
    "synonymous_variant",
    "coding_sequence_variant",
    "mature_miRNA_variant",
    "5_prime_UTR_variant",
    "3_prime_UTR_variant",
    "non_coding_transcript_exon_variant",
    "intron_variant",
    "NMD_transcript_variant",
    "non_coding_transcript_variant",
    "upstream_gene_variant",
    "downstream_gene_variant",
    "TF_binding_site_variant",
    "regulatory_region_variant",
    "intergenic_variant",
];

/// Returns the severity rank of the term, with 0 being the most severe.
///
/// Unknown terms are less severe than any known term.
pub fn severity(term: &str) -> usize {
    SEVERITY_ORDER.iter().position(|x| *x == term).unwrap_or(SEVERITY_ORDER.len())
}

/// Returns the most severe term among the consequence types, or [`None`] if there are no terms.
///
/// Ties are broken by the first occurrence.
pub fn most_severe(consequences: &[ConsequenceType]) -> Option<String> {
    consequences.iter()
        .flat_map(|x| x.sequence_ontology_terms.iter())
        .min_by_key(|x| severity(x))
        .cloned()
}

//-----------------------------------------------------------------------------

/// Computes consequence types for a variant given the genes near it.
pub trait ConsequenceCalculator: Send + Sync {
    /// Returns the consequence types of the variant.
    ///
    /// Returns [`AnnotationError::UnsupportedVariant`] if the variant cannot be classified.
    fn run(&self, variant: &Variant, genes: &[Gene]) -> Result<Vec<ConsequenceType>, AnnotationError>;
}

/// Classifies variants by their overlap with transcripts, exons, and coding regions.
///
/// # Examples
///
/// ```
/// use anno_base::consequence::{ConsequenceCalculator, OverlapCalculator};
/// use anno_base::Variant;
///
/// let calculator = OverlapCalculator::default();
/// let variant = Variant::new("1", 1000, "A", "T");
/// let consequences = calculator.run(&variant, &[]).unwrap();
/// assert_eq!(consequences[0].sequence_ontology_terms, vec!["intergenic_variant"]);
/// ```
#[derive(Clone, Debug)]
pub struct OverlapCalculator {
    /// Maximum distance for upstream and downstream variants.
    pub flank: usize,
}

impl OverlapCalculator {
    /// Default distance for upstream and downstream variants.
    pub const DEFAULT_FLANK: usize = 5000;
}

impl Default for OverlapCalculator {
    fn default() -> Self {
        OverlapCalculator { flank: Self::DEFAULT_FLANK }
    }
}

impl OverlapCalculator {
    fn transcript_term(&self, variant: &Variant, gene: &Gene, transcript: &Transcript) -> Option<&'static str> {
        let (start, end) = variant.span();
        let reverse = gene.is_reverse();

        if end < transcript.start {
            if transcript.start - end > self.flank {
                return None;
            }
            return Some(if reverse { "downstream_gene_variant" } else { "upstream_gene_variant" });
        }
        if start > transcript.end {
            if start - transcript.end > self.flank {
                return None;
            }
            return Some(if reverse { "upstream_gene_variant" } else { "downstream_gene_variant" });
        }

        if transcript.exons.is_empty() {
            return Some("non_coding_transcript_variant");
        }
        let in_exon = transcript.exons.iter().any(|exon| start <= exon.end && end >= exon.start);
        if !in_exon {
            return Some("intron_variant");
        }

        let (coding_start, coding_end) = match (transcript.coding_start, transcript.coding_end) {
            (Some(coding_start), Some(coding_end)) => (coding_start, coding_end),
            _ => return Some("non_coding_transcript_exon_variant"),
        };
        if end < coding_start {
            return Some(if reverse { "3_prime_UTR_variant" } else { "5_prime_UTR_variant" });
        }
        if start > coding_end {
            return Some(if reverse { "5_prime_UTR_variant" } else { "3_prime_UTR_variant" });
        }

        let term = match variant.variant_type() {
            VariantType::Insertion | VariantType::Deletion | VariantType::Indel => {
                let (reference, alternate) = (variant.reference().len(), variant.alternate().len());
                if reference.abs_diff(alternate) % 3 != 0 {
                    "frameshift_variant"
                } else if alternate > reference {
                    "inframe_insertion"
                } else {
                    "inframe_deletion"
                }
            },
            _ => "coding_sequence_variant",
        };
        Some(term)
    }
}

impl ConsequenceCalculator for OverlapCalculator {
    fn run(&self, variant: &Variant, genes: &[Gene]) -> Result<Vec<ConsequenceType>, AnnotationError> {
        if variant.variant_type() == VariantType::Symbolic {
            return Err(AnnotationError::UnsupportedVariant(format!("{} has a symbolic allele", variant)));
        }

        let mut result = Vec::new();
        for gene in genes.iter().filter(|x| x.chromosome == variant.chromosome()) {
            for transcript in gene.transcripts.iter() {
                if let Some(term) = self.transcript_term(variant, gene, transcript) {
                    result.push(ConsequenceType {
                        gene_id: Some(gene.id.clone()),
                        gene_name: Some(gene.name.clone()),
                        transcript_id: Some(transcript.id.clone()),
                        biotype: Some(transcript.biotype.clone()),
                        strand: Some(gene.strand.clone()),
                        sequence_ontology_terms: vec![term.to_string()],
                    });
                }
            }
        }

        if result.is_empty() {
            result.push(ConsequenceType {
                sequence_ontology_terms: vec![String::from("intergenic_variant")],
                ..Default::default()
            });
        }
        Ok(result)
    }
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
