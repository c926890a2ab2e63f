//! Position-level scores: conservation and functional scores.
//!
//! Score documents cover a range of positions and store one value (conservation) or one value per alternate base (functional scores) for each position.

use super::{fetch_each, FetchOptions, PartialResult, SourceAdaptor};

use crate::annotation::{ConservationRecord, FunctionalScoreRecord, Score};
use crate::db::{Collection, Document, StoreInterface};
use crate::error::AnnotationError;
use crate::release::ValidatedRelease;
use crate::variant::{Region, Variant, VariantType};

//-----------------------------------------------------------------------------

// Returns the records of the collection covering the start position of the variant.
fn records_at<T: serde::de::DeserializeOwned>(interface: &mut StoreInterface, collection: Collection, variant: &Variant, release: usize) -> Result<Vec<T>, AnnotationError> {
    let region = Region::new(variant.chromosome(), variant.start(), variant.start());
    let documents = interface.documents_in_region(collection, &region, release)?;
    let records = documents.iter().map(Document::parse_body::<T>).collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

//-----------------------------------------------------------------------------

/// Conservation scores at the start position of the variant, one per source.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConservationAdaptor;

impl SourceAdaptor for ConservationAdaptor {
    fn name(&self) -> &str {
        "conservation"
    }

    fn data_kind(&self) -> Option<&str> {
        Some(Collection::Conservation.name())
    }

    fn fetch_batch(&self, variants: &[Variant], release: &ValidatedRelease, options: &FetchOptions) -> Result<Vec<PartialResult>, AnnotationError> {
        fetch_each(self.name(), variants, release, options, |interface, variant| {
            let records: Vec<ConservationRecord> = records_at(interface, Collection::Conservation, variant, release.release())?;
            let mut scores: Vec<Score> = Vec::new();
            for record in records.iter() {
                let value = variant.start().checked_sub(record.start).and_then(|offset| record.values.get(offset));
                if let Some(value) = value {
                    if !scores.iter().any(|x| x.source == record.source) {
                        scores.push(Score::new(&record.source, *value));
                    }
                }
            }
            Ok(PartialResult::Scores(scores))
        })
    }
}

//-----------------------------------------------------------------------------

/// Functional scores for the alternate base of a single-nucleotide variant, one per source.
///
/// Other variant types have no functional scores.
#[derive(Clone, Copy, Debug, Default)]
pub struct FunctionalScoreAdaptor;

impl FunctionalScoreAdaptor {
    // Index of the base in the per-position score arrays.
    fn base_index(base: &str) -> Option<usize> {
        match base {
            "A" => Some(0),
            "C" => Some(1),
            "G" => Some(2),
            "T" => Some(3),
            _ => None,
        }
    }
}

impl SourceAdaptor for FunctionalScoreAdaptor {
    fn name(&self) -> &str {
        "functional scores"
    }

    fn data_kind(&self) -> Option<&str> {
        Some(Collection::FunctionalScore.name())
    }

    fn fetch_batch(&self, variants: &[Variant], release: &ValidatedRelease, options: &FetchOptions) -> Result<Vec<PartialResult>, AnnotationError> {
        fetch_each(self.name(), variants, release, options, |interface, variant| {
            let base = match Self::base_index(variant.alternate()) {
                Some(base) if variant.variant_type() == VariantType::Snv => base,
                _ => return Ok(PartialResult::Empty),
            };
            let records: Vec<FunctionalScoreRecord> = records_at(interface, Collection::FunctionalScore, variant, release.release())?;
            let mut scores: Vec<Score> = Vec::new();
            for record in records.iter() {
                let values = variant.start().checked_sub(record.start).and_then(|offset| record.values.get(offset));
                if let Some(values) = values {
                    if !scores.iter().any(|x| x.source == record.source) {
                        scores.push(Score::new(&record.source, values[base]));
                    }
                }
            }
            Ok(PartialResult::Scores(scores))
        })
    }
}

//-----------------------------------------------------------------------------
