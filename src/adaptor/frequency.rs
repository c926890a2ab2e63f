//! Population frequencies of known variants.

use super::{fetch_each, FetchOptions, PartialResult, SourceAdaptor};

use crate::annotation::VariationRecord;
use crate::db::Collection;
use crate::error::AnnotationError;
use crate::release::ValidatedRelease;
use crate::variant::Variant;

use log::warn;

//-----------------------------------------------------------------------------

/// Population frequencies and the identifier of the known variant with the same alleles.
///
/// If there are several stored records for the same variant, the first one is used.
#[derive(Clone, Copy, Debug, Default)]
pub struct PopulationFrequencyAdaptor;

impl SourceAdaptor for PopulationFrequencyAdaptor {
    fn name(&self) -> &str {
        "population frequencies"
    }

    fn data_kind(&self) -> Option<&str> {
        Some(Collection::Variation.name())
    }

    fn fetch_batch(&self, variants: &[Variant], release: &ValidatedRelease, options: &FetchOptions) -> Result<Vec<PartialResult>, AnnotationError> {
        fetch_each(self.name(), variants, release, options, |interface, variant| {
            let documents = interface.documents_for_variant(Collection::Variation, variant, release.release())?;
            if documents.len() > 1 {
                warn!("Found {} variation records for {}; using the first one", documents.len(), variant);
            }
            match documents.first() {
                Some(document) => {
                    let record: VariationRecord = document.parse_body()?;
                    Ok(PartialResult::PopulationFrequencies { id: record.id, frequencies: record.population_frequencies })
                },
                None => Ok(PartialResult::Empty),
            }
        })
    }
}

//-----------------------------------------------------------------------------
