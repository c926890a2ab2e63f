//! Clinical evidence for known variants.

use super::{fetch_each, FetchOptions, PartialResult, SourceAdaptor};

use crate::annotation::{ClinicalRecord, EvidenceEntry};
use crate::db::Collection;
use crate::error::AnnotationError;
use crate::phase::PhasedClinicalMatcher;
use crate::release::ValidatedRelease;
use crate::variant::Variant;

use log::warn;

//-----------------------------------------------------------------------------

/// Clinical evidence entries stored for the variant.
///
/// If there are several stored records for the same variant, the first one is used.
/// With [`FetchOptions::phased`], multi-nucleotide entries are filtered with [`PhasedClinicalMatcher`] over the whole batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClinicalAdaptor;

impl SourceAdaptor for ClinicalAdaptor {
    fn name(&self) -> &str {
        "clinical"
    }

    fn data_kind(&self) -> Option<&str> {
        Some(Collection::ClinicalVariants.name())
    }

    fn fetch_batch(&self, variants: &[Variant], release: &ValidatedRelease, options: &FetchOptions) -> Result<Vec<PartialResult>, AnnotationError> {
        let result = fetch_each(self.name(), variants, release, options, |interface, variant| {
            let documents = interface.documents_for_variant(Collection::ClinicalVariants, variant, release.release())?;
            if documents.len() > 1 {
                warn!("Found {} clinical records for {}; using the first one", documents.len(), variant);
            }
            match documents.first() {
                Some(document) => {
                    let record: ClinicalRecord = document.parse_body()?;
                    Ok(PartialResult::Clinical(record.trait_associations))
                },
                None => Ok(PartialResult::Empty),
            }
        })?;
        if !options.phased {
            return Ok(result);
        }

        options.cancel.check(self.name())?;
        let matcher = PhasedClinicalMatcher::new(variants);
        let filtered = result.into_iter().enumerate().map(|(i, partial)| match partial {
            PartialResult::Clinical(entries) => {
                let entries: Vec<EvidenceEntry> = matcher.filter(i, entries);
                PartialResult::Clinical(entries)
            },
            other => other,
        }).collect();
        Ok(filtered)
    }
}

//-----------------------------------------------------------------------------
