//! Genes near the variant.

use super::{fetch_each, FetchOptions, PartialResult, SourceAdaptor};

use crate::annotation::Gene;
use crate::consequence::OverlapCalculator;
use crate::db::{Collection, Document};
use crate::error::AnnotationError;
use crate::release::ValidatedRelease;
use crate::variant::{Region, Variant};

//-----------------------------------------------------------------------------

/// Returns the genes overlapping the variant extended by a flank on both sides.
#[derive(Clone, Debug)]
pub struct GeneAdaptor {
    pub flank: usize,
}

impl GeneAdaptor {
    /// Creates an adaptor with the given flank length.
    pub fn new(flank: usize) -> Self {
        GeneAdaptor { flank }
    }
}

impl Default for GeneAdaptor {
    fn default() -> Self {
        Self::new(OverlapCalculator::DEFAULT_FLANK)
    }
}

impl SourceAdaptor for GeneAdaptor {
    fn name(&self) -> &str {
        "genes"
    }

    fn data_kind(&self) -> Option<&str> {
        Some(Collection::Gene.name())
    }

    fn fetch_batch(&self, variants: &[Variant], release: &ValidatedRelease, options: &FetchOptions) -> Result<Vec<PartialResult>, AnnotationError> {
        fetch_each(self.name(), variants, release, options, |interface, variant| {
            let region = Region::from_variant(variant, self.flank);
            let documents = interface.documents_in_region(Collection::Gene, &region, release.release())?;
            let genes = documents.iter().map(Document::parse_body::<Gene>).collect::<Result<Vec<_>, _>>()?;
            Ok(PartialResult::Genes(genes))
        })
    }
}

//-----------------------------------------------------------------------------
