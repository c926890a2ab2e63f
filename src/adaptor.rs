//! Source adaptors: per-source lookups of annotation data for a batch of variants.
//!
//! Each adaptor implements [`SourceAdaptor`] and returns one [`PartialResult`] per input variant, in input order.
//! Adaptors open their own read-only database connections, so different adaptors can run concurrently in separate threads.
//! [`AdaptorRegistry`] maps annotation sections to adaptors.
//!
//! The gene adaptor is special: the aggregator calls it once per batch and derives several sections from the genes.

use crate::annotation::{EvidenceEntry, Gene, PopulationFrequency, Score};
use crate::db::{AnnotationBase, StoreInterface};
use crate::error::AnnotationError;
use crate::release::ValidatedRelease;
use crate::variant::Variant;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;

pub mod clinical;
pub mod frequency;
pub mod gene;
pub mod scores;

pub use clinical::ClinicalAdaptor;
pub use frequency::PopulationFrequencyAdaptor;
pub use gene::GeneAdaptor;
pub use scores::{ConservationAdaptor, FunctionalScoreAdaptor};


//-----------------------------------------------------------------------------

/// A section of [`crate::VariantAnnotation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    ConsequenceType,
    Conservation,
    FunctionalScore,
    Clinical,
    PopulationFrequencies,
    Expression,
    GeneDisease,
    DrugInteraction,
}

impl Section {
    /// All sections, which is also the default selection.
    pub const ALL: [Section; 8] = [
        Section::ConsequenceType, Section::Conservation, Section::FunctionalScore, Section::Clinical,
        Section::PopulationFrequencies, Section::Expression, Section::GeneDisease, Section::DrugInteraction,
    ];

    // Alternative names accepted in selections.
    const ALIASES: [(&'static str, Section); 2] = [
        ("traitAssociation", Section::Clinical),
        ("variation", Section::PopulationFrequencies),
    ];

    /// Returns the name of the section.
    pub fn name(&self) -> &'static str {
        match self {
            Section::ConsequenceType => "consequenceType",
            Section::Conservation => "conservation",
            Section::FunctionalScore => "functionalScore",
            Section::Clinical => "clinical",
            Section::PopulationFrequencies => "populationFrequencies",
            Section::Expression => "expression",
            Section::GeneDisease => "geneDisease",
            Section::DrugInteraction => "drugInteraction",
        }
    }

    /// Returns `true` if the section is computed from the genes near the variant.
    pub fn is_gene_derived(&self) -> bool {
        matches!(self, Section::ConsequenceType | Section::Expression | Section::GeneDisease | Section::DrugInteraction)
    }

    fn valid_names() -> Vec<&'static str> {
        let mut result: Vec<&'static str> = Self::ALL.iter().map(|x| x.name()).collect();
        result.extend(Self::ALIASES.iter().map(|x| x.0));
        result
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Section {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL.iter().find(|x| x.name() == s).copied()
            .or_else(|| Self::ALIASES.iter().find(|x| x.0 == s).map(|x| x.1))
            .ok_or_else(|| AnnotationError::UnknownSection { name: s.to_string(), valid: Self::valid_names() })
    }
}

//-----------------------------------------------------------------------------

/// Selection of annotation sections with include and exclude lists.
///
/// An include list overrides everything else.
/// Otherwise the selection consists of all sections except those in the exclude list.
///
/// # Examples
///
/// ```
/// use anno_base::{AnnotatorSelection, Section};
///
/// let selection = AnnotatorSelection::from_lists(&[], &["variation", "expression"]).unwrap();
/// let sections = selection.sections();
/// assert_eq!(sections.len(), Section::ALL.len() - 2);
/// assert!(!sections.contains(&Section::PopulationFrequencies));
///
/// let selection = AnnotatorSelection::from_lists(&["traitAssociation"], &["clinical"]).unwrap();
/// assert_eq!(selection.sections().into_iter().collect::<Vec<_>>(), vec![Section::Clinical]);
///
/// assert!(AnnotatorSelection::from_lists(&["nonsense"], &[]).is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnnotatorSelection {
    include: Option<BTreeSet<Section>>,
    exclude: BTreeSet<Section>,
}

impl AnnotatorSelection {
    /// Selects all sections.
    pub fn all() -> Self {
        Self::default()
    }

    /// Selects exactly the given sections.
    pub fn include(sections: &[Section]) -> Self {
        AnnotatorSelection { include: Some(sections.iter().copied().collect()), exclude: BTreeSet::new() }
    }

    /// Selects all sections except the given ones.
    pub fn exclude(sections: &[Section]) -> Self {
        AnnotatorSelection { include: None, exclude: sections.iter().copied().collect() }
    }

    /// Builds a selection from lists of section names.
    ///
    /// An empty include list means that there is no include list.
    /// Returns an error with the valid names if a name is not recognized.
    pub fn from_lists<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, AnnotationError> {
        let parse = |names: &[S]| -> Result<BTreeSet<Section>, AnnotationError> {
            names.iter().map(|x| x.as_ref().parse::<Section>()).collect()
        };
        let include = parse(include)?;
        let exclude = parse(exclude)?;
        Ok(AnnotatorSelection {
            include: if include.is_empty() { None } else { Some(include) },
            exclude,
        })
    }

    /// Returns the selected sections.
    pub fn sections(&self) -> BTreeSet<Section> {
        match &self.include {
            Some(include) => include.clone(),
            None => Section::ALL.iter().filter(|x| !self.exclude.contains(x)).copied().collect(),
        }
    }
}

//-----------------------------------------------------------------------------

/// Cooperative cancellation with an optional deadline.
///
/// Clones share the cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// Creates a token without a deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that expires after the given duration.
    pub fn with_timeout(timeout: Duration) -> Self {
        CancellationToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Cancels the token and all of its clones.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` if the token has been cancelled or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.deadline.is_some_and(|x| Instant::now() >= x)
    }

    /// Returns the time left until the deadline, or [`None`] if there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|x| x.saturating_duration_since(Instant::now()))
    }

    /// Returns [`AnnotationError::Cancelled`] if the token has been cancelled.
    pub fn check(&self, context: &str) -> Result<(), AnnotationError> {
        if self.is_cancelled() {
            Err(AnnotationError::Cancelled(context.to_string()))
        } else {
            Ok(())
        }
    }
}

/// Options passed to [`SourceAdaptor::fetch_batch`].
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    /// Apply phase-aware matching to multi-nucleotide clinical evidence.
    pub phased: bool,
    pub cancel: CancellationToken,
}

//-----------------------------------------------------------------------------

/// Data for a single variant from a single source.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PartialResult {
    /// No data was found.
    #[default]
    Empty,
    /// The source failed for this variant.
    Failed,
    Genes(Vec<Gene>),
    Scores(Vec<Score>),
    PopulationFrequencies {
        id: Option<String>,
        frequencies: Vec<PopulationFrequency>,
    },
    Clinical(Vec<EvidenceEntry>),
}

/// A source of annotation data.
///
/// Implementations must not mutate shared state, as the aggregator runs different adaptors concurrently.
pub trait SourceAdaptor: Send + Sync {
    /// Returns the name of the adaptor for log messages.
    fn name(&self) -> &str;

    /// Returns the data kind the adaptor reads, or [`None`] if it does not depend on release data.
    fn data_kind(&self) -> Option<&str>;

    /// Returns exactly one result for each variant, in the same order.
    ///
    /// The variants are normalized.
    /// Returns [`AnnotationError::Cancelled`] if `options.cancel` is cancelled during the call.
    fn fetch_batch(&self, variants: &[Variant], release: &ValidatedRelease, options: &FetchOptions) -> Result<Vec<PartialResult>, AnnotationError>;
}

// Opens a connection to the release database and calls `fetch` for each variant.
// Per-variant store errors are logged and reported as `PartialResult::Failed`.
pub(crate) fn fetch_each<F>(name: &str, variants: &[Variant], release: &ValidatedRelease, options: &FetchOptions, mut fetch: F) -> Result<Vec<PartialResult>, AnnotationError>
where
    F: FnMut(&mut StoreInterface, &Variant) -> Result<PartialResult, AnnotationError>,
{
    let database = AnnotationBase::open(release.path())?;
    let mut interface = StoreInterface::new(&database)?;
    let mut result = Vec::with_capacity(variants.len());
    for variant in variants {
        options.cancel.check(name)?;
        match fetch(&mut interface, variant) {
            Ok(partial) => result.push(partial),
            Err(error) => {
                warn!("{}: failed to fetch data for {}: {}", name, variant, error);
                result.push(PartialResult::Failed);
            },
        }
    }
    Ok(result)
}

//-----------------------------------------------------------------------------

/// Maps annotation sections to source adaptors.
///
/// Gene-derived sections are computed from the gene adaptor, so adaptors registered for them are not used.
#[derive(Clone, Default)]
pub struct AdaptorRegistry {
    genes: Option<Arc<dyn SourceAdaptor>>,
    sections: BTreeMap<Section, Arc<dyn SourceAdaptor>>,
}

impl AdaptorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the database-backed adaptors for all sections.
    pub fn with_defaults() -> Self {
        let mut result = Self::new();
        result.set_genes(Arc::new(GeneAdaptor::default()));
        result.register(Section::Conservation, Arc::new(ConservationAdaptor));
        result.register(Section::FunctionalScore, Arc::new(FunctionalScoreAdaptor));
        result.register(Section::PopulationFrequencies, Arc::new(PopulationFrequencyAdaptor));
        result.register(Section::Clinical, Arc::new(ClinicalAdaptor));
        result
    }

    /// Sets the gene adaptor, which must return [`PartialResult::Genes`].
    pub fn set_genes(&mut self, adaptor: Arc<dyn SourceAdaptor>) {
        self.genes = Some(adaptor);
    }

    /// Registers an adaptor for the section and returns the replaced adaptor.
    pub fn register(&mut self, section: Section, adaptor: Arc<dyn SourceAdaptor>) -> Option<Arc<dyn SourceAdaptor>> {
        self.sections.insert(section, adaptor)
    }

    /// Returns the gene adaptor.
    pub fn genes(&self) -> Option<&Arc<dyn SourceAdaptor>> {
        self.genes.as_ref()
    }

    /// Returns the adaptor for the section.
    pub fn get(&self, section: Section) -> Option<&Arc<dyn SourceAdaptor>> {
        self.sections.get(&section)
    }
}

impl fmt::Debug for AdaptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections: BTreeMap<&str, &str> = self.sections.iter().map(|(section, adaptor)| (section.name(), adaptor.name())).collect();
        f.debug_struct("AdaptorRegistry")
            .field("genes", &self.genes.as_ref().map(|x| x.name().to_string()))
            .field("sections", &sections)
            .finish()
    }
}

//-----------------------------------------------------------------------------
