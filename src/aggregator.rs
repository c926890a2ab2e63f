//! Annotation aggregation: merging the results of all requested sources into one annotation per variant.
//!
//! The aggregator runs one thread per requested non-gene section, each calling its adaptor on the whole batch.
//! Genes are fetched once per variant in the calling thread, and all gene-derived sections are computed from them.
//! Results are merged by index, so the output is in input order regardless of the order in which the threads finish.
//!
//! A failing, missing, or cancelled source leaves its section absent ([`None`]) in the affected annotations.
//! It never fails the batch.

use crate::adaptor::{AdaptorRegistry, AnnotatorSelection, CancellationToken, FetchOptions, GeneAdaptor, PartialResult, Section};
use crate::annotation::{Gene, VariantAnnotation};
use crate::consequence::{self, ConsequenceCalculator, OverlapCalculator};
use crate::error::AnnotationError;
use crate::release::{ReleaseRegistry, ValidatedRelease};
use crate::variant::Variant;

use std::collections::BTreeSet;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};


//-----------------------------------------------------------------------------

/// Parameters for [`AnnotationAggregator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatorParams {
    /// Genes within this distance from the variant are used for gene-derived sections.
    pub gene_flank: usize,
    /// Normalize the variants before the lookups.
    pub normalize: bool,
    /// Time limit for [`AnnotationAggregator::annotate_release`].
    pub timeout: Option<Duration>,
}

impl AggregatorParams {
    /// Default value for `gene_flank`.
    pub const GENE_FLANK: usize = OverlapCalculator::DEFAULT_FLANK;
}

impl Default for AggregatorParams {
    fn default() -> Self {
        AggregatorParams {
            gene_flank: Self::GENE_FLANK,
            normalize: true,
            timeout: None,
        }
    }
}

//-----------------------------------------------------------------------------

// Result of a concurrent section task.
type TaskResult = (Section, Result<Vec<PartialResult>, AnnotationError>);

/// Builds [`VariantAnnotation`] records for batches of variants.
///
/// The aggregator is immutable after construction and can be shared between threads.
///
/// # Examples
///
/// ```
/// use anno_base::{AggregatorParams, AnnotationAggregator, AnnotationBase, AnnotatorSelection, DatabaseInfo, ReleaseRegistry, Variant};
/// use std::sync::Arc;
///
/// let dir = tempfile::tempdir().unwrap();
/// let db_file = dir.path().join("example.db");
/// AnnotationBase::create(&db_file, &DatabaseInfo::new("example", "hsapiens", "GRCh38")).unwrap();
/// let mut registry = ReleaseRegistry::new();
/// registry.add_database(&db_file).unwrap();
/// registry.create_release("example").unwrap();
///
/// let aggregator = AnnotationAggregator::new(Arc::new(registry), AggregatorParams::default());
/// let variants = vec![Variant::new("1", 1000, "A", "T"), Variant::new("1", 2000, "AT", "A")];
/// let result = aggregator.annotate_release("example", 1, &variants, &AnnotatorSelection::all(), false).unwrap();
///
/// // The release has no data, but every variant gets an annotation.
/// assert_eq!(result.len(), 2);
/// assert_eq!((result[1].start, result[1].reference.as_str(), result[1].alternate.as_str()), (2001, "T", ""));
/// assert!(result[0].consequence_types.is_none());
/// ```
#[derive(Clone)]
pub struct AnnotationAggregator {
    registry: Arc<ReleaseRegistry>,
    adaptors: AdaptorRegistry,
    calculator: Arc<dyn ConsequenceCalculator>,
    params: AggregatorParams,
}

impl AnnotationAggregator {
    // How often the aggregator checks for cancellation while waiting for the sources.
    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Creates an aggregator with the default adaptors and the default consequence calculator.
    pub fn new(registry: Arc<ReleaseRegistry>, params: AggregatorParams) -> Self {
        let mut adaptors = AdaptorRegistry::with_defaults();
        adaptors.set_genes(Arc::new(GeneAdaptor::new(params.gene_flank)));
        let calculator = Arc::new(OverlapCalculator { flank: params.gene_flank });
        Self::with_adaptors(registry, adaptors, calculator, params)
    }

    /// Creates an aggregator with the given adaptors and consequence calculator.
    pub fn with_adaptors(registry: Arc<ReleaseRegistry>, adaptors: AdaptorRegistry, calculator: Arc<dyn ConsequenceCalculator>, params: AggregatorParams) -> Self {
        AnnotationAggregator { registry, adaptors, calculator, params }
    }

    /// Returns the release registry.
    pub fn registry(&self) -> &ReleaseRegistry {
        &self.registry
    }

    pub fn adaptors(&self) -> &AdaptorRegistry {
        &self.adaptors
    }

    pub fn params(&self) -> &AggregatorParams {
        &self.params
    }
}

//-----------------------------------------------------------------------------

/// Annotating variants.
impl AnnotationAggregator {
    /// Resolves the release and annotates the variants.
    ///
    /// Release [`crate::release::DEFAULT_RELEASE`] is the default release of the database.
    /// The annotation is cancelled after `params.timeout`, if set.
    ///
    /// # Errors
    ///
    /// Returns an error if the release cannot be resolved.
    /// Failures in individual sources are logged and do not cause an error.
    pub fn annotate_release(&self, database: &str, release: usize, variants: &[Variant], selection: &AnnotatorSelection, phased: bool) -> Result<Vec<VariantAnnotation>, AnnotationError> {
        let release = self.registry.resolve(database, release)?;
        let cancel = match self.params.timeout {
            Some(timeout) => CancellationToken::with_timeout(timeout),
            None => CancellationToken::new(),
        };
        Ok(self.annotate(variants, &release, selection, phased, &cancel))
    }

    /// Annotates the variants using data from the release.
    ///
    /// Returns one annotation for each input variant, in the same order.
    /// Each annotation contains only the selected sections.
    /// A section is absent if its source is unavailable, fails, or does not finish before cancellation.
    /// If `phased` is set, multi-nucleotide clinical evidence is filtered with [`crate::PhasedClinicalMatcher`].
    pub fn annotate(&self, variants: &[Variant], release: &ValidatedRelease, selection: &AnnotatorSelection, phased: bool, cancel: &CancellationToken) -> Vec<VariantAnnotation> {
        let start = Instant::now();
        let variants: Arc<[Variant]> = if self.params.normalize {
            variants.iter().map(Variant::normalize).collect()
        } else {
            variants.iter().cloned().collect()
        };
        let mut annotations: Vec<VariantAnnotation> = variants.iter().map(VariantAnnotation::new).collect();
        if variants.is_empty() {
            return annotations;
        }

        let sections = selection.sections();
        let options = FetchOptions { phased, cancel: cancel.clone() };
        let (sender, receiver) = mpsc::channel::<TaskResult>();

        // One thread per non-gene section.
        let mut pending: BTreeSet<Section> = BTreeSet::new();
        for section in sections.iter().copied().filter(|x| !x.is_gene_derived()) {
            let adaptor = match self.adaptors.get(section) {
                Some(adaptor) => adaptor.clone(),
                None => {
                    warn!("No source for section {}", section);
                    continue;
                },
            };
            if let Some(kind) = adaptor.data_kind() {
                if !release.has_data(kind) {
                    warn!("Release {} of {} has no {} data; skipping section {}", release.release(), release.database(), kind, section);
                    continue;
                }
            }
            let to_merge = sender.clone();
            let variants = variants.clone();
            let release = release.clone();
            let options = options.clone();
            thread::spawn(move || {
                let result = adaptor.fetch_batch(&variants, &release, &options);
                let _ = to_merge.send((section, result));
            });
            pending.insert(section);
        }
        drop(sender);

        // Gene-derived sections in this thread.
        let gene_sections: Vec<Section> = sections.iter().copied().filter(|x| x.is_gene_derived()).collect();
        if !gene_sections.is_empty() {
            self.fill_gene_sections(&variants, release, &gene_sections, &options, &mut annotations);
        }

        // Merge the other sections as they finish.
        while !pending.is_empty() {
            if cancel.is_cancelled() {
                // Keep the sections that already finished.
                while let Ok((section, result)) = receiver.try_recv() {
                    pending.remove(&section);
                    merge_result(section, result, &mut annotations);
                }
                if !pending.is_empty() {
                    warn!("Annotation cancelled; sections {:?} are incomplete", pending.iter().map(|x| x.name()).collect::<Vec<_>>());
                }
                break;
            }
            let wait = cancel.remaining().map_or(Self::POLL_INTERVAL, |x| x.min(Self::POLL_INTERVAL));
            match receiver.recv_timeout(wait) {
                Ok((section, result)) => {
                    pending.remove(&section);
                    merge_result(section, result, &mut annotations);
                },
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Sources for sections {:?} stopped without a result", pending.iter().map(|x| x.name()).collect::<Vec<_>>());
                    break;
                },
            }
        }

        debug!("Annotated {} variants in release {} of {} in {:.3} seconds", variants.len(), release.release(), release.database(), start.elapsed().as_secs_f64());
        annotations
    }

    // Fetches the genes once per variant and fills the selected gene-derived sections.
    fn fill_gene_sections(&self, variants: &[Variant], release: &ValidatedRelease, sections: &[Section], options: &FetchOptions, annotations: &mut [VariantAnnotation]) {
        let adaptor = match self.adaptors.genes() {
            Some(adaptor) => adaptor,
            None => {
                warn!("No gene source; skipping sections {:?}", sections.iter().map(|x| x.name()).collect::<Vec<_>>());
                return;
            },
        };
        if let Some(kind) = adaptor.data_kind() {
            if !release.has_data(kind) {
                warn!("Release {} of {} has no {} data; skipping gene-derived sections", release.release(), release.database(), kind);
                return;
            }
        }

        let results = match adaptor.fetch_batch(variants, release, options) {
            Ok(results) if results.len() == variants.len() => results,
            Ok(results) => {
                warn!("Gene source returned {} results for {} variants", results.len(), variants.len());
                return;
            },
            Err(error) => {
                warn!("Gene source failed: {}", error);
                return;
            },
        };

        for ((variant, annotation), partial) in variants.iter().zip(annotations.iter_mut()).zip(results) {
            let genes: Vec<Gene> = match partial {
                PartialResult::Genes(genes) => genes,
                PartialResult::Empty => Vec::new(),
                PartialResult::Failed => continue,
                other => {
                    warn!("Unexpected gene source result for {}: {:?}", variant, other);
                    continue;
                },
            };
            for section in sections {
                match section {
                    Section::ConsequenceType => match self.calculator.run(variant, &genes) {
                        Ok(consequences) => {
                            annotation.display_consequence_type = consequence::most_severe(&consequences);
                            annotation.consequence_types = Some(consequences);
                        },
                        Err(error) => warn!("Cannot compute consequence types for {}: {}", variant, error),
                    },
                    Section::Expression => {
                        annotation.gene_expression = Some(genes.iter().flat_map(|x| x.expression.iter().cloned()).collect());
                    },
                    Section::GeneDisease => {
                        annotation.gene_trait_association = Some(genes.iter().flat_map(|x| x.diseases.iter().cloned()).collect());
                    },
                    Section::DrugInteraction => {
                        annotation.gene_drug_interaction = Some(genes.iter().flat_map(|x| x.drugs.iter().cloned()).collect());
                    },
                    _ => {},
                }
            }
        }
    }
}

//-----------------------------------------------------------------------------

fn merge_result(section: Section, result: Result<Vec<PartialResult>, AnnotationError>, annotations: &mut [VariantAnnotation]) {
    match result {
        Ok(results) => merge_section(section, results, annotations),
        Err(error) => warn!("Section {} failed: {}", section, error),
    }
}

// Merges the results of a non-gene section into the annotations by index.
fn merge_section(section: Section, results: Vec<PartialResult>, annotations: &mut [VariantAnnotation]) {
    if results.len() != annotations.len() {
        warn!("Section {} returned {} results for {} variants; ignoring it", section, results.len(), annotations.len());
        return;
    }
    for (annotation, partial) in annotations.iter_mut().zip(results) {
        match (section, partial) {
            (_, PartialResult::Failed) => {},
            (Section::Conservation, PartialResult::Scores(scores)) => annotation.conservation = Some(scores),
            (Section::Conservation, PartialResult::Empty) => annotation.conservation = Some(Vec::new()),
            (Section::FunctionalScore, PartialResult::Scores(scores)) => annotation.functional_scores = Some(scores),
            (Section::FunctionalScore, PartialResult::Empty) => annotation.functional_scores = Some(Vec::new()),
            (Section::PopulationFrequencies, PartialResult::PopulationFrequencies { id, frequencies }) => {
                if annotation.id.is_none() {
                    annotation.id = id;
                }
                annotation.population_frequencies = Some(frequencies);
            },
            (Section::PopulationFrequencies, PartialResult::Empty) => annotation.population_frequencies = Some(Vec::new()),
            (Section::Clinical, PartialResult::Clinical(entries)) => annotation.trait_association = Some(entries),
            (Section::Clinical, PartialResult::Empty) => annotation.trait_association = Some(Vec::new()),
            (section, other) => {
                warn!("Unexpected result for section {} at {}:{}: {:?}", section, annotation.chromosome, annotation.start, other);
            },
        }
    }
}

//-----------------------------------------------------------------------------
