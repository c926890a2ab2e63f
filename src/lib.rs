//! # Anno-base: release-scoped variant annotation from SQLite databases.
//!
//! This crate annotates genomic variants with data from several sources and merges the results into one [`VariantAnnotation`] per variant.
//! The data is stored in SQLite databases, one per species and assembly, and every query is scoped to a data release.
//!
//! ### Storage
//!
//! An [`AnnotationBase`] stores documents in collections such as `gene` and `variation`.
//! Each document is indexed by the fixed-size genomic chunks it overlaps (see [`chunk`]), so region queries only touch the relevant rows.
//! Variant-keyed collections can also be queried by exact alleles.
//! The reference genome is stored as packed sequence chunks.
//! See [`StoreInterface`] for the queries.
//!
//! ### Releases
//!
//! Each document is tagged with the releases it belongs to.
//! A [`ReleaseRegistry`] caches the release metadata of each database and turns a requested release into a [`ValidatedRelease`].
//! Release [`release::DEFAULT_RELEASE`] refers to the release that is active by default.
//! Only the latest release can be modified, and only until it becomes the default.
//!
//! ### Annotation
//!
//! Each annotation section is backed by a [`adaptor::SourceAdaptor`].
//! The [`AnnotationAggregator`] fetches the requested sections concurrently and merges them by index.
//! The output has the same length and order as the input, and a failing source only leaves its own section absent.
//! Clinical evidence for multi-nucleotide variants can be filtered by phase with [`PhasedClinicalMatcher`].
//!
//! ### Binaries
//!
//! * `annoload`: Create a database, load documents and the reference genome, and manage releases.
//! * `annotate`: Annotate variants from a VCF file or a variant list, or print the reference sequence of a region.

pub mod adaptor;
pub mod aggregator;
pub mod annotation;
pub mod chunk;
pub mod consequence;
pub mod db;
pub mod error;
pub mod formats;
pub mod phase;
pub mod release;
pub mod utils;
pub mod variant;

pub use adaptor::{AdaptorRegistry, AnnotatorSelection, CancellationToken, Section, SourceAdaptor};
pub use aggregator::{AggregatorParams, AnnotationAggregator};
pub use annotation::{EvidenceEntry, Gene, VariantAnnotation};
pub use db::{AnnotationBase, Collection, DatabaseInfo, Document, StoreInterface};
pub use error::{AnnotationError, ReleaseError, StoreError};
pub use phase::PhasedClinicalMatcher;
pub use release::{DataRelease, DataSource, ReleaseRegistry, ValidatedRelease};
pub use variant::{Region, SampleData, Variant, VariantType};

#[cfg(test)]
pub(crate) mod internal;
