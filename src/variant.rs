//! Variants, regions, and allele normalization.
//!
//! Alleles use the trimmed representation: common prefixes and suffixes are removed, and an empty allele stands for an insertion or a deletion.
//! The empty allele is written as `-` in text form.
//! Coordinates are 1-based and inclusive.
//! An insertion between positions `p - 1` and `p` has start `p` and end `p - 1`.

use crate::error::AnnotationError;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

//-----------------------------------------------------------------------------

/// Genotype information for a single sample.
///
/// Corresponds to the `PS` (phase set) and `GT` (genotype) fields of a VCF record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_set: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genotype: Option<String>,
}

impl SampleData {
    /// Creates new sample data from optional phase set and genotype strings.
    ///
    /// Missing values (`.`) are treated as absent.
    pub fn new(phase_set: Option<&str>, genotype: Option<&str>) -> Self {
        let present = |value: Option<&str>| value.filter(|x| !x.is_empty() && *x != ".").map(String::from);
        SampleData {
            phase_set: present(phase_set),
            genotype: present(genotype),
        }
    }
}

//-----------------------------------------------------------------------------

/// Shape of a variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariantType {
    Snv,
    Mnv,
    Insertion,
    Deletion,
    /// Both alleles non-empty with different lengths.
    Indel,
    /// Symbolic alleles, breakends, and the `*` allele.
    Symbolic,
}

/// A genomic variant with optional sample data.
///
/// The variant is immutable once constructed.
/// Alleles are stored in uppercase, and `-` is converted to the empty allele.
///
/// # Examples
///
/// ```
/// use anno_base::{Variant, VariantType};
///
/// let variant: Variant = "1:100:A:AT".parse().unwrap();
/// assert_eq!(variant.variant_type(), VariantType::Indel);
///
/// let normalized = variant.normalize();
/// assert_eq!(normalized.to_string(), "1:101:-:T");
/// assert_eq!(normalized.variant_type(), VariantType::Insertion);
/// assert_eq!(normalized.end(), 100);
/// assert_eq!(normalized.normalize(), normalized);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    chromosome: String,
    start: usize,
    reference: String,
    alternate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    samples: Vec<SampleData>,
}

/// Construction.
impl Variant {
    /// Creates a new variant without an identifier or sample data.
    pub fn new(chromosome: &str, start: usize, reference: &str, alternate: &str) -> Self {
        Variant {
            chromosome: chromosome.to_string(),
            start,
            reference: Self::canonical_allele(reference),
            alternate: Self::canonical_allele(alternate),
            id: None,
            samples: Vec::new(),
        }
    }

    /// Returns the variant with the given stable identifier.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Returns the variant with the given sample appended.
    pub fn with_sample(mut self, sample: SampleData) -> Self {
        self.samples.push(sample);
        self
    }

    /// Parses a comma-separated list of variants such as `1:100:C:T,1:101:T:C`.
    pub fn parse_list(list: &str) -> Result<Vec<Variant>, AnnotationError> {
        list.split(',').filter(|x| !x.trim().is_empty()).map(|x| x.trim().parse()).collect()
    }

    /// Checks that the allele can be stored in a variant.
    ///
    /// Alleles must be ASCII.
    pub fn check_allele(allele: &str) -> Result<(), AnnotationError> {
        if allele.is_ascii() {
            Ok(())
        } else {
            Err(AnnotationError::Parse(format!("Invalid allele {}: alleles must be ASCII", allele)))
        }
    }

    fn canonical_allele(allele: &str) -> String {
        if allele == "-" {
            String::new()
        } else {
            allele.to_ascii_uppercase()
        }
    }
}

/// Accessors.
impl Variant {
    #[inline]
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Returns the last reference position covered by the variant.
    ///
    /// For insertions, this is `start - 1`.
    pub fn end(&self) -> usize {
        (self.start + self.reference.len()).saturating_sub(1)
    }

    #[inline]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    #[inline]
    pub fn alternate(&self) -> &str {
        &self.alternate
    }

    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[inline]
    pub fn samples(&self) -> &[SampleData] {
        &self.samples
    }

    /// Returns the sample data used for phasing, which is the first sample.
    pub fn phase_sample(&self) -> Option<&SampleData> {
        self.samples.first()
    }

    /// Returns the closed interval between the smallest and the largest coordinate of the variant.
    ///
    /// For an insertion, the interval covers the flanking bases.
    pub fn span(&self) -> (usize, usize) {
        let end = self.end();
        (self.start.min(end).max(1), self.start.max(end))
    }

    /// Returns `true` if the variants have the same coordinates and alleles.
    pub fn same_alleles(&self, other: &Variant) -> bool {
        self.chromosome == other.chromosome && self.start == other.start &&
            self.reference == other.reference && self.alternate == other.alternate
    }

    /// Returns the shape of the variant.
    pub fn variant_type(&self) -> VariantType {
        if Self::is_symbolic(&self.reference) || Self::is_symbolic(&self.alternate) {
            return VariantType::Symbolic;
        }
        match (self.reference.len(), self.alternate.len()) {
            (1, 1) => VariantType::Snv,
            (0, _) => VariantType::Insertion,
            (_, 0) => VariantType::Deletion,
            (r, a) if r == a => VariantType::Mnv,
            _ => VariantType::Indel,
        }
    }

    fn is_symbolic(allele: &str) -> bool {
        allele == "*" || allele.contains(['<', '>', '[', ']', '.'])
    }
}

//-----------------------------------------------------------------------------

/// Normalization.
impl Variant {
    /// Returns the normalized version of the variant.
    ///
    /// The common suffix of the alleles is trimmed first, followed by the common prefix.
    /// The start position is shifted by the length of the trimmed prefix.
    /// Symbolic variants, variants with identical alleles, and variants with non-ASCII alleles are returned unchanged.
    /// The operation is idempotent.
    pub fn normalize(&self) -> Variant {
        if self.variant_type() == VariantType::Symbolic || self.reference == self.alternate {
            return self.clone();
        }
        if !self.reference.is_ascii() || !self.alternate.is_ascii() {
            return self.clone();
        }

        let reference = self.reference.as_bytes();
        let alternate = self.alternate.as_bytes();
        let mut suffix = 0;
        while suffix < reference.len() && suffix < alternate.len() &&
            reference[reference.len() - 1 - suffix] == alternate[alternate.len() - 1 - suffix] {
            suffix += 1;
        }
        let reference = &reference[..reference.len() - suffix];
        let alternate = &alternate[..alternate.len() - suffix];

        let mut prefix = 0;
        while prefix < reference.len() && prefix < alternate.len() && reference[prefix] == alternate[prefix] {
            prefix += 1;
        }

        // ASCII alleles can be sliced at any byte.
        Variant {
            chromosome: self.chromosome.clone(),
            start: self.start + prefix,
            reference: self.reference[prefix..reference.len()].to_string(),
            alternate: self.alternate[prefix..alternate.len()].to_string(),
            id: self.id.clone(),
            samples: self.samples.clone(),
        }
    }
}

//-----------------------------------------------------------------------------

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let allele = |x: &str| if x.is_empty() { String::from("-") } else { x.to_string() };
        write!(f, "{}:{}:{}:{}", self.chromosome, self.start, allele(&self.reference), allele(&self.alternate))
    }
}

impl FromStr for Variant {
    type Err = AnnotationError;

    /// Parses a variant of the form `chromosome:position:reference:alternate`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim().split(':').collect();
        if fields.len() != 4 || fields[0].is_empty() {
            return Err(AnnotationError::Parse(format!("Invalid variant {}: expected chromosome:position:reference:alternate", s)));
        }
        let start = fields[1].parse::<usize>().map_err(|x| AnnotationError::Parse(format!("Invalid position in variant {}: {}", s, x)))?;
        if start == 0 {
            return Err(AnnotationError::Parse(format!("Invalid variant {}: positions are 1-based", s)));
        }
        Variant::check_allele(fields[2])?;
        Variant::check_allele(fields[3])?;
        Ok(Variant::new(fields[0], start, fields[2], fields[3]))
    }
}

//-----------------------------------------------------------------------------

/// A genomic region with 1-based inclusive coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub chromosome: String,
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn new(chromosome: &str, start: usize, end: usize) -> Self {
        Region { chromosome: chromosome.to_string(), start, end }
    }

    /// Returns the span of the variant extended by `flank` bases on both sides.
    ///
    /// The start is clamped to position 1.
    pub fn from_variant(variant: &Variant, flank: usize) -> Self {
        let (start, end) = variant.span();
        Region {
            chromosome: variant.chromosome().to_string(),
            start: start.saturating_sub(flank).max(1),
            end: end + flank,
        }
    }

    /// Returns `true` if the region overlaps the closed interval `[start, end]`.
    #[inline]
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        start <= self.end && end >= self.start
    }

    /// Returns the length of the region.
    #[inline]
    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

impl FromStr for Region {
    type Err = AnnotationError;

    /// Parses a region of the form `chromosome:start-end` or `chromosome:position`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AnnotationError::Parse(format!("Invalid region {}: expected chromosome:start-end", s));
        let (chromosome, interval) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let (start, end) = match interval.split_once('-') {
            Some((start, end)) => (start, end),
            None => (interval, interval),
        };
        let start = start.replace(',', "").parse::<usize>().map_err(|_| invalid())?;
        let end = end.replace(',', "").parse::<usize>().map_err(|_| invalid())?;
        if chromosome.is_empty() || start == 0 || end < start {
            return Err(invalid());
        }
        Ok(Region::new(chromosome, start, end))
    }
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
