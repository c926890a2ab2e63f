//! Phase-aware attribution of multi-nucleotide clinical evidence.
//!
//! A clinical evidence entry may describe a multi-nucleotide variant (MNV) consisting of several adjacent changes.
//! Such an entry is attributed to a queried variant only if every variant of the MNV was queried in the same batch and none of them is known to be on a different chromosome copy than the queried variant.
//!
//! Phase information comes from the first sample of each variant:
//!
//! * Missing phase set on either side: co-occurrence is possible.
//! * Different phase sets: co-occurrence is possible.
//! * Same phase set and a genotype without an alternate allele (e.g. `0|0` or `0`) on either side: ruled out.
//! * Same phase set and a missing or unphased genotype on either side: co-occurrence is possible.
//! * Same phase set and phased genotypes: the alternate alleles must be on the same haplotype.
//!   A haploid genotype may match either haplotype of a diploid genotype.
//!
//! Genotypes with more than two alleles or allele indexes above 1 are logged and treated as possibly co-occurring.

use crate::annotation::EvidenceEntry;
use crate::variant::{SampleData, Variant};

use std::collections::HashMap;
use std::str::FromStr;

use log::{debug, warn};


//-----------------------------------------------------------------------------

/// An allele in a genotype.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allele {
    Reference,
    Alternate(usize),
    Missing,
}

/// A parsed genotype string such as `0|1`, `1/0`, or `1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Genotype {
    pub alleles: Vec<Allele>,
    /// `true` unless the alleles are separated by `/`.
    pub phased: bool,
}

impl Genotype {
    /// Returns `true` if any allele may be an alternate allele.
    pub fn has_alternate(&self) -> bool {
        self.alleles.iter().any(|x| *x != Allele::Reference)
    }

    /// Returns `true` if the genotype is beyond diploid biallelic notation.
    pub fn is_complex(&self) -> bool {
        self.alleles.len() > 2 || self.alleles.iter().any(|x| matches!(x, Allele::Alternate(n) if *n > 1))
    }
}

impl FromStr for Genotype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let phased = !s.contains('/');
        let alleles = s.split(['|', '/']).map(|allele| match allele {
            "." => Ok(Allele::Missing),
            "0" => Ok(Allele::Reference),
            _ => allele.parse::<usize>().map(Allele::Alternate).map_err(|_| format!("Invalid genotype: {}", s)),
        }).collect::<Result<Vec<Allele>, String>>()?;
        Ok(Genotype { alleles, phased })
    }
}

// Both alleles are alternate, and they are the same allele or one of them is missing.
fn alternate_match(first: Allele, second: Allele) -> bool {
    match (first, second) {
        (Allele::Reference, _) | (_, Allele::Reference) => false,
        (Allele::Missing, _) | (_, Allele::Missing) => true,
        (Allele::Alternate(x), Allele::Alternate(y)) => x == y,
    }
}

fn parse_genotype(sample: &SampleData) -> Option<Genotype> {
    let genotype = sample.genotype.as_deref()?;
    match genotype.parse::<Genotype>() {
        Ok(parsed) => Some(parsed),
        Err(message) => {
            warn!("{}; treating the genotype as missing", message);
            None
        },
    }
}

/// Returns `true` if the alternate alleles of the two variants may be on the same chromosome copy.
///
/// The arguments are the samples used for phasing.
/// See the module documentation for the rules.
///
/// # Examples
///
/// ```
/// use anno_base::phase;
/// use anno_base::SampleData;
///
/// let first = SampleData::new(Some("100"), Some("1|0"));
/// let same_copy = SampleData::new(Some("100"), Some("1|0"));
/// let other_copy = SampleData::new(Some("100"), Some("0|1"));
/// let unknown = SampleData::default();
/// assert!(phase::potentially_in_phase(Some(&first), Some(&same_copy)));
/// assert!(!phase::potentially_in_phase(Some(&first), Some(&other_copy)));
/// assert!(phase::potentially_in_phase(Some(&first), Some(&unknown)));
/// ```
pub fn potentially_in_phase(first: Option<&SampleData>, second: Option<&SampleData>) -> bool {
    let (first, second) = match (first, second) {
        (Some(first), Some(second)) => (first, second),
        _ => return true,
    };
    match (&first.phase_set, &second.phase_set) {
        (Some(x), Some(y)) if x == y => {},
        _ => return true,
    }

    let first = parse_genotype(first);
    let second = parse_genotype(second);
    let no_alternate = |genotype: &Option<Genotype>| genotype.as_ref().is_some_and(|x| !x.has_alternate());
    if no_alternate(&first) || no_alternate(&second) {
        return false;
    }

    let (first, second) = match (first, second) {
        (Some(first), Some(second)) if first.phased && second.phased => (first, second),
        _ => return true,
    };
    if first.is_complex() || second.is_complex() {
        warn!("Cannot compare genotypes {:?} and {:?}; assuming possible co-occurrence", first.alleles, second.alleles);
        return true;
    }

    match (first.alleles.as_slice(), second.alleles.as_slice()) {
        ([a], [b]) => alternate_match(*a, *b),
        ([a], [b0, b1]) | ([b0, b1], [a]) => alternate_match(*a, *b0) || alternate_match(*a, *b1),
        ([a0, a1], [b0, b1]) => alternate_match(*a0, *b0) || alternate_match(*a1, *b1),
        _ => true,
    }
}

//-----------------------------------------------------------------------------

/// Queried variants on the same chromosome sharing a phase set.
///
/// Genotypes are only compared within a group.
/// Variants without a phase set form groups of their own with `phase_set` set to [`None`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseGroup {
    pub phase_set: Option<String>,
    /// Indexes of the members in the batch, in batch order.
    pub members: Vec<usize>,
}

/// Partitions the batch into phase groups.
///
/// Groups are in the order of their first members.
pub fn phase_groups(variants: &[Variant]) -> Vec<PhaseGroup> {
    let mut result: Vec<PhaseGroup> = Vec::new();
    let mut by_phase_set: HashMap<(&str, &str), usize> = HashMap::new();
    for (i, variant) in variants.iter().enumerate() {
        let phase_set = variant.phase_sample().and_then(|x| x.phase_set.as_deref());
        if let Some(phase_set) = phase_set {
            let key = (variant.chromosome(), phase_set);
            if let Some(&group) = by_phase_set.get(&key) {
                result[group].members.push(i);
                continue;
            }
            by_phase_set.insert(key, result.len());
        }
        result.push(PhaseGroup { phase_set: phase_set.map(String::from), members: vec![i] });
    }
    result
}

//-----------------------------------------------------------------------------

/// Decides which multi-nucleotide evidence entries apply to which queried variants.
///
/// The matcher is built for a single batch of normalized variants.
///
/// # Examples
///
/// ```
/// use anno_base::{EvidenceEntry, PhasedClinicalMatcher, SampleData, Variant};
///
/// let variants = vec![
///     Variant::new("X", 100653362, "C", "T").with_sample(SampleData::new(Some("100"), Some("1"))),
///     Variant::new("X", 100653363, "T", "C").with_sample(SampleData::new(Some("100"), Some("0|1"))),
/// ];
/// let mnv = EvidenceEntry {
///     id: String::from("RCV1"),
///     source: String::from("clinvar"),
///     traits: Vec::new(),
///     clinical_significance: None,
///     haplotype: Some(String::from("X:100653362:C:T,X:100653363:T:C")),
/// };
///
/// let matcher = PhasedClinicalMatcher::new(&variants);
/// let filtered = matcher.filter_batch(vec![vec![mnv.clone()], vec![mnv.clone()]]);
/// assert_eq!(filtered, vec![vec![mnv.clone()], vec![mnv.clone()]]);
///
/// // The other half of the MNV was not queried.
/// let matcher = PhasedClinicalMatcher::new(&variants[..1]);
/// assert!(matcher.filter(0, vec![mnv]).is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct PhasedClinicalMatcher<'a> {
    variants: &'a [Variant],
    // Normalized variant to its first index in the batch.
    index: HashMap<String, usize>,
    groups: Vec<PhaseGroup>,
    // Group of each variant in the batch.
    group_of: Vec<usize>,
}

impl<'a> PhasedClinicalMatcher<'a> {
    /// Creates a matcher for the batch.
    pub fn new(variants: &'a [Variant]) -> Self {
        let mut index = HashMap::with_capacity(variants.len());
        for (i, variant) in variants.iter().enumerate() {
            index.entry(variant.normalize().to_string()).or_insert(i);
        }
        let groups = phase_groups(variants);
        let mut group_of = vec![0; variants.len()];
        for (id, group) in groups.iter().enumerate() {
            for &member in group.members.iter() {
                group_of[member] = id;
            }
        }
        debug!("Phased matching over {} variants in {} phase groups", variants.len(), groups.len());
        PhasedClinicalMatcher { variants, index, groups, group_of }
    }

    /// Returns the phase groups of the batch.
    pub fn groups(&self) -> &[PhaseGroup] {
        &self.groups
    }

    /// Returns the entries that apply to the variant at the given index in the batch.
    ///
    /// Single-variant entries are always kept.
    /// Multi-nucleotide entries are kept if [`PhasedClinicalMatcher::same_haplotype`] holds.
    pub fn filter(&self, query: usize, entries: Vec<EvidenceEntry>) -> Vec<EvidenceEntry> {
        entries.into_iter().filter(|entry| {
            let haplotype = match entry.haplotype.as_deref() {
                Some(haplotype) if entry.is_haplotype() => haplotype,
                _ => return true,
            };
            match Variant::parse_list(haplotype) {
                Ok(members) => self.same_haplotype(query, &members),
                Err(error) => {
                    warn!("Evidence entry {}: invalid haplotype {}: {}", entry.id, haplotype, error);
                    false
                },
            }
        }).collect()
    }

    /// Applies [`PhasedClinicalMatcher::filter`] to the entries of each variant in the batch.
    ///
    /// `evidence[i]` contains the entries for variant `i`.
    pub fn filter_batch(&self, evidence: Vec<Vec<EvidenceEntry>>) -> Vec<Vec<EvidenceEntry>> {
        evidence.into_iter().enumerate().map(|(i, entries)| self.filter(i, entries)).collect()
    }

    /// Returns `true` if every member of the haplotype was queried in the batch and may be on the same chromosome copy as the query.
    ///
    /// Batch variants and haplotype members are compared in normalized form.
    /// Members outside the phase group of the query may always co-occur with it.
    pub fn same_haplotype(&self, query: usize, haplotype: &[Variant]) -> bool {
        let variant = match self.variants.get(query) {
            Some(variant) => variant,
            None => return false,
        };
        haplotype.iter().all(|member| {
            match self.index.get(&member.normalize().to_string()) {
                Some(&other) if self.group_of[other] == self.group_of[query] => {
                    potentially_in_phase(variant.phase_sample(), self.variants[other].phase_sample())
                },
                Some(_) => true,
                None => false,
            }
        })
    }
}

//-----------------------------------------------------------------------------
