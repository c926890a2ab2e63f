//! Chunk index: fixed-size coordinate windows for range queries and sequence storage.
//!
//! A chromosome is partitioned into chunks of a collection-specific size.
//! Chunk `i` covers positions `i * size ..= i * size + size - 1`, except that chunk 0 starts at position 1 and therefore holds `size - 1` positions.
//! Stored records list every chunk they overlap in table `ChunkIds`, and a region query first selects candidates by chunk id before comparing the exact coordinates.
//!
//! Chunk ids have the form `<chromosome>_<index>_<size in kb>k`.
//! The format is part of the database schema.
//!
//! # Examples
//!
//! ```
//! use anno_base::chunk::{self, ChunkSize};
//! use anno_base::Region;
//!
//! let size = ChunkSize::new(50_000);
//! assert_eq!(chunk::chunk_id("17", 63_973_115, size), "17_1279_50k");
//!
//! let region = Region::new("17", 99_000, 151_000);
//! assert_eq!(chunk::chunk_range(&region, size), vec!["17_1_50k", "17_2_50k", "17_3_50k"]);
//! ```

use crate::error::AnnotationError;
use crate::utils;
use crate::variant::Region;

use std::fmt;
use std::str::FromStr;


//-----------------------------------------------------------------------------

/// Size of a chunk in base pairs.
///
/// The size is always positive.
/// It should be a multiple of 1000, as chunk ids only record the size in kilobases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkSize(usize);

impl ChunkSize {
    /// Creates a new chunk size.
    ///
    /// # Panics
    ///
    /// Panics if the size is zero.
    pub const fn new(size: usize) -> Self {
        if size == 0 {
            panic!("ChunkSize::new: chunk size must be positive");
        }
        ChunkSize(size)
    }

    /// Creates a new chunk size or returns an error if the size is zero.
    pub fn try_new(size: usize) -> Result<Self, AnnotationError> {
        if size == 0 {
            Err(AnnotationError::InvalidChunkSize(size))
        } else {
            Ok(ChunkSize(size))
        }
    }

    /// Returns the size in base pairs.
    #[inline]
    pub fn get(&self) -> usize {
        self.0
    }

    /// Returns the index of the chunk containing the given position.
    #[inline]
    pub fn index(&self, position: usize) -> usize {
        position / self.0
    }

    /// Returns the first position in the given chunk.
    #[inline]
    pub fn chunk_start(&self, index: usize) -> usize {
        if index == 0 { 1 } else { index * self.0 }
    }

    /// Returns the last position in the given chunk.
    #[inline]
    pub fn chunk_end(&self, index: usize) -> usize {
        index * self.0 + self.0 - 1
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}k", self.0 / 1000)
    }
}

/// Chunk size for genes.
pub const GENE_CHUNK_SIZE: ChunkSize = ChunkSize::new(50_000);

/// Chunk size for the reference genome sequence.
pub const SEQUENCE_CHUNK_SIZE: ChunkSize = ChunkSize::new(2_000);

/// Chunk size for conservation scores.
pub const CONSERVATION_CHUNK_SIZE: ChunkSize = ChunkSize::new(2_000);

/// Chunk size for functional scores.
pub const FUNCTIONAL_SCORE_CHUNK_SIZE: ChunkSize = ChunkSize::new(2_000);

/// Chunk size for variation and clinical variants.
pub const VARIANT_CHUNK_SIZE: ChunkSize = ChunkSize::new(1_000);

//-----------------------------------------------------------------------------

/// Returns the id of the chunk containing the given position.
pub fn chunk_id(chromosome: &str, position: usize, size: ChunkSize) -> String {
    format!("{}_{}_{}", chromosome, size.index(position), size)
}

/// Returns the ids of all chunks overlapping the region, in chunk order.
///
/// Returns an empty list if the region is empty.
pub fn chunk_range(region: &Region, size: ChunkSize) -> Vec<String> {
    if region.is_empty() {
        return Vec::new();
    }
    (size.index(region.start)..=size.index(region.end))
        .map(|index| format!("{}_{}_{}", region.chromosome, index, size))
        .collect()
}

//-----------------------------------------------------------------------------

/// Strand of a sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

impl FromStr for Strand {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" | "1" | "+1" => Ok(Strand::Forward),
            "-" | "-1" => Ok(Strand::Reverse),
            _ => Err(AnnotationError::Parse(format!("Invalid strand: {}", s))),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// A fixed-size slice of a chromosome sequence.
///
/// The last chunk of a chromosome may be shorter than the chunk size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceChunk {
    pub chromosome: String,
    pub index: usize,
    pub sequence: Vec<u8>,
}

/// Splits a chromosome sequence into chunks of the given size.
///
/// Concatenating the returned chunks reconstructs the sequence.
pub fn split_sequence(chromosome: &str, sequence: &[u8], size: ChunkSize) -> Vec<SequenceChunk> {
    let mut result = Vec::with_capacity(sequence.len() / size.get() + 1);
    let mut offset = 0;
    let mut index = 0;
    while offset < sequence.len() {
        // Offsets are 0-based, so the chunk ends at offset `chunk_end`, exclusive.
        let limit = size.chunk_end(index).min(sequence.len());
        if limit > offset {
            result.push(SequenceChunk {
                chromosome: chromosome.to_string(),
                index,
                sequence: sequence[offset..limit].to_vec(),
            });
        }
        offset = limit.max(offset);
        index += 1;
    }
    result
}

/// Extracts the sequence of the region from the chunks.
///
/// Chunks for other chromosomes are ignored, and the chunks may be given in any order.
/// The extracted sequence starts at `region.start` and covers the contiguous positions available in the chunks.
/// If the region extends past the last available chunk or a missing chunk, the sequence is truncated there.
/// If the chunk containing `region.start` is not available, the result is empty.
/// On the reverse strand, the extracted sequence is reverse-complemented.
pub fn assemble_sequence(chunks: &[SequenceChunk], region: &Region, strand: Strand, size: ChunkSize) -> Vec<u8> {
    let mut relevant: Vec<&SequenceChunk> = chunks.iter().filter(|chunk| chunk.chromosome == region.chromosome).collect();
    if relevant.is_empty() || region.is_empty() {
        return Vec::new();
    }
    relevant.sort_by_key(|chunk| chunk.index);
    relevant.dedup_by_key(|chunk| chunk.index);

    let mut result: Vec<u8> = Vec::with_capacity(region.len());
    let mut position = region.start;
    for chunk in relevant {
        let start = size.chunk_start(chunk.index);
        let limit = start + chunk.sequence.len();
        if limit <= position {
            continue;
        }
        if start > position {
            break;
        }
        let from = position - start;
        let to = (region.end + 1).min(limit) - start;
        result.extend_from_slice(&chunk.sequence[from..to]);
        position = start + to;
        if position > region.end {
            break;
        }
    }

    match strand {
        Strand::Forward => result,
        Strand::Reverse => utils::reverse_complement(&result),
    }
}

//-----------------------------------------------------------------------------
