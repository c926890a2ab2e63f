//! Utility functions for files and DNA sequences.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

//-----------------------------------------------------------------------------

// Files.

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Returns a human-readable representation of a size in bytes, such as `1.500 KiB`.
pub fn human_readable_size(bytes: usize) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.3} {}", value, UNITS[unit])
}

/// Returns the human-readable size of the file, or [`None`] if the file cannot be accessed.
pub fn file_size<P: AsRef<Path>>(filename: P) -> Option<String> {
    fs::metadata(filename).ok().map(|metadata| human_readable_size(metadata.len() as usize))
}

pub fn file_exists<P: AsRef<Path>>(filename: P) -> bool {
    filename.as_ref().exists()
}

/// Opens the file for buffered reading.
///
/// Gzip-compressed files are detected from the first bytes and decompressed transparently.
/// Variant lists, VCF files, FASTA genomes, and JSON-lines documents can all be read this way.
pub fn open_file<P: AsRef<Path>>(filename: P) -> Result<Box<dyn BufRead>, String> {
    let filename = filename.as_ref();
    let file = File::open(filename).map_err(|x| format!("Cannot open {}: {}", filename.display(), x))?;
    let mut reader = BufReader::new(file);
    let compressed = reader.fill_buf()
        .map_err(|x| format!("Cannot read {}: {}", filename.display(), x))?
        .starts_with(&GZIP_MAGIC);
    if compressed {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

//-----------------------------------------------------------------------------

// Packed sequences.
//
// Each byte stores three bases in base 6, with the first base as the least significant digit.
// Digit 0 marks the end of the sequence, so the last byte always contains it.

const PACKED_BASES: [u8; 5] = [b'A', b'C', b'G', b'T', b'N'];

#[inline]
fn base_digit(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => 1,
        b'C' => 2,
        b'G' => 3,
        b'T' => 4,
        _ => 5,
    }
}

/// Packs a DNA sequence into bytes, three bases per byte.
///
/// Lowercase bases become uppercase, and other symbols become `N`.
/// See [`unpack_sequence`] for the inverse.
///
/// # Examples
///
/// ```
/// use anno_base::utils;
///
/// let packed = utils::pack_sequence(b"GATtacaX");
/// assert_eq!(packed.len(), 3);
/// assert_eq!(utils::unpack_sequence(&packed), b"GATTACAN");
/// ```
pub fn pack_sequence(sequence: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(sequence.len() / 3 + 1);
    let mut chunks = sequence.chunks_exact(3);
    for chunk in chunks.by_ref() {
        result.push(base_digit(chunk[0]) + 6 * base_digit(chunk[1]) + 36 * base_digit(chunk[2]));
    }
    let last = chunks.remainder().iter().rev().fold(0, |acc, &base| 6 * acc + base_digit(base));
    result.push(last);
    result
}

/// Unpacks a sequence packed with [`pack_sequence`].
pub fn unpack_sequence(packed: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(3 * packed.len());
    for &byte in packed {
        let mut value = byte;
        for _ in 0..3 {
            let digit = value % 6;
            if digit == 0 {
                return result;
            }
            result.push(PACKED_BASES[(digit - 1) as usize]);
            value /= 6;
        }
    }
    result
}

//-----------------------------------------------------------------------------

// Strands.

/// Returns the complement of a nucleotide, preserving case.
///
/// Symbols other than `acgtACGT` become `N`.
#[inline]
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T', b'C' => b'G', b'G' => b'C', b'T' => b'A',
        b'a' => b't', b'c' => b'g', b'g' => b'c', b't' => b'a',
        _ => b'N',
    }
}

/// Returns the reverse complement of a DNA sequence.
pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence.iter().rev().map(|&base| complement(base)).collect()
}

//-----------------------------------------------------------------------------
