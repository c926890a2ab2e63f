//! Support for reading and writing the file formats used by the binaries.
//!
//! ### Variants (reading)
//!
//! Variants can be read from VCF files or from variant lists with one `chromosome:position:reference:alternate` per line.
//! [`read_variants`] accepts both and detects the format line by line.
//! Header lines starting with `#` and empty lines are skipped.
//!
//! * [`is_header_line`]: Check if a line is a header or comment line.
//! * [`parse_vcf_line`]: Parse a VCF data line into one variant per alternate allele.
//! * [`parse_variant_line`]: Parse a variant list line.
//!
//! Only the genotype (`GT`) and phase set (`PS`) of the first sample are kept.
//! When a multi-allelic record is split, each genotype is rewritten relative to the alternate allele of the split variant.
//!
//! ### FASTA (reading)
//!
//! [`FastaReader`] iterates over the sequences of a FASTA file, one at a time.
//!
//! ### JSON lines (reading and writing)
//!
//! Documents for [`crate::AnnotationBase::insert_documents`] are read with [`read_documents`].
//! Annotations are written with [`write_annotation`], one JSON object per line.

use crate::annotation::VariantAnnotation;
use crate::db::Document;
use crate::error::{AnnotationError, StoreError};
use crate::variant::{SampleData, Variant};

use std::io::{self, BufRead, Write};

use log::warn;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Returns `true` if the line is a header or comment line.
///
/// # Examples
///
/// ```
/// use anno_base::formats;
///
/// assert!(formats::is_header_line("##fileformat=VCFv4.2"));
/// assert!(formats::is_header_line("#CHROM\tPOS\tID\tREF\tALT"));
/// assert!(!formats::is_header_line("1\t100\t.\tA\tT"));
/// ```
pub fn is_header_line(line: &str) -> bool {
    line.starts_with('#')
}

// Column numbers in VCF data lines.
const VCF_CHROM: usize = 0;
const VCF_POS: usize = 1;
const VCF_ID: usize = 2;
const VCF_REF: usize = 3;
const VCF_ALT: usize = 4;
const VCF_FORMAT: usize = 8;
const VCF_FIRST_SAMPLE: usize = 9;

/// Parses a VCF data line.
///
/// Returns one variant for each alternate allele.
/// Missing (`.`) and spanning deletion (`*`) alleles are skipped.
/// The variants are not normalized, as VCF alleles usually share a padding base.
///
/// # Errors
///
/// Returns [`AnnotationError::Parse`] if the line has fewer than five columns, the position is invalid, or an allele is not ASCII.
///
/// # Examples
///
/// ```
/// use anno_base::formats;
///
/// let variants = formats::parse_vcf_line("1\t100\trs5\tA\tT,AG\t.\t.\t.\tGT:PS\t1|2:90").unwrap();
/// assert_eq!(variants.len(), 2);
/// assert_eq!(variants[0].to_string(), "1:100:A:T");
/// assert_eq!(variants[0].id(), Some("rs5"));
/// assert_eq!(variants[1].phase_sample().unwrap().genotype.as_deref(), Some("0|1"));
/// assert_eq!(variants[1].normalize().to_string(), "1:101:-:G");
/// ```
pub fn parse_vcf_line(line: &str) -> Result<Vec<Variant>, AnnotationError> {
    let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    if fields.len() <= VCF_ALT {
        return Err(AnnotationError::Parse(format!("Expected at least 5 VCF columns, found {}", fields.len())));
    }
    let start = fields[VCF_POS].parse::<usize>().map_err(|x| {
        AnnotationError::Parse(format!("Invalid VCF position {}: {}", fields[VCF_POS], x))
    })?;
    if start == 0 {
        return Err(AnnotationError::Parse(String::from("Invalid VCF position 0")));
    }

    let id = match fields[VCF_ID] {
        "." | "" => None,
        id => Some(id),
    };
    Variant::check_allele(fields[VCF_REF])?;
    let (phase_set, genotype) = first_sample(&fields);

    let mut result = Vec::new();
    for (index, alternate) in fields[VCF_ALT].split(',').enumerate() {
        if alternate == "." || alternate == "*" {
            continue;
        }
        Variant::check_allele(alternate)?;
        let mut variant = Variant::new(fields[VCF_CHROM], start, fields[VCF_REF], alternate);
        if let Some(id) = id {
            variant = variant.with_id(id);
        }
        if phase_set.is_some() || genotype.is_some() {
            let genotype = genotype.map(|x| split_genotype(x, index + 1));
            variant = variant.with_sample(SampleData::new(phase_set, genotype.as_deref()));
        }
        result.push(variant);
    }

    Ok(result)
}

// Returns the phase set and the genotype of the first sample.
fn first_sample<'a>(fields: &[&'a str]) -> (Option<&'a str>, Option<&'a str>) {
    if fields.len() <= VCF_FIRST_SAMPLE {
        return (None, None);
    }
    let format: Vec<&str> = fields[VCF_FORMAT].split(':').collect();
    let sample: Vec<&str> = fields[VCF_FIRST_SAMPLE].split(':').collect();
    let value = |key: &str| -> Option<&'a str> {
        let index = format.iter().position(|x| *x == key)?;
        match sample.get(index) {
            Some(&".") | Some(&"") | None => None,
            Some(value) => Some(*value),
        }
    };
    (value("PS"), value("GT"))
}

// Rewrites the genotype for the alternate allele with the given index.
// That allele becomes `1` and the other alternate alleles become `0`.
fn split_genotype(genotype: &str, allele: usize) -> String {
    let mut result = String::with_capacity(genotype.len());
    let mut current = String::new();
    let flush = |current: &mut String, result: &mut String| {
        if !current.is_empty() {
            match current.parse::<usize>() {
                Ok(0) => result.push('0'),
                Ok(value) if value == allele => result.push('1'),
                Ok(_) => result.push('0'),
                Err(_) => result.push_str(current),
            }
            current.clear();
        }
    };
    for c in genotype.chars() {
        if c == '|' || c == '/' {
            flush(&mut current, &mut result);
            result.push(c);
        } else {
            current.push(c);
        }
    }
    flush(&mut current, &mut result);
    result
}

/// Parses a variant list line of the form `chromosome:position:reference:alternate`.
///
/// A deletion or an insertion can use `-` or an empty string for the empty allele.
pub fn parse_variant_line(line: &str) -> Result<Variant, AnnotationError> {
    line.trim().parse::<Variant>()
}

/// Reads variants from a VCF file or a variant list.
///
/// Tab-separated lines are parsed as VCF data lines and other lines as variant list lines.
///
/// # Errors
///
/// Returns an error if reading fails or a line cannot be parsed.
/// The message includes the line number.
pub fn read_variants<R: BufRead>(reader: R) -> Result<Vec<Variant>, AnnotationError> {
    let mut result = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(StoreError::from)?;
        if line.trim().is_empty() || is_header_line(&line) {
            continue;
        }
        let with_line = |error: AnnotationError| AnnotationError::Parse(format!("Line {}: {}", line_num + 1, error));
        if line.contains('\t') {
            let variants = parse_vcf_line(&line).map_err(with_line)?;
            if variants.is_empty() {
                warn!("Line {}: no alternate alleles", line_num + 1);
            }
            result.extend(variants);
        } else {
            result.push(parse_variant_line(&line).map_err(with_line)?);
        }
    }
    Ok(result)
}

//-----------------------------------------------------------------------------

/// An iterator over the sequences in a FASTA file.
///
/// Each item is a pair of a sequence name and the sequence.
/// The name is the part of the header line before the first whitespace.
///
/// # Examples
///
/// ```
/// use anno_base::formats::FastaReader;
///
/// let fasta = ">1 chromosome 1\nGATT\nACA\n>MT\nacgt\n";
/// let sequences: Vec<(String, Vec<u8>)> = FastaReader::new(fasta.as_bytes()).collect::<Result<_, _>>().unwrap();
/// assert_eq!(sequences.len(), 2);
/// assert_eq!(sequences[0], (String::from("1"), b"GATTACA".to_vec()));
/// assert_eq!(sequences[1].0, "MT");
/// ```
pub struct FastaReader<R: BufRead> {
    reader: R,
    next_name: Option<String>,
    line_num: usize,
    started: bool,
}

impl<R: BufRead> FastaReader<R> {
    /// Creates a new reader.
    pub fn new(reader: R) -> Self {
        FastaReader { reader, next_name: None, line_num: 0, started: false }
    }

    fn header_name(line: &str) -> String {
        line[1..].split_whitespace().next().unwrap_or("").to_string()
    }

    // Reads the next line without the line terminator, or returns `None` at the end of the file.
    fn read_line(&mut self, buffer: &mut String) -> io::Result<Option<()>> {
        buffer.clear();
        let len = self.reader.read_line(buffer)?;
        if len == 0 {
            return Ok(None);
        }
        self.line_num += 1;
        let trimmed = buffer.trim_end_matches(['\r', '\n']).len();
        buffer.truncate(trimmed);
        Ok(Some(()))
    }

    fn next_sequence(&mut self) -> Result<Option<(String, Vec<u8>)>, StoreError> {
        let mut buffer = String::new();
        if !self.started {
            self.started = true;
            while self.read_line(&mut buffer)?.is_some() {
                if buffer.starts_with('>') {
                    self.next_name = Some(Self::header_name(&buffer));
                    break;
                }
                if !buffer.trim().is_empty() {
                    return Err(StoreError::InvalidValue {
                        key: format!("FASTA line {}", self.line_num),
                        value: String::from("sequence before the first header"),
                    });
                }
            }
        }

        let name = match self.next_name.take() {
            Some(name) => name,
            None => return Ok(None),
        };
        let mut sequence = Vec::new();
        while self.read_line(&mut buffer)?.is_some() {
            if buffer.starts_with('>') {
                self.next_name = Some(Self::header_name(&buffer));
                break;
            }
            sequence.extend(buffer.trim().bytes().map(|x| x.to_ascii_uppercase()));
        }
        Ok(Some((name, sequence)))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<(String, Vec<u8>), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_sequence().transpose()
    }
}

//-----------------------------------------------------------------------------

/// Reads JSON-lines documents.
///
/// Each non-empty line must be a JSON object with fields `chromosome`, `start`, `end`, and `body`.
/// Variant-keyed documents also have `reference` and `alternate`.
///
/// # Errors
///
/// Returns an error if reading fails or a line is not a valid document.
pub fn read_documents<R: BufRead>(reader: R) -> Result<Vec<Document>, StoreError> {
    let mut result = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let document: Document = serde_json::from_str(&line).map_err(|x| StoreError::InvalidValue {
            key: format!("document on line {}", line_num + 1),
            value: x.to_string(),
        })?;
        result.push(document);
    }
    Ok(result)
}

/// Writes the annotation as a single line of JSON.
///
/// Absent sections are omitted.
pub fn write_annotation<W: Write>(writer: &mut W, annotation: &VariantAnnotation) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, annotation)?;
    writer.write_all(b"\n")
}

//-----------------------------------------------------------------------------
