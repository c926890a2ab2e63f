use super::*;

use crate::annotation::{Score, VariationRecord};

//-----------------------------------------------------------------------------

fn parse_vcf(line: &str) -> Vec<Variant> {
    let result = parse_vcf_line(line);
    assert!(result.is_ok(), "Failed to parse VCF line {}: {}", line, result.unwrap_err());
    result.unwrap()
}

fn sample(variant: &Variant) -> (Option<&str>, Option<&str>) {
    match variant.phase_sample() {
        Some(sample) => (sample.phase_set.as_deref(), sample.genotype.as_deref()),
        None => (None, None),
    }
}

//-----------------------------------------------------------------------------

#[test]
fn vcf_lines() {
    let variants = parse_vcf("X\t100653362\t.\tc\tT\t50\tPASS\tDP=10\tGT:DP:PS\t0|1:10:100653000");
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].to_string(), "X:100653362:C:T");
    assert_eq!(variants[0].id(), None, "Missing id should be absent");
    assert_eq!(sample(&variants[0]), (Some("100653000"), Some("0|1")));

    // No sample columns.
    let variants = parse_vcf("1\t1000\trs2\tAT\tA");
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].id(), Some("rs2"));
    assert!(variants[0].samples().is_empty(), "Found sample data without sample columns");

    // Missing phase set.
    let variants = parse_vcf("1\t1000\t.\tA\tG\t.\t.\t.\tPS:GT\t.:1/1");
    assert_eq!(sample(&variants[0]), (None, Some("1/1")));

    // No alternate alleles.
    assert!(parse_vcf("1\t1000\t.\tA\t.\t.\t.\t.").is_empty());
    let variants = parse_vcf("1\t1000\t.\tA\t*,G\t.\t.\t.\tGT\t1|2");
    assert_eq!(variants.len(), 1, "Spanning deletion should be skipped");
    assert_eq!(sample(&variants[0]), (None, Some("0|1")));

    assert!(parse_vcf_line("1\t1000\t.\tA").is_err(), "Parsed a line without alternate alleles");
    assert!(parse_vcf_line("1\tfirst\t.\tA\tG").is_err(), "Parsed an invalid position");
    assert!(parse_vcf_line("1\t0\t.\tA\tG").is_err(), "Parsed position 0");
    assert!(parse_vcf_line("1\t1000\t.\tAé\tG").is_err(), "Parsed a non-ASCII reference allele");
    assert!(parse_vcf_line("1\t1000\t.\tA\tG,Cö").is_err(), "Parsed a non-ASCII alternate allele");
}

#[test]
fn multiallelic_records() {
    let variants = parse_vcf("2\t500\trs3\tG\tA,C,T\t.\t.\t.\tGT:PS\t1/3:450");
    let alleles: Vec<&str> = variants.iter().map(|x| x.alternate()).collect();
    assert_eq!(alleles, vec!["A", "C", "T"]);
    let genotypes: Vec<Option<&str>> = variants.iter().map(|x| sample(x).1).collect();
    assert_eq!(genotypes, vec![Some("1/0"), Some("0/0"), Some("0/1")]);
    for variant in variants.iter() {
        assert_eq!(variant.start(), 500);
        assert_eq!(variant.id(), Some("rs3"));
        assert_eq!(sample(variant).0, Some("450"), "Phase set was not copied to {}", variant);
    }
}

#[test]
fn genotype_splitting() {
    assert_eq!(split_genotype("0|2", 1), "0|0");
    assert_eq!(split_genotype("0|2", 2), "0|1");
    assert_eq!(split_genotype("./2", 2), "./1");
    assert_eq!(split_genotype("1", 1), "1");
    assert_eq!(split_genotype("12|1", 12), "1|0");
}

#[test]
fn read_mixed_input() {
    let input = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\n1\t100\t.\tA\tT,G\n\n1:200:C:-\n  X:300:-:TT  \n";
    let result = read_variants(input.as_bytes());
    assert!(result.is_ok(), "Failed to read variants: {}", result.unwrap_err());
    let names: Vec<String> = result.unwrap().iter().map(|x| x.to_string()).collect();
    assert_eq!(names, vec!["1:100:A:T", "1:100:A:G", "1:200:C:-", "X:300:-:TT"]);

    let input = "1:100:A:T\n1:200\n";
    let error = read_variants(input.as_bytes()).unwrap_err().to_string();
    assert!(error.contains("Line 2"), "The error should include the line number: {}", error);

    assert!(read_variants("".as_bytes()).is_ok_and(|x| x.is_empty()));
}

//-----------------------------------------------------------------------------

#[test]
fn fasta_sequences() {
    let input = ">1 Homo sapiens chromosome 1\r\nGATTaca\r\nNNNN\r\n\n>2\n>MT description\nacgt\n";
    let result: Result<Vec<(String, Vec<u8>)>, StoreError> = FastaReader::new(input.as_bytes()).collect();
    assert!(result.is_ok(), "Failed to read FASTA: {}", result.unwrap_err());
    let result = result.unwrap();
    assert_eq!(result, vec![
        (String::from("1"), b"GATTACANNNN".to_vec()),
        (String::from("2"), Vec::new()),
        (String::from("MT"), b"ACGT".to_vec()),
    ]);

    assert_eq!(FastaReader::new("".as_bytes()).count(), 0, "Found sequences in an empty file");
    assert_eq!(FastaReader::new("\n\n".as_bytes()).count(), 0, "Found sequences in an empty file");

    let mut reader = FastaReader::new("GATTACA\n>1\nACGT\n".as_bytes());
    assert!(matches!(reader.next(), Some(Err(StoreError::InvalidValue { .. }))), "Accepted a sequence without a header");
}

//-----------------------------------------------------------------------------

#[test]
fn documents() {
    let variant = Variant::new("1", 11_500, "A", "T");
    let record = VariationRecord { id: Some(String::from("rs1")), population_frequencies: Vec::new() };
    let first = Document::variant(&variant, &record).unwrap();
    let second = Document::interval("1", 11_001, 13_000, &serde_json::json!({ "source": "phastCons", "values": [0.5] })).unwrap();
    let input = format!("{}\n\n{}\n", serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());

    let result = read_documents(input.as_bytes());
    assert!(result.is_ok(), "Failed to read documents: {}", result.unwrap_err());
    let result = result.unwrap();
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].reference.as_deref(), Some("A"));
    assert_eq!(result[0].parse_body::<VariationRecord>().unwrap(), record);
    assert_eq!((result[1].start, result[1].end), (11_001, 13_000));
    assert!(result[1].alternate.is_none());

    let input = "{\"chromosome\":\"1\",\"start\":1,\"end\":2,\"body\":{}}\n{\"chromosome\":\"1\"}\n";
    let error = read_documents(input.as_bytes()).unwrap_err().to_string();
    assert!(error.contains("line 2"), "The error should include the line number: {}", error);
}

#[test]
fn annotation_lines() {
    let mut annotation = VariantAnnotation::new(&Variant::new("1", 100, "A", "T"));
    annotation.conservation = Some(vec![Score::new("phylop", 1.5)]);
    let mut buffer: Vec<u8> = Vec::new();
    assert!(write_annotation(&mut buffer, &annotation).is_ok());
    assert!(write_annotation(&mut buffer, &annotation).is_ok());

    let text = String::from_utf8(buffer).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2, "Each annotation should be on its own line");
    let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(value["start"], 100);
    assert_eq!(value["conservation"][0]["source"], "phylop");
    assert!(value.get("functionalScores").is_none(), "Absent sections should be omitted");
}

//-----------------------------------------------------------------------------
