use anno_base::{AggregatorParams, AnnotationAggregator, AnnotationBase, AnnotatorSelection, CancellationToken, ReleaseRegistry, Region, StoreInterface, Variant};
use anno_base::chunk::Strand;
use anno_base::formats;
use anno_base::release::DEFAULT_RELEASE;
use anno_base::utils;

use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{env, process};

use getopts::Options;
use log::info;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();
    init_logging();

    // Parse arguments.
    let config = Config::new()?;

    // Reference sequence mode.
    if let Some(region) = config.region.as_ref() {
        write_sequence(&config.db_file, region, config.strand)?;
        report_time(start_time);
        return Ok(());
    }

    // Resolve the release once for all batches.
    let mut registry = ReleaseRegistry::new();
    let name = registry.add_database(&config.db_file).map_err(|x| x.to_string())?;
    let release = registry.resolve(&name, config.release).map_err(|x| x.to_string())?;
    info!("Using release {} of database {}", release.release(), name);
    let aggregator = AnnotationAggregator::new(Arc::new(registry), config.params.clone());

    let variants = config.variants()?;
    info!("Annotating {} variants in batches of {}", variants.len(), config.batch_size);

    let mut output = BufWriter::new(io::stdout().lock());
    for batch in variants.chunks(config.batch_size) {
        let cancel = match config.params.timeout {
            Some(timeout) => CancellationToken::with_timeout(timeout),
            None => CancellationToken::new(),
        };
        let annotations = aggregator.annotate(batch, &release, &config.selection, config.phased, &cancel);
        for annotation in annotations.iter() {
            formats::write_annotation(&mut output, annotation).map_err(|x| x.to_string())?;
        }
    }
    output.flush().map_err(|x| x.to_string())?;

    report_time(start_time);
    Ok(())
}

//-----------------------------------------------------------------------------

fn init_logging() {
    let mut builder = pretty_env_logger::formatted_builder();
    match env::var("RUST_LOG") {
        Ok(filters) => builder.parse_filters(&filters),
        Err(_) => builder.filter_level(log::LevelFilter::Info),
    };
    builder.init();
}

fn report_time(start_time: Instant) {
    let seconds = start_time.elapsed().as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);
}

// Writes the sequence of the region in FASTA format.
fn write_sequence(db_file: &str, region: &Region, strand: Strand) -> Result<(), String> {
    let database = AnnotationBase::open(db_file).map_err(|x| x.to_string())?;
    let mut interface = StoreInterface::new(&database).map_err(|x| x.to_string())?;
    let sequence = interface.sequence(region, strand).map_err(|x| x.to_string())?;
    if sequence.len() < region.len() {
        eprintln!("Warning: found {} of {} bases for region {}", sequence.len(), region.len(), region);
    }

    let mut output = BufWriter::new(io::stdout().lock());
    let mut write = || -> io::Result<()> {
        writeln!(output, ">{} {}", region, strand)?;
        for line in sequence.chunks(Config::FASTA_WIDTH) {
            output.write_all(line)?;
            output.write_all(b"\n")?;
        }
        output.flush()
    };
    write().map_err(|x| x.to_string())
}

//-----------------------------------------------------------------------------

struct Config {
    db_file: String,
    input: Option<String>,
    variant_list: Option<String>,
    release: usize,
    selection: AnnotatorSelection,
    phased: bool,
    batch_size: usize,
    params: AggregatorParams,
    region: Option<Region>,
    strand: Strand,
}

impl Config {
    const BATCH_SIZE: usize = 200;
    const FASTA_WIDTH: usize = 60;

    fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("r", "release", "data release (default: the default release)", "INT");
        opts.optopt("i", "include", "annotate only these sections (comma-separated)", "LIST");
        opts.optopt("e", "exclude", "do not annotate these sections (comma-separated)", "LIST");
        opts.optopt("v", "variants", "annotate these variants instead of reading a file (comma-separated chr:pos:ref:alt)", "LIST");
        opts.optflag("p", "phased", "filter multi-nucleotide clinical evidence by phase");
        opts.optopt("t", "timeout", "time limit for each batch", "SECONDS");
        opts.optopt("b", "batch-size", &format!("number of variants per batch (default: {})", Self::BATCH_SIZE), "INT");
        opts.optopt("f", "flank", &format!("gene flank length (default: {})", AggregatorParams::GENE_FLANK), "INT");
        opts.optflag("", "no-normalize", "do not normalize the variants");
        opts.optopt("", "region", "print the reference sequence of a region instead", "CHR:START-END");
        opts.optflag("", "reverse", "print the reverse strand of the region");
        let matches = opts.parse(&args[1..]).map_err(|x| x.to_string())?;

        let header = format!("Usage: {} [options] annotations.db [variants.vcf[.gz]]", program);
        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }
        let db_file = match matches.free.first() {
            Some(s) => s.clone(),
            None => {
                eprint!("{}", opts.usage(&header));
                process::exit(1);
            },
        };
        let input = matches.free.get(1).cloned();

        let release = match matches.opt_str("r") {
            Some(s) => s.parse::<usize>().map_err(|x| format!("--release: {}", x))?,
            None => DEFAULT_RELEASE,
        };
        let split = |value: Option<String>| -> Vec<String> {
            value.map(|x| x.split(',').map(|y| y.trim().to_string()).filter(|y| !y.is_empty()).collect()).unwrap_or_default()
        };
        let include = split(matches.opt_str("i"));
        let exclude = split(matches.opt_str("e"));
        let selection = AnnotatorSelection::from_lists(&include, &exclude).map_err(|x| x.to_string())?;

        let mut params = AggregatorParams::default();
        if let Some(s) = matches.opt_str("t") {
            let seconds = s.parse::<f64>().map_err(|x| format!("--timeout: {}", x))?;
            if !seconds.is_finite() || seconds <= 0.0 {
                return Err(format!("--timeout: invalid value {}", s));
            }
            params.timeout = Some(Duration::from_secs_f64(seconds));
        }
        if let Some(s) = matches.opt_str("f") {
            params.gene_flank = s.parse::<usize>().map_err(|x| format!("--flank: {}", x))?;
        }
        params.normalize = !matches.opt_present("no-normalize");

        let batch_size = match matches.opt_str("b") {
            Some(s) => s.parse::<usize>().map_err(|x| format!("--batch-size: {}", x))?,
            None => Self::BATCH_SIZE,
        };
        if batch_size == 0 {
            return Err(String::from("--batch-size: must be positive"));
        }

        let region = match matches.opt_str("region") {
            Some(s) => Some(s.parse::<Region>().map_err(|x| x.to_string())?),
            None => None,
        };
        let strand = if matches.opt_present("reverse") { Strand::Reverse } else { Strand::Forward };

        Ok(Config {
            db_file,
            input,
            variant_list: matches.opt_str("v"),
            release,
            selection,
            phased: matches.opt_present("p"),
            batch_size,
            params,
            region,
            strand,
        })
    }

    // Reads the variants from the command line, a file, or stdin.
    fn variants(&self) -> Result<Vec<Variant>, String> {
        if let Some(list) = self.variant_list.as_ref() {
            return Variant::parse_list(list).map_err(|x| x.to_string());
        }
        let result = match self.input.as_deref() {
            Some("-") | None => formats::read_variants(io::stdin().lock()),
            Some(filename) => formats::read_variants(utils::open_file(filename)?),
        };
        result.map_err(|x| x.to_string())
    }
}

//-----------------------------------------------------------------------------
