use anno_base::{AnnotationBase, Collection, DatabaseInfo, DataSource, ReleaseRegistry};
use anno_base::formats::{self, FastaReader};
use anno_base::utils;

use std::time::Instant;
use std::{env, fs, process};

use getopts::Options;
use log::info;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();
    init_logging();

    // Parse arguments.
    let config = Config::new()?;

    match &config.command {
        Command::Create { name, species, assembly } => create(&config, name, species, assembly)?,
        Command::Load { release, collection, filename } => load_documents(&config, *release, *collection, filename)?,
        Command::Genome { filename } => load_genome(&config, filename)?,
        Command::Release => {
            let (registry, name) = registry_for(&config)?;
            let release = registry.create_release(&name).map_err(|x| x.to_string())?;
            info!("Created release {} with data {:?}", release.release, release.data_kinds());
        },
        Command::Attach { release, data, sources } => {
            let (registry, name) = registry_for(&config)?;
            registry.attach_data(&name, *release, data, sources).map_err(|x| x.to_string())?;
            info!("Attached {} sources for {} to release {}", sources.len(), data, release);
        },
        Command::Activate { release } => {
            let (registry, name) = registry_for(&config)?;
            registry.activate_by_default(&name, *release).map_err(|x| x.to_string())?;
            info!("Release {} is now the default release of {}", release, name);
        },
        Command::List => list_releases(&config)?,
    }

    let seconds = start_time.elapsed().as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);

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

fn open_registry(config: &Config) -> Result<ReleaseRegistry, String> {
    if !AnnotationBase::exists(&config.db_file) {
        return Err(format!("Database {} does not exist", config.db_file));
    }
    Ok(ReleaseRegistry::new())
}

fn registry_for(config: &Config) -> Result<(ReleaseRegistry, String), String> {
    let mut registry = open_registry(config)?;
    let name = registry.add_database(&config.db_file).map_err(|x| x.to_string())?;
    Ok((registry, name))
}

fn create(config: &Config, name: &str, species: &str, assembly: &str) -> Result<(), String> {
    if AnnotationBase::exists(&config.db_file) {
        if config.overwrite {
            eprintln!("Overwriting database {}", config.db_file);
            fs::remove_file(&config.db_file).map_err(|x| x.to_string())?;
        } else {
            return Err(format!("Database {} already exists", config.db_file));
        }
    }
    let info = DatabaseInfo::new(name, species, assembly);
    AnnotationBase::create(&config.db_file, &info).map_err(|x| x.to_string())?;
    info!("Created database {} ({} {})", name, species, assembly);
    Ok(())
}

fn load_documents(config: &Config, release: usize, collection: Collection, filename: &str) -> Result<(), String> {
    let reader = utils::open_file(filename)?;
    let documents = formats::read_documents(reader).map_err(|x| x.to_string())?;
    info!("Read {} documents from {}", documents.len(), filename);
    let inserted = AnnotationBase::insert_documents(&config.db_file, collection, release, &documents).map_err(|x| x.to_string())?;
    info!("Inserted {} documents into collection {} of release {}", inserted, collection, release);
    Ok(())
}

fn load_genome(config: &Config, filename: &str) -> Result<(), String> {
    let reader = utils::open_file(filename)?;
    let mut total_chunks = 0;
    for record in FastaReader::new(reader) {
        let (chromosome, sequence) = record.map_err(|x| x.to_string())?;
        let chunks = AnnotationBase::insert_sequence(&config.db_file, &chromosome, &sequence).map_err(|x| x.to_string())?;
        info!("Chromosome {}: {} bp in {} chunks", chromosome, sequence.len(), chunks);
        total_chunks += chunks;
    }
    info!("Inserted {} sequence chunks", total_chunks);
    Ok(())
}

fn list_releases(config: &Config) -> Result<(), String> {
    let database = AnnotationBase::open(&config.db_file).map_err(|x| x.to_string())?;
    println!("Database {}: {} {}", database.name(), database.species(), database.assembly());
    if let Some(size) = database.file_size() {
        println!("File size: {}", size);
    }
    println!("Documents: {}, sequence chunks: {}", database.documents(), database.sequence_chunks());
    let releases = database.releases().map_err(|x| x.to_string())?;
    for release in releases.iter() {
        let default = if release.active_by_default { " (default)" } else { "" };
        println!("Release {}{}, created {}", release.release, default, release.date);
        for (data, sources) in release.collections.iter() {
            let sources: Vec<String> = sources.iter().map(|x| format!("{} {}", x.name, x.version)).collect();
            println!("  {}: {}", data, sources.join(", "));
        }
    }
    Ok(())
}

//-----------------------------------------------------------------------------

enum Command {
    Create { name: String, species: String, assembly: String },
    Load { release: usize, collection: Collection, filename: String },
    Genome { filename: String },
    Release,
    Attach { release: usize, data: String, sources: Vec<DataSource> },
    Activate { release: usize },
    List,
}

struct Config {
    db_file: String,
    command: Command,
    overwrite: bool,
}

impl Config {
    const COMMANDS: &'static str = "Commands:
    create annotations.db             create an empty database (requires --species and --assembly)
    load annotations.db RELEASE COLLECTION documents.jsonl[.gz]
                                      load JSON-lines documents into a collection
    genome annotations.db genome.fa[.gz]
                                      load the reference genome
    release annotations.db            create a new release from the latest one
    attach annotations.db RELEASE DATA NAME:VERSION [NAME:VERSION ...]
                                      attach data sources to a release
    activate annotations.db RELEASE   make the release the default release
    list annotations.db               list the releases
";

    fn new() -> Result<Config, String> {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("n", "name", "database name for create (default: <species>_<assembly>)", "STR");
        opts.optopt("s", "species", "species for create", "STR");
        opts.optopt("a", "assembly", "assembly for create", "STR");
        opts.optflag("", "overwrite", "overwrite the database file if it exists");
        let matches = opts.parse(&args[1..]).map_err(|x| x.to_string())?;

        let header = format!("Usage: {} [options] COMMAND annotations.db [args]", program);
        let usage = || format!("{}\n{}", opts.usage(&header), Self::COMMANDS);
        if matches.opt_present("h") {
            eprint!("{}", usage());
            process::exit(0);
        }
        if matches.free.len() < 2 {
            eprint!("{}", usage());
            process::exit(1);
        }
        let command_name = matches.free[0].as_str();
        let db_file = matches.free[1].clone();
        let args = &matches.free[2..];
        let expect_args = |count: usize| -> Result<(), String> {
            if args.len() < count {
                Err(format!("Command {} expects at least {} arguments after the database", command_name, count))
            } else {
                Ok(())
            }
        };
        let parse_release = |value: &str| -> Result<usize, String> {
            value.parse::<usize>().map_err(|x| format!("Invalid release {}: {}", value, x))
        };

        let command = match command_name {
            "create" => {
                let species = matches.opt_str("s").ok_or(String::from("Command create requires --species"))?;
                let assembly = matches.opt_str("a").ok_or(String::from("Command create requires --assembly"))?;
                let name = matches.opt_str("n").unwrap_or(format!("{}_{}", species, assembly).to_lowercase());
                Command::Create { name, species, assembly }
            },
            "load" => {
                expect_args(3)?;
                let release = parse_release(&args[0])?;
                let collection = args[1].parse::<Collection>()?;
                Command::Load { release, collection, filename: args[2].clone() }
            },
            "genome" => {
                expect_args(1)?;
                Command::Genome { filename: args[0].clone() }
            },
            "release" => Command::Release,
            "attach" => {
                expect_args(3)?;
                let release = parse_release(&args[0])?;
                let sources = args[2..].iter().map(|x| parse_source(x)).collect::<Result<Vec<_>, _>>()?;
                Command::Attach { release, data: args[1].clone(), sources }
            },
            "activate" => {
                expect_args(1)?;
                Command::Activate { release: parse_release(&args[0])? }
            },
            "list" => Command::List,
            _ => return Err(format!("Unknown command: {}\n{}", command_name, usage())),
        };

        Ok(Config {
            db_file,
            command,
            overwrite: matches.opt_present("overwrite"),
        })
    }
}

// Parses a data source of the form `name:version`.
fn parse_source(value: &str) -> Result<DataSource, String> {
    match value.split_once(':') {
        Some((name, version)) if !name.is_empty() && !version.is_empty() => Ok(DataSource::new(name, version)),
        _ => Err(format!("Invalid data source {}: expected NAME:VERSION", value)),
    }
}

//-----------------------------------------------------------------------------
