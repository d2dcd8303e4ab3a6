//! `streamdex` command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Every record stored under a key
//! streamdex fetch prices.index prices.binpb AAPL0
//!
//! # Same, through the directory-backed object store (STREAMDEX_OBJECT_ROOT)
//! streamdex --remote fetch market/prices.index market/prices.binpb AAPL0
//!
//! # Write one frame per input line, then scan it back
//! streamdex write feed.bin --header "feed v1" --input lines.txt
//! streamdex scan feed.bin
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use streamdex::btree::{BTreeReader, decode_offset};
use streamdex::config::Config;
use streamdex::object_store::{DirectoryObjectStore, RemoteObject};
use streamdex::source::{CachedPageSource, FilePageSource, PageSource, RemotePageSource};
use streamdex::stream::{
    RawRecord, RemoteStreamReader, SealOutcome, StreamError, StreamReader, StreamWriter,
    seal_file, summarize,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(
    name = "streamdex",
    version,
    about = "Paged B+tree index and record stream tool"
)]
struct Cli {
    /// Resolve index and stream arguments as `bucket/key` object names
    #[arg(long, global = true)]
    remote: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every value stored under a key
    Lookup { index: String, key: String },
    /// Print a stream's header
    Header { stream: String },
    /// List every frame of a local stream, then its summary
    Scan { stream: PathBuf },
    /// Print the frame at a byte offset
    ReadAt { stream: String, offset: u64 },
    /// Look up a key and print the record at each stored offset
    Fetch {
        index: String,
        stream: String,
        key: String,
    },
    /// Write a local stream with one frame per input line
    Write {
        stream: PathBuf,
        /// Header text
        #[arg(long)]
        header: String,
        /// Input file (defaults to stdin)
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Leave the stream without a seal marker
        #[arg(long)]
        no_seal: bool,
    },
    /// Seal a local stream whose writer never sealed it
    Seal { stream: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "streamdex=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?config, remote = cli.remote, "Loaded configuration");

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &Config) -> CliResult {
    match &cli.command {
        Command::Lookup { index, key } => lookup(cli, config, index, key),
        Command::Header { stream } => {
            let stream = open_stream(cli, config, stream)?;
            println!("{}", display_bytes(stream.header().as_bytes()));
            println!("first frame at {}", stream.first_frame_offset());
            Ok(())
        }
        Command::Scan { stream } => {
            local_only(cli, "scan")?;
            scan(stream)
        }
        Command::ReadAt { stream, offset } => {
            let stream = open_stream(cli, config, stream)?;
            let payload = stream.read_at(*offset)?;
            println!("{}", display_bytes(payload.as_bytes()));
            Ok(())
        }
        Command::Fetch { index, stream, key } => fetch(cli, config, index, stream, key),
        Command::Write {
            stream,
            header,
            input,
            no_seal,
        } => {
            local_only(cli, "write")?;
            write(stream, header, input.as_deref(), *no_seal)
        }
        Command::Seal { stream } => {
            local_only(cli, "seal")?;
            match seal_file(stream)? {
                SealOutcome::AlreadySealed { frames } => {
                    println!("already sealed ({frames} frames)");
                }
                SealOutcome::Sealed {
                    frames,
                    seal_offset,
                } => println!("sealed {frames} frames at offset {seal_offset}"),
            }
            Ok(())
        }
    }
}

fn local_only(cli: &Cli, command: &str) -> CliResult {
    if cli.remote {
        return Err(format!("{command} works on local streams only").into());
    }
    Ok(())
}

fn lookup(cli: &Cli, config: &Config, index: &str, key: &str) -> CliResult {
    let mut tree = open_index(cli, config, index)?;
    let mut count = 0u64;
    for value in tree.search(key.as_bytes())? {
        let value = value?;
        match decode_offset(&value) {
            Ok(offset) => println!("{}\toffset {offset}", display_bytes(&value)),
            Err(_) => println!("{}", display_bytes(&value)),
        }
        count += 1;
    }
    tracing::info!(key, values = count, "Lookup complete");
    Ok(())
}

fn fetch(cli: &Cli, config: &Config, index: &str, stream: &str, key: &str) -> CliResult {
    let mut tree = open_index(cli, config, index)?;
    let stream = open_stream(cli, config, stream)?;
    let mut count = 0u64;
    for value in tree.search(key.as_bytes())? {
        let offset = decode_offset(&value?)?;
        let payload = stream.read_at(offset)?;
        println!("{offset}\t{}", display_bytes(payload.as_bytes()));
        count += 1;
    }
    tracing::info!(key, records = count, "Fetch complete");
    Ok(())
}

fn scan(path: &Path) -> CliResult {
    let mut reader = StreamReader::<RawRecord, RawRecord>::open(path)?;
    while let Some((offset, payload)) = reader.next_frame_with_offset()? {
        println!("{offset}\t{}", payload.as_bytes().len());
    }

    let summary = summarize(path)?;
    println!(
        "frames={} payload_bytes={} header_bytes={} end={} crc32={:08x}",
        summary.frames,
        summary.payload_bytes,
        summary.header_len,
        summary.end_offset,
        summary.crc32
    );
    Ok(())
}

fn write(path: &Path, header: &str, input: Option<&Path>, no_seal: bool) -> CliResult {
    let lines: Box<dyn BufRead> = match input {
        Some(input) => Box::new(BufReader::new(File::open(input)?)),
        None => Box::new(io::stdin().lock()),
    };

    let mut writer = StreamWriter::create(path, &RawRecord(header.as_bytes().to_vec()))?;
    for line in lines.lines() {
        let offset = writer.position();
        writer.write_frame(&RawRecord(line?.into_bytes()))?;
        println!("{offset}");
    }

    let frames = writer.frames_written();
    if no_seal {
        writer.into_unsealed()?;
    } else {
        writer.finish()?;
    }
    tracing::info!(path = %path.display(), frames, sealed = !no_seal, "Wrote stream");
    Ok(())
}

type IndexReader = BTreeReader<CachedPageSource<Box<dyn PageSource>>>;

fn open_index(
    cli: &Cli,
    config: &Config,
    name: &str,
) -> Result<IndexReader, Box<dyn std::error::Error>> {
    let source: Box<dyn PageSource> = if cli.remote {
        let store = DirectoryObjectStore::new(&config.object_root);
        let object = RemoteObject::from_path(store, name)?;
        Box::new(RemotePageSource::open(object)?)
    } else {
        Box::new(FilePageSource::open(Path::new(name))?)
    };
    let cached = CachedPageSource::new(source, config.page_cache_pages);
    Ok(BTreeReader::open_with_layout(cached, config.leaf_layout)?)
}

/// A record stream opened from a local file or from the object store.
enum StreamHandle {
    Local(StreamReader<RawRecord, RawRecord>),
    Remote(RemoteStreamReader<DirectoryObjectStore, RawRecord, RawRecord>),
}

impl StreamHandle {
    const fn header(&self) -> &RawRecord {
        match self {
            Self::Local(reader) => reader.header(),
            Self::Remote(reader) => reader.header(),
        }
    }

    const fn first_frame_offset(&self) -> u64 {
        match self {
            Self::Local(reader) => reader.first_frame_offset(),
            Self::Remote(reader) => reader.first_frame_offset(),
        }
    }

    fn read_at(&self, offset: u64) -> Result<RawRecord, StreamError> {
        match self {
            Self::Local(reader) => reader.read_at(offset),
            Self::Remote(reader) => reader.read_at(offset),
        }
    }
}

fn open_stream(
    cli: &Cli,
    config: &Config,
    name: &str,
) -> Result<StreamHandle, Box<dyn std::error::Error>> {
    if cli.remote {
        let store = DirectoryObjectStore::new(&config.object_root);
        let object = RemoteObject::from_path(store, name)?;
        Ok(StreamHandle::Remote(RemoteStreamReader::open(object)?))
    } else {
        Ok(StreamHandle::Local(StreamReader::open(Path::new(name))?))
    }
}

/// Printable form of a value or payload: the text itself if it is UTF-8,
/// otherwise hex.
fn display_bytes(bytes: &[u8]) -> String {
    std::str::from_utf8(bytes).map_or_else(
        |_| bytes.iter().map(|b| format!("{b:02x}")).collect(),
        str::to_string,
    )
}
