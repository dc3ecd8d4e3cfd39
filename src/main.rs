use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

use tunemark::audio_processor::decode::decode_file;
use tunemark::{Recognizer, Settings, SqliteIndex, server, tester};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(&["ingest", "match", "serve", "list", "delete", "clear", "random_test"]),
))]
struct Args {
    /// Ingest a file into the corpus
    #[arg(long)]
    ingest: bool,

    /// Match a snippet file against the corpus
    #[arg(long = "match", id = "match")]
    match_: bool,

    /// Serve the HTTP API
    #[arg(long)]
    serve: bool,

    /// List ingested recordings
    #[arg(long)]
    list: bool,

    /// Delete a recording by id
    #[arg(long, value_name = "ID")]
    delete: Option<i32>,

    /// Remove every recording and fingerprint
    #[arg(long)]
    clear: bool,

    /// Run a test with random snippets from the songs directory
    #[arg(long)]
    random_test: bool,

    /// Path to the audio file (or songs directory for --random-test)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Recording name for --ingest (defaults to the file name)
    #[arg(short, long)]
    name: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings = Settings::from_env();
    let config = settings.engine()?;
    let index = SqliteIndex::open(&settings.database_url)
        .with_context(|| format!("opening corpus at {}", settings.database_url))?;
    let recognizer = Recognizer::new(Arc::new(index), config).with_retry(settings.retry);

    if args.ingest {
        let file = required_file(&args.file, "--ingest")?;
        ingest_file(&recognizer, file, args.name.as_deref())
    } else if args.match_ {
        let file = required_file(&args.file, "--match")?;
        match_file(&recognizer, file)
    } else if args.serve {
        let addr: SocketAddr = settings
            .bind_addr
            .parse()
            .with_context(|| format!("invalid BIND_ADDR {}", settings.bind_addr))?;
        tokio::runtime::Runtime::new()?.block_on(server::serve(recognizer, addr))
    } else if args.list {
        for recording in recognizer.recordings()? {
            println!("{:>6}  {}", recording.id, recording.name);
        }
        Ok(())
    } else if let Some(id) = args.delete {
        if recognizer.delete_recording(id)? {
            println!("Deleted recording {id}");
            Ok(())
        } else {
            bail!("no recording with id {id}")
        }
    } else if args.clear {
        recognizer.clear()?;
        println!("Corpus cleared");
        Ok(())
    } else if args.random_test {
        let dir = required_file(&args.file, "--random-test")?;
        let summary = tester::run_random_snippet_test(&recognizer, dir)?;
        println!(
            "Correct Matches: {} / {}\nAccuracy: {:.2}%",
            summary.correct,
            summary.total,
            summary.accuracy()
        );
        Ok(())
    } else {
        bail!("no mode selected")
    }
}

fn required_file<'a>(file: &'a Option<PathBuf>, mode: &str) -> anyhow::Result<&'a Path> {
    match file {
        Some(path) => Ok(path),
        None => bail!("{mode} requires --file <path>"),
    }
}

/// Decode an audio file and store it under `name` or its file name.
fn ingest_file(recognizer: &Recognizer, file: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let song_name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown Song".to_string()),
    };

    let buffer = decode_file(file).with_context(|| format!("decoding {}", file.display()))?;
    let report = recognizer.ingest(&song_name, &buffer)?;

    println!(
        "Ingested '{}' as recording {} ({:.1}s, {} fingerprints)",
        report.name, report.recording_id, report.duration_secs, report.fingerprints
    );
    Ok(())
}

/// Decode a snippet file and try to match it against the corpus.
fn match_file(recognizer: &Recognizer, file: &Path) -> anyhow::Result<()> {
    let buffer = decode_file(file).with_context(|| format!("decoding {}", file.display()))?;
    let outcome = recognizer.identify(&buffer)?;

    match (&outcome.best, outcome.matched) {
        (Some(best), true) => println!(
            "Match: \"{}\" (id={}) confidence={:.1}% score={} offset={}ms",
            best.name, best.recording_id, outcome.confidence, best.score, best.offset_ms
        ),
        _ => println!("No match (confidence={:.1}%)", outcome.confidence),
    }

    if !outcome.candidates.is_empty() {
        println!("Top candidates:");
        for candidate in &outcome.candidates {
            println!(
                "  id={} title=\"{}\" score={} offset={}ms",
                candidate.recording_id, candidate.name, candidate.score, candidate.offset_ms
            );
        }
    }
    Ok(())
}
