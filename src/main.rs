use clap::{Parser, Subcommand};
use qcarrier::archive::{pack_archive, unpack_archive, PackOptions};
use qcarrier::circuit::{InstructionStream, Vocabulary};
use qcarrier::embed::{embed_payload, vocabulary_for_basis, CodecOptions, GateSpec};
use qcarrier::recovery::recover_payload;
use qcarrier::DEFAULT_BLOCK_SIZE;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qcarrier", about = "Carry a payload on a marker channel of a circuit instruction stream")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack existing paths into a .tar.zst archive
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        /// Zstd compression level
        #[arg(short, long, default_value = "3")]
        level: i32,
        /// Candidate paths; missing ones are skipped
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Embed a file into an instruction stream (JSON)
    Encode {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Existing stream to append the marker channel to
        #[arg(short, long)]
        base: Option<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
        /// Name of the payload-carrying gate
        #[arg(long, default_value = "rz", conflicts_with = "basis")]
        marker: String,
        #[arg(long, default_value = "reset")]
        reset: String,
        /// Target gate set as NAME:PARAMS; its first one-parameter gate
        /// becomes the marker
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        basis: Vec<GateSpec>,
    },
    /// Recover the payload carried by an instruction stream (JSON)
    Decode {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
        #[arg(long, default_value = "rz")]
        marker: String,
        #[arg(long, default_value = "reset")]
        reset: String,
    },
    /// Unpack a .tar.zst archive
    Unpack {
        #[arg(short, long)]
        input: PathBuf,
        /// Destination; a fresh temporary directory when omitted
        #[arg(short = 'C', long)]
        output_dir: Option<PathBuf>,
    },
}

fn codec_options(block_size: usize, marker: String, reset: String) -> CodecOptions {
    CodecOptions {
        block_size,
        vocabulary: Vocabulary { marker, reset },
        ..CodecOptions::default()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, level, input } => {
            let opts = PackOptions { candidates: input, level };
            let bytes = pack_archive(&opts)?;
            if bytes.is_empty() {
                println!("No candidate paths exist; nothing packed");
                return Ok(());
            }
            std::fs::write(&output, &bytes)?;
            println!("Created: {} ({} bytes)", output.display(), bytes.len());
        }

        // ── Encode ───────────────────────────────────────────────────────────
        Commands::Encode { input, output, base, block_size, marker, reset, basis } => {
            let mut opts = codec_options(block_size, marker, reset);
            if !basis.is_empty() {
                opts.vocabulary = vocabulary_for_basis(&basis, &opts.vocabulary.reset)
                    .ok_or("basis has no one-parameter gate to carry markers")?;
                println!("Marker gate: {}", opts.vocabulary.marker);
            }
            let payload = std::fs::read(&input)?;
            let mut stream = match base {
                Some(path) => InstructionStream::from_bytes(&std::fs::read(path)?)?,
                None       => InstructionStream::default(),
            };
            let program = embed_payload(&payload, &opts)?;
            let channel = program.append_to(&mut stream, &opts.vocabulary);
            std::fs::write(&output, stream.to_bytes()?)?;
            println!("Embedded {} bytes as {} markers on {}",
                     payload.len(), program.marker_count(), channel);
        }

        // ── Decode ───────────────────────────────────────────────────────────
        Commands::Decode { input, output, block_size, marker, reset } => {
            let opts = codec_options(block_size, marker, reset);
            let stream = InstructionStream::from_bytes(&std::fs::read(&input)?)?;
            let payload = recover_payload(&stream, &opts)?;
            if payload.is_empty() {
                println!("No payload present");
                return Ok(());
            }
            std::fs::write(&output, &payload)?;
            println!("Recovered {} bytes → {}", payload.len(), output.display());
        }

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { input, output_dir } => {
            let bytes = std::fs::read(&input)?;
            match unpack_archive(&bytes, output_dir.as_deref()) {
                Ok(report) => println!("Unpacked {} entries to: {}",
                                       report.extracted, report.destination.display()),
                Err(e)     => eprintln!("Extraction failed: {e}"),
            }
        }
    }

    Ok(())
}
