use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Write as _;
use std::path::Path;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arm7tdmi_decode::{DecodeStats, DecodeTable, Decoded, Engine, EngineConfig, Width};
use arm7tdmi_disasm::model::{load_raw_bin, Image};

#[derive(Parser, Debug)]
#[command(author, version, about = "ARM7TDMI (ARM/THUMB) disassembler CLI", long_about = None)]
struct Cli {
    /// Load address for the binary in target address space
    #[arg(long, default_value = "0x08000000", value_parser = parse_u32)]
    base: u32,
    /// Skip N bytes at start of file before loading
    #[arg(long, default_value_t = 0usize)]
    skip: usize,
    /// Input binary path
    #[arg(value_name = "BINFILE")]
    input: String,
    /// Limit bytes loaded (default: to EOF after --skip)
    #[arg(long)]
    len: Option<usize>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List loaded segments (single segment for a raw ROM dump)
    Sections,
    /// Disassemble a range [start, end) in bytes
    Range {
        /// Start address (hex or dec)
        start: String,
        /// End address (hex or dec, exclusive)
        end: String,
        /// Decode 16-bit THUMB halfwords instead of ARM words
        #[arg(long)]
        thumb: bool,
        /// Show instruction bytes
        #[arg(long)]
        show_bytes: bool,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<String>,
    },
    /// Decode every ARM and THUMB slot of the image
    Dump {
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Only list slots that decoded to a known operation (text format only)
        #[arg(long)]
        known: bool,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, serde::Serialize)]
struct DumpReport<'a> {
    config: EngineConfig,
    stats: DecodeStats,
    table: &'a DecodeTable,
}

fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}

/// One listing line: address, optional raw bytes, mnemonic.
fn listing_line(d: &Decoded, show_bytes: bool) -> String {
    let mut line = format!("{:#010x}: ", d.addr);
    if show_bytes {
        let n = d.width.stride() as usize;
        for b in &d.raw.to_le_bytes()[..n] {
            let _ = write!(line, "{b:02x} ");
        }
        // pad halfwords so both widths line up
        line.push_str(&"   ".repeat(4 - n));
        line.push_str("  ");
    }
    line.push_str(&d.mnemonic);
    line
}

fn decode(engine: &mut Engine<Image>, width: Width, slot: usize) {
    let res = match width {
        Width::W32 => engine.decode_word_instruction(slot),
        Width::W16 => engine.decode_halfword_instruction(slot),
    };
    if let Err(e) = res {
        warn!(slot, ?width, "{e}");
    }
}

fn emit(out: Option<String>, text: &str) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, text)?,
        None => print!("{text}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let img = load_raw_bin(Path::new(&cli.input), cli.base, cli.skip, cli.len)?;
    info!(base = format_args!("{:#010x}", cli.base), size = img.span(), "loaded {}", cli.input);

    match cli.cmd {
        Command::Sections => {
            println!("{:<10} {:<12} {:<12} {:<6} {:<6}", "name", "start", "end", "perms", "kind");
            for s in &img.segments {
                println!(
                    "{:<10} {:#010x}   {:#010x}   {:<6} {:<6}",
                    s.name,
                    s.base,
                    s.end(),
                    s.perms,
                    s.kind
                );
            }
        }
        Command::Range { start, end, thumb, show_bytes, out } => {
            let start = parse_u32(&start)?;
            let end = parse_u32(&end)?;
            anyhow::ensure!(end >= start, "end must be >= start");
            anyhow::ensure!(start >= cli.base, "start lies below --base");

            let width = if thumb { Width::W16 } else { Width::W32 };
            let stride = width.stride();
            anyhow::ensure!(
                (start - cli.base) % stride == 0,
                "start is not aligned to {stride}-byte instructions"
            );

            let mut engine = Engine::new(EngineConfig { base: cli.base }, img);
            let first = ((start - cli.base) / stride) as usize;
            let last = (((end - cli.base) / stride) as usize).min(engine.slot_count(width));

            let mut buf = String::new();
            for slot in first..last {
                decode(&mut engine, width, slot);
                if let Some(d) = engine.table().get(width, slot) {
                    let _ = writeln!(buf, "{}", listing_line(d, show_bytes));
                }
            }
            emit(out, &buf)?;
        }
        Command::Dump { format, known, out } => {
            let config = EngineConfig { base: cli.base };
            let mut engine = Engine::new(config, img);
            let stats = engine.decode_all();
            info!(?stats, "decoded image");

            let text = match format {
                OutputFormat::Json => {
                    let report = DumpReport { config, stats, table: engine.table() };
                    serde_json::to_string_pretty(&report)? + "\n"
                }
                OutputFormat::Text => {
                    let mut buf = String::new();
                    for (title, width) in [("ARM", Width::W32), ("THUMB", Width::W16)] {
                        let _ = writeln!(buf, "{title}:");
                        for (_, d) in engine.table().iter(width) {
                            if known && !d.is_classified() {
                                continue;
                            }
                            let _ = writeln!(buf, "  {}", listing_line(d, true));
                        }
                    }
                    let _ = writeln!(
                        buf,
                        "decoded {} unclassified {} faults {}",
                        stats.decoded, stats.unclassified, stats.faults
                    );
                    buf
                }
            };
            emit(out, &text)?;
        }
    }

    Ok(())
}
