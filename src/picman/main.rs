use std::path::PathBuf;

use clap::{Parser, Subcommand};
use picman::{Context, Language, Message, error::PicResult};
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use detect::{DetectOptions, handle_detect};
use info::{
    ChipInfoOptions, ChipsOptions, HexInfoOptions, handle_backend, handle_chip_info, handle_chips,
    handle_hex_info,
};
use operation::{
    DumpOptions, EraseOptions, ProgramOptions, VerifyOptions, handle_dump, handle_erase,
    handle_program, handle_verify,
};

mod detect;
mod info;
mod operation;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Backend executable; remembered after a successful operation
    #[arg(long, global = true)]
    backend_path: Option<PathBuf>,

    /// Message language
    #[arg(long, global = true, value_enum)]
    lang: Option<Language>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Write a HEX file to the chip
    #[command(name = "program", alias = "p")]
    Program(ProgramOptions),

    /// Compare the chip against a HEX file
    #[command(name = "verify", alias = "v")]
    Verify(VerifyOptions),

    /// Erase the chip
    #[command(name = "erase", alias = "e")]
    Erase(EraseOptions),

    /// Read chip memory into a file
    #[command(name = "dump", alias = "d")]
    Dump(DumpOptions),

    /// List serial ports and rate them as programmer candidates
    Detect(DetectOptions),

    /// List supported chips
    Chips(ChipsOptions),

    /// Ask the backend about a chip
    ChipInfo(ChipInfoOptions),

    /// Ask the backend about a HEX file
    HexInfo(HexInfoOptions),

    /// Show and check the backend executable
    Backend,
}

fn main() -> PicResult<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,picman=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    let mut ctx = Context::load();
    if let Some(path) = cli.backend_path {
        ctx.settings_mut().backend_path = Some(path);
    }
    if let Some(lang) = cli.lang {
        ctx.settings_mut().language = lang;
    }

    if ctx.resolve_backend().is_none() {
        warn!(
            "{}: {}",
            ctx.tr(Message::BackendNotFound),
            ctx.settings().backend.default_executable()
        );
    }

    match cli.command {
        Command::Program(opts) => handle_program(&mut ctx, opts)?,
        Command::Verify(opts) => handle_verify(&mut ctx, opts)?,
        Command::Erase(opts) => handle_erase(&mut ctx, opts)?,
        Command::Dump(opts) => handle_dump(&mut ctx, opts)?,
        Command::Detect(opts) => handle_detect(&ctx, opts)?,
        Command::Chips(opts) => handle_chips(opts),
        Command::ChipInfo(opts) => handle_chip_info(&ctx, opts)?,
        Command::HexInfo(opts) => handle_hex_info(&ctx, opts)?,
        Command::Backend => handle_backend(&ctx)?,
    }

    Ok(())
}
