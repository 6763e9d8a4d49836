use std::path::PathBuf;

use clap::Args;
use picman::{
    ChipDescriptor, Context, Message,
    chips::{ChipFamily, chip_for_name, chips_in_family, family_counts, popular_chips, search_chips},
    error::{PicError, PicResult},
    supported_chips,
};
use tracing::warn;

#[derive(Args, Debug, Clone)]
pub(crate) struct ChipsOptions {
    /// Only chips whose part number contains this text
    search: Option<String>,

    /// Only chips of one family, e.g. PIC16F
    #[clap(short, long)]
    family: Option<String>,

    /// Only the commonly used chips
    #[clap(long, default_value_t = false)]
    popular: bool,

    /// Chip counts per family
    #[clap(long, default_value_t = false)]
    summary: bool,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ChipInfoOptions {
    /// PIC type, e.g. 16F628A
    chip: String,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct HexInfoOptions {
    /// HEX file
    file: PathBuf,

    /// PIC type the file is meant for
    chip: String,
}

pub(crate) fn handle_chips(opts: ChipsOptions) {
    if opts.summary {
        for (family, count) in family_counts() {
            println!("{:<8} {}", family, count);
        }
        return;
    }

    let mut chips: Vec<&'static ChipDescriptor> = if opts.popular {
        popular_chips()
    } else if let Some(query) = &opts.search {
        search_chips(query)
    } else {
        supported_chips().iter().collect()
    };

    if let Some(name) = &opts.family {
        match ChipFamily::from_name(name) {
            Some(family) => {
                let members: Vec<_> = chips_in_family(family).collect();
                chips.retain(|chip| members.contains(chip));
            }
            None => {
                warn!("Unknown chip family {}", name);
                chips.clear();
            }
        }
    }

    for chip in chips {
        println!(
            "{:<12} {:<8} {:>6} words {:>5} bytes EEPROM",
            chip.display_name(),
            chip.family(),
            chip.program_words,
            chip.eeprom_bytes
        );
    }
}

pub(crate) fn handle_chip_info(ctx: &Context, opts: ChipInfoOptions) -> PicResult<()> {
    let chip = chip_for_name(&opts.chip)?;
    let backend = require_backend(ctx)?;
    println!("{}", backend.chip_info(chip)?);
    Ok(())
}

pub(crate) fn handle_hex_info(ctx: &Context, opts: HexInfoOptions) -> PicResult<()> {
    let chip = chip_for_name(&opts.chip)?;
    let backend = require_backend(ctx)?;
    println!("{}", backend.hex_info(&opts.file, chip)?);
    Ok(())
}

pub(crate) fn handle_backend(ctx: &Context) -> PicResult<()> {
    let backend = require_backend(ctx)?;
    println!("{} {}", backend.kind, backend.path.display());

    let check = backend.validate(ctx.backend_timeout())?;
    let status = if check.compatible {
        ctx.tr(Message::BackendValid)
    } else {
        ctx.tr(Message::BackendInvalid)
    };
    println!("{}: {}", status, check.message);

    if check.compatible {
        Ok(())
    } else {
        Err(PicError::Backend(check.message))
    }
}

fn require_backend(ctx: &Context) -> PicResult<picman::Backend> {
    ctx.resolve_backend()
        .ok_or_else(|| PicError::Backend(ctx.tr(Message::BackendNotFound).to_string()))
}
