use std::path::PathBuf;

use clap::Args;
use picman::{
    Context, Detector, DetectorOptions, MemoryRegion, Message, OperationKind, OperationRequest,
    OperationStatus,
    error::{PicError, PicResult},
    find_chip,
    hex::{SizeCheck, check_hex_file},
    util::create_spinner,
};
use tracing::{debug, info, warn};

/// Chip and port shared by every operation
#[derive(Args, Debug, Clone)]
pub(crate) struct TargetOptions {
    /// PIC type, e.g. 16F628A. Defaults to the last used chip.
    #[clap(short = 't', long)]
    chip: Option<String>,

    /// Serial port. Detected or taken from the last run when omitted.
    #[clap(short, long)]
    port: Option<String>,

    /// Program in-circuit instead of in the socket
    #[clap(long, overrides_with = "no_icsp")]
    icsp: bool,

    /// Program in the socket, even if the last run used ICSP
    #[clap(long, overrides_with = "icsp")]
    no_icsp: bool,
}

impl TargetOptions {
    /// `None` when neither flag was given
    fn icsp_choice(&self) -> Option<bool> {
        match (self.icsp, self.no_icsp) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ProgramOptions {
    #[clap(flatten)]
    target: TargetOptions,

    /// Firmware
    #[clap(short, long)]
    input: PathBuf,

    /// Fuse setting passed to the backend, e.g. `FOSC:INTRC`
    #[clap(long = "fuse")]
    fuses: Vec<String>,

    /// File with one fuse setting per line
    #[clap(long)]
    fuses_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct VerifyOptions {
    #[clap(flatten)]
    target: TargetOptions,

    /// Firmware to compare against
    #[clap(short, long)]
    input: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct EraseOptions {
    #[clap(flatten)]
    target: TargetOptions,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct DumpOptions {
    #[clap(flatten)]
    target: TargetOptions,

    /// Memory to read
    #[clap(short, long, value_enum, default_value_t = MemoryRegion::Rom)]
    memory: MemoryRegion,

    /// Output file
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Write raw binary instead of Intel HEX
    #[clap(long, default_value_t = false)]
    binary: bool,
}

pub(crate) fn handle_program(ctx: &mut Context, opts: ProgramOptions) -> PicResult<()> {
    let mut fuses = opts.fuses;
    if let Some(path) = &opts.fuses_file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PicError::Configuration(format!("Failed to read fuses file: {}", e)))?;
        fuses.extend(content.lines().map(str::to_string));
    }

    let request = base_request(ctx, OperationKind::Program, &opts.target)
        .with_file(opts.input)
        .with_fuses(fuses);
    warn_if_too_large(ctx, &request);
    run(ctx, request)
}

pub(crate) fn handle_verify(ctx: &mut Context, opts: VerifyOptions) -> PicResult<()> {
    let request = base_request(ctx, OperationKind::Verify, &opts.target).with_file(opts.input);
    run(ctx, request)
}

pub(crate) fn handle_erase(ctx: &mut Context, opts: EraseOptions) -> PicResult<()> {
    let request = base_request(ctx, OperationKind::Erase, &opts.target);
    run(ctx, request)
}

pub(crate) fn handle_dump(ctx: &mut Context, opts: DumpOptions) -> PicResult<()> {
    let mut request = base_request(ctx, OperationKind::Dump, &opts.target).with_binary(opts.binary);
    request.memory = opts.memory;
    if let Some(output) = opts.output {
        request = request.with_file(output);
    }
    run(ctx, request)
}

fn base_request(ctx: &Context, kind: OperationKind, target: &TargetOptions) -> OperationRequest {
    let chip = target
        .chip
        .clone()
        .unwrap_or_else(|| ctx.settings().last_chip.clone());
    let port = resolve_port(ctx, target).unwrap_or_default();
    let icsp = target
        .icsp_choice()
        .unwrap_or(ctx.settings().icsp_enabled);
    OperationRequest::new(kind, chip, port).with_icsp(icsp)
}

/// Explicit port, then a detected programmer, then the last used port
fn resolve_port(ctx: &Context, target: &TargetOptions) -> Option<String> {
    if let Some(port) = &target.port {
        return Some(port.clone());
    }

    if ctx.settings().auto_detect_programmer {
        println!("{}", ctx.tr(Message::DetectingDevices));
        match Detector::new(DetectorOptions::default()).best_candidate() {
            Ok(Some(candidate)) => {
                info!(
                    "{}: {} ({})",
                    ctx.tr(Message::DeviceFound),
                    candidate.port,
                    candidate.device_type.unwrap_or("unknown")
                );
                return Some(candidate.port);
            }
            Ok(None) => info!("{}", ctx.tr(Message::NoDeviceFound)),
            Err(e) => warn!("Port detection failed: {}", e),
        }
    }

    ctx.settings().last_port.clone()
}

fn warn_if_too_large(ctx: &Context, request: &OperationRequest) {
    let (Some(chip), Some(file)) = (find_chip(&request.chip), request.file.as_deref()) else {
        return;
    };
    match check_hex_file(file, chip) {
        Ok(SizeCheck::TooLarge {
            used_words,
            capacity_words,
        }) => warn!(
            "{} ({} > {} words)",
            ctx.tr(Message::HexFileTooLarge),
            used_words,
            capacity_words
        ),
        Ok(SizeCheck::Fits { .. }) => {}
        // The dispatcher reports missing or unreadable files itself
        Err(e) => debug!("Skipping HEX size check: {}", e),
    }
}

fn run(ctx: &mut Context, request: OperationRequest) -> PicResult<()> {
    let dispatcher = ctx.dispatcher();
    let pb = create_spinner(&format!("{} {} on {}", request.kind, request.chip, request.port));

    let result = dispatcher.execute_streaming(request.clone(), |line| pb.println(&line.text));
    pb.finish_and_clear();

    match &result.status {
        OperationStatus::Success | OperationStatus::SuccessWithWarnings => {
            let message = if result.status == OperationStatus::Success {
                Message::OperationCompleted
            } else {
                Message::OperationCompletedWithWarnings
            };
            println!("{} ({:.1}s)", ctx.tr(message), result.elapsed.as_secs_f32());
            if let Some(hint) = result.hint() {
                println!("{}", hint);
            }

            ctx.remember(&request);
            if let Err(e) = ctx.save() {
                warn!("Could not save settings: {}", e);
            }
            Ok(())
        }
        OperationStatus::PreconditionFailed(e) => Err(PicError::Precondition(e.clone())),
        OperationStatus::Cancelled => Err(PicError::Backend(
            ctx.tr(Message::OperationCancelled).to_string(),
        )),
        status => {
            if let Some(hint) = result.hint() {
                eprintln!("{}", hint);
            }
            Err(PicError::Backend(format!(
                "{}: {:?} (exit code {:?})",
                ctx.tr(Message::OperationFailed),
                status,
                result.exit_code
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use picman::{Settings, dispatcher::backend_args};

    use super::*;

    #[derive(Parser, Debug)]
    struct Target {
        #[clap(flatten)]
        target: TargetOptions,
    }

    fn erase_args(saved_icsp: bool, flags: &[&str]) -> Vec<String> {
        let ctx = Context::in_memory(Settings {
            icsp_enabled: saved_icsp,
            ..Settings::default()
        });
        let cli = Target::parse_from(["erase", "-t", "16F84A", "-p", "COM1"].iter().chain(flags));
        let request = base_request(&ctx, OperationKind::Erase, &cli.target);
        let chip = find_chip(&request.chip).unwrap();
        backend_args(&request, chip)
    }

    fn has_icsp(args: &[String]) -> bool {
        args.iter().any(|a| a == "--icsp")
    }

    #[test]
    fn no_icsp_overrides_saved_choice() {
        assert!(!has_icsp(&erase_args(true, &["--no-icsp"])));
    }

    #[test]
    fn saved_choice_applies_without_flags() {
        assert!(has_icsp(&erase_args(true, &[])));
        assert!(!has_icsp(&erase_args(false, &[])));
    }

    #[test]
    fn last_icsp_flag_wins() {
        assert!(has_icsp(&erase_args(false, &["--icsp"])));
        assert!(!has_icsp(&erase_args(false, &["--icsp", "--no-icsp"])));
        assert!(has_icsp(&erase_args(true, &["--no-icsp", "--icsp"])));
    }
}
