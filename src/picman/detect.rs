use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use picman::{
    Confidence, Context, Detector, DetectorOptions, Message, PortCandidate, PortMonitor,
    error::PicResult,
    interface::{ComPort, SystemPorts},
};

#[derive(Args, Debug, Clone)]
pub(crate) struct DetectOptions {
    /// Briefly open each port to check it responds
    #[clap(long, default_value_t = false)]
    probe: bool,

    /// Probe timeout per port in milliseconds
    #[clap(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Keep running and report ports as they come and go
    #[clap(short, long, default_value_t = false)]
    watch: bool,
}

pub(crate) fn handle_detect(ctx: &Context, opts: DetectOptions) -> PicResult<()> {
    let detector = Detector::new(DetectorOptions {
        probe: opts.probe,
        probe_timeout: Duration::from_millis(opts.timeout_ms),
    });

    println!("{}", ctx.tr(Message::DetectingDevices));
    let mut found = false;
    let mut known = BTreeSet::new();
    for candidate in detector.detect()? {
        found |= candidate.is_likely_programmer();
        print_candidate(&candidate);
        known.insert(candidate.port);
    }
    if !found {
        println!("{}", ctx.tr(Message::NoDeviceFound));
    }

    if opts.watch {
        let monitor = PortMonitor::start(Arc::new(SystemPorts))?;
        for change in monitor.changes().iter() {
            // The monitor's first report lists every port as new
            let current: BTreeSet<ComPort> = change.current.into_iter().collect();
            for line in describe_changes(&known, &current) {
                println!("{}", line);
            }
            known = current;
        }
    }

    Ok(())
}

/// `+ port` for each new port and `- port` for each one that went away
fn describe_changes(known: &BTreeSet<ComPort>, current: &BTreeSet<ComPort>) -> Vec<String> {
    let added = current.difference(known).map(|port| format!("+ {}", port));
    let removed = known.difference(current).map(|port| format!("- {}", port));
    added.chain(removed).collect()
}

fn print_candidate(candidate: &PortCandidate) {
    let marker = match candidate.confidence {
        Confidence::High => "***",
        Confidence::Medium => "** ",
        Confidence::Low => "*  ",
    };
    let usb_id = candidate
        .usb_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());

    let label = match (candidate.device_type, candidate.description.as_deref()) {
        (Some(device_type), _) => device_type,
        (None, Some(description)) => description,
        (None, None) => "",
    };

    print!("{} {:<16} {:<10} {}", marker, candidate.port, usb_id, label);
    if candidate.busy {
        print!(" [busy]");
    }
    if let Some(e) = &candidate.error {
        print!(" ({})", e);
    }
    println!();
}
