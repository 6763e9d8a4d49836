use std::sync::Arc;
use std::time::{Duration, Instant};

use picman::{
    Dispatcher, OperationEvent, OperationRequest, OperationStatus, OutputLine, PreconditionError,
};

mod common;

use common::{MockLauncher, hex_file};

#[test]
fn program_success() {
    let launcher = Arc::new(MockLauncher::exiting(
        0,
        vec![
            OutputLine::stdout("Waiting for user to insert chip..."),
            OutputLine::stdout("Programming successful"),
        ],
    ));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher.clone());
    let file = hex_file();

    let result = dispatcher.execute(OperationRequest::program("PIC16F628A", "COM3", file.path()));

    assert_eq!(result.status, OperationStatus::Success);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.output.len(), 2);
    assert_eq!(launcher.launches(), 1);

    let args = launcher.last_args().unwrap();
    assert_eq!(&args[..5], ["program", "-p", "COM3", "-t", "16F628A"]);
    assert_eq!(args[5], "-i");
    assert!(!dispatcher.is_port_busy("COM3"));
}

#[test]
fn device_not_found_is_device_error() {
    let launcher = Arc::new(MockLauncher::exiting(
        1,
        vec![OutputLine::stderr("Device not found")],
    ));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher.clone());
    let file = hex_file();

    let result = dispatcher.execute(OperationRequest::program("PIC16F628A", "COM3", file.path()));

    assert_eq!(result.status, OperationStatus::DeviceError);
    assert_eq!(result.exit_code, Some(1));
    assert!(result.hint().is_some());
}

#[test]
fn verify_mismatch_is_success_with_warnings() {
    let launcher = Arc::new(MockLauncher::exiting(
        0,
        vec![OutputLine::stdout("Verify failed at address 0x0010")],
    ));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher);
    let file = hex_file();

    let result = dispatcher.execute(OperationRequest::verify("16F628A", "COM3", file.path()));

    assert_eq!(result.status, OperationStatus::SuccessWithWarnings);
    assert!(result.is_success());
}

#[test]
fn failure_text_with_clean_exit_is_a_failure() {
    let launcher = Arc::new(MockLauncher::exiting(
        0,
        vec![
            OutputLine::stdout("Programming ROM..."),
            OutputLine::stdout("Programming failed"),
        ],
    ));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher);
    let file = hex_file();

    let result = dispatcher.execute(OperationRequest::program("16F628A", "COM3", file.path()));

    assert_eq!(result.status, OperationStatus::UnknownFailure);
    assert!(!result.is_success());
}

#[test]
fn unreachable_process_is_killed_and_reaped() {
    let launcher = Arc::new(MockLauncher::lost(vec![OutputLine::stdout("Erasing chip")]));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher.clone());

    let result = dispatcher.execute(OperationRequest::erase("16F84A", "COM9"));

    assert_eq!(result.status, OperationStatus::UnknownFailure);
    assert_eq!(result.exit_code, None);
    assert_eq!(launcher.kills(), 1);
    assert_eq!(launcher.reaps(), 1);
    assert!(!dispatcher.is_port_busy("COM9"));
}

#[test]
fn nonexistent_file_never_launches() {
    let launcher = Arc::new(MockLauncher::exiting(0, Vec::new()));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher.clone());

    let result = dispatcher.execute(OperationRequest::program(
        "PIC16F628A",
        "COM3",
        "/definitely/missing/blink.hex",
    ));

    assert!(matches!(
        result.status,
        OperationStatus::PreconditionFailed(PreconditionError::FileNotFound(_))
    ));
    assert_eq!(launcher.launches(), 0);
}

#[test]
fn missing_file_never_launches() {
    let launcher = Arc::new(MockLauncher::exiting(0, Vec::new()));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher.clone());

    for kind in [picman::OperationKind::Program, picman::OperationKind::Verify] {
        let result = dispatcher.execute(OperationRequest::new(kind, "16F84A", "COM1"));
        assert_eq!(
            result.status,
            OperationStatus::PreconditionFailed(PreconditionError::MissingFile)
        );
    }
    assert_eq!(launcher.launches(), 0);
}

#[test]
fn empty_file_is_refused() {
    let launcher = Arc::new(MockLauncher::exiting(0, Vec::new()));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher.clone());
    let empty = tempfile::NamedTempFile::new().unwrap();

    let result = dispatcher.execute(OperationRequest::program("16F84A", "COM1", empty.path()));

    assert!(matches!(
        result.status,
        OperationStatus::PreconditionFailed(PreconditionError::EmptyFile(_))
    ));
    assert_eq!(launcher.launches(), 0);
}

#[test]
fn second_request_on_busy_port_is_refused() {
    let launcher = Arc::new(MockLauncher::hanging(Vec::new()));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher.clone());

    let first = dispatcher
        .start(OperationRequest::erase("16F84A", "COM4"))
        .unwrap();
    let second = dispatcher.start(OperationRequest::erase("12F675", "COM4"));
    assert_eq!(
        second.err(),
        Some(PreconditionError::PortBusy("COM4".to_string()))
    );

    // Another port is unaffected
    let other = dispatcher
        .start(OperationRequest::erase("12F675", "COM5"))
        .unwrap();
    assert_eq!(launcher.launches(), 2);

    first.cancel();
    other.cancel();
    assert_eq!(first.wait().status, OperationStatus::Cancelled);
    assert_eq!(other.wait().status, OperationStatus::Cancelled);
}

#[test]
fn cancel_releases_port_within_bounded_time() {
    let launcher = Arc::new(MockLauncher::hanging(vec![OutputLine::stdout(
        "Waiting for user to insert chip...",
    )]));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher.clone());

    let handle = dispatcher
        .start(OperationRequest::erase("16F84A", "COM6"))
        .unwrap();
    assert!(dispatcher.is_port_busy("COM6"));

    // Wait until the backend is running before cancelling
    let started = handle
        .events()
        .recv_timeout(Duration::from_secs(5))
        .unwrap();
    assert!(matches!(started, OperationEvent::Started { .. }));

    let cancelled_at = Instant::now();
    handle.cancel();
    let result = handle.wait();

    assert!(cancelled_at.elapsed() < Duration::from_secs(2));
    assert_eq!(result.status, OperationStatus::Cancelled);
    assert_eq!(result.exit_code, None);
    assert!(!dispatcher.is_port_busy("COM6"));

    let again = dispatcher.start(OperationRequest::erase("16F84A", "COM6"));
    assert!(again.is_ok());
    if let Ok(handle) = again {
        handle.cancel();
        handle.wait();
    }
}

#[test]
fn events_arrive_in_order() {
    let launcher = Arc::new(MockLauncher::exiting(
        0,
        vec![
            OutputLine::stdout("Erasing chip"),
            OutputLine::stdout("Erase complete"),
        ],
    ));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher);

    let handle = dispatcher
        .start(OperationRequest::erase("16F84A", "COM7"))
        .unwrap();
    let events: Vec<_> = handle.events().iter().collect();
    let result = handle.wait();

    assert!(matches!(events.first(), Some(OperationEvent::Started { .. })));
    assert_eq!(
        events[1..3],
        [
            OperationEvent::Output(OutputLine::stdout("Erasing chip")),
            OperationEvent::Output(OutputLine::stdout("Erase complete")),
        ]
    );
    assert_eq!(events.last(), Some(&OperationEvent::Finished(result.clone())));
    assert_eq!(result.status, OperationStatus::Success);
}

#[test]
fn streaming_sees_every_line() {
    let launcher = Arc::new(MockLauncher::exiting(
        0,
        vec![OutputLine::stdout("a"), OutputLine::stderr("b")],
    ));
    let dispatcher = Dispatcher::with_launcher("picpro", launcher);

    let mut seen = Vec::new();
    let result = dispatcher.execute_streaming(OperationRequest::erase("16F84A", "COM8"), |line| {
        seen.push(line.text.clone())
    });

    assert_eq!(seen, ["a", "b"]);
    assert_eq!(result.output.len(), 2);
}
