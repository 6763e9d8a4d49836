use picman::{
    ChipFamily, MemoryRegion, OperationKind, OperationRequest,
    chips::search_chips,
    dispatcher::backend_args,
    find_chip, supported_chips,
};
use proptest::prelude::*;

fn any_kind() -> impl Strategy<Value = OperationKind> {
    prop_oneof![
        Just(OperationKind::Program),
        Just(OperationKind::Verify),
        Just(OperationKind::Erase),
        Just(OperationKind::Dump),
    ]
}

fn any_region() -> impl Strategy<Value = MemoryRegion> {
    prop_oneof![
        Just(MemoryRegion::Rom),
        Just(MemoryRegion::Eeprom),
        Just(MemoryRegion::Config),
    ]
}

proptest! {
    #[test]
    fn args_start_with_command_port_and_chip(
        kind in any_kind(),
        chip_index in 0..supported_chips().len(),
        port in "(COM[0-9]{1,2}|/dev/tty(USB|ACM)[0-9])",
        icsp in any::<bool>(),
        region in any_region(),
        binary in any::<bool>(),
        fuses in proptest::collection::vec("[A-Z]{2,6}:[A-Z0-9]{1,6}", 0..4),
    ) {
        let chip = &supported_chips()[chip_index];
        let mut request = OperationRequest::new(kind, format!("PIC{}", chip.part_number), port.as_str())
            .with_file("image.hex")
            .with_icsp(icsp)
            .with_fuses(&fuses)
            .with_binary(binary);
        request.memory = region;

        let args = backend_args(&request, chip);

        prop_assert_eq!(args[0].as_str(), kind.command());
        prop_assert_eq!(&args[1..5], [
            "-p".to_string(),
            port.clone(),
            "-t".to_string(),
            chip.part_number.to_string(),
        ]);
        prop_assert_eq!(args.iter().any(|a| a == "--icsp"), icsp);

        let fuse_flags = args.iter().filter(|a| *a == "--fuse").count();
        let expected = if kind == OperationKind::Program { fuses.len() } else { 0 };
        prop_assert_eq!(fuse_flags, expected);

        prop_assert_eq!(args.iter().any(|a| a == "--binary"), kind == OperationKind::Dump && binary);
        prop_assert_eq!(args.iter().any(|a| a == "-o"), kind == OperationKind::Dump);
    }

    #[test]
    fn lookup_ignores_case_and_prefix(chip_index in 0..supported_chips().len(), lower in any::<bool>()) {
        let chip = &supported_chips()[chip_index];
        let name = format!("PIC{}", chip.part_number);
        let name = if lower { name.to_lowercase() } else { name };

        let found = find_chip(&name);
        prop_assert!(found.is_some());
        prop_assert_eq!(found.map(|c| c.part_number), Some(chip.part_number));
    }

    #[test]
    fn search_results_contain_the_query(query in "[0-9]{1,2}F?") {
        for chip in search_chips(&query) {
            prop_assert!(chip.part_number.contains(query.as_str()));
        }
    }
}

#[test]
fn every_chip_has_memory_and_a_family() {
    for chip in supported_chips() {
        assert!(chip.program_words > 0, "{}", chip.part_number);
        assert_ne!(chip.family(), ChipFamily::Other, "{}", chip.part_number);
    }
}
