//! The six cross-cutting invariants, independent of the literal seed
//! scenarios covered in `seed_scenarios.rs`.

use clp::{CloseMethod, Descriptor, Flags, Handle, Kind, OpenOptions, TargetBuffer};

#[test]
fn idempotent_reparse_produces_byte_identical_buffers() {
    static ROOT: &[Descriptor] = &[
        Descriptor::new(Kind::Number, "A", 8, 0).default("7"),
        Descriptor::new(Kind::String, "B", 6, 8).default("'hi'"),
    ];

    let mut backing_a = [0u8; 16];
    let buf_a = TargetBuffer::new(&mut backing_a);
    let mut handle = Handle::open(ROOT, buf_a, OpenOptions::default()).unwrap();
    handle.parse_command(":test:", "A=5 B='xy'", true, true).unwrap();

    let mut backing_b = [0u8; 16];
    handle.reset(TargetBuffer::new(&mut backing_b));
    handle.parse_command(":test:", "A=5 B='xy'", true, true).unwrap();
    handle.close(CloseMethod::All);

    assert_eq!(backing_a, backing_b);
}

#[test]
fn property_override_shadows_default_and_literal_shadows_both() {
    static ROOT: &[Descriptor] = &[Descriptor::new(Kind::Number, "NUM", 8, 0).default("1")];

    // Default alone.
    let mut backing = [0u8; 8];
    let buf = TargetBuffer::new(&mut backing);
    let mut handle = Handle::open(ROOT, buf, OpenOptions::default()).unwrap();
    handle.parse_command(":test:", "", true, true).unwrap();
    handle.close(CloseMethod::All);
    assert_eq!(i64::from_ne_bytes(backing), 1);

    // Property override shadows the built-in default.
    let mut backing = [0u8; 8];
    let buf = TargetBuffer::new(&mut backing);
    let mut handle = Handle::open(ROOT, buf, OpenOptions::default()).unwrap();
    handle.parse_properties(":props:", "NUM=9", true).unwrap();
    handle.parse_command(":test:", "", true, true).unwrap();
    handle.close(CloseMethod::All);
    assert_eq!(i64::from_ne_bytes(backing), 9);

    // A literal value on the command line shadows both.
    let mut backing = [0u8; 8];
    let buf = TargetBuffer::new(&mut backing);
    let mut handle = Handle::open(ROOT, buf, OpenOptions::default()).unwrap();
    handle.parse_properties(":props:", "NUM=9", true).unwrap();
    handle.parse_command(":test:", "NUM=100", true, true).unwrap();
    handle.close(CloseMethod::All);
    assert_eq!(i64::from_ne_bytes(backing), 100);
}

#[test]
fn unambiguous_prefix_binds_while_ambiguous_prefix_errors() {
    static ROOT: &[Descriptor] = &[
        Descriptor::new(Kind::Number, "ALPHA", 8, 0),
        Descriptor::new(Kind::Number, "ALMOST", 8, 8),
        Descriptor::new(Kind::Number, "BETA", 8, 16),
    ];

    let mut backing = [0u8; 24];
    let buf = TargetBuffer::new(&mut backing);
    let mut handle = Handle::open(ROOT, buf, OpenOptions::default()).unwrap();
    // "ALP" only matches ALPHA; "B" only matches BETA.
    handle.parse_command(":test:", "ALP=3 B=4", true, true).unwrap();
    handle.close(CloseMethod::All);
    assert_eq!(i64::from_ne_bytes(backing[0..8].try_into().unwrap()), 3);
    assert_eq!(i64::from_ne_bytes(backing[16..24].try_into().unwrap()), 4);

    // "AL" matches both ALPHA and ALMOST: ambiguous.
    let mut backing = [0u8; 24];
    let buf = TargetBuffer::new(&mut backing);
    let mut handle = Handle::open(ROOT, buf, OpenOptions::default()).unwrap();
    let err = handle.parse_command(":test:", "AL=3", true, true).unwrap_err();
    assert_eq!(err.code(), -5);
}

#[test]
fn link_siblings_track_count_and_total_length_across_writes() {
    static ROOT: &[Descriptor] = &[
        Descriptor::new(Kind::String, "ARR", 5, 0).min_max(0, 4).flags(Flags::FIXED),
        Descriptor::new(Kind::Number, "ARR-COUNT", 4, 20).flags(Flags::COUNT).link_target("ARR"),
        Descriptor::new(Kind::Number, "ARR-TLN", 4, 24).flags(Flags::TLN).link_target("ARR"),
    ];
    let mut backing = [0u8; 32];
    let buf = TargetBuffer::new(&mut backing);
    let mut handle = Handle::open(ROOT, buf, OpenOptions::default()).unwrap();
    handle.parse_command(":test:", "ARR[ 'x' 'yy' ]", true, true).unwrap();
    handle.close(CloseMethod::All);
    assert_eq!(i32::from_ne_bytes(backing[20..24].try_into().unwrap()), 2);
    assert_eq!(i32::from_ne_bytes(backing[24..28].try_into().unwrap()), 10);
}

#[test]
fn overlay_oid_sibling_records_the_selected_branch() {
    static BRANCHES: &[Descriptor] = &[
        Descriptor::new(Kind::Number, "X", 8, 0).oid(11),
        Descriptor::new(Kind::Number, "Y", 8, 0).oid(22),
    ];
    static ROOT: &[Descriptor] = &[
        Descriptor::new(Kind::Overlay, "M", 0, 0).children(BRANCHES),
        Descriptor::new(Kind::Number, "M-OID", 4, 8).flags(Flags::OID).link_target("M"),
    ];
    let mut backing = [0u8; 16];
    let buf = TargetBuffer::new(&mut backing);
    let mut handle = Handle::open(ROOT, buf, OpenOptions::default()).unwrap();
    handle.parse_command(":test:", "M(Y=7)", true, true).unwrap();
    handle.close(CloseMethod::All);
    assert_eq!(i32::from_ne_bytes(backing[8..12].try_into().unwrap()), 22);
}

#[test]
fn generated_properties_round_trip_through_a_fresh_handle() {
    static OPT_LEAF: &[Descriptor] = &[Descriptor::new(Kind::Number, "OPT", 8, 0)];
    static ROOT: &[Descriptor] = &[Descriptor::new(Kind::Object, "ROOT", 0, 0).children(OPT_LEAF)];

    let mut backing = [0u8; 8];
    let buf = TargetBuffer::new(&mut backing);
    let mut handle = Handle::open(ROOT, buf, OpenOptions::default()).unwrap();
    handle.parse_properties(":props:", "ROOT.OPT=42", true).unwrap();
    let generated = handle.properties();
    assert!(generated.contains("ROOT.OPT=42"));

    let mut backing2 = [0u8; 8];
    handle.reset(TargetBuffer::new(&mut backing2));
    handle.parse_properties(":props2:", &generated, true).unwrap();
    let regenerated = handle.properties();
    handle.close(CloseMethod::All);

    assert_eq!(generated, regenerated);
}

#[test]
fn pwd_flagged_values_are_redacted_everywhere() {
    static ROOT: &[Descriptor] = &[Descriptor::new(Kind::String, "PASS", 16, 0).flags(Flags::PWD)];
    let mut backing = [0u8; 16];
    let buf = TargetBuffer::new(&mut backing);
    let mut handle = Handle::open(ROOT, buf, OpenOptions::default()).unwrap();
    let (_, log) = handle.parse_command(":test:", "PASS='hunter2'", true, true).unwrap();
    handle.close(CloseMethod::All);

    assert_eq!(log.len(), 1);
    assert!(log[0].display().contains("***SECRET***"));
    assert!(!log[0].display().contains("hunter2"));
}
