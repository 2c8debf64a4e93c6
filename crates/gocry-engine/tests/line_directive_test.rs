//! End-to-end tests for line mode: directive matching, ordering across
//! worker counts, and failure reporting.

use gocry_core::{CipherKind, Directives, ErrorKind, GocryError, Mode, Operation};
use gocry_crypto::SecretKey;
use gocry_engine::Engine;
use proptest::prelude::*;

const ENCRYPT: &str = "### DIRECTIVE: ENCRYPT";
const DECRYPT: &str = "### DIRECTIVE: DECRYPT";

fn line_engine(key_bytes: Vec<u8>, operation: Operation, workers: usize) -> Engine {
    let mut engine = Engine::new(SecretKey::new(key_bytes).unwrap(), operation);
    engine.mode = Mode::Line;
    engine.parallelism = workers;
    engine
}

fn run(engine: &Engine, input: &str) -> Result<(bool, String), GocryError> {
    let mut out = Vec::new();
    let processed = engine.process(input.as_bytes(), &mut out)?;
    Ok((processed, String::from_utf8(out).unwrap()))
}

/// Every tenth line carries the encrypt directive.
fn mixed_input(lines: usize) -> String {
    (0..lines)
        .map(|i| {
            if i % 10 == 3 {
                format!("token_{i} = s3cr3t{ENCRYPT}\n")
            } else {
                format!("plain line {i}\n")
            }
        })
        .collect()
}

#[test]
fn directive_line_roundtrip() {
    let input = format!("secret{ENCRYPT}\n");

    let encrypt = line_engine(vec![0u8; 32], Operation::Encrypt, 2);
    let (processed, sealed) = run(&encrypt, &input).unwrap();
    assert!(processed);
    assert!(sealed.starts_with(&format!("{DECRYPT}: ")));
    assert!(!sealed.contains("secret"));

    let decrypt = line_engine(vec![0u8; 32], Operation::Decrypt, 2);
    let (processed, opened) = run(&decrypt, &sealed).unwrap();
    assert!(processed);
    assert_eq!(opened, input);
}

#[test]
fn input_without_directives_passes_through() {
    let input = "alpha\r\nbeta\n\ngamma";
    let (processed, out) = run(&line_engine(vec![1u8; 32], Operation::Encrypt, 4), input).unwrap();
    assert!(!processed);
    assert_eq!(out, "alpha\nbeta\n\ngamma\n");

    let (processed, _) = run(&line_engine(vec![1u8; 32], Operation::Decrypt, 4), input).unwrap();
    assert!(!processed);
}

#[test]
fn empty_input_produces_empty_output() {
    let (processed, out) = run(&line_engine(vec![1u8; 32], Operation::Encrypt, 4), "").unwrap();
    assert!(!processed);
    assert!(out.is_empty());
}

#[test]
fn order_preserved_across_worker_counts() {
    let input = mixed_input(500);

    let (_, sealed) = run(&line_engine(vec![2u8; 32], Operation::Encrypt, 8), &input).unwrap();
    let sealed_lines: Vec<&str> = sealed.lines().collect();
    assert_eq!(sealed_lines.len(), 500);
    for (i, line) in sealed_lines.iter().enumerate() {
        if i % 10 == 3 {
            assert!(line.starts_with(DECRYPT), "line {i} should be sealed");
        } else {
            assert_eq!(*line, format!("plain line {i}"));
        }
    }

    let (_, one) = run(&line_engine(vec![2u8; 32], Operation::Decrypt, 1), &sealed).unwrap();
    let (_, many) = run(&line_engine(vec![2u8; 32], Operation::Decrypt, 16), &sealed).unwrap();
    assert_eq!(one, input);
    assert_eq!(many, input);
}

#[test]
fn deterministic_output_independent_of_worker_count() {
    let input = mixed_input(200);

    let mut one = line_engine(vec![3u8; 64], Operation::Encrypt, 1);
    one.cipher = CipherKind::Deterministic;
    let mut many = line_engine(vec![3u8; 64], Operation::Encrypt, 8);
    many.cipher = CipherKind::Deterministic;

    let (_, a) = run(&one, &input).unwrap();
    let (_, b) = run(&many, &input).unwrap();
    assert_eq!(a, b);

    let (_, opened) = run(&line_engine(vec![3u8; 64], Operation::Decrypt, 8), &a).unwrap();
    assert_eq!(opened, input);
}

#[test]
fn custom_directives() {
    let mut encrypt = line_engine(vec![4u8; 32], Operation::Encrypt, 2);
    encrypt.directives = Directives::new("# seal", "# sealed");
    let (_, sealed) = run(&encrypt, "password = x # seal\nkeep\n").unwrap();
    assert!(sealed.starts_with("# sealed: "));

    let mut decrypt = line_engine(vec![4u8; 32], Operation::Decrypt, 2);
    decrypt.directives = Directives::new("# seal", "# sealed");
    let (_, opened) = run(&decrypt, &sealed).unwrap();
    assert_eq!(opened, "password = x # seal\nkeep\n");
}

#[test]
fn invalid_directives_are_config_errors() {
    let mut engine = line_engine(vec![4u8; 32], Operation::Encrypt, 2);
    engine.directives = Directives::new("same", "same");
    assert_eq!(run(&engine, "x\n").unwrap_err().kind(), ErrorKind::Config);

    engine.directives = Directives::new("", "dec");
    assert_eq!(run(&engine, "x\n").unwrap_err().kind(), ErrorKind::Config);
}

#[test]
fn zero_workers_is_config_error() {
    let engine = line_engine(vec![4u8; 32], Operation::Encrypt, 0);
    assert_eq!(run(&engine, "x\n").unwrap_err().kind(), ErrorKind::Config);
}

#[test]
fn joined_standalone_directive_roundtrip() {
    let input = format!("[db]\n{ENCRYPT}\npassword = \"hunter2\"\nport = 5432\n");

    let mut encrypt = line_engine(vec![5u8; 32], Operation::Encrypt, 4);
    encrypt.join_standalone = true;
    let (_, sealed) = run(&encrypt, &input).unwrap();
    let lines: Vec<&str> = sealed.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(!sealed.contains("hunter2"));

    // Without joining the bare directive is sealed on its own
    let plain = line_engine(vec![5u8; 32], Operation::Encrypt, 4);
    let (_, separate) = run(&plain, &input).unwrap();
    assert_eq!(separate.lines().count(), 4);
    assert!(separate.contains("hunter2"));

    let (_, opened) = run(&line_engine(vec![5u8; 32], Operation::Decrypt, 4), &sealed).unwrap();
    assert_eq!(opened, input);
}

#[test]
fn lowest_failing_line_is_reported_and_nothing_written() {
    let encrypt = line_engine(vec![6u8; 32], Operation::Encrypt, 4);
    let (_, sealed) = run(&encrypt, &mixed_input(100)).unwrap();
    let mut lines: Vec<String> = sealed.lines().map(str::to_owned).collect();
    lines[57] = format!("{DECRYPT}: ****");
    lines[91] = format!("{DECRYPT}: ****");
    // Tamper with one base64 character of an otherwise valid line
    let victim = &mut lines[73];
    let pos = victim.len() - 10;
    let flipped = if victim.as_bytes()[pos] == b'A' { "B" } else { "A" };
    victim.replace_range(pos..pos + 1, flipped);
    let broken: String = lines.iter().map(|l| format!("{l}\n")).collect();

    let engine = line_engine(vec![6u8; 32], Operation::Decrypt, 8);
    for _ in 0..5 {
        let mut out = Vec::new();
        let err = engine.process(broken.as_bytes(), &mut out).unwrap_err();
        match &err {
            GocryError::Line { line, source } => {
                assert_eq!(*line, 58);
                assert_eq!(source.kind(), ErrorKind::Format);
            }
            other => panic!("expected a line error, got: {other:?}"),
        }
        assert!(out.is_empty());
    }
}

#[test]
fn wrong_key_reports_authentication() {
    let encrypt = line_engine(vec![7u8; 32], Operation::Encrypt, 2);
    let (_, sealed) = run(&encrypt, &mixed_input(20)).unwrap();
    let err = run(&line_engine(vec![8u8; 32], Operation::Decrypt, 2), &sealed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(matches!(err, GocryError::Line { line: 4, .. }));
}

#[test]
fn wrong_key_length_for_sealed_line_is_key_error() {
    let mut encrypt = line_engine(vec![9u8; 64], Operation::Encrypt, 2);
    encrypt.cipher = CipherKind::Deterministic;
    let (_, sealed) = run(&encrypt, &format!("v{ENCRYPT}\n")).unwrap();

    let err = run(&line_engine(vec![9u8; 32], Operation::Decrypt, 2), &sealed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Key);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn line_roundtrip_any_text(
        lines in proptest::collection::vec("[a-zA-Z0-9 =#:]{0,40}", 0..30),
        marks in proptest::collection::vec(any::<bool>(), 30),
        workers in 1usize..6,
    ) {
        let input: String = lines
            .iter()
            .zip(&marks)
            .map(|(l, &m)| if m { format!("{l}{ENCRYPT}\n") } else { format!("{l}\n") })
            .collect();

        let encrypt = line_engine(vec![10u8; 32], Operation::Encrypt, workers);
        let decrypt = line_engine(vec![10u8; 32], Operation::Decrypt, workers);
        let (_, sealed) = run(&encrypt, &input).unwrap();
        let (_, opened) = run(&decrypt, &sealed).unwrap();
        prop_assert_eq!(opened, input);
    }
}
