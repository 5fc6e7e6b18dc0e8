//! Service loop, live-context cap and recycling

use std::io::BufReader;
use std::time::Duration;

use asminfo::prelude::ServeOutcome;

use super::*;

fn lines(output: &[u8]) -> Vec<String> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_rescan_is_byte_identical() {
    let file = module_file(&document_image(vec![foo_record()]));
    let scanner = document_scanner(1);
    let input = format!("{}\n", file.path().display()).repeat(10);

    let mut output = Vec::new();
    let outcome = scanner
        .serve(&mut BufReader::new(input.as_bytes()), &mut output)
        .unwrap();
    assert_eq!(outcome, ServeOutcome::Eof);

    let lines = lines(&output);
    assert_eq!(lines.len(), 10);
    assert!(lines.iter().all(|l| l == &lines[0]));
    assert_eq!(lines[0], scanner.scan_json(file.path()).unwrap());
}

#[test]
fn test_requests_beyond_cap_stay_bounded() {
    let file = module_file(&widget_image("alpha"));
    let scanner = Arc::new(
        Scanner::builder()
            .max_live_contexts(2)
            .acquire_timeout(Duration::from_secs(10))
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let scanner = Arc::clone(&scanner);
            let path = file.path().to_path_buf();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    scanner.scan(&path).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = scanner.stats();
    assert_eq!(stats.contexts_created, 60);
    assert!(stats.peak_live_contexts <= 2);
    assert_eq!(stats.live_contexts, 0);
}

#[test]
fn test_recycle_budget_ends_serve_loop() {
    let file = module_file(&document_image(vec![foo_record()]));
    let scanner = Scanner::builder()
        .introspector(Arc::new(DocumentIntrospector))
        .max_live_contexts(1)
        .recycle_after(3)
        .build()
        .unwrap();

    let input = format!("{}\n", file.path().display()).repeat(3);
    let mut output = Vec::new();
    let outcome = scanner
        .serve(&mut BufReader::new(input.as_bytes()), &mut output)
        .unwrap();

    assert_eq!(outcome, ServeOutcome::Recycle);
    assert_eq!(lines(&output).len(), 3);
    assert!(scanner.recycle_due());
}

#[test]
fn test_errors_are_answered_inline() {
    let file = module_file(&document_image(vec![foo_record()]));
    let scanner = document_scanner(1);
    let input = format!(
        "/missing.dll\n{{\"path\": \"\"}}\n\n\"{}\"\n",
        file.path().display()
    );

    let mut output = Vec::new();
    scanner
        .serve(&mut BufReader::new(input.as_bytes()), &mut output)
        .unwrap();

    let lines = lines(&output);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with(r#"{"error":"failed to load module '/missing.dll'"#));
    assert!(lines[1].starts_with(r#"{"error":"invalid request"#));
    assert!(lines[2].starts_with(r#"{"collection":[{"full_name":"Foo""#));
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let err = Scanner::builder().max_live_contexts(0).build().unwrap_err();
    assert!(matches!(err, asminfo::Error::Config(_)));

    let err = Scanner::builder()
        .config_file("/no/such/asminfo.toml")
        .err()
        .unwrap();
    assert!(matches!(err, asminfo::Error::Config(_)));
}
