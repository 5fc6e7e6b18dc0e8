//! Load-context isolation: nothing from one request is visible to another

use std::thread;

use super::*;

fn widget(field_ty: &str) -> NamedTempFile {
    let mut record = TypeRecord::new("Shared.Widget", Some("Widget".into()));
    record.fields.push(IdentTy::new("value", field_ty));
    module_file(&document_image(vec![record]))
}

fn field_ty(result: &ScanResult) -> &str {
    &result.find("Shared.Widget").unwrap().fields[0].ty_full_name
}

#[test]
fn test_same_full_name_sequential() {
    let a = widget("Int32");
    let b = widget("String");
    let scanner = document_scanner(1);

    for _ in 0..4 {
        assert_eq!(field_ty(&scanner.scan(a.path()).unwrap()), "Int32");
        assert_eq!(field_ty(&scanner.scan(b.path()).unwrap()), "String");
    }
}

#[test]
fn test_same_full_name_concurrent() {
    let a = widget("Int32");
    let b = widget("String");
    let scanner = Arc::new(document_scanner(3));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let scanner = Arc::clone(&scanner);
            let (path, expected) = if i % 2 == 0 {
                (a.path().to_path_buf(), "Int32")
            } else {
                (b.path().to_path_buf(), "String")
            };
            thread::spawn(move || {
                for _ in 0..25 {
                    let result = scanner.scan(&path).unwrap();
                    assert_eq!(field_ty(&result), expected);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = scanner.stats();
    assert_eq!(stats.succeeded, 200);
    assert_eq!(stats.live_contexts, 0);
    assert!(stats.peak_live_contexts <= 3);
}

#[test]
fn test_same_full_name_in_clr_modules() {
    let a = module_file(&widget_image("alpha"));
    let b = module_file(&widget_image("beta"));
    let scanner = Scanner::new();

    let ra = scanner.scan(a.path()).unwrap();
    let rb = scanner.scan(b.path()).unwrap();
    let ra_again = scanner.scan(a.path()).unwrap();

    assert_eq!(ra.collection[0].fields[0].ident, "alpha");
    assert_eq!(rb.collection[0].fields[0].ident, "beta");
    assert_eq!(ra, ra_again);
}

#[test]
fn test_changed_file_is_rescanned() {
    let file = widget("Int32");
    let scanner = document_scanner(1);
    assert_eq!(field_ty(&scanner.scan(file.path()).unwrap()), "Int32");

    let mut record = TypeRecord::new("Shared.Widget", Some("Widget".into()));
    record.fields.push(IdentTy::new("value", "Decimal"));
    std::fs::write(file.path(), document_image(vec![record])).unwrap();

    assert_eq!(field_ty(&scanner.scan(file.path()).unwrap()), "Decimal");
}

#[test]
fn test_failed_request_does_not_affect_next() {
    let good = widget("Int32");
    let bad = module_file(b"{ not a document");
    let scanner = document_scanner(1);

    assert!(scanner.scan(bad.path()).unwrap_err().is_load_failure());
    assert_eq!(field_ty(&scanner.scan(good.path()).unwrap()), "Int32");
    assert_eq!(scanner.stats().live_contexts, 0);
}
