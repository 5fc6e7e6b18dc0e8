//! Property tests over generated modules

use asminfo::naming::snake_case;
use proptest::prelude::*;

use super::*;

fn ident() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,12}"
}

fn type_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Int32".to_string()),
        Just("String".to_string()),
        Just("Boolean".to_string()),
        Just("!T".to_string()),
        "[A-Z][a-z]{1,6}(\\.[A-Z][a-z]{1,6}){0,2}",
    ]
}

fn record() -> impl Strategy<Value = TypeRecord> {
    (
        prop_oneof![4 => "[A-Z][A-Za-z]{0,8}", 1 => Just("!Open".to_string())],
        prop::collection::vec((ident(), type_name()), 0..4),
        prop::collection::vec(
            (ident(), prop::collection::vec((ident(), type_name()), 0..3), type_name()),
            0..3,
        ),
    )
        .prop_map(|(name, fields, methods)| {
            let mut record = TypeRecord::new(name.clone(), Some(name));
            record.fields = fields.into_iter().map(|(i, t)| IdentTy::new(i, t)).collect();
            record.methods = methods
                .into_iter()
                .map(|(ident, args, ret)| asminfo::MethodRecord {
                    ident,
                    args: args.into_iter().map(|(i, t)| IdentTy::new(i, t)).collect(),
                    return_ty_full_name: ret,
                })
                .collect();
            record
        })
}

fn resolvable(record: &TypeRecord) -> bool {
    let ok = |s: &str| !s.starts_with('!');
    ok(&record.full_name)
        && record.fields.iter().all(|f| ok(&f.ty_full_name))
        && record.methods.iter().all(|m| {
            ok(&m.return_ty_full_name) && m.args.iter().all(|a| ok(&a.ty_full_name))
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_result_is_resolvable_subset_in_order(records in prop::collection::vec(record(), 0..6)) {
        let expected: Vec<_> = records.iter().filter(|r| resolvable(r)).cloned().collect();
        let file = module_file(&document_image(records.clone()));

        let extraction = document_scanner(1).scan_detailed(file.path()).unwrap();
        prop_assert_eq!(&extraction.result.collection, &expected);
        prop_assert_eq!(extraction.dropped(), records.len() - expected.len());
    }

    #[test]
    fn prop_scan_is_deterministic(records in prop::collection::vec(record(), 0..6)) {
        let file = module_file(&document_image(records));
        let scanner = document_scanner(1);
        let first = scanner.scan_json(file.path()).unwrap();
        prop_assert_eq!(scanner.scan_json(file.path()).unwrap(), first);
    }

    #[test]
    fn prop_snake_case_is_lowercase_and_idempotent(name in "[A-Z][a-zA-Z]{0,16}") {
        let key = snake_case(&name);
        prop_assert!(!key.chars().any(|c| c.is_ascii_uppercase()));
        prop_assert_eq!(snake_case(&key), key.clone());
        prop_assert_eq!(key.replace('_', ""), name.to_lowercase());
    }
}
