//! One-shot extraction through the facade

use super::*;

#[test]
fn test_foo_document() {
    let file = module_file(&document_image(vec![foo_record()]));
    let json = document_scanner(1).scan_json(file.path()).unwrap();
    assert_eq!(
        json,
        r#"{"collection":[{"full_name":"Foo","short_name":"Foo","fields":[{"ident":"x","ty_full_name":"Int32"}],"methods":[{"ident":"Bar","args":[{"ident":"y","ty_full_name":"String"}],"return_ty_full_name":"Boolean"}]}]}"#
    );
}

#[test]
fn test_zero_exported_types() {
    let file = module_file(&document_image(Vec::new()));
    assert_eq!(
        document_scanner(1).scan_json(file.path()).unwrap(),
        r#"{"collection":[]}"#
    );

    let clr = module_file(&ImageBuilder::new("Empty.dll").build());
    assert_eq!(Scanner::new().scan_json(clr.path()).unwrap(), r#"{"collection":[]}"#);
}

#[test]
fn test_unresolvable_types_are_absent() {
    let mut generic = TypeRecord::new("Box`1", Some("Box`1".into()));
    generic.fields.push(IdentTy::new("value", "!T"));
    let unnamed = TypeRecord::new("!<>c__DisplayClass", None);

    let file = module_file(&document_image(vec![generic, foo_record(), unnamed]));
    let extraction = document_scanner(1).scan_detailed(file.path()).unwrap();

    assert_eq!(extraction.result.collection, vec![foo_record()]);
    assert_eq!(extraction.dropped(), 2);
    assert_eq!(extraction.failures[0].index, 0);
    assert_eq!(extraction.failures[0].cause.kind, NameKind::FieldType);
    assert_eq!(extraction.failures[1].index, 2);
    assert_eq!(extraction.failures[1].cause.kind, NameKind::Type);
}

#[test]
fn test_missing_path_is_load_failure() {
    let err = Scanner::new().scan("/no/such/module.dll").unwrap_err();
    assert!(err.is_load_failure());
    assert!(!err.is_fatal());
}

#[test]
fn test_non_module_is_load_failure() {
    let file = module_file(b"#!/bin/sh\necho not a module\n");
    let err = Scanner::new().scan(file.path()).unwrap_err();
    assert!(err.is_load_failure(), "{err}");
}

#[test]
fn test_clr_module_end_to_end() {
    let mut b = ImageBuilder::new("Shapes.dll");
    let list = b.type_ref("System.Collections.Generic", "List`1");
    b.begin_type("Shapes", "Circle", flags::TYPE_PUBLIC);
    b.field("Radius", flags::MEMBER_PUBLIC, &SigType::Double);
    b.field("secret", flags::MEMBER_PRIVATE, &SigType::Int32);
    b.method(
        "Scale",
        flags::MEMBER_PUBLIC,
        &SigType::Void,
        &[("factor", SigType::Single)],
    );
    b.method(
        "Tags",
        flags::MEMBER_PUBLIC,
        &SigType::GenericInst(list, vec![SigType::String]),
        &[],
    );
    b.begin_type("Shapes", "Hidden", flags::TYPE_NOT_PUBLIC);
    let file = module_file(&b.build());

    let result = Scanner::new().scan(file.path()).unwrap();
    assert_eq!(result.len(), 1);
    let circle = result.find("Shapes.Circle").unwrap();
    assert_eq!(circle.short_name.as_deref(), Some("Circle"));
    assert_eq!(circle.fields, vec![IdentTy::new("Radius", "System.Double")]);
    assert_eq!(circle.methods[0].ident, "Scale");
    assert_eq!(circle.methods[0].return_ty_full_name, "System.Void");
    assert_eq!(circle.methods[0].args, vec![IdentTy::new("factor", "System.Single")]);
    assert_eq!(
        circle.methods[1].return_ty_full_name,
        "System.Collections.Generic.List`1[[System.String]]"
    );
}
