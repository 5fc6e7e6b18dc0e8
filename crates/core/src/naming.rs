//! Key naming policy for the exported JSON document
//!
//! Downstream consumers parse the scan document by key, so key spelling is a
//! frozen contract. Keys are derived mechanically from the conceptual
//! PascalCase attribute names:
//!
//! | Attribute | JSON key |
//! |-----------|----------|
//! | `FullName` | `full_name` |
//! | `ShortName` | `short_name` |
//! | `TyFullName` | `ty_full_name` |
//! | `ReturnTyFullName` | `return_ty_full_name` |
//!
//! Every model type lists its attribute names in declaration order
//! (`ATTRIBUTES`), and its serialized keys must equal
//! `ATTRIBUTES.map(snake_case)` in the same order.

/// Convert a PascalCase or camelCase attribute name to its JSON key.
///
/// An underscore is inserted before every ASCII uppercase letter that is not
/// the first character, then the whole name is lowercased.
///
/// ```
/// use asminfo_core::naming::snake_case;
///
/// assert_eq!(snake_case("ReturnTyFullName"), "return_ty_full_name");
/// assert_eq!(snake_case("collection"), "collection");
/// ```
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if i > 0 && ch.is_ascii_uppercase() {
            out.push('_');
        }
        out.extend(ch.to_lowercase());
    }
    out
}

/// JSON keys for a list of attribute names, in order.
pub fn keys_for(attributes: &[&str]) -> Vec<String> {
    attributes.iter().map(|a| snake_case(a)).collect()
}
