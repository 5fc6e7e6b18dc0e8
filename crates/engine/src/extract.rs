//! Metadata extraction
//!
//! Walks a [`LoadedModule`] and builds the normalized [`ScanResult`]. Every
//! name is resolve-or-fail; a failure anywhere inside a type drops that type
//! only, is recorded as a [`TypeFailure`], and extraction moves on to the
//! next type. Output order is the introspector's enumeration order.

use asminfo_core::{
    IdentTy, LoadedModule, MethodDescriptor, MethodRecord, Resolution, ScanResult,
    TypeDescriptor, TypeRecord, Unresolvable,
};
use tracing::{debug, warn};

/// A type dropped from the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFailure {
    /// Position of the type in enumeration order
    pub index: usize,
    /// Best name known for the type (full name, else short name)
    pub name: Option<String>,
    /// What could not be resolved
    pub cause: Unresolvable,
}

/// Result of extracting one module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Types that extracted completely
    pub result: ScanResult,
    /// Types that were dropped
    pub failures: Vec<TypeFailure>,
}

impl Extraction {
    /// True when no type was dropped
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of dropped types
    pub fn dropped(&self) -> usize {
        self.failures.len()
    }
}

/// Extract every exported type of `module`
pub fn extract(module: &dyn LoadedModule) -> Extraction {
    let mut extraction = Extraction::default();

    for (index, ty) in module.exported_types().iter().enumerate() {
        match extract_type(ty.as_ref()) {
            Ok(record) => extraction.result.push(record),
            Err(cause) => {
                let name = ty.full_name().ok().or_else(|| ty.short_name());
                match &name {
                    Some(name) => debug!(index, type_name = %name, %cause, "dropping type"),
                    None => debug!(index, %cause, "dropping unnamed type"),
                }
                extraction.failures.push(TypeFailure { index, name, cause });
            }
        }
    }

    if !extraction.is_complete() {
        warn!(
            extracted = extraction.result.len(),
            dropped = extraction.dropped(),
            "some types could not be resolved"
        );
    }
    extraction
}

fn extract_type(ty: &dyn TypeDescriptor) -> Resolution<TypeRecord> {
    let mut record = TypeRecord::new(ty.full_name()?, ty.short_name());

    for field in ty.fields()? {
        record
            .fields
            .push(IdentTy::new(field.ident()?, field.ty_full_name()?));
    }
    for method in ty.methods()? {
        record.methods.push(extract_method(method.as_ref())?);
    }
    Ok(record)
}

fn extract_method(method: &dyn MethodDescriptor) -> Resolution<MethodRecord> {
    let ident = method.ident()?;
    let mut args = Vec::new();
    for param in method.params()? {
        args.push(IdentTy::new(param.ident()?, param.ty_full_name()?));
    }
    Ok(MethodRecord {
        ident,
        args,
        return_ty_full_name: method.return_ty_full_name()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use asminfo_core::{MemberDescriptor, NameKind};

    // Minimal in-memory descriptors; names prefixed with '!' fail to resolve.

    fn resolve(name: &str, kind: NameKind) -> Resolution<String> {
        match name.strip_prefix('!') {
            Some(rest) => Err(Unresolvable::new(kind, format!("open generic {rest}"))),
            None => Ok(name.to_string()),
        }
    }

    struct Member(&'static str, &'static str);

    impl MemberDescriptor for Member {
        fn ident(&self) -> Resolution<String> {
            resolve(self.0, NameKind::Field)
        }
        fn ty_full_name(&self) -> Resolution<String> {
            resolve(self.1, NameKind::FieldType)
        }
    }

    struct Method(&'static str, Vec<(&'static str, &'static str)>, &'static str);

    impl MethodDescriptor for Method {
        fn ident(&self) -> Resolution<String> {
            resolve(self.0, NameKind::Method)
        }
        fn return_ty_full_name(&self) -> Resolution<String> {
            resolve(self.2, NameKind::ReturnType)
        }
        fn params(&self) -> Resolution<Vec<Box<dyn MemberDescriptor + '_>>> {
            Ok(self
                .1
                .iter()
                .map(|&(n, t)| Box::new(Member(n, t)) as Box<dyn MemberDescriptor>)
                .collect())
        }
    }

    struct Type {
        name: &'static str,
        fields: Vec<(&'static str, &'static str)>,
        methods: Vec<Method>,
    }

    impl TypeDescriptor for Type {
        fn full_name(&self) -> Resolution<String> {
            resolve(self.name, NameKind::Type)
        }
        fn short_name(&self) -> Option<String> {
            Some(self.name.trim_start_matches('!').to_string())
        }
        fn fields(&self) -> Resolution<Vec<Box<dyn MemberDescriptor + '_>>> {
            Ok(self
                .fields
                .iter()
                .map(|&(n, t)| Box::new(Member(n, t)) as Box<dyn MemberDescriptor>)
                .collect())
        }
        fn methods(&self) -> Resolution<Vec<Box<dyn MethodDescriptor + '_>>> {
            Ok(self
                .methods
                .iter()
                .map(|m| Box::new(Method(m.0, m.1.clone(), m.2)) as Box<dyn MethodDescriptor>)
                .collect())
        }
    }

    struct Module(Vec<Type>);

    impl LoadedModule for Module {
        fn exported_types(&self) -> Vec<Box<dyn TypeDescriptor + '_>> {
            self.0
                .iter()
                .map(|t| {
                    Box::new(Type {
                        name: t.name,
                        fields: t.fields.clone(),
                        methods: t
                            .methods
                            .iter()
                            .map(|m| Method(m.0, m.1.clone(), m.2))
                            .collect(),
                    }) as Box<dyn TypeDescriptor>
                })
                .collect()
        }
    }

    fn plain(name: &'static str) -> Type {
        Type {
            name,
            fields: vec![],
            methods: vec![],
        }
    }

    #[test]
    fn test_empty_module() {
        let extraction = extract(&Module(vec![]));
        assert!(extraction.result.is_empty());
        assert!(extraction.is_complete());
        assert_eq!(extraction.result.to_json().unwrap(), r#"{"collection":[]}"#);
    }

    #[test]
    fn test_foo() {
        let module = Module(vec![Type {
            name: "Foo",
            fields: vec![("x", "Int32")],
            methods: vec![Method("Bar", vec![("y", "String")], "Boolean")],
        }]);
        let extraction = extract(&module);
        assert_eq!(
            extraction.result.to_json().unwrap(),
            r#"{"collection":[{"full_name":"Foo","short_name":"Foo","fields":[{"ident":"x","ty_full_name":"Int32"}],"methods":[{"ident":"Bar","args":[{"ident":"y","ty_full_name":"String"}],"return_ty_full_name":"Boolean"}]}]}"#
        );
    }

    #[test]
    fn test_unresolvable_type_name_drops_type() {
        let module = Module(vec![plain("A"), plain("!T"), plain("C")]);
        let extraction = extract(&module);
        let names: Vec<_> = extraction
            .result
            .collection
            .iter()
            .map(|t| t.full_name.as_str())
            .collect();
        assert_eq!(names, ["A", "C"]);
        assert_eq!(extraction.dropped(), 1);
        let failure = &extraction.failures[0];
        assert_eq!(failure.index, 1);
        assert_eq!(failure.name.as_deref(), Some("T"));
        assert_eq!(failure.cause.kind, NameKind::Type);
    }

    #[test]
    fn test_unresolvable_member_drops_only_its_type() {
        let module = Module(vec![
            Type {
                name: "Good",
                fields: vec![("a", "Int32")],
                methods: vec![],
            },
            Type {
                name: "BadField",
                fields: vec![("ok", "Int32"), ("value", "!T")],
                methods: vec![],
            },
            Type {
                name: "BadParam",
                fields: vec![],
                methods: vec![Method("Map", vec![("f", "!!U")], "Void")],
            },
            Type {
                name: "BadReturn",
                fields: vec![],
                methods: vec![Method("Get", vec![], "!T")],
            },
            plain("AlsoGood"),
        ]);
        let extraction = extract(&module);
        assert_eq!(extraction.result.len(), 2);
        assert!(extraction.result.find("Good").is_some());
        assert!(extraction.result.find("AlsoGood").is_some());

        let kinds: Vec<_> = extraction.failures.iter().map(|f| f.cause.kind).collect();
        assert_eq!(
            kinds,
            [NameKind::FieldType, NameKind::FieldType, NameKind::ReturnType]
        );
        let indices: Vec<_> = extraction.failures.iter().map(|f| f.index).collect();
        assert_eq!(indices, [1, 2, 3]);
    }

    #[test]
    fn test_order_is_enumeration_order() {
        let module = Module(vec![plain("Zeta"), plain("Alpha"), plain("Mid")]);
        let names: Vec<_> = extract(&module)
            .result
            .collection
            .into_iter()
            .map(|t| t.full_name)
            .collect();
        assert_eq!(names, ["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let module = Module(vec![plain("Same"), plain("Same")]);
        assert_eq!(extract(&module).result.len(), 2);
    }
}
