//! Attribute flag values read from the TypeDef, Field and MethodDef tables

/// `TypeAttributes.VisibilityMask`
pub const TYPE_VISIBILITY_MASK: u32 = 0x0000_0007;
/// Top-level type not visible outside its assembly
pub const TYPE_NOT_PUBLIC: u32 = 0x0000_0000;
/// Top-level public type
pub const TYPE_PUBLIC: u32 = 0x0000_0001;
/// Nested type visible wherever its enclosing type is
pub const TYPE_NESTED_PUBLIC: u32 = 0x0000_0002;
/// Nested private type
pub const TYPE_NESTED_PRIVATE: u32 = 0x0000_0003;

/// `FieldAttributes.FieldAccessMask` / `MethodAttributes.MemberAccessMask`
pub const MEMBER_ACCESS_MASK: u16 = 0x0007;
/// Private member
pub const MEMBER_PRIVATE: u16 = 0x0001;
/// Internal member
pub const MEMBER_ASSEMBLY: u16 = 0x0003;
/// Protected member
pub const MEMBER_FAMILY: u16 = 0x0004;
/// Public member
pub const MEMBER_PUBLIC: u16 = 0x0006;
/// Static field or method
pub const MEMBER_STATIC: u16 = 0x0010;
/// Compile-time constant field
pub const FIELD_LITERAL: u16 = 0x0040;
/// Method with a special name (accessors, operators, constructors)
pub const METHOD_SPECIAL_NAME: u16 = 0x0800;
/// Runtime-special name (constructors)
pub const METHOD_RT_SPECIAL_NAME: u16 = 0x1000;

/// Instance constructor name
pub const CONSTRUCTOR: &str = ".ctor";
/// Static constructor name
pub const TYPE_INITIALIZER: &str = ".cctor";

/// Whether a member's access bits mark it public
pub fn is_public_member(flags: u16) -> bool {
    flags & MEMBER_ACCESS_MASK == MEMBER_PUBLIC
}
