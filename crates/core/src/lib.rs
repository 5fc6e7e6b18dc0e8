//! Core types for asminfo
//!
//! This crate defines the pieces every other layer agrees on:
//! - [`model`]: the normalized exchange schema ([`ScanResult`], [`TypeRecord`],
//!   [`IdentTy`], [`MethodRecord`])
//! - [`naming`]: the mechanical PascalCase → snake_case key policy
//! - [`introspect`]: the Type System Introspector contract and [`LoadContext`]
//! - [`error`]: [`Unresolvable`] (recovered locally) and [`ScanError`]
//!   (surfaced to callers)
//! - [`types`]: identifiers such as [`ContextId`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod introspect;
pub mod model;
pub mod naming;
pub mod types;

pub use error::{NameKind, Resolution, ScanError, Unresolvable};
pub use introspect::{
    Introspector, LoadContext, LoadedModule, MemberDescriptor, MethodDescriptor, TypeDescriptor,
};
pub use model::{IdentTy, MethodRecord, ScanResult, TypeRecord};
pub use types::ContextId;
