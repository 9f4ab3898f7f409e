// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Compile-time member introspection (C1).
//!
//! A [`Target`] advertises its checksummable members through a `&'static
//! [Member]` table. The table is normally produced by
//! `#[derive(gop_derive::Protect)]`; it can also be written by hand for
//! targets that want full control over participation.

/// The storage variant a member (or a whole target) belongs to.
///
/// This is diagnostic metadata only: which wrapper a target ends up
/// behind (`Protected<T, ..>` vs `StaticProtected<T, ..>`) is a choice
/// made at the call site, not a property `#[derive(Protect)]` can see
/// ahead of time, so it does not gate participation (see
/// [`Member::participates`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Lives inside a per-instance `Protected<T, ..>`.
    Instance,
    /// Lives inside a process-wide `StaticProtected<T, ..>`.
    Static,
}

/// Visibility of a member, as seen from outside the target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Only reachable from within the target's own module (default Rust
    /// field visibility). Participates by default.
    Private,
    /// Reachable from outside the target's module (`pub`). Participates
    /// only when the `public-members` feature is enabled.
    Public,
}

/// Structural kind of a member, used by the §4.2 participation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A plain scalar (integer, float, bool, enum with a fixed
    /// representation).
    Scalar,
    /// A fixed-length array of scalars.
    ScalarArray,
    /// A nested record type (another struct/enum holding more than one
    /// primitive field). Never participates.
    Record,
    /// An unsized trailing array. Rejected at build time for per-instance
    /// targets (§4.1); the derive macro never emits this variant, it only
    /// exists so hand-written tables can describe why a field was skipped.
    UnsizedArray,
}

/// One entry of a target's member table.
///
/// `name` is diagnostic only and never affects generate/check/repair
/// behaviour.
#[derive(Debug, Clone, Copy)]
pub struct Member {
    /// Field name, for logging only.
    pub name: &'static str,
    /// Byte offset of this member within `T`.
    pub offset: usize,
    /// `size_of` this member, in bytes.
    pub size: usize,
    /// Structural kind.
    pub kind: Kind,
    /// Declared visibility.
    pub visibility: Visibility,
    /// Storage variant this member belongs to.
    pub variant: Variant,
    /// Whether this member is declared `const` (never changes after
    /// construction; excluded regardless of kind/visibility).
    pub is_const: bool,
}

impl Member {
    /// Applies the §4.2 participation rule for the instance variant.
    ///
    /// `allow_public` mirrors the `public-members` cargo feature: when
    /// false (the default), public members are excluded even if otherwise
    /// eligible.
    pub const fn participates(&self, allow_public: bool) -> bool {
        if self.is_const {
            return false;
        }
        if !matches!(self.kind, Kind::Scalar | Kind::ScalarArray) {
            return false;
        }
        if matches!(self.visibility, Visibility::Public) && !allow_public {
            return false;
        }
        true
    }
}

/// A target type's static description: its member table and a per-type
/// hash seed (see SPEC_FULL.md §"Per-target `HASHCODE`").
///
/// Implemented by `#[derive(gop_derive::Protect)]`. `T` must be
/// `#[repr(C)]` so that `offset`/`size` in [`Member`] are meaningful and
/// stable.
///
/// # Safety
///
/// Implementors must guarantee that every [`Member`] in `MEMBERS` with
/// `variant == Variant::Instance` describes a byte range that lies fully
/// within `size_of::<Self>()` and does not overlap any padding the type
/// depends on for validity (e.g. no byte of a `bool` member may fall
/// outside `{0, 1}` after a raw byte copy). This holds automatically for
/// plain integers, floats and arrays thereof, which is exactly the set
/// the planner (`Kind::Scalar` / `Kind::ScalarArray`) allows through.
pub unsafe trait ChecksummedLayout: Sized {
    /// The full member table, instance and static members intermixed.
    const MEMBERS: &'static [Member];
    /// A stable, type-specific hash used to seed the SUM+DMR accumulator.
    const HASHCODE: u32;
}

/// Marker trait for types that may be wrapped in `Protected<T, ..>`.
///
/// Separate from [`ChecksummedLayout`] so that hand-written impls can
/// override the per-target flags without re-deriving the member table.
pub trait Target: ChecksummedLayout {
    /// Whether instances of this target are wrapped with a counting lock.
    const SYNCHRONIZED: bool = false;
    /// Whether `generate` may run from a `&self` (const) method.
    const MEMBERS_MUTABLE: bool = false;
}
