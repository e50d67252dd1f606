//! Composition and reflection for shadelink.
//!
//! The [`Composer`] merges modules and entry points into a
//! [`LinkedProgram`], reporting conflicts, unresolved references and binding
//! collisions as typed [`LinkError`](shadelink_core::LinkError)s. Each
//! complete program carries one [`ProgramLayout`] per target.

mod binding;
mod composer;
mod layout;
mod reflection;
mod type_layout;

pub use binding::{BindingAllocator, ClaimError, Collision, SlotKey};
pub use composer::{
    Composer, Constituent, EntryPointKey, LinkOptions, LinkResult, LinkedProgram, ModuleKey,
    ModuleSource, UnresolvedSymbol,
};
pub use reflection::{
    ANONYMOUS_TYPE_PARAMETER, EntryPointLayout, EntryPointUniform, ParameterInfo, ProgramLayout,
    TypeParameterInfo, VaryingParameter,
};
pub use type_layout::{BufferBuilder, LayoutCalculator, LayoutRules, StructSource, TypeLayout};
