//! Global capability registry for shadelink.
//!
//! This crate holds the read-only catalog sessions are configured against:
//! named compilation profiles, target formats and the capabilities of each
//! format. Sessions query it when they are created and never mutate it.

mod profile;
mod registry;
mod target;

pub use profile::{Profile, ProfileFamily, ProfileId};
pub use registry::Registry;
pub use target::{
    BindingModel, LayoutOverrides, MatrixLayout, ResolvedTarget, TargetCaps, TargetDesc,
    TargetFlags, TargetFormat,
};
