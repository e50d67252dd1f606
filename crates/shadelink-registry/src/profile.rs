//! Compilation profiles.

use std::fmt;

/// Identifies a profile inside a [`Registry`](crate::Registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileId(u32);

impl ProfileId {
    #[inline]
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the underlying index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "profile_{}", self.0)
    }
}

/// Language family a profile belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileFamily {
    Spirv,
    Glsl,
    Hlsl,
    Metal,
    Wgsl,
}

/// A named profile with its family and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: ProfileId,
    pub name: &'static str,
    pub family: ProfileFamily,
    /// Major and minor version within the family.
    pub version: (u8, u8),
}

/// Built-in catalog: name, family, version.
pub(crate) const BUILTIN_PROFILES: &[(&str, ProfileFamily, (u8, u8))] = &[
    ("spirv_1_0", ProfileFamily::Spirv, (1, 0)),
    ("spirv_1_1", ProfileFamily::Spirv, (1, 1)),
    ("spirv_1_2", ProfileFamily::Spirv, (1, 2)),
    ("spirv_1_3", ProfileFamily::Spirv, (1, 3)),
    ("spirv_1_4", ProfileFamily::Spirv, (1, 4)),
    ("spirv_1_5", ProfileFamily::Spirv, (1, 5)),
    ("spirv_1_6", ProfileFamily::Spirv, (1, 6)),
    ("glsl_450", ProfileFamily::Glsl, (4, 50)),
    ("glsl_460", ProfileFamily::Glsl, (4, 60)),
    ("sm_5_0", ProfileFamily::Hlsl, (5, 0)),
    ("sm_5_1", ProfileFamily::Hlsl, (5, 1)),
    ("sm_6_0", ProfileFamily::Hlsl, (6, 0)),
    ("sm_6_1", ProfileFamily::Hlsl, (6, 1)),
    ("sm_6_2", ProfileFamily::Hlsl, (6, 2)),
    ("sm_6_3", ProfileFamily::Hlsl, (6, 3)),
    ("sm_6_4", ProfileFamily::Hlsl, (6, 4)),
    ("sm_6_5", ProfileFamily::Hlsl, (6, 5)),
    ("sm_6_6", ProfileFamily::Hlsl, (6, 6)),
    ("sm_6_7", ProfileFamily::Hlsl, (6, 7)),
    ("metal_2_3", ProfileFamily::Metal, (2, 3)),
    ("metal_3_0", ProfileFamily::Metal, (3, 0)),
    ("wgsl", ProfileFamily::Wgsl, (1, 0)),
];
