//! Target formats, capability flags and target descriptors.

use std::fmt;

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::ProfileId;

/// Output formats a session can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum TargetFormat {
    Spirv = 0,
    SpirvAsm = 1,
    Glsl = 2,
    Hlsl = 3,
    Dxil = 4,
    Dxbc = 5,
    Metal = 6,
    Wgsl = 7,
}

impl TargetFormat {
    /// Every format, in numeric order.
    pub const ALL: [TargetFormat; 8] = [
        TargetFormat::Spirv,
        TargetFormat::SpirvAsm,
        TargetFormat::Glsl,
        TargetFormat::Hlsl,
        TargetFormat::Dxil,
        TargetFormat::Dxbc,
        TargetFormat::Metal,
        TargetFormat::Wgsl,
    ];

    /// Short lowercase name, as accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            TargetFormat::Spirv => "spirv",
            TargetFormat::SpirvAsm => "spirv-asm",
            TargetFormat::Glsl => "glsl",
            TargetFormat::Hlsl => "hlsl",
            TargetFormat::Dxil => "dxil",
            TargetFormat::Dxbc => "dxbc",
            TargetFormat::Metal => "metal",
            TargetFormat::Wgsl => "wgsl",
        }
    }

    /// Parse a short name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Per-target code generation flags requested by the session.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TargetFlags: u32 {
        /// Emit SPIR-V without going through GLSL.
        const GENERATE_SPIRV_DIRECTLY = 1 << 0;
        /// Compile all entry points into one output.
        const GENERATE_WHOLE_PROGRAM = 1 << 1;
        /// Dump intermediate representation while compiling.
        const DUMP_IR = 1 << 2;
    }
}

bitflags! {
    /// What a target format can do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TargetCaps: u32 {
        /// Resources bind to `(binding, set)` descriptor slots.
        const DESCRIPTOR_SETS = 1 << 0;
        /// Resources bind to per-class registers (`b`, `t`, `u`, `s`).
        const REGISTER_CLASSES = 1 << 1;
        /// Supports [`TargetFlags::GENERATE_SPIRV_DIRECTLY`].
        const DIRECT_SPIRV = 1 << 2;
        /// Supports [`TargetFlags::GENERATE_WHOLE_PROGRAM`].
        const WHOLE_PROGRAM = 1 << 3;
        /// Output is binary rather than source text.
        const BINARY = 1 << 4;
    }
}

impl TargetCaps {
    /// Flags a target with these capabilities accepts.
    pub fn supported_flags(self) -> TargetFlags {
        let mut flags = TargetFlags::DUMP_IR;
        if self.contains(TargetCaps::DIRECT_SPIRV) {
            flags |= TargetFlags::GENERATE_SPIRV_DIRECTLY;
        }
        if self.contains(TargetCaps::WHOLE_PROGRAM) {
            flags |= TargetFlags::GENERATE_WHOLE_PROGRAM;
        }
        flags
    }
}

/// How parameters are assigned binding slots on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingModel {
    /// One slot counter per descriptor set.
    DescriptorSets,
    /// One counter per register class and space.
    RegisterClasses,
}

/// Matrix storage order inside buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatrixLayout {
    #[default]
    ColumnMajor,
    RowMajor,
}

/// Buffer layout overrides for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayoutOverrides {
    /// Use scalar (C-like) packing for uniform and storage buffers.
    pub force_scalar_buffer_layout: bool,
    pub matrix_layout: MatrixLayout,
}

/// One compilation target requested by a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub format: TargetFormat,
    /// Profile name, resolved against the registry when the session is created.
    pub profile: String,
    pub flags: TargetFlags,
    pub layout: LayoutOverrides,
}

impl TargetDesc {
    /// A target with default flags and layout.
    pub fn new(format: TargetFormat, profile: impl Into<String>) -> Self {
        Self {
            format,
            profile: profile.into(),
            flags: TargetFlags::empty(),
            layout: LayoutOverrides::default(),
        }
    }

    /// Set code generation flags.
    pub fn with_flags(mut self, flags: TargetFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Force scalar buffer layout.
    pub fn with_scalar_layout(mut self) -> Self {
        self.layout.force_scalar_buffer_layout = true;
        self
    }

    /// Set the matrix storage order.
    pub fn with_matrix_layout(mut self, layout: MatrixLayout) -> Self {
        self.layout.matrix_layout = layout;
        self
    }
}

/// A target whose profile has been resolved against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub desc: TargetDesc,
    pub profile: ProfileId,
    pub caps: TargetCaps,
}

impl ResolvedTarget {
    /// Binding model implied by the format's capabilities.
    pub fn binding_model(&self) -> BindingModel {
        if self.caps.contains(TargetCaps::REGISTER_CLASSES) {
            BindingModel::RegisterClasses
        } else {
            BindingModel::DescriptorSets
        }
    }

    pub fn format(&self) -> TargetFormat {
        self.desc.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_round_trip() {
        for format in TargetFormat::ALL {
            assert_eq!(TargetFormat::from_name(format.name()), Some(format));
        }
        assert_eq!(TargetFormat::from_name("ptx"), None);
    }

    #[test]
    fn format_numeric_values() {
        let raw: u32 = TargetFormat::Metal.into();
        assert_eq!(raw, 6);
        assert_eq!(TargetFormat::try_from(0u32).ok(), Some(TargetFormat::Spirv));
        assert!(TargetFormat::try_from(99u32).is_err());
    }

    #[test]
    fn supported_flags_follow_caps() {
        let caps = TargetCaps::DESCRIPTOR_SETS | TargetCaps::DIRECT_SPIRV;
        let flags = caps.supported_flags();
        assert!(flags.contains(TargetFlags::GENERATE_SPIRV_DIRECTLY));
        assert!(!flags.contains(TargetFlags::GENERATE_WHOLE_PROGRAM));
        assert!(flags.contains(TargetFlags::DUMP_IR));
    }

    #[test]
    fn desc_builders() {
        let desc = TargetDesc::new(TargetFormat::Spirv, "spirv_1_6")
            .with_flags(TargetFlags::GENERATE_WHOLE_PROGRAM)
            .with_scalar_layout();
        assert!(desc.layout.force_scalar_buffer_layout);
        assert_eq!(desc.flags, TargetFlags::GENERATE_WHOLE_PROGRAM);
        assert_eq!(desc.layout.matrix_layout, MatrixLayout::ColumnMajor);
    }
}
