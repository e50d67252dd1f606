//! The read-only program layout exposed after a successful link.

use std::fmt;

use rustc_hash::FxHashMap;
use shadelink_core::{HashedString, IndexError, ParameterCategory, ShaderStage};
use shadelink_registry::TargetFormat;

use crate::type_layout::LayoutRules;

/// Name reported for type parameters declared without one.
pub const ANONYMOUS_TYPE_PARAMETER: &str = "<anonymous>";

/// One top-level shader parameter and where it was placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) category: ParameterCategory,
    pub(crate) binding_index: u32,
    pub(crate) binding_space: u32,
    pub(crate) binding_count: u32,
    pub(crate) size: u32,
    pub(crate) explicit: bool,
    pub(crate) module: String,
}

impl ParameterInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type, e.g. `Texture2D<float4>[4]`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn category(&self) -> ParameterCategory {
        self.category
    }

    /// Slot index, or byte offset for [`ParameterCategory::Uniform`].
    pub fn binding_index(&self) -> u32 {
        self.binding_index
    }

    pub fn binding_space(&self) -> u32 {
        self.binding_space
    }

    /// Number of consecutive slots; arrays claim one per element.
    pub fn binding_count(&self) -> u32 {
        self.binding_count
    }

    /// Bytes occupied by uniform data, or by a constant buffer's contents.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Whether the binding was given in source.
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Name of the module that declared this parameter.
    pub fn module(&self) -> &str {
        &self.module
    }
}

/// A module-level type parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameterInfo {
    pub(crate) name: Option<String>,
    pub(crate) index: u32,
    pub(crate) constraint: Option<String>,
}

impl TypeParameterInfo {
    /// Declared name; `None` for anonymous type parameters.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declared name, or [`ANONYMOUS_TYPE_PARAMETER`].
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or(ANONYMOUS_TYPE_PARAMETER)
    }

    /// Position across all type parameters of the program.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Interface the argument must conform to.
    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }
}

/// A stage input or output of an entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaryingParameter {
    pub name: String,
    pub type_name: String,
    pub semantic: Option<String>,
    /// `VaryingInput` or `VaryingOutput`.
    pub category: ParameterCategory,
    /// Location index; system values (`SV_*`) have none.
    pub location: Option<u32>,
}

/// A `uniform` entry-point parameter, placed in the entry point's own buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointUniform {
    pub name: String,
    pub type_name: String,
    pub offset: u32,
    pub size: u32,
}

/// Layout of one entry point of the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPointLayout {
    pub(crate) name: String,
    pub(crate) module: String,
    pub(crate) stage: ShaderStage,
    pub(crate) thread_group_size: Option<[u32; 3]>,
    pub(crate) inputs: Vec<VaryingParameter>,
    pub(crate) outputs: Vec<VaryingParameter>,
    pub(crate) uniforms: Vec<EntryPointUniform>,
    pub(crate) uniform_buffer_size: u32,
}

impl EntryPointLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Present for stages that dispatch thread groups.
    pub fn thread_group_size(&self) -> Option<[u32; 3]> {
        self.thread_group_size
    }

    pub fn varying_inputs(&self) -> &[VaryingParameter] {
        &self.inputs
    }

    pub fn varying_outputs(&self) -> &[VaryingParameter] {
        &self.outputs
    }

    pub fn uniforms(&self) -> &[EntryPointUniform] {
        &self.uniforms
    }

    /// Size of the buffer holding [`uniforms`](Self::uniforms); zero when there are none.
    pub fn uniform_buffer_size(&self) -> u32 {
        self.uniform_buffer_size
    }
}

/// The implicit buffer holding loose top-level uniforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GlobalConstantBuffer {
    pub size: u32,
    pub binding: u32,
    pub space: u32,
}

/// Reflection of a linked program for one target.
///
/// A layout only exists for programs that composed without errors; it is
/// never partially populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLayout {
    pub(crate) format: TargetFormat,
    pub(crate) rules: LayoutRules,
    pub(crate) parameters: Vec<ParameterInfo>,
    pub(crate) parameter_names: FxHashMap<String, usize>,
    pub(crate) type_parameters: Vec<TypeParameterInfo>,
    pub(crate) entry_points: Vec<EntryPointLayout>,
    pub(crate) hashed_strings: Vec<HashedString>,
    pub(crate) global_constant_buffer: Option<GlobalConstantBuffer>,
}

impl ProgramLayout {
    /// Target format this layout was computed for.
    pub fn format(&self) -> TargetFormat {
        self.format
    }

    /// Packing rules used for uniform data.
    pub fn rules(&self) -> LayoutRules {
        self.rules
    }

    pub fn entry_point_count(&self) -> usize {
        self.entry_points.len()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn hashed_string_count(&self) -> usize {
        self.hashed_strings.len()
    }

    pub fn type_parameter_count(&self) -> usize {
        self.type_parameters.len()
    }

    /// Size in bytes of the implicit global constant buffer; zero when absent.
    pub fn global_constant_buffer_size(&self) -> u32 {
        self.global_constant_buffer.map_or(0, |cb| cb.size)
    }

    /// Binding slot of the implicit global constant buffer, if one exists.
    pub fn global_constant_buffer_binding(&self) -> Option<u32> {
        self.global_constant_buffer.map(|cb| cb.binding)
    }

    /// Binding space of the implicit global constant buffer, if one exists.
    pub fn global_constant_buffer_space(&self) -> Option<u32> {
        self.global_constant_buffer.map(|cb| cb.space)
    }

    /// Parameters in declaration order, first definition wins.
    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    pub fn parameter_by_index(&self, index: usize) -> Result<&ParameterInfo, IndexError> {
        IndexError::check("parameter", index, self.parameters.len()).map(|i| &self.parameters[i])
    }

    pub fn find_parameter(&self, name: &str) -> Option<&ParameterInfo> {
        self.parameter_names
            .get(name)
            .and_then(|&i| self.parameters.get(i))
    }

    pub fn type_parameters(&self) -> &[TypeParameterInfo] {
        &self.type_parameters
    }

    pub fn type_parameter_by_index(&self, index: usize) -> Result<&TypeParameterInfo, IndexError> {
        IndexError::check("type parameter", index, self.type_parameters.len())
            .map(|i| &self.type_parameters[i])
    }

    pub fn find_type_parameter(&self, name: &str) -> Option<&TypeParameterInfo> {
        self.type_parameters.iter().find(|tp| tp.name() == Some(name))
    }

    pub fn entry_points(&self) -> &[EntryPointLayout] {
        &self.entry_points
    }

    pub fn entry_point_by_index(&self, index: usize) -> Result<&EntryPointLayout, IndexError> {
        IndexError::check("entry point", index, self.entry_points.len())
            .map(|i| &self.entry_points[i])
    }

    pub fn find_entry_point(&self, name: &str) -> Option<&EntryPointLayout> {
        self.entry_points.iter().find(|ep| ep.name == name)
    }

    pub fn hashed_strings(&self) -> &[HashedString] {
        &self.hashed_strings
    }

    pub fn hashed_string_by_index(&self, index: usize) -> Result<&HashedString, IndexError> {
        IndexError::check("hashed string", index, self.hashed_strings.len())
            .map(|i| &self.hashed_strings[i])
    }

    pub fn find_hashed_string(&self, value: &str) -> Option<&HashedString> {
        self.hashed_strings.iter().find(|s| s.value == value)
    }
}

impl fmt::Display for ProgramLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Num entrypoint: {}\tNum parameter count: {}\tNum hashed string: {}\tNum type parameter: {}",
            self.entry_point_count(),
            self.parameter_count(),
            self.hashed_string_count(),
            self.type_parameter_count()
        )?;
        write!(
            f,
            "Global constant buffer size: {}\tGlobal constant buffer binding: ",
            self.global_constant_buffer_size()
        )?;
        match self.global_constant_buffer_binding() {
            Some(binding) => writeln!(f, "{}", binding)?,
            None => writeln!(f, "none")?,
        }
        for parameter in &self.parameters {
            writeln!(
                f,
                "[slot={}, space={}, category={}] {}",
                parameter.binding_index,
                parameter.binding_space,
                u32::from(parameter.category),
                parameter.name
            )?;
        }
        for type_parameter in &self.type_parameters {
            writeln!(
                f,
                "[Type Parameter] {} : {}",
                type_parameter.display_name(),
                type_parameter.index
            )?;
        }
        Ok(())
    }
}
