//! The shader type model shared by the front end, composer and reflection.
//!
//! Types are value-like and compare structurally, which is what conflict
//! detection relies on: two global declarations are compatible exactly when
//! their [`ShaderType`]s are equal.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Scalar element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    Uint,
    Half,
    Float,
    Double,
}

impl ScalarKind {
    /// Look up a scalar by its source spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => ScalarKind::Bool,
            "int" => ScalarKind::Int,
            "uint" => ScalarKind::Uint,
            "half" => ScalarKind::Half,
            "float" => ScalarKind::Float,
            "double" => ScalarKind::Double,
            _ => return None,
        })
    }

    /// Source spelling.
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Half => "half",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
        }
    }

    /// Size in bytes inside a uniform buffer. `bool` occupies 32 bits.
    pub fn size(self) -> u32 {
        match self {
            ScalarKind::Half => 2,
            ScalarKind::Double => 8,
            _ => 4,
        }
    }
}

/// Resource categories as exposed by reflection.
///
/// The numeric values are stable and used by the `shadelink-reflect` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum ParameterCategory {
    /// Plain data living in a constant buffer; the binding index is a byte offset.
    Uniform = 0,
    /// A constant buffer binding (`b` registers).
    ConstantBuffer = 1,
    /// Read-only resource (`t` registers).
    ShaderResource = 2,
    /// Read-write resource (`u` registers).
    UnorderedAccess = 3,
    /// Sampler state (`s` registers).
    Sampler = 4,
    /// Stage input.
    VaryingInput = 5,
    /// Stage output.
    VaryingOutput = 6,
}

impl ParameterCategory {
    /// The register class a resource of this category binds to, if any.
    pub fn register_class(self) -> Option<RegisterClass> {
        match self {
            ParameterCategory::ConstantBuffer => Some(RegisterClass::B),
            ParameterCategory::ShaderResource => Some(RegisterClass::T),
            ParameterCategory::UnorderedAccess => Some(RegisterClass::U),
            ParameterCategory::Sampler => Some(RegisterClass::S),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParameterCategory::Uniform => "Uniform",
            ParameterCategory::ConstantBuffer => "ConstantBuffer",
            ParameterCategory::ShaderResource => "ShaderResource",
            ParameterCategory::UnorderedAccess => "UnorderedAccess",
            ParameterCategory::Sampler => "SamplerState",
            ParameterCategory::VaryingInput => "VaryingInput",
            ParameterCategory::VaryingOutput => "VaryingOutput",
        })
    }
}

/// D3D-style register classes used by `register(...)` bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterClass {
    B,
    T,
    U,
    S,
}

impl RegisterClass {
    /// Parse the register letter.
    pub fn from_letter(letter: char) -> Option<Self> {
        Some(match letter.to_ascii_lowercase() {
            'b' => RegisterClass::B,
            't' => RegisterClass::T,
            'u' => RegisterClass::U,
            's' => RegisterClass::S,
            _ => return None,
        })
    }

    /// The register letter.
    pub fn letter(self) -> char {
        match self {
            RegisterClass::B => 'b',
            RegisterClass::T => 't',
            RegisterClass::U => 'u',
            RegisterClass::S => 's',
        }
    }
}

/// Built-in resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture1D,
    Texture2D,
    Texture3D,
    TextureCube,
    Texture2DArray,
    RWTexture1D,
    RWTexture2D,
    RWTexture3D,
    RWTexture2DArray,
    Buffer,
    RWBuffer,
    StructuredBuffer,
    RWStructuredBuffer,
    ByteAddressBuffer,
    RWByteAddressBuffer,
    ConstantBuffer,
    SamplerState,
    SamplerComparisonState,
    RaytracingAccelerationStructure,
}

/// How many generic arguments a resource type takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericArity {
    None,
    Optional,
    Required,
}

const RESOURCE_NAMES: &[(&str, ResourceKind)] = &[
    ("Texture1D", ResourceKind::Texture1D),
    ("Texture2D", ResourceKind::Texture2D),
    ("Texture3D", ResourceKind::Texture3D),
    ("TextureCube", ResourceKind::TextureCube),
    ("Texture2DArray", ResourceKind::Texture2DArray),
    ("RWTexture1D", ResourceKind::RWTexture1D),
    ("RWTexture2D", ResourceKind::RWTexture2D),
    ("RWTexture3D", ResourceKind::RWTexture3D),
    ("RWTexture2DArray", ResourceKind::RWTexture2DArray),
    ("Buffer", ResourceKind::Buffer),
    ("RWBuffer", ResourceKind::RWBuffer),
    ("StructuredBuffer", ResourceKind::StructuredBuffer),
    ("RWStructuredBuffer", ResourceKind::RWStructuredBuffer),
    ("ByteAddressBuffer", ResourceKind::ByteAddressBuffer),
    ("RWByteAddressBuffer", ResourceKind::RWByteAddressBuffer),
    ("ConstantBuffer", ResourceKind::ConstantBuffer),
    ("SamplerState", ResourceKind::SamplerState),
    ("SamplerComparisonState", ResourceKind::SamplerComparisonState),
    (
        "RaytracingAccelerationStructure",
        ResourceKind::RaytracingAccelerationStructure,
    ),
];

impl ResourceKind {
    /// Look up a resource type by name.
    pub fn from_name(name: &str) -> Option<Self> {
        RESOURCE_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, kind)| *kind)
    }

    /// Source spelling.
    pub fn name(self) -> &'static str {
        RESOURCE_NAMES
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(n, _)| *n)
            .unwrap_or("<resource>")
    }

    /// Reflection category of this resource.
    pub fn category(self) -> ParameterCategory {
        use ResourceKind::*;
        match self {
            ConstantBuffer => ParameterCategory::ConstantBuffer,
            SamplerState | SamplerComparisonState => ParameterCategory::Sampler,
            RWTexture1D | RWTexture2D | RWTexture3D | RWTexture2DArray | RWBuffer
            | RWStructuredBuffer | RWByteAddressBuffer => ParameterCategory::UnorderedAccess,
            _ => ParameterCategory::ShaderResource,
        }
    }

    /// Generic argument requirements.
    pub fn generic_arity(self) -> GenericArity {
        use ResourceKind::*;
        match self {
            StructuredBuffer | RWStructuredBuffer | ConstantBuffer => GenericArity::Required,
            Texture1D | Texture2D | Texture3D | TextureCube | Texture2DArray | RWTexture1D
            | RWTexture2D | RWTexture3D | RWTexture2DArray | Buffer | RWBuffer => {
                GenericArity::Optional
            }
            _ => GenericArity::None,
        }
    }
}

/// A resolved shader type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Void,
    Scalar(ScalarKind),
    /// Element kind and component count (2..=4).
    Vector(ScalarKind, u8),
    /// Element kind, rows and columns (each 1..=4).
    Matrix(ScalarKind, u8, u8),
    /// A user struct, referenced by name.
    Struct(String),
    /// An interface, referenced by name.
    Interface(String),
    /// A module-level type parameter, referenced by name.
    TypeParam(String),
    Resource {
        kind: ResourceKind,
        element: Option<Box<ShaderType>>,
    },
    /// Fixed-size array.
    Array(Box<ShaderType>, u32),
}

impl ShaderType {
    /// Resolve a built-in, non-generic type name such as `float4x4` or `uint2`.
    ///
    /// Resources are not handled here because they may take generic arguments.
    pub fn builtin(name: &str) -> Option<Self> {
        if name == "void" {
            return Some(ShaderType::Void);
        }
        if let Some(scalar) = ScalarKind::from_name(name) {
            return Some(ShaderType::Scalar(scalar));
        }

        let split = name.find(|c: char| c.is_ascii_digit())?;
        let scalar = ScalarKind::from_name(&name[..split])?;
        let dims = name[split..].as_bytes();
        let dim = |b: u8| matches!(b, b'1'..=b'4').then(|| b - b'0');
        match dims {
            [n] => {
                let n = dim(*n)?;
                Some(if n == 1 {
                    ShaderType::Scalar(scalar)
                } else {
                    ShaderType::Vector(scalar, n)
                })
            }
            [r, b'x', c] => Some(ShaderType::Matrix(scalar, dim(*r)?, dim(*c)?)),
            _ => None,
        }
    }

    /// Strip array dimensions.
    pub fn base(&self) -> &ShaderType {
        match self {
            ShaderType::Array(inner, _) => inner.base(),
            other => other,
        }
    }

    /// Total number of elements across array dimensions (1 for non-arrays).
    ///
    /// `None` when the product does not fit in a `u32`.
    pub fn element_count(&self) -> Option<u32> {
        match self {
            ShaderType::Array(inner, count) => count.checked_mul(inner.element_count()?),
            _ => Some(1),
        }
    }

    /// Resource kind, looking through arrays.
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        match self.base() {
            ShaderType::Resource { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether values of this type consume binding slots rather than bytes.
    pub fn is_resource(&self) -> bool {
        self.resource_kind().is_some()
    }

    /// Whether this is plain data that can live in a constant buffer.
    pub fn is_data(&self) -> bool {
        matches!(
            self.base(),
            ShaderType::Scalar(_)
                | ShaderType::Vector(..)
                | ShaderType::Matrix(..)
                | ShaderType::Struct(_)
        )
    }

    /// Reflection category for a top-level parameter of this type.
    pub fn category(&self) -> ParameterCategory {
        self.resource_kind()
            .map(ResourceKind::category)
            .unwrap_or(ParameterCategory::Uniform)
    }
}

impl fmt::Display for ShaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderType::Void => f.write_str("void"),
            ShaderType::Scalar(s) => f.write_str(s.name()),
            ShaderType::Vector(s, n) => write!(f, "{}{}", s.name(), n),
            ShaderType::Matrix(s, r, c) => write!(f, "{}{}x{}", s.name(), r, c),
            ShaderType::Struct(name) | ShaderType::Interface(name) | ShaderType::TypeParam(name) => {
                f.write_str(name)
            }
            ShaderType::Resource { kind, element } => match element {
                Some(element) => write!(f, "{}<{}>", kind.name(), element),
                None => f.write_str(kind.name()),
            },
            ShaderType::Array(inner, n) => write!(f, "{}[{}]", inner, n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_vectors_and_matrices() {
        assert_eq!(
            ShaderType::builtin("float4"),
            Some(ShaderType::Vector(ScalarKind::Float, 4))
        );
        assert_eq!(
            ShaderType::builtin("half3x2"),
            Some(ShaderType::Matrix(ScalarKind::Half, 3, 2))
        );
        assert_eq!(
            ShaderType::builtin("uint1"),
            Some(ShaderType::Scalar(ScalarKind::Uint))
        );
        assert_eq!(ShaderType::builtin("float5"), None);
        assert_eq!(ShaderType::builtin("Texture2D"), None);
        assert_eq!(ShaderType::builtin("void"), Some(ShaderType::Void));
    }

    #[test]
    fn resource_categories() {
        assert_eq!(
            ResourceKind::RWStructuredBuffer.category(),
            ParameterCategory::UnorderedAccess
        );
        assert_eq!(
            ResourceKind::Texture2D.category(),
            ParameterCategory::ShaderResource
        );
        assert_eq!(
            ResourceKind::SamplerComparisonState.category(),
            ParameterCategory::Sampler
        );
        assert_eq!(
            ParameterCategory::Sampler.register_class(),
            Some(RegisterClass::S)
        );
    }

    #[test]
    fn arrays_count_elements() {
        let tex = ShaderType::Resource {
            kind: ResourceKind::Texture2D,
            element: Some(Box::new(ShaderType::Vector(ScalarKind::Float, 4))),
        };
        let array = ShaderType::Array(Box::new(ShaderType::Array(Box::new(tex), 2)), 3);
        assert_eq!(array.element_count(), Some(6));
        let huge = ShaderType::Array(Box::new(array.clone()), u32::MAX);
        assert_eq!(huge.element_count(), None);
        assert!(array.is_resource());
        assert_eq!(array.to_string(), "Texture2D<float4>[2][3]");
    }

    #[test]
    fn category_round_trips_through_u32() {
        let raw: u32 = ParameterCategory::UnorderedAccess.into();
        assert_eq!(raw, 3);
        assert_eq!(
            ParameterCategory::try_from(3u32).ok(),
            Some(ParameterCategory::UnorderedAccess)
        );
    }
}
