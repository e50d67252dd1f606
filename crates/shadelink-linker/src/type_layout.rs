//! Byte layout of plain-data types inside uniform buffers.

use std::fmt;

use rustc_hash::FxHashMap;
use shadelink_core::{ScalarKind, ShaderType, StructDecl};
use shadelink_registry::{BindingModel, MatrixLayout, ResolvedTarget};

/// Packing rules for uniform data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutRules {
    /// GLSL `std140`: vec3/vec4, arrays and structs align to 16 bytes.
    Std140,
    /// D3D constant buffers: tight packing, but nothing straddles a 16-byte register.
    D3DConstantBuffer,
    /// Scalar block layout: every type aligns to its component size.
    Scalar,
}

impl LayoutRules {
    /// Rules used for a target's global and entry-point uniform buffers.
    pub fn for_target(target: &ResolvedTarget) -> Self {
        if target.desc.layout.force_scalar_buffer_layout {
            LayoutRules::Scalar
        } else {
            match target.binding_model() {
                BindingModel::DescriptorSets => LayoutRules::Std140,
                BindingModel::RegisterClasses => LayoutRules::D3DConstantBuffer,
            }
        }
    }
}

impl fmt::Display for LayoutRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayoutRules::Std140 => "std140",
            LayoutRules::D3DConstantBuffer => "d3d-cbuffer",
            LayoutRules::Scalar => "scalar",
        })
    }
}

/// Size and alignment of a type under some [`LayoutRules`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeLayout {
    pub size: u32,
    pub alignment: u32,
}

impl TypeLayout {
    const EMPTY: TypeLayout = TypeLayout {
        size: 0,
        alignment: 1,
    };
}

/// Resolves struct names during layout.
pub trait StructSource {
    fn struct_decl(&self, name: &str) -> Option<&StructDecl>;
}

impl StructSource for shadelink_core::ModuleIr {
    fn struct_decl(&self, name: &str) -> Option<&StructDecl> {
        self.find_struct(name)
    }
}

impl<'a, 'b> StructSource for FxHashMap<&'a str, &'b StructDecl> {
    fn struct_decl(&self, name: &str) -> Option<&StructDecl> {
        self.get(name).copied()
    }
}

/// `value` rounded up to a multiple of `alignment`, `None` past `u32::MAX`.
#[inline]
fn round_up(value: u32, alignment: u32) -> Option<u32> {
    let alignment = alignment.max(1);
    value.div_ceil(alignment).checked_mul(alignment)
}

/// Computes [`TypeLayout`]s for one set of rules.
///
/// Every size and offset is a `u32`; layouts that would not fit come back
/// as `None` instead of wrapping.
pub struct LayoutCalculator<'s, S: StructSource + ?Sized> {
    rules: LayoutRules,
    matrix_layout: MatrixLayout,
    structs: &'s S,
}

impl<'s, S: StructSource + ?Sized> LayoutCalculator<'s, S> {
    pub fn new(rules: LayoutRules, matrix_layout: MatrixLayout, structs: &'s S) -> Self {
        Self {
            rules,
            matrix_layout,
            structs,
        }
    }

    pub fn rules(&self) -> LayoutRules {
        self.rules
    }

    /// Layout of `ty`. Non-data types occupy no bytes.
    pub fn layout(&self, ty: &ShaderType) -> Option<TypeLayout> {
        match ty {
            ShaderType::Scalar(kind) => Some(self.vector(*kind, 1)),
            ShaderType::Vector(kind, n) => Some(self.vector(*kind, u32::from(*n))),
            ShaderType::Matrix(kind, rows, cols) => self.matrix(*kind, *rows, *cols),
            ShaderType::Array(element, count) => self.array(self.layout(element)?, *count),
            ShaderType::Struct(name) => match self.structs.struct_decl(name) {
                Some(decl) => self.struct_layout(decl),
                None => Some(TypeLayout::EMPTY),
            },
            _ => Some(TypeLayout::EMPTY),
        }
    }

    fn vector(&self, kind: ScalarKind, n: u32) -> TypeLayout {
        let component = kind.size();
        let alignment = match (self.rules, n) {
            (LayoutRules::Std140, 1) => component,
            (LayoutRules::Std140, 2) => 2 * component,
            (LayoutRules::Std140, _) => 4 * component,
            _ => component,
        };
        TypeLayout {
            size: n * component,
            alignment,
        }
    }

    fn matrix(&self, kind: ScalarKind, rows: u8, cols: u8) -> Option<TypeLayout> {
        let (count, len) = match self.matrix_layout {
            MatrixLayout::ColumnMajor => (u32::from(cols), u32::from(rows)),
            MatrixLayout::RowMajor => (u32::from(rows), u32::from(cols)),
        };
        let vector = self.vector(kind, len);
        let layout = match self.rules {
            LayoutRules::Std140 => TypeLayout {
                size: round_up(vector.size, 16)? * count,
                alignment: 16,
            },
            LayoutRules::D3DConstantBuffer => TypeLayout {
                size: 16 * count.saturating_sub(1) + vector.size,
                alignment: 16,
            },
            LayoutRules::Scalar => TypeLayout {
                size: vector.size * count,
                alignment: vector.alignment,
            },
        };
        Some(layout)
    }

    fn array(&self, element: TypeLayout, count: u32) -> Option<TypeLayout> {
        if count == 0 || element.size == 0 {
            return Some(TypeLayout::EMPTY);
        }
        let layout = match self.rules {
            LayoutRules::Std140 => {
                let alignment = element.alignment.max(16);
                TypeLayout {
                    size: round_up(element.size, alignment)?.checked_mul(count)?,
                    alignment,
                }
            }
            LayoutRules::D3DConstantBuffer => TypeLayout {
                size: round_up(element.size, 16)?
                    .checked_mul(count - 1)?
                    .checked_add(element.size)?,
                alignment: 16,
            },
            LayoutRules::Scalar => TypeLayout {
                size: round_up(element.size, element.alignment)?.checked_mul(count)?,
                alignment: element.alignment,
            },
        };
        Some(layout)
    }

    fn struct_layout(&self, decl: &StructDecl) -> Option<TypeLayout> {
        let mut builder = BufferBuilder::new(self.rules);
        for field in &decl.fields {
            builder.place(self.layout(&field.ty)?)?;
        }
        let (size, alignment) = builder.finish_struct()?;
        Some(TypeLayout { size, alignment })
    }

    /// Offset of each field of `decl`, in declaration order.
    pub fn field_offsets(&self, decl: &StructDecl) -> Option<Vec<u32>> {
        let mut builder = BufferBuilder::new(self.rules);
        decl.fields
            .iter()
            .map(|field| builder.place(self.layout(&field.ty)?))
            .collect()
    }
}

/// Places members one after another inside a buffer or struct.
#[derive(Debug, Clone)]
pub struct BufferBuilder {
    rules: LayoutRules,
    offset: u32,
    alignment: u32,
}

impl BufferBuilder {
    pub fn new(rules: LayoutRules) -> Self {
        Self {
            rules,
            offset: 0,
            alignment: 1,
        }
    }

    /// Place a member and return its offset.
    ///
    /// Returns `None`, leaving the builder unchanged, when the member would
    /// end past `u32::MAX`.
    pub fn place(&mut self, layout: TypeLayout) -> Option<u32> {
        let offset = match self.rules {
            LayoutRules::D3DConstantBuffer => {
                let end = self.offset.checked_add(layout.size)?;
                let straddles = layout.size > 0 && self.offset / 16 != (end - 1) / 16;
                if layout.alignment >= 16 || straddles {
                    round_up(self.offset, 16)?
                } else {
                    round_up(self.offset, layout.alignment)?
                }
            }
            _ => round_up(self.offset, layout.alignment)?,
        };
        self.offset = offset.checked_add(layout.size)?;
        self.alignment = self.alignment.max(layout.alignment);
        Some(offset)
    }

    /// Bytes used so far, without trailing padding.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Size and alignment when the members form a struct.
    fn finish_struct(&self) -> Option<(u32, u32)> {
        match self.rules {
            LayoutRules::Std140 => {
                let alignment = round_up(self.alignment, 16)?;
                Some((round_up(self.offset, alignment)?, alignment))
            }
            LayoutRules::D3DConstantBuffer => Some((self.offset, 16)),
            LayoutRules::Scalar => Some((round_up(self.offset, self.alignment)?, self.alignment)),
        }
    }

    /// Total buffer size, padded to a whole number of 16-byte rows
    /// (or to the widest member under scalar rules).
    pub fn finish_buffer(&self) -> Option<u32> {
        match self.rules {
            LayoutRules::Scalar => round_up(self.offset, self.alignment),
            _ => round_up(self.offset, 16),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadelink_core::{SourceOrigin, Span, StructField};

    fn float(n: u8) -> ShaderType {
        match n {
            1 => ShaderType::Scalar(ScalarKind::Float),
            n => ShaderType::Vector(ScalarKind::Float, n),
        }
    }

    fn pack(rules: LayoutRules, types: &[ShaderType]) -> (Vec<u32>, u32) {
        let module = shadelink_core::ModuleIr::new("m", SourceOrigin::Memory("m".into()));
        let calc = LayoutCalculator::new(rules, MatrixLayout::ColumnMajor, &module);
        let mut builder = BufferBuilder::new(rules);
        let offsets = types
            .iter()
            .map(|t| builder.place(calc.layout(t).unwrap()).unwrap())
            .collect();
        (offsets, builder.finish_buffer().unwrap())
    }

    #[test]
    fn std140_vec3_aligns_to_16() {
        let matrix = ShaderType::Matrix(ScalarKind::Float, 4, 4);
        let (offsets, size) = pack(LayoutRules::Std140, &[float(1), float(3), matrix]);
        assert_eq!(offsets, [0, 16, 32]);
        assert_eq!(size, 96);
    }

    #[test]
    fn d3d_packs_into_registers() {
        let matrix = ShaderType::Matrix(ScalarKind::Float, 4, 4);
        let (offsets, size) =
            pack(LayoutRules::D3DConstantBuffer, &[float(1), float(3), matrix]);
        assert_eq!(offsets, [0, 4, 16]);
        assert_eq!(size, 80);

        let (offsets, _) = pack(LayoutRules::D3DConstantBuffer, &[float(3), float(2)]);
        assert_eq!(offsets, [0, 16]);
    }

    #[test]
    fn scalar_layout_is_tight() {
        let (offsets, size) = pack(LayoutRules::Scalar, &[float(1), float(3), float(2)]);
        assert_eq!(offsets, [0, 4, 16]);
        assert_eq!(size, 24);
    }

    #[test]
    fn array_strides() {
        let array = ShaderType::Array(Box::new(float(1)), 4);
        let module = shadelink_core::ModuleIr::new("m", SourceOrigin::Memory("m".into()));
        let layout = |rules| {
            LayoutCalculator::new(rules, MatrixLayout::ColumnMajor, &module).layout(&array).unwrap()
        };
        assert_eq!(layout(LayoutRules::Std140).size, 64);
        assert_eq!(layout(LayoutRules::D3DConstantBuffer).size, 52);
        assert_eq!(layout(LayoutRules::Scalar).size, 16);
    }

    #[test]
    fn struct_members_and_padding() {
        let decl = StructDecl {
            name: "Light".into(),
            fields: vec![
                StructField {
                    name: "dir".into(),
                    ty: float(3),
                    span: Span::default(),
                },
                StructField {
                    name: "intensity".into(),
                    ty: float(1),
                    span: Span::default(),
                },
                StructField {
                    name: "color".into(),
                    ty: float(3),
                    span: Span::default(),
                },
            ],
            span: Span::default(),
        };
        let mut structs = FxHashMap::default();
        structs.insert("Light", &decl);

        let std140 = LayoutCalculator::new(LayoutRules::Std140, MatrixLayout::ColumnMajor, &structs);
        assert_eq!(std140.field_offsets(&decl).unwrap(), [0, 12, 16]);
        assert_eq!(
            std140.layout(&ShaderType::Struct("Light".into())),
            Some(TypeLayout {
                size: 32,
                alignment: 16
            })
        );

        let scalar = LayoutCalculator::new(LayoutRules::Scalar, MatrixLayout::ColumnMajor, &structs);
        assert_eq!(scalar.layout(&ShaderType::Struct("Light".into())).unwrap().size, 28);
    }

    #[test]
    fn row_major_matrix_under_d3d() {
        let module = shadelink_core::ModuleIr::new("m", SourceOrigin::Memory("m".into()));
        let matrix = ShaderType::Matrix(ScalarKind::Float, 2, 3);
        let column = LayoutCalculator::new(
            LayoutRules::D3DConstantBuffer,
            MatrixLayout::ColumnMajor,
            &module,
        );
        let row = LayoutCalculator::new(LayoutRules::D3DConstantBuffer, MatrixLayout::RowMajor, &module);
        assert_eq!(column.layout(&matrix).unwrap().size, 16 * 2 + 8);
        assert_eq!(row.layout(&matrix).unwrap().size, 16 + 12);
    }

    #[test]
    fn oversized_arrays_do_not_wrap() {
        let module = shadelink_core::ModuleIr::new("m", SourceOrigin::Memory("m".into()));
        let big = ShaderType::Array(Box::new(float(4)), 300_000_000);
        for rules in [
            LayoutRules::Std140,
            LayoutRules::D3DConstantBuffer,
            LayoutRules::Scalar,
        ] {
            let calc = LayoutCalculator::new(rules, MatrixLayout::ColumnMajor, &module);
            assert_eq!(calc.layout(&big), None, "{}", rules);
        }

        let nested = ShaderType::Array(
            Box::new(ShaderType::Array(Box::new(float(1)), 70_000)),
            70_000,
        );
        let calc = LayoutCalculator::new(LayoutRules::Scalar, MatrixLayout::ColumnMajor, &module);
        assert_eq!(calc.layout(&nested), None);
    }

    #[test]
    fn buffer_builder_stops_at_u32_max() {
        let mut builder = BufferBuilder::new(LayoutRules::Scalar);
        let almost_all = TypeLayout {
            size: u32::MAX - 2,
            alignment: 4,
        };
        assert_eq!(builder.place(almost_all), Some(0));
        let vec4 = TypeLayout {
            size: 16,
            alignment: 4,
        };
        assert_eq!(builder.place(vec4), None);
        assert_eq!(builder.offset(), u32::MAX - 2);
        assert_eq!(builder.finish_buffer(), None);
    }
}
