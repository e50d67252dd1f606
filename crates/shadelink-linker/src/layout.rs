//! Per-target layout of a composed program.
//!
//! Allocation order:
//!
//! 1. explicit bindings, as written in source
//! 2. the implicit global constant buffer, when loose uniforms exist
//! 3. every remaining resource, first fit in space 0
//!
//! Loose uniforms never take a slot; they are placed in the global constant
//! buffer and report their byte offset instead.

use rustc_hash::{FxHashMap, FxHashSet};
use shadelink_core::{
    ExplicitBinding, FunctionDecl, GlobalVar, HashedString, LinkError, ParamDirection,
    ParameterCategory, ShaderType, StructDecl,
};
use shadelink_registry::{BindingModel, ResolvedTarget};

use crate::binding::{BindingAllocator, ClaimError, Collision, SlotKey};
use crate::composer::{EntryPointKey, ModuleKey, ModuleSource, SymbolTable};
use crate::reflection::{
    EntryPointLayout, EntryPointUniform, GlobalConstantBuffer, ParameterInfo, ProgramLayout,
    TypeParameterInfo, VaryingParameter,
};
use crate::type_layout::{BufferBuilder, LayoutCalculator, LayoutRules};

/// Owner id of the implicit global constant buffer inside the allocator.
const GLOBAL_BUFFER_OWNER: usize = usize::MAX;
const GLOBAL_BUFFER_NAME: &str = "<global constant buffer>";

/// Name given to an entry point's return value in its varying outputs.
const RESULT_NAME: &str = "result";

/// Compute the layout of a complete program for `target`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(crate) fn build_layout<M: ModuleSource + ?Sized>(
    source: &M,
    symbols: &SymbolTable<'_>,
    modules: &[ModuleKey],
    entry_points: &[EntryPointKey],
    target: &ResolvedTarget,
) -> Result<ProgramLayout, Vec<LinkError>> {
    let rules = LayoutRules::for_target(target);
    let calculator = LayoutCalculator::new(rules, target.desc.layout.matrix_layout, &symbols.structs);

    let parameters = allocate_parameters(source, symbols, target, &calculator)?;
    let parameter_names = parameters
        .parameters
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name.clone(), i))
        .collect();

    let mut entry_point_layouts = Vec::with_capacity(entry_points.len());
    let mut errors = Vec::new();
    for ep in entry_points {
        let ir = source.module_ir(ep.module);
        let Some(function) = ir.entry_point(ep.index as usize) else {
            continue;
        };
        match entry_point_layout(&ir.name, function, &calculator, &symbols.structs, target) {
            Ok(Some(layout)) => entry_point_layouts.push(layout),
            Ok(None) => {}
            Err(error) => errors.push(error),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut type_parameters = Vec::new();
    let mut hashed_strings: Vec<HashedString> = Vec::new();
    let mut seen_strings: FxHashSet<&str> = FxHashSet::default();
    for &key in modules {
        let ir = source.module_ir(key);
        for decl in &ir.type_params {
            type_parameters.push(TypeParameterInfo {
                name: decl.name.clone(),
                index: type_parameters.len() as u32,
                constraint: decl.constraint.clone(),
            });
        }
        for string in &ir.hashed_strings {
            if seen_strings.insert(string.value.as_str()) {
                hashed_strings.push(string.clone());
            }
        }
    }

    Ok(ProgramLayout {
        format: target.format(),
        rules,
        parameters: parameters.parameters,
        parameter_names,
        type_parameters,
        entry_points: entry_point_layouts,
        hashed_strings,
        global_constant_buffer: parameters.global_constant_buffer,
    })
}

struct AllocatedParameters {
    parameters: Vec<ParameterInfo>,
    global_constant_buffer: Option<GlobalConstantBuffer>,
}

/// The explicit `(index, space)` a binding model honours, if any.
fn explicit_slot(binding: &ExplicitBinding, model: BindingModel) -> Option<(u32, u32)> {
    let register = binding.register.map(|r| (r.index, r.space));
    match model {
        BindingModel::DescriptorSets => binding
            .descriptor
            .map(|d| (d.index, d.space))
            .or(register),
        BindingModel::RegisterClasses => register,
    }
}

fn allocate_parameters(
    source: &(impl ModuleSource + ?Sized),
    symbols: &SymbolTable<'_>,
    target: &ResolvedTarget,
    calculator: &LayoutCalculator<'_, FxHashMap<&str, &StructDecl>>,
) -> Result<AllocatedParameters, Vec<LinkError>> {
    let mut allocator = BindingAllocator::new(target.binding_model());
    let mut parameters = Vec::with_capacity(symbols.parameters.len());
    let mut errors = Vec::new();
    for &(key, global) in &symbols.parameters {
        let module = &source.module_ir(key).name;
        match describe(global, module, calculator) {
            Some(parameter) => parameters.push(parameter),
            None => errors.push(overflow_error(&global.name, module, target)),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    for (owner, (_, global)) in symbols.parameters.iter().enumerate() {
        let (category, count) = (parameters[owner].category, parameters[owner].binding_count);
        if category == ParameterCategory::Uniform {
            continue;
        }
        let Some((index, space)) = explicit_slot(&global.binding, allocator.model()) else {
            continue;
        };
        let key = allocator.key(category, space);
        match allocator.claim(key, index, count, owner) {
            Ok(()) => {
                let parameter = &mut parameters[owner];
                parameter.binding_index = index;
                parameter.binding_space = space;
                parameter.explicit = true;
                log::trace!("'{}' claims {}:{} explicitly", parameter.name, key, index);
            }
            Err(ClaimError::Collision(collision)) => {
                errors.push(collision_error(&parameters, owner, key, collision, target))
            }
            Err(ClaimError::OutOfRange) => {
                let parameter = &parameters[owner];
                errors.push(exhausted_error(&parameter.name, count, &parameter.module, key, target))
            }
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut buffer = BufferBuilder::new(calculator.rules());
    let mut last_uniform = None;
    for (owner, (parameter, (_, global))) in
        parameters.iter_mut().zip(&symbols.parameters).enumerate()
    {
        if parameter.category != ParameterCategory::Uniform {
            continue;
        }
        match calculator.layout(&global.ty).and_then(|l| buffer.place(l)) {
            Some(offset) => parameter.binding_index = offset,
            None => errors.push(overflow_error(&parameter.name, &parameter.module, target)),
        }
        last_uniform = Some(owner);
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let global_constant_buffer = match last_uniform {
        Some(last) => {
            let module = &parameters[last].module;
            let key = allocator.key(ParameterCategory::ConstantBuffer, 0);
            let Some(size) = buffer.finish_buffer() else {
                return Err(vec![overflow_error(GLOBAL_BUFFER_NAME, module, target)]);
            };
            let Some(binding) = allocator.allocate(key, 1, GLOBAL_BUFFER_OWNER) else {
                return Err(vec![exhausted_error(GLOBAL_BUFFER_NAME, 1, module, key, target)]);
            };
            log::trace!("global constant buffer placed at {}:{}", key, binding);
            Some(GlobalConstantBuffer {
                size,
                binding,
                space: 0,
            })
        }
        None => None,
    };

    for (owner, parameter) in parameters.iter_mut().enumerate() {
        if parameter.explicit || parameter.category == ParameterCategory::Uniform {
            continue;
        }
        let key = allocator.key(parameter.category, 0);
        let Some(index) = allocator.allocate(key, parameter.binding_count, owner) else {
            errors.push(exhausted_error(
                &parameter.name,
                parameter.binding_count,
                &parameter.module,
                key,
                target,
            ));
            continue;
        };
        parameter.binding_index = index;
        parameter.binding_space = 0;
        log::trace!(
            "'{}' allocated {}:{} (count {})",
            parameter.name,
            key,
            parameter.binding_index,
            parameter.binding_count
        );
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(AllocatedParameters {
        parameters,
        global_constant_buffer,
    })
}

/// Reflection entry for a parameter, before any slot is assigned.
///
/// `None` when the parameter's size or slot count does not fit in 32 bits.
fn describe(
    global: &GlobalVar,
    module: &str,
    calculator: &LayoutCalculator<'_, FxHashMap<&str, &StructDecl>>,
) -> Option<ParameterInfo> {
    let category = global.ty.category();
    let size = match global.ty.base() {
        ShaderType::Resource {
            element: Some(element),
            ..
        } if category == ParameterCategory::ConstantBuffer => calculator.layout(element)?.size,
        _ if category == ParameterCategory::Uniform => calculator.layout(&global.ty)?.size,
        _ => 0,
    };
    Some(ParameterInfo {
        name: global.name.clone(),
        type_name: global.ty.to_string(),
        category,
        binding_index: 0,
        binding_space: 0,
        binding_count: if category == ParameterCategory::Uniform {
            1
        } else {
            global.ty.element_count()?
        },
        size,
        explicit: false,
        module: module.to_string(),
    })
}

fn collision_error(
    parameters: &[ParameterInfo],
    owner: usize,
    key: SlotKey,
    collision: Collision,
    target: &ResolvedTarget,
) -> LinkError {
    let parameter = &parameters[owner];
    let other = parameters
        .get(collision.owner)
        .map_or(GLOBAL_BUFFER_NAME, |p| p.name.as_str());
    LinkError::BindingCollision {
        parameter: parameter.name.clone(),
        other: other.to_string(),
        class: key
            .class
            .map(|c| c.letter().to_string())
            .unwrap_or_default(),
        index: collision.index,
        space: key.space,
        target: target.format().name().to_string(),
        origin: format!("module '{}'", parameter.module),
    }
}

fn exhausted_error(
    parameter: &str,
    count: u32,
    module: &str,
    key: SlotKey,
    target: &ResolvedTarget,
) -> LinkError {
    LinkError::BindingsExhausted {
        parameter: parameter.to_string(),
        count,
        range: key.to_string(),
        target: target.format().name().to_string(),
        origin: format!("module '{}'", module),
    }
}

fn overflow_error(parameter: &str, module: &str, target: &ResolvedTarget) -> LinkError {
    LinkError::LayoutOverflow {
        parameter: parameter.to_string(),
        target: target.format().name().to_string(),
        origin: format!("module '{}'", module),
    }
}

/// Number of varying locations a value of `ty` occupies.
fn location_count(ty: &ShaderType, structs: &FxHashMap<&str, &StructDecl>) -> Option<u32> {
    match ty {
        ShaderType::Array(element, count) => count.checked_mul(location_count(element, structs)?),
        ShaderType::Matrix(_, rows, _) => Some(u32::from(*rows)),
        ShaderType::Struct(name) => match structs.get(name.as_str()) {
            Some(decl) => decl.fields.iter().try_fold(0u32, |total, f| {
                total.checked_add(location_count(&f.ty, structs)?)
            }),
            None => Some(1),
        },
        _ => Some(1),
    }
}

fn is_system_value(semantic: Option<&str>) -> bool {
    semantic
        .and_then(|s| s.get(..3))
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sv_"))
}

/// Assigns consecutive locations to one direction of varyings.
struct Locations<'s, 'a> {
    next: u32,
    category: ParameterCategory,
    structs: &'s FxHashMap<&'a str, &'a StructDecl>,
}

impl Locations<'_, '_> {
    /// `None` when the locations would run past `u32::MAX`.
    fn varying(
        &mut self,
        name: &str,
        ty: &ShaderType,
        semantic: Option<&str>,
    ) -> Option<VaryingParameter> {
        let location = if is_system_value(semantic) {
            None
        } else {
            let location = self.next;
            self.next = self.next.checked_add(location_count(ty, self.structs)?)?;
            Some(location)
        };
        Some(VaryingParameter {
            name: name.to_string(),
            type_name: ty.to_string(),
            semantic: semantic.map(str::to_string),
            category: self.category,
            location,
        })
    }
}

/// Layout of one entry point; `Ok(None)` for functions without a stage.
fn entry_point_layout(
    module: &str,
    function: &FunctionDecl,
    calculator: &LayoutCalculator<'_, FxHashMap<&str, &StructDecl>>,
    structs: &FxHashMap<&str, &StructDecl>,
    target: &ResolvedTarget,
) -> Result<Option<EntryPointLayout>, LinkError> {
    let Some(stage) = function.stage else {
        return Ok(None);
    };
    let overflow = |name: &str| LinkError::LayoutOverflow {
        parameter: name.to_string(),
        target: target.format().name().to_string(),
        origin: format!("entry point '{}' of module '{}'", function.name, module),
    };
    let mut inputs = Locations {
        next: 0,
        category: ParameterCategory::VaryingInput,
        structs,
    };
    let mut outputs = Locations {
        next: 0,
        category: ParameterCategory::VaryingOutput,
        structs,
    };
    let mut layout = EntryPointLayout {
        name: function.name.clone(),
        module: module.to_string(),
        stage,
        thread_group_size: function.thread_group_size,
        inputs: Vec::new(),
        outputs: Vec::new(),
        uniforms: Vec::new(),
        uniform_buffer_size: 0,
    };

    let mut buffer = BufferBuilder::new(calculator.rules());
    for param in &function.signature.params {
        let semantic = param.semantic.as_deref();
        let name = param.name.as_str();
        if matches!(param.direction, ParamDirection::In | ParamDirection::InOut) {
            let varying = inputs.varying(name, &param.ty, semantic);
            layout.inputs.push(varying.ok_or_else(|| overflow(name))?);
        }
        if matches!(param.direction, ParamDirection::Out | ParamDirection::InOut) {
            let varying = outputs.varying(name, &param.ty, semantic);
            layout.outputs.push(varying.ok_or_else(|| overflow(name))?);
        }
        if param.direction == ParamDirection::Uniform {
            let type_layout = calculator.layout(&param.ty).ok_or_else(|| overflow(name))?;
            let offset = buffer.place(type_layout).ok_or_else(|| overflow(name))?;
            layout.uniforms.push(EntryPointUniform {
                name: param.name.clone(),
                type_name: param.ty.to_string(),
                offset,
                size: type_layout.size,
            });
        }
    }

    let return_type = &function.signature.return_type;
    if *return_type != ShaderType::Void {
        let semantic = function.signature.return_semantic.as_deref();
        let varying = outputs.varying(RESULT_NAME, return_type, semantic);
        layout.outputs.push(varying.ok_or_else(|| overflow(RESULT_NAME))?);
    }
    if let Some(last) = layout.uniforms.last() {
        let size = buffer.finish_buffer().ok_or_else(|| overflow(&last.name))?;
        layout.uniform_buffer_size = size;
    }
    Ok(Some(layout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadelink_core::{ScalarKind, Span, StructField};

    fn field(name: &str, ty: ShaderType) -> StructField {
        StructField {
            name: name.into(),
            ty,
            span: Span::default(),
        }
    }

    #[test]
    fn location_counts() {
        let vertex = StructDecl {
            name: "Vertex".into(),
            fields: vec![
                field("position", ShaderType::Vector(ScalarKind::Float, 3)),
                field("bones", ShaderType::Matrix(ScalarKind::Float, 3, 4)),
            ],
            span: Span::default(),
        };
        let mut structs: FxHashMap<&str, &StructDecl> = FxHashMap::default();
        structs.insert("Vertex", &vertex);

        assert_eq!(location_count(&ShaderType::Scalar(ScalarKind::Float), &structs), Some(1));
        assert_eq!(
            location_count(&ShaderType::Matrix(ScalarKind::Float, 4, 4), &structs),
            Some(4)
        );
        assert_eq!(location_count(&ShaderType::Struct("Vertex".into()), &structs), Some(4));
        assert_eq!(
            location_count(
                &ShaderType::Array(Box::new(ShaderType::Struct("Vertex".into())), 2),
                &structs
            ),
            Some(8)
        );
        let huge = ShaderType::Array(Box::new(ShaderType::Struct("Vertex".into())), u32::MAX);
        assert_eq!(location_count(&huge, &structs), None);
    }

    #[test]
    fn system_values_are_case_insensitive() {
        assert!(is_system_value(Some("SV_Position")));
        assert!(is_system_value(Some("sv_target")));
        assert!(!is_system_value(Some("TEXCOORD0")));
        assert!(!is_system_value(Some("SV")));
        assert!(!is_system_value(None));
    }

    #[test]
    fn descriptor_binding_wins_only_under_descriptor_model() {
        use shadelink_core::{DescriptorBinding, RegisterBinding, RegisterClass};

        let binding = ExplicitBinding {
            register: Some(RegisterBinding {
                class: RegisterClass::T,
                index: 4,
                space: 1,
            }),
            descriptor: Some(DescriptorBinding { index: 2, space: 0 }),
        };
        assert_eq!(
            explicit_slot(&binding, BindingModel::DescriptorSets),
            Some((2, 0))
        );
        assert_eq!(
            explicit_slot(&binding, BindingModel::RegisterClasses),
            Some((4, 1))
        );

        let descriptor_only = ExplicitBinding {
            register: None,
            descriptor: Some(DescriptorBinding { index: 2, space: 0 }),
        };
        assert_eq!(
            explicit_slot(&descriptor_only, BindingModel::RegisterClasses),
            None
        );
    }
}
