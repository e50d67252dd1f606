//! Name resolution and declaration checking.
//!
//! Lowers a [`SourceFile`] into a [`ModuleIr`]. Every problem is recorded as
//! a diagnostic; the caller discards the module when any error was reported.

use ordered_float::OrderedFloat;
use rustc_hash::{FxHashMap, FxHashSet};
use shadelink_core::{
    Attribute, AttributeArg, DescriptorBinding, Diagnostic, DiagnosticCode, Diagnostics,
    ExplicitBinding, FunctionDecl, FunctionParam, FunctionSignature, GenericArity, GlobalVar,
    HashedString, InterfaceDecl, ModuleIr, ParamDirection, RegisterBinding, RegisterClass,
    ResourceKind, ShaderStage, ShaderType, SourceOrigin, Span, StorageClass, StructDecl,
    StructField, Symbol, TypeParamDecl,
};

use crate::ast::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeNameKind {
    Struct,
    Interface,
    TypeParam,
}

/// Check `file` and lower it into a module named `name`.
pub fn check_module(file: &SourceFile<'_>, name: &str, origin: SourceOrigin) -> (ModuleIr, Diagnostics) {
    let mut checker = Checker::new(name, origin);
    checker.collect_names(file);
    for item in file.items {
        match item {
            Item::Struct(node) => checker.check_struct(node),
            Item::Interface(node) => checker.check_interface(node),
            Item::TypeParam(node) => checker.check_type_param(node),
            Item::Global(node) => checker.check_global(node),
            Item::Function(node) => checker.check_function(node),
        }
    }
    checker.check_struct_cycles();
    (checker.module, checker.diagnostics)
}

struct Checker<'ast> {
    module: ModuleIr,
    origin: String,
    diagnostics: Diagnostics,
    type_names: FxHashMap<&'ast str, TypeNameKind>,
    value_names: FxHashSet<&'ast str>,
    seen_strings: FxHashSet<String>,
}

impl<'ast> Checker<'ast> {
    fn new(name: &str, origin: SourceOrigin) -> Self {
        Self {
            origin: origin.to_string(),
            module: ModuleIr::new(name, origin),
            diagnostics: Diagnostics::new(),
            type_names: FxHashMap::default(),
            value_names: FxHashSet::default(),
            seen_strings: FxHashSet::default(),
        }
    }

    fn error(&mut self, code: DiagnosticCode, span: Span, message: impl Into<String>) {
        self.diagnostics.push(
            Diagnostic::error(code, message)
                .with_origin(self.origin.clone())
                .with_span(span),
        );
    }

    fn warning(&mut self, code: DiagnosticCode, span: Span, message: impl Into<String>) {
        self.diagnostics.push(
            Diagnostic::warning(code, message)
                .with_origin(self.origin.clone())
                .with_span(span),
        );
    }

    fn redeclared(&mut self, name: &str, span: Span, previous: Symbol) {
        let kind = match previous {
            Symbol::Global(_) => "a variable",
            Symbol::Function(_) => "a function",
            Symbol::Struct(_) => "a struct",
            Symbol::Interface(_) => "an interface",
            Symbol::TypeParam(_) => "a type parameter",
        };
        self.error(
            DiagnosticCode::Redeclaration,
            span,
            format!("'{}' is already declared as {}", name, kind),
        );
    }

    /// Forward-declare every module-level name so declaration order is irrelevant.
    fn collect_names(&mut self, file: &SourceFile<'ast>) {
        for item in file.items {
            match item {
                Item::Struct(node) => {
                    self.type_names.entry(node.name.name).or_insert(TypeNameKind::Struct);
                }
                Item::Interface(node) => {
                    self.type_names
                        .entry(node.name.name)
                        .or_insert(TypeNameKind::Interface);
                }
                Item::TypeParam(TypeParamNode {
                    name: Some(name), ..
                }) => {
                    self.type_names.entry(name.name).or_insert(TypeNameKind::TypeParam);
                }
                Item::TypeParam(_) => {}
                Item::Global(node) => {
                    self.value_names.insert(node.declarator.name.name);
                }
                Item::Function(node) => {
                    self.value_names.insert(node.name.name);
                }
            }
        }
    }

    // ========================================================================
    // Types
    // ========================================================================

    fn resolve_type(&mut self, ty: &TypeExpr<'ast>) -> Option<ShaderType> {
        let name = ty.name.name;

        if let Some(kind) = ResourceKind::from_name(name) {
            return self.resolve_resource(kind, ty);
        }
        if ty.has_arg_list {
            self.error(
                DiagnosticCode::InvalidType,
                ty.span,
                format!("'{}' is not a generic type", name),
            );
            return None;
        }
        if let Some(builtin) = ShaderType::builtin(name) {
            return Some(builtin);
        }
        match self.type_names.get(name) {
            Some(TypeNameKind::Struct) => Some(ShaderType::Struct(name.to_string())),
            Some(TypeNameKind::Interface) => Some(ShaderType::Interface(name.to_string())),
            Some(TypeNameKind::TypeParam) => Some(ShaderType::TypeParam(name.to_string())),
            None => {
                self.error(
                    DiagnosticCode::UndefinedType,
                    ty.name.span,
                    format!("undefined type '{}'", name),
                );
                None
            }
        }
    }

    fn resolve_resource(&mut self, kind: ResourceKind, ty: &TypeExpr<'ast>) -> Option<ShaderType> {
        let name = kind.name();
        let element = match (kind.generic_arity(), ty.args) {
            (GenericArity::None, []) if !ty.has_arg_list => None,
            (GenericArity::Optional, []) if !ty.has_arg_list => None,
            (GenericArity::Optional | GenericArity::Required, [arg]) => {
                Some(self.resolve_type(arg)?)
            }
            (GenericArity::Required, []) => {
                self.error(
                    DiagnosticCode::InvalidType,
                    ty.span,
                    format!("'{}' requires a type argument", name),
                );
                return None;
            }
            (GenericArity::None, _) => {
                self.error(
                    DiagnosticCode::InvalidType,
                    ty.span,
                    format!("'{}' is not a generic type", name),
                );
                return None;
            }
            (_, args) => {
                self.error(
                    DiagnosticCode::InvalidType,
                    ty.span,
                    format!("'{}' expects 1 type argument, found {}", name, args.len()),
                );
                return None;
            }
        };

        if let Some(element) = &element {
            let valid = match kind {
                ResourceKind::ConstantBuffer => matches!(element, ShaderType::Struct(_)),
                ResourceKind::StructuredBuffer | ResourceKind::RWStructuredBuffer => element.is_data(),
                _ => matches!(element, ShaderType::Scalar(_) | ShaderType::Vector(..)),
            };
            if !valid {
                let expected = match kind {
                    ResourceKind::ConstantBuffer => "a struct",
                    ResourceKind::StructuredBuffer | ResourceKind::RWStructuredBuffer => {
                        "a data type"
                    }
                    _ => "a scalar or vector",
                };
                self.error(
                    DiagnosticCode::InvalidType,
                    ty.span,
                    format!(
                        "element type of '{}' must be {}, found '{}'",
                        name, expected, element
                    ),
                );
                return None;
            }
        }

        Some(ShaderType::Resource {
            kind,
            element: element.map(Box::new),
        })
    }

    /// Wrap `ty` in array dimensions, outermost written first.
    fn apply_dims(&mut self, ty: ShaderType, declarator: &Declarator<'ast>) -> Option<ShaderType> {
        let mut ty = ty;
        for dim in declarator.dims {
            match dim {
                Some(n) => ty = ShaderType::Array(Box::new(ty), *n),
                None => {
                    self.error(
                        DiagnosticCode::InvalidType,
                        declarator.name.span,
                        format!("unsized array '{}' is not supported", declarator.name.name),
                    );
                    return None;
                }
            }
        }
        Some(ty)
    }

    /// Resolve a variable's full type and reject `void`.
    fn variable_type(&mut self, ty: &TypeExpr<'ast>, declarator: &Declarator<'ast>) -> Option<ShaderType> {
        let base = self.resolve_type(ty)?;
        if base == ShaderType::Void {
            self.error(
                DiagnosticCode::InvalidType,
                declarator.name.span,
                format!("variable '{}' cannot have type 'void'", declarator.name.name),
            );
            return None;
        }
        self.apply_dims(base, declarator)
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    fn lower_attribute(node: &AttributeNode<'_>) -> Attribute {
        Attribute {
            name: node.name.to_string(),
            args: node
                .args
                .iter()
                .map(|arg| match *arg {
                    AttributeArgNode::Int(v) => AttributeArg::Int(v),
                    AttributeArgNode::Float(v) => AttributeArg::Float(OrderedFloat(v)),
                    AttributeArgNode::Str(v) => AttributeArg::String(v.to_string()),
                    AttributeArgNode::Ident(v) => AttributeArg::Ident(v.to_string()),
                })
                .collect(),
            span: node.span,
        }
    }

    /// Non-negative integer arguments of `attr`, if it has `min..=max` of them.
    fn uint_args(&mut self, attr: &AttributeNode<'ast>, min: usize, max: usize) -> Option<Vec<u32>> {
        let values: Option<Vec<u32>> = attr
            .args
            .iter()
            .map(|arg| match arg {
                AttributeArgNode::Int(v) => u32::try_from(*v).ok(),
                _ => None,
            })
            .collect();
        match values {
            Some(values) if (min..=max).contains(&values.len()) => Some(values),
            _ => {
                let count = if min == max {
                    min.to_string()
                } else {
                    format!("{} to {}", min, max)
                };
                self.error(
                    DiagnosticCode::InvalidAttribute,
                    attr.span,
                    format!(
                        "attribute '{}' expects {} non-negative integer arguments",
                        attr.name, count
                    ),
                );
                None
            }
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn check_struct(&mut self, node: &StructNode<'ast>) {
        let mut fields = Vec::with_capacity(node.fields.len());
        let mut field_names = FxHashSet::default();

        for field in node.fields {
            let field_name = field.declarator.name;
            if !field_names.insert(field_name.name) {
                self.error(
                    DiagnosticCode::Redeclaration,
                    field_name.span,
                    format!(
                        "field '{}' is already declared in struct '{}'",
                        field_name.name, node.name.name
                    ),
                );
                continue;
            }
            let Some(ty) = self.variable_type(&field.ty, &field.declarator) else {
                continue;
            };
            if ty.is_resource() {
                self.error(
                    DiagnosticCode::InvalidType,
                    field.span,
                    format!(
                        "field '{}' of struct '{}' cannot have resource type '{}'",
                        field_name.name, node.name.name, ty
                    ),
                );
                continue;
            }
            if !ty.is_data() {
                self.error(
                    DiagnosticCode::InvalidType,
                    field.span,
                    format!(
                        "field '{}' of struct '{}' must have a data type, found '{}'",
                        field_name.name, node.name.name, ty
                    ),
                );
                continue;
            }
            fields.push(StructField {
                name: field_name.name.to_string(),
                ty,
                span: field.span,
            });
        }

        let decl = StructDecl {
            name: node.name.name.to_string(),
            fields,
            span: node.span,
        };
        if let Err(previous) = self.module.add_struct(decl) {
            self.redeclared(node.name.name, node.name.span, previous);
        }
    }

    /// Report structs that contain themselves, directly or through other structs.
    fn check_struct_cycles(&mut self) {
        let mut cyclic = Vec::new();
        for decl in &self.module.structs {
            let mut stack = vec![decl.name.as_str()];
            let mut visited = FxHashSet::default();
            let mut found = false;
            while let Some(current) = stack.pop() {
                let Some(current) = self.module.find_struct(current) else {
                    continue;
                };
                for field in &current.fields {
                    if let ShaderType::Struct(inner) = field.ty.base() {
                        if inner == &decl.name {
                            found = true;
                        } else if visited.insert(inner.as_str()) {
                            stack.push(inner.as_str());
                        }
                    }
                }
            }
            if found {
                cyclic.push((decl.name.clone(), decl.span));
            }
        }
        for (name, span) in cyclic {
            self.error(
                DiagnosticCode::InvalidType,
                span,
                format!("struct '{}' contains itself", name),
            );
        }
    }

    fn check_interface(&mut self, node: &InterfaceNode<'ast>) {
        let decl = InterfaceDecl {
            name: node.name.name.to_string(),
            span: node.span,
        };
        if let Err(previous) = self.module.add_interface(decl) {
            self.redeclared(node.name.name, node.name.span, previous);
        }
    }

    fn check_type_param(&mut self, node: &TypeParamNode<'ast>) {
        if let Some(constraint) = node.constraint {
            match self.type_names.get(constraint.name) {
                Some(TypeNameKind::Interface) => {}
                Some(_) => {
                    self.error(
                        DiagnosticCode::InvalidType,
                        constraint.span,
                        format!(
                            "type parameter constraint '{}' is not an interface",
                            constraint.name
                        ),
                    );
                    return;
                }
                None => {
                    self.error(
                        DiagnosticCode::UndefinedType,
                        constraint.span,
                        format!("undefined interface '{}'", constraint.name),
                    );
                    return;
                }
            }
        }

        let decl = TypeParamDecl {
            name: node.name.map(|n| n.name.to_string()),
            constraint: node.constraint.map(|c| c.name.to_string()),
            span: node.span,
        };
        if let Err(previous) = self.module.add_type_param(decl)
            && let Some(name) = node.name
        {
            self.redeclared(name.name, name.span, previous);
        }
    }

    fn check_global(&mut self, node: &GlobalVarNode<'ast>) {
        let name = node.declarator.name;
        let Some(ty) = self.variable_type(&node.ty, &node.declarator) else {
            return;
        };
        if !ty.is_data() && !ty.is_resource() {
            self.error(
                DiagnosticCode::InvalidType,
                name.span,
                format!("global '{}' cannot have type '{}'", name.name, ty),
            );
            return;
        }

        let modifiers = node.modifiers;
        let storage = match (modifiers.is_extern, modifiers.is_static) {
            (true, true) => {
                self.error(
                    DiagnosticCode::InvalidType,
                    node.span,
                    format!("global '{}' cannot be both extern and static", name.name),
                );
                return;
            }
            (true, false) => StorageClass::Extern,
            (false, true) => StorageClass::Static,
            (false, false) => StorageClass::Uniform,
        };

        let mut binding = ExplicitBinding::default();
        let mut attributes = Vec::new();
        for attr in node.attrs {
            match attr.name {
                "vk::binding" => {
                    if let Some(args) = self.uint_args(attr, 1, 2) {
                        binding.descriptor = Some(DescriptorBinding {
                            index: args[0],
                            space: args.get(1).copied().unwrap_or(0),
                        });
                    }
                }
                "shader" | "numthreads" => {
                    self.error(
                        DiagnosticCode::InvalidAttribute,
                        attr.span,
                        format!("attribute '{}' is not valid on a variable", attr.name),
                    );
                    continue;
                }
                _ => {}
            }
            attributes.push(Self::lower_attribute(attr));
        }
        if let Some(register) = &node.register {
            binding.register = self.lower_register(register);
        }

        if binding.is_explicit() {
            if storage == StorageClass::Static || !ty.is_resource() {
                let what = if storage == StorageClass::Static {
                    "static variable"
                } else {
                    "plain uniform"
                };
                self.warning(
                    DiagnosticCode::IgnoredBinding,
                    name.span,
                    format!("explicit binding on {} '{}' is ignored", what, name.name),
                );
                binding = ExplicitBinding::default();
            } else if let Some(register) = binding.register {
                let category = ty.category();
                if category.register_class() != Some(register.class) {
                    let expected = category
                        .register_class()
                        .map(RegisterClass::letter)
                        .unwrap_or('?');
                    self.error(
                        DiagnosticCode::InvalidBinding,
                        node.register.map(|r| r.span).unwrap_or(name.span),
                        format!(
                            "register class '{}' does not match {} parameter '{}' (expected '{}')",
                            register.class.letter(),
                            category,
                            name.name,
                            expected
                        ),
                    );
                    return;
                }
            }
        }

        let global = GlobalVar {
            name: name.name.to_string(),
            ty,
            storage,
            binding,
            attributes,
            span: node.span,
        };
        if let Err(previous) = self.module.add_global(global) {
            self.redeclared(name.name, name.span, previous);
        }
    }

    /// Parse `tN` and `spaceM` out of a register clause.
    fn lower_register(&mut self, node: &RegisterNode<'ast>) -> Option<RegisterBinding> {
        let slot = node.slot.name;
        let mut chars = slot.chars();
        let class = chars.next().and_then(RegisterClass::from_letter);
        let index = chars.as_str().parse::<u32>().ok();
        let (Some(class), Some(index)) = (class, index) else {
            self.error(
                DiagnosticCode::InvalidBinding,
                node.slot.span,
                format!("invalid register '{}'", slot),
            );
            return None;
        };

        let space = match node.space {
            None => 0,
            Some(space) => match space.name.strip_prefix("space").and_then(|n| n.parse().ok()) {
                Some(space) => space,
                None => {
                    self.error(
                        DiagnosticCode::InvalidBinding,
                        space.span,
                        format!("invalid register space '{}'", space.name),
                    );
                    return None;
                }
            },
        };
        Some(RegisterBinding { class, index, space })
    }

    fn check_function(&mut self, node: &FunctionNode<'ast>) {
        let name = node.name;
        let mut failed = false;

        let return_type = self.resolve_type(&node.return_ty);
        failed |= return_type.is_none();

        let mut params = Vec::with_capacity(node.params.len());
        let mut param_names = FxHashSet::default();
        for param in node.params {
            let param_name = param.declarator.name;
            if !param_names.insert(param_name.name) {
                self.error(
                    DiagnosticCode::Redeclaration,
                    param_name.span,
                    format!("parameter '{}' is already declared", param_name.name),
                );
                failed = true;
                continue;
            }
            let Some(ty) = self.variable_type(&param.ty, &param.declarator) else {
                failed = true;
                continue;
            };
            let direction = match param.modifier {
                None | Some(ParamModifier::In) => ParamDirection::In,
                Some(ParamModifier::Out) => ParamDirection::Out,
                Some(ParamModifier::InOut) => ParamDirection::InOut,
                Some(ParamModifier::Uniform) => ParamDirection::Uniform,
            };
            params.push(FunctionParam {
                name: param_name.name.to_string(),
                ty,
                direction,
                semantic: param.semantic.map(|s| s.name.to_string()),
                span: param.span,
            });
        }

        let mut stage = None;
        let mut thread_group_size = None;
        let mut attributes = Vec::with_capacity(node.attrs.len());
        for attr in node.attrs {
            match attr.name {
                "shader" => match attr.args {
                    [AttributeArgNode::Str(text)] => match ShaderStage::from_name(text) {
                        Some(s) => stage = Some(s),
                        None => {
                            self.error(
                                DiagnosticCode::InvalidAttribute,
                                attr.span,
                                format!("unknown shader stage '{}'", text),
                            );
                            failed = true;
                        }
                    },
                    _ => {
                        self.error(
                            DiagnosticCode::InvalidAttribute,
                            attr.span,
                            "attribute 'shader' expects a stage name string",
                        );
                        failed = true;
                    }
                },
                "numthreads" => match self.uint_args(attr, 3, 3) {
                    Some(args) if args.iter().all(|&n| n > 0) => {
                        thread_group_size = Some([args[0], args[1], args[2]]);
                    }
                    Some(_) => {
                        self.error(
                            DiagnosticCode::InvalidAttribute,
                            attr.span,
                            "thread group dimensions must be positive",
                        );
                        failed = true;
                    }
                    None => failed = true,
                },
                "vk::binding" => {
                    self.error(
                        DiagnosticCode::InvalidAttribute,
                        attr.span,
                        "attribute 'vk::binding' is not valid on a function",
                    );
                    failed = true;
                }
                _ => {}
            }
            attributes.push(Self::lower_attribute(attr));
        }

        if let Some(stage) = stage {
            if node.body.is_none() {
                self.error(
                    DiagnosticCode::InvalidAttribute,
                    name.span,
                    format!("extern function '{}' cannot be a {} entry point", name.name, stage),
                );
                failed = true;
            }
            for param in &params {
                if param.direction == ParamDirection::Uniform && !param.ty.is_data() {
                    self.error(
                        DiagnosticCode::InvalidType,
                        param.span,
                        format!(
                            "uniform entry-point parameter '{}' must have a data type, found '{}'",
                            param.name, param.ty
                        ),
                    );
                    failed = true;
                }
            }
            if stage.uses_thread_groups() {
                if thread_group_size.is_none() {
                    self.warning(
                        DiagnosticCode::MissingThreadGroupSize,
                        name.span,
                        format!(
                            "{} entry point '{}' has no [numthreads] attribute; assuming (1, 1, 1)",
                            stage, name.name
                        ),
                    );
                    thread_group_size = Some([1, 1, 1]);
                }
            } else {
                thread_group_size = None;
            }
        } else {
            thread_group_size = None;
        }

        let mut uses = Vec::new();
        if let Some(body) = &node.body {
            let mut seen = FxHashSet::default();
            for ident in body.idents {
                if !param_names.contains(ident.name)
                    && self.value_names.contains(ident.name)
                    && seen.insert(ident.name)
                {
                    uses.push(ident.name.to_string());
                }
            }
            for literal in body.hashed_strings {
                if self.seen_strings.insert(literal.to_string()) {
                    self.module.hashed_strings.push(HashedString::new(*literal));
                }
            }
        }

        let (false, Some(return_type)) = (failed, return_type) else {
            return;
        };
        let function = FunctionDecl {
            name: name.name.to_string(),
            signature: FunctionSignature {
                params,
                return_type,
                return_semantic: node.return_semantic.map(|s| s.name.to_string()),
            },
            attributes,
            stage,
            thread_group_size,
            has_body: node.body.is_some(),
            uses,
            span: node.span,
        };
        if let Err(previous) = self.module.add_function(function) {
            self.redeclared(name.name, name.span, previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use bumpalo::Bump;
    use shadelink_core::{ParameterCategory, ScalarKind};

    fn check(source: &str) -> (ModuleIr, Diagnostics) {
        let arena = Bump::new();
        let (tokens, _) = Lexer::new(source, &arena).tokenize();
        let (file, errors) = Parser::new(tokens, &arena).parse_file();
        assert!(errors.is_empty(), "{:?}", errors);
        check_module(&file, "test", SourceOrigin::Memory("test.slang".into()))
    }

    fn check_ok(source: &str) -> ModuleIr {
        let (module, diagnostics) = check(source);
        assert!(!diagnostics.has_errors(), "{}", diagnostics);
        module
    }

    fn first_error(source: &str) -> Diagnostic {
        let (_, diagnostics) = check(source);
        diagnostics
            .errors()
            .next()
            .cloned()
            .unwrap_or_else(|| panic!("expected an error for {:?}", source))
    }

    #[test]
    fn resolves_globals_in_order() {
        let module = check_ok(
            "struct Light { float3 dir; };\n\
             ConstantBuffer<Light> light;\n\
             Texture2D<float4> albedo : register(t0);\n\
             SamplerState samp;\n\
             float4x4 world;",
        );
        let names: Vec<_> = module.globals.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["light", "albedo", "samp", "world"]);
        assert_eq!(module.globals[0].ty.category(), ParameterCategory::ConstantBuffer);
        assert_eq!(
            module.globals[1].binding.register,
            Some(RegisterBinding {
                class: RegisterClass::T,
                index: 0,
                space: 0
            })
        );
        assert_eq!(
            module.globals[3].ty,
            ShaderType::Matrix(ScalarKind::Float, 4, 4)
        );
    }

    #[test]
    fn struct_used_before_declaration() {
        check_ok("ConstantBuffer<Params> params;\nstruct Params { float gain; };");
    }

    #[test]
    fn undefined_type() {
        let err = first_error("Foo value;");
        assert_eq!(err.code, DiagnosticCode::UndefinedType);
        assert_eq!(err.message, "undefined type 'Foo'");
        assert_eq!(err.span, Span::new(1, 1, 3));
        assert_eq!(err.origin.as_deref(), Some("test.slang"));
    }

    #[test]
    fn generic_arity_errors() {
        assert_eq!(
            first_error("StructuredBuffer buf;").message,
            "'StructuredBuffer' requires a type argument"
        );
        assert_eq!(
            first_error("SamplerState<float> s;").message,
            "'SamplerState' is not a generic type"
        );
        assert_eq!(
            first_error("Texture2D<float, float> t;").message,
            "'Texture2D' expects 1 type argument, found 2"
        );
        assert_eq!(
            first_error("float<int> f;").message,
            "'float' is not a generic type"
        );
    }

    #[test]
    fn constant_buffer_needs_struct() {
        let err = first_error("ConstantBuffer<float4> cb;");
        assert_eq!(err.code, DiagnosticCode::InvalidType);
        assert!(err.message.contains("must be a struct"));
    }

    #[test]
    fn resources_in_structs_are_rejected() {
        let err = first_error("struct Material { Texture2D tex; float k; };");
        assert_eq!(err.code, DiagnosticCode::InvalidType);
        assert!(err.message.contains("resource type"));
    }

    #[test]
    fn self_containing_structs_are_rejected() {
        let err = first_error("struct A { B b; };\nstruct B { A a; };");
        assert_eq!(err.message, "struct 'A' contains itself");
    }

    #[test]
    fn void_variable() {
        let err = first_error("void nothing;");
        assert_eq!(err.code, DiagnosticCode::InvalidType);
    }

    #[test]
    fn redeclaration() {
        let err = first_error("float gain;\nint gain;");
        assert_eq!(err.code, DiagnosticCode::Redeclaration);
        assert_eq!(err.message, "'gain' is already declared as a variable");
        assert_eq!(err.span.line, 2);
    }

    #[test]
    fn register_class_must_match_category() {
        let err = first_error("Texture2D tex : register(u0);");
        assert_eq!(err.code, DiagnosticCode::InvalidBinding);
        assert!(err.message.contains("expected 't'"));

        let err = first_error("RWTexture2D<float4> tex : register(t0, spaceX);");
        assert_eq!(err.message, "invalid register space 'spaceX'");
    }

    #[test]
    fn register_on_plain_uniform_is_ignored() {
        let (module, diagnostics) = check("float gain : register(b0);");
        assert!(!diagnostics.has_errors());
        assert!(diagnostics.has_code(DiagnosticCode::IgnoredBinding));
        assert!(!module.globals[0].binding.is_explicit());
    }

    #[test]
    fn descriptor_binding_attribute() {
        let module = check_ok("[vk::binding(3, 1)] Texture2D tex;\n[[vk::binding(2)]] SamplerState s;");
        assert_eq!(
            module.globals[0].binding.descriptor,
            Some(DescriptorBinding { index: 3, space: 1 })
        );
        assert_eq!(
            module.globals[1].binding.descriptor,
            Some(DescriptorBinding { index: 2, space: 0 })
        );
    }

    #[test]
    fn entry_point_signature_and_attributes() {
        let module = check_ok(
            r#"
            [shader("compute")]
            [numthreads(8, 4, 1)]
            [MyAttr(1, "x")]
            void main(uint3 tid : SV_DispatchThreadID, uniform float scale) {}
            "#,
        );
        let entry = module.entry_point(0).unwrap();
        assert_eq!(entry.stage, Some(ShaderStage::Compute));
        assert_eq!(entry.thread_group_size, Some([8, 4, 1]));
        assert_eq!(entry.signature.params[1].direction, ParamDirection::Uniform);
        let user: Vec<_> = entry.user_attributes().map(|a| a.name.as_str()).collect();
        assert_eq!(user, ["MyAttr"]);
    }

    #[test]
    fn compute_without_numthreads_warns() {
        let (module, diagnostics) = check("[shader(\"compute\")] void main() {}");
        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.warning_count(), 1);
        assert!(diagnostics.has_code(DiagnosticCode::MissingThreadGroupSize));
        assert_eq!(module.entry_point(0).unwrap().thread_group_size, Some([1, 1, 1]));
    }

    #[test]
    fn unknown_stage() {
        let err = first_error("[shader(\"tessellation\")] void main() {}");
        assert_eq!(err.code, DiagnosticCode::InvalidAttribute);
        assert_eq!(err.message, "unknown shader stage 'tessellation'");
    }

    #[test]
    fn extern_function_cannot_be_entry_point() {
        let err = first_error("[shader(\"vertex\")] float4 main();");
        assert_eq!(err.code, DiagnosticCode::InvalidAttribute);
    }

    #[test]
    fn type_param_constraints() {
        let module = check_ok("interface IMaterial {}\ntype_param M : IMaterial;\ntype_param;");
        assert_eq!(module.type_params.len(), 2);
        assert_eq!(module.type_params[1].name, None);

        let err = first_error("struct S { float x; };\ntype_param M : S;");
        assert_eq!(err.message, "type parameter constraint 'S' is not an interface");
        let err = first_error("type_param M : IMissing;");
        assert_eq!(err.code, DiagnosticCode::UndefinedType);
    }

    #[test]
    fn uses_follow_first_reference_and_skip_params() {
        let module = check_ok(
            r#"
            Texture2D albedo;
            SamplerState samp;
            float gain;
            float4 shade(float2 uv) { return albedo.Sample(samp, uv) * gain; }
            [shader("fragment")]
            float4 main(float2 uv : TEXCOORD, float gain : GAIN) : SV_Target {
                return shade(uv) * gain + shade(uv);
            }
            "#,
        );
        assert_eq!(
            module.find_function("shade").unwrap().uses,
            ["albedo", "samp", "gain"]
        );
        assert_eq!(module.find_function("main").unwrap().uses, ["shade"]);
    }

    #[test]
    fn hashed_strings_are_distinct_in_first_seen_order() {
        let module = check_ok(
            r#"
            void a() { getStringHash("albedo"); getStringHash("normal"); }
            void b() { getStringHash("albedo"); getStringHash("roughness"); }
            "#,
        );
        let values: Vec<_> = module
            .hashed_strings
            .iter()
            .map(|s| s.value.as_str())
            .collect();
        assert_eq!(values, ["albedo", "normal", "roughness"]);
    }

    #[test]
    fn storage_classes() {
        let module = check_ok(
            "extern Texture2D shadowMap;\nstatic const float PI = 3.14159;\nuniform float exposure;",
        );
        assert_eq!(module.globals[0].storage, StorageClass::Extern);
        assert_eq!(module.globals[1].storage, StorageClass::Static);
        assert_eq!(module.globals[2].storage, StorageClass::Uniform);
    }
}
