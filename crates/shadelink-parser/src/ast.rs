//! Declaration-level syntax tree.
//!
//! Nodes are `Copy` and borrow from the parse arena. Function bodies are not
//! represented as statements; the parser reduces them to the identifiers and
//! hashed string literals they mention.

use shadelink_core::Span;

/// An identifier with its location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'ast> {
    pub name: &'ast str,
    pub span: Span,
}

/// A type as written: `float4`, `Texture2D<float4>`, `ConstantBuffer<Light>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeExpr<'ast> {
    pub name: Ident<'ast>,
    /// Generic arguments, empty when no `<...>` was written.
    pub args: &'ast [TypeExpr<'ast>],
    /// Whether `<...>` was written at all (distinguishes `Foo<>` from `Foo`).
    pub has_arg_list: bool,
    pub span: Span,
}

/// A declared name with optional array dimensions: `lights[4][2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declarator<'ast> {
    pub name: Ident<'ast>,
    /// Dimensions in source order; `None` for an unsized `[]`.
    pub dims: &'ast [Option<u32>],
}

/// A literal attribute argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttributeArgNode<'ast> {
    Int(i64),
    Float(f64),
    Str(&'ast str),
    Ident(&'ast str),
}

/// `[name(args)]` or `[ns::name(args)]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeNode<'ast> {
    /// Qualified name with `::` separators.
    pub name: &'ast str,
    pub args: &'ast [AttributeArgNode<'ast>],
    pub span: Span,
}

/// `register(t3)` or `register(t3, space1)`, kept as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterNode<'ast> {
    pub slot: Ident<'ast>,
    pub space: Option<Ident<'ast>>,
    pub span: Span,
}

/// Storage modifiers on a global declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageModifiers {
    pub is_extern: bool,
    pub is_uniform: bool,
    pub is_static: bool,
    pub is_const: bool,
}

/// A module-level variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalVarNode<'ast> {
    pub attrs: &'ast [AttributeNode<'ast>],
    pub modifiers: StorageModifiers,
    pub ty: TypeExpr<'ast>,
    pub declarator: Declarator<'ast>,
    pub register: Option<RegisterNode<'ast>>,
    pub has_initializer: bool,
    pub span: Span,
}

/// Parameter passing keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamModifier {
    In,
    Out,
    InOut,
    Uniform,
}

/// A function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamNode<'ast> {
    pub modifier: Option<ParamModifier>,
    pub ty: TypeExpr<'ast>,
    pub declarator: Declarator<'ast>,
    pub semantic: Option<Ident<'ast>>,
    pub span: Span,
}

/// What a scanned function body mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyNode<'ast> {
    /// Identifiers in order of appearance, member accesses excluded.
    pub idents: &'ast [Ident<'ast>],
    /// Contents of `getStringHash("...")` literals, unquoted.
    pub hashed_strings: &'ast [&'ast str],
}

/// A function definition or prototype.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionNode<'ast> {
    pub attrs: &'ast [AttributeNode<'ast>],
    pub return_ty: TypeExpr<'ast>,
    pub name: Ident<'ast>,
    pub params: &'ast [ParamNode<'ast>],
    pub return_semantic: Option<Ident<'ast>>,
    /// `None` for `;`-terminated prototypes.
    pub body: Option<BodyNode<'ast>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldNode<'ast> {
    pub ty: TypeExpr<'ast>,
    pub declarator: Declarator<'ast>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructNode<'ast> {
    pub name: Ident<'ast>,
    pub fields: &'ast [FieldNode<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceNode<'ast> {
    pub name: Ident<'ast>,
    pub span: Span,
}

/// `type_param T : IMaterial;`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeParamNode<'ast> {
    pub name: Option<Ident<'ast>>,
    pub constraint: Option<Ident<'ast>>,
    pub span: Span,
}

/// A top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'ast> {
    Global(GlobalVarNode<'ast>),
    Function(FunctionNode<'ast>),
    Struct(StructNode<'ast>),
    Interface(InterfaceNode<'ast>),
    TypeParam(TypeParamNode<'ast>),
}

impl<'ast> Item<'ast> {
    /// Get the span of this item.
    pub fn span(&self) -> Span {
        match self {
            Self::Global(d) => d.span,
            Self::Function(d) => d.span,
            Self::Struct(d) => d.span,
            Self::Interface(d) => d.span,
            Self::TypeParam(d) => d.span,
        }
    }

    /// The declared name, if the item has one.
    pub fn name(&self) -> Option<Ident<'ast>> {
        match self {
            Self::Global(d) => Some(d.declarator.name),
            Self::Function(d) => Some(d.name),
            Self::Struct(d) => Some(d.name),
            Self::Interface(d) => Some(d.name),
            Self::TypeParam(d) => d.name,
        }
    }
}

/// A parsed source file.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'ast> {
    pub items: &'ast [Item<'ast>],
}
