//! Declaration-level syntax tree.
//!
//! Only top-level declarations are modelled. Function bodies, class bodies
//! and statements other than declarations are skipped by the parser.

use serde_json::Value;

/// How a declaration is exported from its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportKind {
    #[default]
    None,
    Named,
    Default,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Function(FunctionDecl),
    Variable(VarDecl),
    TypeAlias(TypeAliasDecl),
    Interface(InterfaceDecl),
    Enum(EnumDecl),
    /// `export { a, b as c } [from "x"]`
    ExportNamed {
        specifiers: Vec<ExportSpecifier>,
        source: Option<String>,
    },
    /// `export default <expr>`
    ExportDefault(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// `None` only for `export default function () {}`
    pub name: Option<String>,
    pub sig: FunctionSig,
    pub export: ExportKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<TypeNode>,
    pub init: Option<Expr>,
    pub export: ExportKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name: String,
    pub ty: TypeNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub extends: Vec<String>,
    pub members: Vec<PropSig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    /// Initializer text, unquoted when it is a string literal
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}

/// Parameter list of any function-like node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionSig {
    pub params: Vec<Param>,
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub optional: bool,
    pub ty: Option<TypeNode>,
    pub has_default: bool,
}

impl Param {
    /// The binding name for a plain identifier parameter.
    pub fn name(&self) -> Option<&str> {
        match &self.pattern {
            Pattern::Ident(name) | Pattern::Rest(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(String),
    Object(Vec<PatternProp>),
    Rest(String),
    /// Array destructuring and anything else not modelled
    Other,
}

/// One key of an object destructuring pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternProp {
    pub key: String,
    pub has_default: bool,
    /// The default when it is a plain literal
    pub default_literal: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Function(FunctionSig),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Member { object: Box<Expr>, property: String },
    Ident(String),
    Object(Vec<ObjectProp>),
    Literal(Value),
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProp {
    pub key: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralType {
    Str(String),
    Num(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    /// `string`, `number`, `any`, `null`, ...
    Keyword(String),
    Literal(LiteralType),
    Reference { name: String, args: Vec<TypeNode> },
    Array(Box<TypeNode>),
    Union(Vec<TypeNode>),
    Intersection(Vec<TypeNode>),
    Object(Vec<PropSig>),
    /// `keyof typeof Name`
    KeyofTypeof(String),
    Other,
}

impl TypeNode {
    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, TypeNode::Keyword(k) if k == kw)
    }

    /// `null`, `undefined` and `void` carry no input shape.
    pub fn is_nullish(&self) -> bool {
        self.is_keyword("null") || self.is_keyword("undefined") || self.is_keyword("void")
    }
}

/// A property signature in an object type or interface.
#[derive(Debug, Clone, PartialEq)]
pub struct PropSig {
    pub key: String,
    pub optional: bool,
    pub ty: Option<TypeNode>,
    pub doc: Option<String>,
    /// `f(a: string): void` style member; never an input field
    pub method: bool,
}

/// A named value binding in module scope.
#[derive(Debug, Clone, Copy)]
pub enum Binding<'m> {
    Function(&'m FunctionDecl),
    Variable(&'m VarDecl),
}

impl Module {
    pub fn binding(&self, name: &str) -> Option<Binding<'_>> {
        self.items.iter().find_map(|item| match item {
            Item::Function(f) if f.name.as_deref() == Some(name) => Some(Binding::Function(f)),
            Item::Variable(v) if v.name == name => Some(Binding::Variable(v)),
            _ => None,
        })
    }

    pub fn type_alias(&self, name: &str) -> Option<&TypeAliasDecl> {
        self.items.iter().find_map(|item| match item {
            Item::TypeAlias(a) if a.name == name => Some(a),
            _ => None,
        })
    }

    /// All declarations of an interface; TypeScript merges repeated ones.
    pub fn interfaces<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a InterfaceDecl> + 'a {
        self.items.iter().filter_map(move |item| match item {
            Item::Interface(i) if i.name == name => Some(i),
            _ => None,
        })
    }

    pub fn enum_decl(&self, name: &str) -> Option<&EnumDecl> {
        self.items.iter().find_map(|item| match item {
            Item::Enum(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// The local name exported as `exported` through an export list.
    pub fn exported_local(&self, exported: &str) -> Option<&str> {
        self.export_specifiers()
            .find(|s| s.exported == exported)
            .map(|s| s.local.as_str())
    }

    /// How the local binding `name` is exported, combining the declaration's
    /// own modifier with export lists and `export default name`.
    pub fn export_kind(&self, name: &str) -> ExportKind {
        let declared = match self.binding(name) {
            Some(Binding::Function(f)) => f.export,
            Some(Binding::Variable(v)) => v.export,
            None => ExportKind::None,
        };
        if declared != ExportKind::None {
            return declared;
        }

        let mut kind = ExportKind::None;
        for spec in self.export_specifiers().filter(|s| s.local == name) {
            if spec.exported == "default" {
                kind = ExportKind::Default;
            } else if spec.exported == name {
                return ExportKind::Named;
            }
        }
        let default_ident = self.items.iter().any(|item| {
            matches!(item, Item::ExportDefault(Expr::Ident(id)) if id == name)
        });
        if default_ident {
            kind = ExportKind::Default;
        }
        kind
    }

    fn export_specifiers(&self) -> impl Iterator<Item = &ExportSpecifier> {
        self.items.iter().flat_map(|item| match item {
            Item::ExportNamed {
                specifiers,
                source: None,
            } => specifiers.as_slice(),
            _ => &[],
        })
    }
}
