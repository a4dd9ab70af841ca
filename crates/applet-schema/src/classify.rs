//! Type classification: `TypeNode` → `ParsedNode`.
//!
//! Local type aliases, interfaces and enums are followed through the module.
//! Names currently being expanded are kept on a stack so a self-referencing
//! alias or interface classifies as `unknown` instead of recursing forever.

use crate::ast::{Binding, EnumDecl, Expr, LiteralType, Module, PropSig, TypeNode, VarDecl};
use crate::node::{ArrayElements, EnumValue, ObjectProperty, ParsedNode, PrimitiveKind};

pub struct TypeClassifier<'m> {
    module: &'m Module,
    resolving: Vec<String>,
}

impl<'m> TypeClassifier<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            resolving: Vec::new(),
        }
    }

    /// Classify the declared type of an input property.
    ///
    /// A union consisting only of string literals collapses to plain
    /// `string` at this position; the form renders it as free text.
    pub fn classify_property(&mut self, ty: &TypeNode) -> ParsedNode {
        if let TypeNode::Union(members) = ty {
            let members = without_nullish(members);
            if members.len() > 1 && members.iter().all(|m| is_string_literal(m)) {
                return ParsedNode::primitive(PrimitiveKind::String);
            }
        }
        self.classify(ty)
    }

    pub fn classify(&mut self, ty: &TypeNode) -> ParsedNode {
        match ty {
            TypeNode::Keyword(kw) => keyword_node(kw),
            TypeNode::Literal(lit) => literal_node(lit),
            TypeNode::Array(inner) => self.array_of(inner),
            TypeNode::Union(members) => self.union_of(members),
            TypeNode::Object(members) => self.object_node(members),
            TypeNode::Intersection(_) => match self.object_members(ty) {
                Some(members) => self.object_node(&members),
                None => ParsedNode::unknown(),
            },
            TypeNode::Reference { name, args } => self.reference(name, args),
            TypeNode::KeyofTypeof(name) => self.keyof_typeof(name),
            TypeNode::Other => ParsedNode::unknown(),
        }
    }

    /// The property signatures of an object-shaped type, in declared order.
    ///
    /// Returns `None` when the type is not (or does not resolve to) an
    /// object type whose members can be listed.
    pub fn object_members(&mut self, ty: &TypeNode) -> Option<Vec<PropSig>> {
        match ty {
            TypeNode::Object(members) => Some(fields(members)),
            TypeNode::Intersection(parts) => {
                let mut all = Vec::new();
                for part in parts {
                    merge_members(&mut all, self.object_members(part)?);
                }
                Some(all)
            }
            TypeNode::Union(members) => match without_nullish(members).as_slice() {
                [only] => self.object_members(only),
                _ => None,
            },
            TypeNode::Reference { name, args } => match (name.as_str(), args.as_slice()) {
                ("Partial", [inner]) => Some(with_optional(self.object_members(inner)?, true)),
                ("Required", [inner]) => Some(with_optional(self.object_members(inner)?, false)),
                ("Readonly" | "NonNullable", [inner]) => self.object_members(inner),
                _ => {
                    let module = self.module;
                    if let Some(alias) = module.type_alias(name) {
                        self.guarded(name, |s| s.object_members(&alias.ty))
                    } else if module.interfaces(name).next().is_some() {
                        self.guarded(name, |s| Some(s.interface_members(name)))
                    } else {
                        None
                    }
                }
            },
            _ => None,
        }
    }

    fn guarded<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        if self.resolving.iter().any(|n| n == name) {
            return None;
        }
        self.resolving.push(name.to_string());
        let out = f(self);
        self.resolving.pop();
        out
    }

    /// Members of all declarations of an interface, inherited ones first.
    fn interface_members(&mut self, name: &str) -> Vec<PropSig> {
        let module = self.module;
        let mut members = Vec::new();
        for decl in module.interfaces(name) {
            for base in &decl.extends {
                let base_ty = TypeNode::Reference {
                    name: base.clone(),
                    args: Vec::new(),
                };
                if let Some(inherited) = self.object_members(&base_ty) {
                    merge_members(&mut members, inherited);
                }
            }
            merge_members(&mut members, fields(&decl.members));
        }
        members
    }

    fn object_node(&mut self, members: &[PropSig]) -> ParsedNode {
        let properties = members
            .iter()
            .filter(|m| !m.method)
            .map(|m| ObjectProperty {
                key: m.key.clone(),
                node: match &m.ty {
                    Some(ty) => self.classify_property(ty),
                    None => ParsedNode::any(),
                },
            })
            .collect();
        ParsedNode::Object(properties)
    }

    fn array_of(&mut self, element: &TypeNode) -> ParsedNode {
        if let TypeNode::Union(members) = element {
            let members = without_nullish(members);
            if members.len() > 1 {
                let variants = members.into_iter().map(|m| self.classify(m)).collect();
                return ParsedNode::Array(ArrayElements::Union(variants));
            }
            if let [only] = members.as_slice() {
                return ParsedNode::Array(ArrayElements::Single(Box::new(self.classify(only))));
            }
        }
        ParsedNode::Array(ArrayElements::Single(Box::new(self.classify(element))))
    }

    fn union_of(&mut self, members: &[TypeNode]) -> ParsedNode {
        match without_nullish(members).as_slice() {
            [] => ParsedNode::unknown(),
            [only] => self.classify(only),
            rest => ParsedNode::Union(rest.iter().map(|m| self.classify(m)).collect()),
        }
    }

    fn reference(&mut self, name: &str, args: &[TypeNode]) -> ParsedNode {
        match (name, args) {
            ("Array" | "ReadonlyArray", [element]) => return self.array_of(element),
            ("Date", _) => return ParsedNode::primitive(PrimitiveKind::Date),
            ("File" | "Blob", _) => return ParsedNode::primitive(PrimitiveKind::File),
            ("Partial" | "Required" | "Readonly" | "NonNullable", [inner]) => {
                return self.classify(inner)
            }
            _ => {}
        }

        let module = self.module;
        if let Some(alias) = module.type_alias(name) {
            return self
                .guarded(name, |s| Some(s.alias_node(&alias.ty)))
                .unwrap_or_else(ParsedNode::unknown);
        }
        if module.interfaces(name).next().is_some() {
            return self
                .guarded(name, |s| {
                    let members = s.interface_members(name);
                    Some(s.object_node(&members))
                })
                .unwrap_or_else(ParsedNode::unknown);
        }
        if let Some(decl) = module.enum_decl(name) {
            return enum_node(decl);
        }
        ParsedNode::unknown()
    }

    /// An alias of a string-literal union becomes an enum of the literals.
    fn alias_node(&mut self, target: &TypeNode) -> ParsedNode {
        if let TypeNode::Union(members) = target {
            let members = without_nullish(members);
            let literals: Option<Vec<EnumValue>> = members
                .iter()
                .map(|m| match m {
                    TypeNode::Literal(LiteralType::Str(s)) => Some(EnumValue::Name(s.clone())),
                    _ => None,
                })
                .collect();
            if let Some(values) = literals.filter(|v| !v.is_empty()) {
                return ParsedNode::Enum(values);
            }
        }
        self.classify(target)
    }

    fn keyof_typeof(&self, name: &str) -> ParsedNode {
        if let Some(decl) = self.module.enum_decl(name) {
            return ParsedNode::Enum(
                decl.members
                    .iter()
                    .map(|m| EnumValue::Name(m.name.clone()))
                    .collect(),
            );
        }
        // `keyof typeof CONFIG` over a const object literal
        if let Some(Binding::Variable(VarDecl {
            init: Some(Expr::Object(props)),
            ..
        })) = self.module.binding(name)
        {
            return ParsedNode::Enum(
                props
                    .iter()
                    .map(|p| EnumValue::Name(p.key.clone()))
                    .collect(),
            );
        }
        ParsedNode::unknown()
    }
}

fn keyword_node(kw: &str) -> ParsedNode {
    let kind = match kw {
        "string" => PrimitiveKind::String,
        "number" | "bigint" => PrimitiveKind::Number,
        "boolean" => PrimitiveKind::Boolean,
        "any" => PrimitiveKind::Any,
        _ => PrimitiveKind::Unknown,
    };
    ParsedNode::primitive(kind)
}

fn literal_node(lit: &LiteralType) -> ParsedNode {
    match lit {
        LiteralType::Str(s) => ParsedNode::literal(PrimitiveKind::String, s.clone()),
        LiteralType::Num(n) => ParsedNode::literal(PrimitiveKind::Number, n.clone()),
        LiteralType::Bool(b) => ParsedNode::literal(PrimitiveKind::Boolean, b.to_string()),
    }
}

fn enum_node(decl: &EnumDecl) -> ParsedNode {
    ParsedNode::Enum(
        decl.members
            .iter()
            .map(|m| match &m.value {
                Some(value) => EnumValue::Keyed {
                    key: m.name.clone(),
                    value: value.clone(),
                },
                None => EnumValue::Name(m.name.clone()),
            })
            .collect(),
    )
}

fn is_string_literal(ty: &TypeNode) -> bool {
    matches!(ty, TypeNode::Literal(LiteralType::Str(_)))
}

fn without_nullish(members: &[TypeNode]) -> Vec<&TypeNode> {
    members.iter().filter(|m| !m.is_nullish()).collect()
}

fn with_optional(mut members: Vec<PropSig>, optional: bool) -> Vec<PropSig> {
    for m in &mut members {
        m.optional = optional;
    }
    members
}

/// Data members only; method signatures carry no input.
fn fields(members: &[PropSig]) -> Vec<PropSig> {
    members.iter().filter(|m| !m.method).cloned().collect()
}

/// Later members override earlier ones with the same key in place.
fn merge_members(into: &mut Vec<PropSig>, members: Vec<PropSig>) {
    for member in members {
        match into.iter_mut().find(|m| m.key == member.key) {
            Some(existing) => *existing = member,
            None => into.push(member),
        }
    }
}
