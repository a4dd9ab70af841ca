//! Input schema model.
//!
//! `ParsedNode` is the closed, recursive description of one input's type.
//! It serializes to the `kind`-tagged JSON the form generator and the
//! runtime's boot descriptor consume.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
    Date,
    Any,
    Unknown,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireNode", try_from = "WireNode")]
pub enum ParsedNode {
    Primitive {
        kind: PrimitiveKind,
        /// Source text of a literal type (`"hey"` → `hey`, `1` → `1`)
        literal: Option<String>,
    },
    Array(ArrayElements),
    Object(Vec<ObjectProperty>),
    Union(Vec<ParsedNode>),
    Enum(Vec<EnumValue>),
}

/// Element type of an array node.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElements {
    /// `T[]` where `T` is not a union
    Single(Box<ParsedNode>),
    /// `(A | B)[]`, one node per member
    Union(Vec<ParsedNode>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub key: String,
    pub node: ParsedNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    Name(String),
    Keyed { key: String, value: String },
}

impl ParsedNode {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        ParsedNode::Primitive {
            kind,
            literal: None,
        }
    }

    pub fn literal(kind: PrimitiveKind, text: impl Into<String>) -> Self {
        ParsedNode::Primitive {
            kind,
            literal: Some(text.into()),
        }
    }

    pub fn any() -> Self {
        Self::primitive(PrimitiveKind::Any)
    }

    pub fn unknown() -> Self {
        Self::primitive(PrimitiveKind::Unknown)
    }

    /// The `kind` tag this node serializes with.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParsedNode::Primitive { kind, .. } => match kind {
                PrimitiveKind::String => "string",
                PrimitiveKind::Number => "number",
                PrimitiveKind::Boolean => "boolean",
                PrimitiveKind::Date => "date",
                PrimitiveKind::Any => "any",
                PrimitiveKind::Unknown => "unknown",
                PrimitiveKind::File => "file",
            },
            ParsedNode::Array(_) => "array",
            ParsedNode::Object(_) => "object",
            ParsedNode::Union(_) => "union",
            ParsedNode::Enum(_) => "enum",
        }
    }
}

/// One input of a handler or action, in declared property order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputParam {
    pub key: String,
    pub node: ParsedNode,
    pub optional: bool,
    /// Display name from a `@name` doc tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl InputParam {
    pub fn new(key: impl Into<String>, node: ParsedNode, optional: bool) -> Self {
        Self {
            key: key.into(),
            node,
            optional,
            name: None,
            description: None,
            default_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub inputs: Vec<InputParam>,
}

/// Extraction result for one script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScriptSchema {
    /// `None` when the script has no `handler`
    pub handler: Option<Vec<InputParam>>,
    /// `None` when the script has no `actions` or the map is empty
    pub actions: Option<BTreeMap<String, ActionDescriptor>>,
}

// ---- wire representation ----

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum WireNode {
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        literal: Option<String>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        literal: Option<String>,
    },
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        literal: Option<String>,
    },
    Date {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        literal: Option<String>,
    },
    Any {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        literal: Option<String>,
    },
    Unknown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        literal: Option<String>,
    },
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        literal: Option<String>,
    },
    Array {
        #[serde(rename = "isUnion")]
        is_union: bool,
        elements: WireElements,
    },
    Object {
        properties: Vec<ObjectProperty>,
    },
    Union {
        variants: Vec<ParsedNode>,
    },
    Enum {
        values: Vec<EnumValue>,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireElements {
    Many(Vec<ParsedNode>),
    One(Box<ParsedNode>),
}

impl From<ParsedNode> for WireNode {
    fn from(node: ParsedNode) -> Self {
        match node {
            ParsedNode::Primitive { kind, literal } => match kind {
                PrimitiveKind::String => WireNode::String { literal },
                PrimitiveKind::Number => WireNode::Number { literal },
                PrimitiveKind::Boolean => WireNode::Boolean { literal },
                PrimitiveKind::Date => WireNode::Date { literal },
                PrimitiveKind::Any => WireNode::Any { literal },
                PrimitiveKind::Unknown => WireNode::Unknown { literal },
                PrimitiveKind::File => WireNode::File { literal },
            },
            ParsedNode::Array(ArrayElements::Single(element)) => WireNode::Array {
                is_union: false,
                elements: WireElements::One(element),
            },
            ParsedNode::Array(ArrayElements::Union(members)) => WireNode::Array {
                is_union: true,
                elements: WireElements::Many(members),
            },
            ParsedNode::Object(properties) => WireNode::Object { properties },
            ParsedNode::Union(variants) => WireNode::Union { variants },
            ParsedNode::Enum(values) => WireNode::Enum { values },
        }
    }
}

impl TryFrom<WireNode> for ParsedNode {
    type Error = String;

    fn try_from(wire: WireNode) -> Result<Self, Self::Error> {
        let primitive = |kind, literal| ParsedNode::Primitive { kind, literal };
        Ok(match wire {
            WireNode::String { literal } => primitive(PrimitiveKind::String, literal),
            WireNode::Number { literal } => primitive(PrimitiveKind::Number, literal),
            WireNode::Boolean { literal } => primitive(PrimitiveKind::Boolean, literal),
            WireNode::Date { literal } => primitive(PrimitiveKind::Date, literal),
            WireNode::Any { literal } => primitive(PrimitiveKind::Any, literal),
            WireNode::Unknown { literal } => primitive(PrimitiveKind::Unknown, literal),
            WireNode::File { literal } => primitive(PrimitiveKind::File, literal),
            WireNode::Array { is_union, elements } => match (is_union, elements) {
                (false, WireElements::One(element)) => {
                    ParsedNode::Array(ArrayElements::Single(element))
                }
                (true, WireElements::Many(members)) => {
                    ParsedNode::Array(ArrayElements::Union(members))
                }
                (is_union, _) => {
                    return Err(format!(
                        "array node has isUnion={is_union} but elements of the other shape"
                    ))
                }
            },
            WireNode::Object { properties } => ParsedNode::Object(properties),
            WireNode::Union { variants } => ParsedNode::Union(variants),
            WireNode::Enum { values } => ParsedNode::Enum(values),
        })
    }
}
