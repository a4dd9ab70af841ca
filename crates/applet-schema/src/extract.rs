//! Schema extraction for `handler` and `actions` exports.
//!
//! Every entry point takes a `strict` flag. Strict callers (publish-time
//! validation) receive an [`ExtractError`]; lenient callers (live preview
//! while editing) get a best-effort result and a `warn!` event.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::warn;

use crate::ast::{ExportKind, FunctionSig, Module, Param, Pattern, PatternProp};
use crate::classify::TypeClassifier;
use crate::error::{ExtractError, Result};
use crate::locator::Locator;
use crate::node::{ActionDescriptor, InputParam, ParsedNode, ScriptSchema};
use crate::parser::parse_module;

pub const HANDLER_EXPORT: &str = "handler";
pub const ACTIONS_EXPORT: &str = "actions";

/// Extract the handler's inputs from source.
///
/// Returns `Ok(None)` when the script has no `handler` (a library file).
pub fn extract_inputs(source: &str, strict: bool) -> Result<Option<Vec<InputParam>>> {
    match parse_for(source, strict)? {
        Some(module) => extract_inputs_from(&module, strict),
        None => Ok(None),
    }
}

/// Extract the handler's inputs from an already parsed module.
pub fn extract_inputs_from(module: &Module, strict: bool) -> Result<Option<Vec<InputParam>>> {
    let Some(local) = root_binding(module, HANDLER_EXPORT, strict)? else {
        return Ok(None);
    };
    let locator = Locator::new(module);
    let sig = match locator.resolve_function(local) {
        Ok(Some(sig)) => sig,
        Ok(None) => {
            return unresolved(HANDLER_EXPORT, "does not resolve to a function", strict).map(Some)
        }
        Err(err) if strict => return Err(err),
        Err(err) => {
            warn!(export = HANDLER_EXPORT, error = %err, "treating handler as unresolved");
            return Ok(Some(Vec::new()));
        }
    };
    inputs_for(module, sig, HANDLER_EXPORT, strict).map(Some)
}

/// Extract the `actions` map from source.
///
/// Returns `Ok(None)` when there is no `actions` export or it is empty.
pub fn extract_actions(
    source: &str,
    strict: bool,
) -> Result<Option<BTreeMap<String, ActionDescriptor>>> {
    match parse_for(source, strict)? {
        Some(module) => extract_actions_from(&module, strict),
        None => Ok(None),
    }
}

pub fn extract_actions_from(
    module: &Module,
    strict: bool,
) -> Result<Option<BTreeMap<String, ActionDescriptor>>> {
    let Some(local) = root_binding(module, ACTIONS_EXPORT, strict)? else {
        return Ok(None);
    };
    let locator = Locator::new(module);
    let props = match locator.resolve_object(local) {
        Ok(Some(props)) => props,
        Ok(None) => return unresolved(ACTIONS_EXPORT, "is not an object literal", strict),
        Err(err) if strict => return Err(err),
        Err(err) => {
            warn!(export = ACTIONS_EXPORT, error = %err, "treating actions as unresolved");
            return Ok(None);
        }
    };

    let mut actions = BTreeMap::new();
    for prop in props {
        let path = format!("{ACTIONS_EXPORT}.{}", prop.key);
        let sig = match locator.resolve_expr(&prop.value) {
            Ok(Some(sig)) => sig,
            Ok(None) if strict => {
                return Err(ExtractError::PropertyResolution {
                    name: path,
                    reason: "does not resolve to a function".to_string(),
                })
            }
            Err(err) if strict => return Err(err),
            Ok(None) => {
                warn!(action = %path, "skipping action that is not a function");
                continue;
            }
            Err(err) => {
                warn!(action = %path, error = %err, "skipping unresolvable action");
                continue;
            }
        };
        let inputs = inputs_for(module, sig, &path, strict)?;
        actions.insert(
            prop.key.clone(),
            ActionDescriptor {
                name: prop.key.clone(),
                inputs,
            },
        );
    }

    Ok((!actions.is_empty()).then_some(actions))
}

/// Extract both the handler inputs and the actions map.
pub fn analyze_script(source: &str, strict: bool) -> Result<ScriptSchema> {
    match parse_for(source, strict)? {
        Some(module) => analyze_module(&module, strict),
        None => Ok(ScriptSchema::default()),
    }
}

pub fn analyze_module(module: &Module, strict: bool) -> Result<ScriptSchema> {
    Ok(ScriptSchema {
        handler: extract_inputs_from(module, strict)?,
        actions: extract_actions_from(module, strict)?,
    })
}

fn parse_for(source: &str, strict: bool) -> Result<Option<Module>> {
    match parse_module(source) {
        Ok(module) => Ok(Some(module)),
        Err(err) if strict => Err(err.into()),
        Err(err) => {
            warn!(error = %err, "script does not parse; skipping schema extraction");
            Ok(None)
        }
    }
}

/// The local binding behind an export name, validating its export shape.
fn root_binding<'m>(module: &'m Module, name: &'m str, strict: bool) -> Result<Option<&'m str>> {
    if module.binding(name).is_some() {
        match module.export_kind(name) {
            ExportKind::Named => {}
            ExportKind::Default => shape_error(
                name,
                "must be a named export, not the default export",
                strict,
            )?,
            ExportKind::None => shape_error(name, "is declared but not exported", strict)?,
        }
        return Ok(Some(name));
    }
    Ok(module.exported_local(name))
}

fn shape_error(name: &str, reason: &str, strict: bool) -> Result<()> {
    if strict {
        return Err(ExtractError::ExportShape {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }
    warn!(export = name, reason, "export shape is invalid");
    Ok(())
}

fn unresolved<T: Default>(name: &str, reason: &str, strict: bool) -> Result<T> {
    if strict {
        return Err(ExtractError::PropertyResolution {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }
    warn!(export = name, reason, "cannot resolve input properties");
    Ok(T::default())
}

fn inputs_for(
    module: &Module,
    sig: &FunctionSig,
    name: &str,
    strict: bool,
) -> Result<Vec<InputParam>> {
    let Some(param) = sig.params.first() else {
        return Ok(Vec::new());
    };
    if param.name().is_some_and(|n| n.starts_with('_')) {
        return Ok(Vec::new());
    }

    let ty = match &param.ty {
        Some(ty) if !ty.is_keyword("any") => ty,
        _ => return untyped_inputs(param, name, strict),
    };

    let mut classifier = TypeClassifier::new(module);
    let Some(members) = classifier.object_members(ty) else {
        return unresolved(name, "parameter type is not an object type", strict);
    };

    let defaults: HashMap<&str, &PatternProp> = match &param.pattern {
        Pattern::Object(props) => props.iter().map(|p| (p.key.as_str(), p)).collect(),
        _ => HashMap::new(),
    };

    let mut inputs = Vec::with_capacity(members.len());
    for member in &members {
        let destructured = defaults.get(member.key.as_str());
        let node = match &member.ty {
            Some(ty) => classifier.classify_property(ty),
            None => ParsedNode::any(),
        };
        let doc = member.doc.as_deref().map(DocTags::parse).unwrap_or_default();
        inputs.push(InputParam {
            key: member.key.clone(),
            node,
            optional: member.optional || destructured.is_some_and(|p| p.has_default),
            name: doc.name,
            description: doc.description,
            default_value: doc
                .default
                .or_else(|| destructured.and_then(|p| p.default_literal.clone())),
        });
    }
    Ok(inputs)
}

/// Inputs for a parameter declared without a type (or as `any`).
fn untyped_inputs(param: &Param, name: &str, strict: bool) -> Result<Vec<InputParam>> {
    match &param.pattern {
        Pattern::Ident(ident) | Pattern::Rest(ident) => Ok(vec![InputParam::new(
            ident.clone(),
            ParsedNode::any(),
            param.optional || param.has_default,
        )]),
        Pattern::Object(props) => Ok(props
            .iter()
            .map(|p| {
                let mut input = InputParam::new(p.key.clone(), ParsedNode::any(), p.has_default);
                input.default_value = p.default_literal.clone();
                input
            })
            .collect()),
        Pattern::Other => unresolved(name, "parameter pattern cannot be enumerated", strict),
    }
}

/// Tags read from a property's `/** ... */` comment.
#[derive(Debug, Default, PartialEq)]
struct DocTags {
    description: Option<String>,
    name: Option<String>,
    default: Option<Value>,
}

impl DocTags {
    fn parse(doc: &str) -> Self {
        let mut tags = DocTags::default();
        let mut text: Vec<&str> = Vec::new();
        for line in doc.lines() {
            let line = line.trim().trim_start_matches('*').trim();
            if let Some(rest) = tag(line, "@name") {
                tags.name = Some(rest.to_string()).filter(|s| !s.is_empty());
            } else if let Some(rest) = tag(line, "@default") {
                tags.default = Some(
                    serde_json::from_str(rest).unwrap_or_else(|_| Value::String(rest.to_string())),
                );
            } else if let Some(rest) = tag(line, "@description") {
                text.push(rest);
            } else if !line.is_empty() && !line.starts_with('@') {
                text.push(line);
            }
        }
        if !text.is_empty() {
            tags.description = Some(text.join(" "));
        }
        tags
    }
}

fn tag<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?;
    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn doc_tags_split_description_name_and_default() {
        let tags = DocTags::parse(" Maximum rows\n * to return.\n * @name Row limit\n * @default 25\n ");
        assert_eq!(tags.description.as_deref(), Some("Maximum rows to return."));
        assert_eq!(tags.name.as_deref(), Some("Row limit"));
        assert_eq!(tags.default, Some(json!(25)));
    }

    #[test]
    fn doc_default_falls_back_to_string() {
        let tags = DocTags::parse(" @default hello world ");
        assert_eq!(tags.default, Some(json!("hello world")));
        assert_eq!(tags.description, None);
    }

    #[test]
    fn unrelated_tags_are_ignored() {
        let tags = DocTags::parse(" @defaultValue 3\n @deprecated ");
        assert_eq!(tags, DocTags::default());
    }

    #[test]
    fn underscore_parameter_has_no_inputs() {
        let inputs = extract_inputs("export function handler(_ctx: { a: string }) {}", true)
            .unwrap()
            .unwrap();
        assert!(inputs.is_empty());
    }

    #[test]
    fn missing_parameter_has_no_inputs() {
        let inputs = extract_inputs("export const handler = async () => 1;", true)
            .unwrap()
            .unwrap();
        assert!(inputs.is_empty());
    }
}
