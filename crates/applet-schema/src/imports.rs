//! Module specifier scanning and in-place rewriting.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::lexer::{tokenize, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import x from "y"`, `import "y"`
    Static,
    /// `import("y")`
    Dynamic,
    /// `export { x } from "y"`, `export * from "y"`
    ReExport,
}

/// A string-literal module specifier found in source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSpecifier {
    pub specifier: String,
    /// Byte offset of the first character inside the quotes
    pub start: usize,
    /// Byte offset of the closing quote
    pub end: usize,
    pub kind: ImportKind,
}

/// Find every module specifier referenced by `source`, in source order.
///
/// Specifiers are read from the token stream, so text inside comments,
/// strings and templates never matches.
pub fn scan_imports(source: &str) -> Result<Vec<ImportSpecifier>, ParseError> {
    let tokens = tokenize(source)?;
    let mut found = Vec::new();

    for (i, tok) in tokens.iter().enumerate() {
        let after_dot = i > 0 && (tokens[i - 1].is_punct(".") || tokens[i - 1].is_punct("?."));
        if after_dot {
            continue;
        }

        if tok.is_ident("import") {
            match tokens.get(i + 1) {
                Some(next) if next.is_punct("(") => {
                    let literal = tokens.get(i + 2).filter(|t| t.kind == TokenKind::Str);
                    let closed = tokens
                        .get(i + 3)
                        .is_some_and(|t| t.is_punct(")") || t.is_punct(","));
                    if let (Some(lit), true) = (literal, closed) {
                        found.extend(specifier(lit, ImportKind::Dynamic));
                    }
                }
                Some(next) if next.kind == TokenKind::Str => {
                    found.extend(specifier(next, ImportKind::Static));
                }
                Some(_) => {
                    if let Some(lit) = clause_source(&tokens, i + 1) {
                        found.extend(specifier(lit, ImportKind::Static));
                    }
                }
                None => {}
            }
        } else if tok.is_ident("export") {
            let reexport = tokens
                .get(i + 1)
                .is_some_and(|t| t.is_punct("*") || t.is_punct("{") || t.is_ident("type"));
            if reexport {
                if let Some(lit) = clause_source(&tokens, i + 1) {
                    found.extend(specifier(lit, ImportKind::ReExport));
                }
            }
        }
    }

    Ok(found)
}

/// Walks an import/export clause (`x, { a as b }`, `* as ns`, `type { T }`)
/// and returns the string literal after `from`, if the clause has one.
fn clause_source(tokens: &[Token], mut i: usize) -> Option<&Token> {
    while let Some(tok) = tokens.get(i) {
        if tok.is_ident("from") {
            if let Some(lit) = tokens.get(i + 1).filter(|t| t.kind == TokenKind::Str) {
                return Some(lit);
            }
        }
        match tok.kind {
            TokenKind::Punct if tok.text == "{" => {
                let close = tokens[i..].iter().position(|t| t.is_punct("}"))?;
                i += close + 1;
            }
            TokenKind::Punct if tok.text == "*" || tok.text == "," => i += 1,
            TokenKind::Ident if !tok.is_ident("import") && !tok.is_ident("export") => i += 1,
            _ => return None,
        }
    }
    None
}

fn specifier(tok: &Token, kind: ImportKind) -> Option<ImportSpecifier> {
    Some(ImportSpecifier {
        specifier: tok.string_value()?,
        start: tok.start + 1,
        end: tok.end - 1,
        kind,
    })
}

/// Replace specifiers in `source`. The callback returns the new specifier
/// or `None` to leave it untouched; quotes are preserved.
pub fn replace_specifiers<F>(source: &str, imports: &[ImportSpecifier], mut replace: F) -> String
where
    F: FnMut(&ImportSpecifier) -> Option<String>,
{
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for import in imports {
        if import.start < cursor {
            continue;
        }
        if let Some(new) = replace(import) {
            out.push_str(&source[cursor..import.start]);
            out.push_str(&new);
            cursor = import.end;
        }
    }
    out.push_str(&source[cursor..]);
    out
}
