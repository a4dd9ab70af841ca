//! Recursive-descent parser for top-level TypeScript declarations.
//!
//! Type syntax is parsed fully enough to classify parameter shapes.
//! Expressions are parsed only as far as the locator needs (functions,
//! calls, identifiers, object literals, literals); anything else is skipped
//! by bracket matching and becomes [`Expr::Other`].

use serde_json::Value;

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{tokenize, Token, TokenKind};

type ParseResult<T> = Result<T, ParseError>;

/// Tokenize and parse a module.
pub fn parse_module(source: &str) -> ParseResult<Module> {
    let tokens = tokenize(source)?;
    Parser::new(source, tokens).parse()
}

const TYPE_KEYWORDS: &[&str] = &[
    "string", "number", "boolean", "any", "unknown", "null", "undefined", "void", "never",
    "object", "bigint", "symbol",
];

const PARAM_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "override"];

// An identifier ending the previous line that still expects an operand.
const CONTINUING_KEYWORDS: &[&str] = &[
    "typeof", "new", "await", "yield", "as", "satisfies", "extends", "keyof", "in", "of",
    "instanceof", "void", "delete", "export", "default", "const", "let", "var", "async", "from",
    "import", "type",
];

// An identifier starting a line that continues the previous expression.
const CONTINUATION_KEYWORDS: &[&str] = &["as", "satisfies", "instanceof", "in", "of", "extends"];

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
        }
    }

    fn parse(mut self) -> ParseResult<Module> {
        let mut items = Vec::new();
        while !self.at_end() {
            if self.eat(";") {
                continue;
            }
            self.parse_item(&mut items)?;
        }
        Ok(Module { items })
    }

    // ---- token helpers ----

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, punct: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(punct))
    }

    fn check_ident(&self, name: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(name))
    }

    fn check_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn nth_is_punct(&self, n: usize, punct: &str) -> bool {
        self.peek_at(n).is_some_and(|t| t.is_punct(punct))
    }

    fn nth_is_ident(&self, n: usize, name: &str) -> bool {
        self.peek_at(n).is_some_and(|t| t.is_ident(name))
    }

    fn nth_kind(&self, n: usize, kind: TokenKind) -> bool {
        self.peek_at(n).is_some_and(|t| t.kind == kind)
    }

    fn newline_before(&self) -> bool {
        self.peek().is_some_and(|t| t.newline_before)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.check(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.check_ident(name) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> ParseResult<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected `{punct}`")))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::Ident => {
                let name = tok.text.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("expected identifier")),
        }
    }

    fn unexpected(&self, message: &str) -> ParseError {
        match self.peek().or_else(|| self.tokens.last()) {
            Some(tok) if !self.at_end() => ParseError::new(
                format!("{message}, found `{}`", tok.text),
                tok.line,
                tok.column,
            ),
            Some(tok) => ParseError::new(
                format!("{message}, found end of input"),
                tok.line,
                tok.column + tok.text.chars().count(),
            ),
            None => ParseError::new(format!("{message}, found end of input"), 1, 1),
        }
    }

    // ---- skipping ----

    /// Skips a balanced `(...)`, `[...]` or `{...}` group starting at the
    /// current token.
    fn skip_group(&mut self) -> ParseResult<()> {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            self.pos += 1;
                            return Ok(());
                        }
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
        Err(self.unexpected("unbalanced brackets"))
    }

    /// Skips `<...>` type parameters or arguments.
    fn skip_angle(&mut self) -> ParseResult<()> {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "<" => depth += 1,
                    ">" => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            self.pos += 1;
                            return Ok(());
                        }
                    }
                    "(" | "[" | "{" => {
                        self.skip_group()?;
                        continue;
                    }
                    ";" | ")" | "]" | "}" => break,
                    _ => {}
                }
            }
            self.pos += 1;
        }
        Err(self.unexpected("unbalanced `<`"))
    }

    /// Whether automatic semicolon insertion ends a statement before the
    /// current token.
    fn asi_boundary(&self) -> bool {
        let (Some(prev), Some(tok)) = (
            self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)),
            self.peek(),
        ) else {
            return false;
        };
        if !tok.newline_before {
            return false;
        }
        let prev_ends = match prev.kind {
            TokenKind::Punct => matches!(prev.text.as_str(), ")" | "]" | "}" | "++" | "--"),
            TokenKind::Ident => !CONTINUING_KEYWORDS.contains(&prev.text.as_str()),
            _ => true,
        };
        let tok_starts = match tok.kind {
            TokenKind::Punct => false,
            TokenKind::Ident => !CONTINUATION_KEYWORDS.contains(&tok.text.as_str()),
            _ => true,
        };
        prev_ends && tok_starts
    }

    /// Skips one statement, consuming its terminating `;` if present.
    fn skip_statement(&mut self) {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if self.pos > start && depth == 0 && self.asi_boundary() {
                return;
            }
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    ";" if depth == 0 => {
                        self.pos += 1;
                        return;
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
    }

    /// Skips an expression up to (not including) the token that ends it.
    fn skip_expr(&mut self) {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if depth == 0 {
                if self.pos > start && self.asi_boundary() {
                    return;
                }
                if tok.kind == TokenKind::Punct
                    && matches!(tok.text.as_str(), "," | ";" | ")" | "]" | "}")
                {
                    return;
                }
            }
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            self.pos += 1;
        }
    }

    /// Skips one non-property member of an object type (index, call or
    /// construct signature, accessor).
    fn skip_type_member(&mut self) {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if depth == 0 && self.pos > start && tok.newline_before {
                return;
            }
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "(" | "[" | "{" | "<" => depth += 1,
                    ")" | "]" | ">" => depth = depth.saturating_sub(1),
                    "}" if depth == 0 => return,
                    "}" => depth -= 1,
                    ";" | "," if depth == 0 => {
                        self.pos += 1;
                        return;
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
    }

    fn skip_class(&mut self) -> ParseResult<()> {
        while !self.at_end() && !self.check("{") {
            if self.check("(") || self.check("[") {
                self.skip_group()?;
            } else {
                self.pos += 1;
            }
        }
        self.skip_group()
    }

    fn source_between(&self, first: usize, last: usize) -> String {
        match (self.tokens.get(first), self.tokens.get(last)) {
            (Some(a), Some(b)) if a.start <= b.end => self.src[a.start..b.end].to_string(),
            _ => String::new(),
        }
    }

    // ---- declarations ----

    fn parse_item(&mut self, items: &mut Vec<Item>) -> ParseResult<()> {
        if self.check_ident("export") && !self.nth_is_punct(1, ".") {
            self.pos += 1;
            return self.parse_export(items);
        }
        self.parse_declaration(items, ExportKind::None)
    }

    fn parse_export(&mut self, items: &mut Vec<Item>) -> ParseResult<()> {
        if self.eat_ident("default") {
            if self.check_ident("function")
                || (self.check_ident("async") && self.nth_is_ident(1, "function"))
            {
                let decl = self.parse_function_decl(ExportKind::Default)?;
                items.push(Item::Function(decl));
            } else if self.check_ident("class") || self.check_ident("abstract") {
                self.skip_class()?;
                items.push(Item::ExportDefault(Expr::Other));
            } else if self.check_ident("interface") {
                self.parse_declaration(items, ExportKind::Default)?;
            } else {
                let expr = self.parse_expr()?;
                self.eat(";");
                items.push(Item::ExportDefault(expr));
            }
            return Ok(());
        }

        if self.check("*") || self.check("=") || self.check_ident("import") {
            self.skip_statement();
            return Ok(());
        }
        if self.check_ident("type") && self.nth_is_punct(1, "{") {
            self.pos += 1;
        }
        if self.check("{") {
            let specifiers = self.parse_export_specifiers()?;
            let source = if self.eat_ident("from") {
                let source = self.peek().and_then(Token::string_value);
                self.pos += 1;
                source
            } else {
                None
            };
            self.eat(";");
            items.push(Item::ExportNamed { specifiers, source });
            return Ok(());
        }
        self.parse_declaration(items, ExportKind::Named)
    }

    fn parse_export_specifiers(&mut self) -> ParseResult<Vec<ExportSpecifier>> {
        self.expect("{")?;
        let mut specifiers = Vec::new();
        while !self.check("}") {
            if self.check_ident("type")
                && !(self.nth_is_punct(1, ",")
                    || self.nth_is_punct(1, "}")
                    || self.nth_is_ident(1, "as"))
            {
                self.pos += 1;
            }
            let local = self.module_export_name()?;
            let exported = if self.eat_ident("as") {
                self.module_export_name()?
            } else {
                local.clone()
            };
            specifiers.push(ExportSpecifier { local, exported });
            if !self.eat(",") {
                break;
            }
        }
        self.expect("}")?;
        Ok(specifiers)
    }

    fn module_export_name(&mut self) -> ParseResult<String> {
        if let Some(value) = self.peek().and_then(Token::string_value) {
            self.pos += 1;
            return Ok(value);
        }
        self.expect_identifier()
    }

    fn parse_declaration(&mut self, items: &mut Vec<Item>, export: ExportKind) -> ParseResult<()> {
        self.eat_ident("declare");
        let Some(tok) = self.peek() else {
            return Ok(());
        };
        if tok.kind != TokenKind::Ident {
            self.skip_statement();
            return Ok(());
        }

        let keyword = tok.text.clone();
        match keyword.as_str() {
            "function" => {
                let decl = self.parse_function_decl(export)?;
                items.push(Item::Function(decl));
            }
            "async" if self.nth_is_ident(1, "function") => {
                let decl = self.parse_function_decl(export)?;
                items.push(Item::Function(decl));
            }
            "const" if self.nth_is_ident(1, "enum") => {
                self.pos += 1;
                items.push(Item::Enum(self.parse_enum()?));
            }
            "const" | "let" | "var" if self.nth_kind(1, TokenKind::Ident)
                || self.nth_is_punct(1, "{")
                || self.nth_is_punct(1, "[") =>
            {
                self.parse_var_decls(items, export)?;
            }
            "type" if self.nth_kind(1, TokenKind::Ident)
                && (self.peek_at(2).is_some_and(|t| t.is_punct("=") || t.is_punct("<"))) =>
            {
                items.push(Item::TypeAlias(self.parse_type_alias()?));
            }
            "interface" if self.nth_kind(1, TokenKind::Ident) => {
                items.push(Item::Interface(self.parse_interface()?));
            }
            "enum" if self.nth_kind(1, TokenKind::Ident) => {
                items.push(Item::Enum(self.parse_enum()?));
            }
            "class" | "abstract" => self.skip_class()?,
            _ => self.skip_statement(),
        }
        Ok(())
    }

    fn parse_function_decl(&mut self, export: ExportKind) -> ParseResult<FunctionDecl> {
        let is_async = self.eat_ident("async");
        if !self.eat_ident("function") {
            return Err(self.unexpected("expected `function`"));
        }
        self.eat("*");
        let name = if self.check_kind(TokenKind::Ident) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let sig = self.parse_function_rest(is_async)?;
        Ok(FunctionDecl { name, sig, export })
    }

    /// Parses type parameters, parameters, return type and body.
    fn parse_function_rest(&mut self, is_async: bool) -> ParseResult<FunctionSig> {
        if self.check("<") {
            self.skip_angle()?;
        }
        let params = self.parse_params()?;
        if self.eat(":") {
            self.parse_type()?;
        }
        if self.check("{") {
            self.skip_group()?;
        } else {
            self.eat(";");
        }
        Ok(FunctionSig { params, is_async })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        self.expect("(")?;
        let mut params = Vec::new();
        while !self.check(")") {
            if self.at_end() {
                return Err(self.unexpected("expected `)`"));
            }
            while self
                .peek()
                .is_some_and(|t| PARAM_MODIFIERS.contains(&t.text.as_str()))
                && (self.nth_kind(1, TokenKind::Ident)
                    || self.nth_is_punct(1, "{")
                    || self.nth_is_punct(1, "["))
            {
                self.pos += 1;
            }

            let pattern = if self.eat("...") {
                if self.check_kind(TokenKind::Ident) {
                    Pattern::Rest(self.expect_identifier()?)
                } else {
                    self.skip_group()?;
                    Pattern::Other
                }
            } else if self.check("{") {
                self.parse_object_pattern()?
            } else if self.check("[") {
                self.skip_group()?;
                Pattern::Other
            } else {
                Pattern::Ident(self.expect_identifier()?)
            };
            let optional = self.eat("?");
            let ty = if self.eat(":") {
                Some(self.parse_type()?)
            } else {
                None
            };
            let has_default = if self.eat("=") {
                self.skip_expr();
                true
            } else {
                false
            };

            if pattern != Pattern::Ident("this".to_string()) {
                params.push(Param {
                    pattern,
                    optional,
                    ty,
                    has_default,
                });
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")")?;
        Ok(params)
    }

    fn parse_object_pattern(&mut self) -> ParseResult<Pattern> {
        self.expect("{")?;
        let mut props = Vec::new();
        while !self.check("}") {
            if self.at_end() {
                return Err(self.unexpected("expected `}`"));
            }
            if self.eat("...") {
                self.expect_identifier()?;
                self.eat(",");
                continue;
            }
            let key = self.parse_property_key()?;
            if self.eat(":") {
                if self.check("{") || self.check("[") {
                    self.skip_group()?;
                } else {
                    self.expect_identifier()?;
                }
            }
            let (has_default, default_literal) = if self.eat("=") {
                match self.parse_expr()? {
                    Expr::Literal(value) => (true, Some(value)),
                    _ => (true, None),
                }
            } else {
                (false, None)
            };
            if let Some(key) = key {
                props.push(PatternProp {
                    key,
                    has_default,
                    default_literal,
                });
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect("}")?;
        Ok(Pattern::Object(props))
    }

    /// Identifier, string or numeric key. Computed keys return `None`.
    fn parse_property_key(&mut self) -> ParseResult<Option<String>> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.unexpected("expected property key"));
        };
        let key = match tok.kind {
            TokenKind::Ident | TokenKind::Number => Some(tok.text),
            TokenKind::Str => tok.string_value(),
            TokenKind::Punct if tok.text == "[" => {
                self.skip_group()?;
                return Ok(None);
            }
            _ => return Err(self.unexpected("expected property key")),
        };
        self.pos += 1;
        Ok(key)
    }

    fn parse_var_decls(&mut self, items: &mut Vec<Item>, export: ExportKind) -> ParseResult<()> {
        self.pos += 1;
        loop {
            if self.check("{") || self.check("[") {
                self.skip_group()?;
                if self.eat(":") {
                    self.parse_type()?;
                }
                if self.eat("=") {
                    self.skip_expr();
                }
            } else {
                let name = self.expect_identifier()?;
                self.eat("!");
                let ty = if self.eat(":") {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let init = if self.eat("=") {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                items.push(Item::Variable(VarDecl {
                    name,
                    ty,
                    init,
                    export,
                }));
            }
            if !self.eat(",") {
                break;
            }
        }
        self.eat(";");
        Ok(())
    }

    fn parse_type_alias(&mut self) -> ParseResult<TypeAliasDecl> {
        self.pos += 1;
        let name = self.expect_identifier()?;
        if self.check("<") {
            self.skip_angle()?;
        }
        self.expect("=")?;
        let ty = self.parse_type()?;
        self.eat(";");
        Ok(TypeAliasDecl { name, ty })
    }

    fn parse_interface(&mut self) -> ParseResult<InterfaceDecl> {
        self.pos += 1;
        let name = self.expect_identifier()?;
        if self.check("<") {
            self.skip_angle()?;
        }
        let mut extends = Vec::new();
        if self.eat_ident("extends") {
            loop {
                extends.push(self.qualified_name()?);
                if self.check("<") {
                    self.skip_angle()?;
                }
                if !self.eat(",") {
                    break;
                }
            }
        }
        let members = self.parse_object_type_members()?;
        Ok(InterfaceDecl {
            name,
            extends,
            members,
        })
    }

    fn parse_enum(&mut self) -> ParseResult<EnumDecl> {
        self.pos += 1;
        let name = self.expect_identifier()?;
        self.expect("{")?;
        let mut members = Vec::new();
        while !self.check("}") {
            let Some(member) = self.parse_property_key()? else {
                return Err(self.unexpected("expected enum member"));
            };
            let value = if self.eat("=") {
                let first = self.pos;
                let literal = self.peek().and_then(Token::string_value);
                self.skip_expr();
                if self.pos == first {
                    return Err(self.unexpected("expected enum initializer"));
                }
                match literal {
                    Some(text) if self.pos == first + 1 => Some(text),
                    _ => Some(self.source_between(first, self.pos - 1)),
                }
            } else {
                None
            };
            members.push(EnumMember {
                name: member,
                value,
            });
            if !self.eat(",") {
                break;
            }
        }
        self.expect("}")?;
        Ok(EnumDecl { name, members })
    }

    fn qualified_name(&mut self) -> ParseResult<String> {
        let mut name = self.expect_identifier()?;
        while self.check(".") && self.nth_kind(1, TokenKind::Ident) {
            self.pos += 1;
            name.push('.');
            name.push_str(&self.expect_identifier()?);
        }
        Ok(name)
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        let start = self.pos;
        let expr = match self.parse_postfix_expr() {
            Ok(expr) => expr,
            Err(_) => {
                self.pos = start;
                self.skip_expr();
                return Ok(Expr::Other);
            }
        };
        if self.at_expr_end() {
            Ok(expr)
        } else {
            self.skip_expr();
            Ok(Expr::Other)
        }
    }

    fn at_expr_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(tok) if tok.kind == TokenKind::Punct => {
                matches!(tok.text.as_str(), "," | ";" | ")" | "]" | "}")
            }
            Some(_) => self.asi_boundary(),
        }
    }

    fn parse_postfix_expr(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            if self.check(".") || self.check("?.") {
                self.pos += 1;
                if self.check("(") {
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                } else if self.check("[") {
                    self.skip_group()?;
                    expr = Expr::Other;
                } else {
                    let property = self.expect_identifier()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                    };
                }
            } else if self.check("(") && !self.newline_before() {
                let args = self.parse_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.check("[") && !self.newline_before() {
                self.skip_group()?;
                expr = Expr::Other;
            } else if self.check("<")
                && matches!(expr, Expr::Ident(_) | Expr::Member { .. })
            {
                // explicit type arguments on a call: f<T>(x)
                let save = self.pos;
                if self.skip_angle().is_ok() && self.check("(") {
                    continue;
                }
                self.pos = save;
                break;
            } else if self.check("!") && !self.newline_before() {
                self.pos += 1;
            } else if (self.check_ident("as") || self.check_ident("satisfies"))
                && !self.newline_before()
            {
                self.pos += 1;
                if !self.eat_ident("const") {
                    self.parse_type()?;
                }
            } else if self.check_kind(TokenKind::Template) && !self.newline_before() {
                self.pos += 1;
                expr = Expr::Other;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect("(")?;
        let mut args = Vec::new();
        while !self.check(")") {
            if self.at_end() {
                return Err(self.unexpected("expected `)`"));
            }
            if self.eat("...") {
                self.skip_expr();
                args.push(Expr::Other);
            } else {
                args.push(self.parse_expr()?);
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")")?;
        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> ParseResult<Expr> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.unexpected("expected expression"));
        };
        match tok.kind {
            TokenKind::Str => {
                self.pos += 1;
                Ok(Expr::Literal(Value::String(
                    tok.string_value().unwrap_or_default(),
                )))
            }
            TokenKind::Number => {
                self.pos += 1;
                Ok(Expr::Literal(number_value(&tok.text, false)))
            }
            TokenKind::Template => {
                self.pos += 1;
                let inner = &tok.text[1..tok.text.len().saturating_sub(1).max(1)];
                if inner.contains("${") {
                    Ok(Expr::Other)
                } else {
                    Ok(Expr::Literal(Value::String(inner.to_string())))
                }
            }
            TokenKind::Regex | TokenKind::Jsx => {
                self.pos += 1;
                Ok(Expr::Other)
            }
            TokenKind::Punct => match tok.text.as_str() {
                "(" => {
                    if let Some(sig) = self.try_arrow(false)? {
                        return Ok(Expr::Function(sig));
                    }
                    self.pos += 1;
                    let inner = self.parse_expr()?;
                    self.expect(")")?;
                    Ok(inner)
                }
                "<" => {
                    self.skip_angle()?;
                    match self.try_arrow(false)? {
                        Some(sig) => Ok(Expr::Function(sig)),
                        None => Err(self.unexpected("expected arrow function")),
                    }
                }
                "{" => self.parse_object_literal(),
                "-" if self.nth_kind(1, TokenKind::Number) => {
                    let text = self.peek_at(1).map(|t| t.text.clone()).unwrap_or_default();
                    self.pos += 2;
                    Ok(Expr::Literal(number_value(&text, true)))
                }
                "[" => {
                    self.skip_group()?;
                    Ok(Expr::Other)
                }
                "!" | "+" | "-" | "~" | "++" | "--" => {
                    self.pos += 1;
                    self.parse_postfix_expr()?;
                    Ok(Expr::Other)
                }
                _ => Err(self.unexpected("expected expression")),
            },
            TokenKind::Ident => self.parse_ident_expr(&tok),
        }
    }

    fn parse_ident_expr(&mut self, tok: &Token) -> ParseResult<Expr> {
        match tok.text.as_str() {
            "async" if !self.peek_at(1).is_some_and(|t| t.newline_before) => {
                if self.nth_is_ident(1, "function") {
                    self.pos += 2;
                    self.eat("*");
                    if self.check_kind(TokenKind::Ident) {
                        self.pos += 1;
                    }
                    return Ok(Expr::Function(self.parse_function_rest(true)?));
                }
                if self.nth_kind(1, TokenKind::Ident) && self.peek_at(2).is_some_and(|t| t.is_punct("=>")) {
                    self.pos += 1;
                    return self.parse_single_param_arrow(true);
                }
                if self.nth_is_punct(1, "(") || self.nth_is_punct(1, "<") {
                    let save = self.pos;
                    self.pos += 1;
                    if self.check("<") {
                        self.skip_angle()?;
                    }
                    if let Some(sig) = self.try_arrow(true)? {
                        return Ok(Expr::Function(sig));
                    }
                    self.pos = save;
                }
                self.pos += 1;
                Ok(Expr::Ident(tok.text.clone()))
            }
            "function" => {
                self.pos += 1;
                self.eat("*");
                if self.check_kind(TokenKind::Ident) {
                    self.pos += 1;
                }
                Ok(Expr::Function(self.parse_function_rest(false)?))
            }
            "true" | "false" => {
                self.pos += 1;
                Ok(Expr::Literal(Value::Bool(tok.text == "true")))
            }
            "null" => {
                self.pos += 1;
                Ok(Expr::Literal(Value::Null))
            }
            "new" => {
                self.pos += 1;
                self.parse_primary_expr()?;
                while self.check(".") && self.nth_kind(1, TokenKind::Ident) {
                    self.pos += 2;
                }
                if self.check("<") {
                    self.skip_angle()?;
                }
                if self.check("(") {
                    self.skip_group()?;
                }
                Ok(Expr::Other)
            }
            "await" | "typeof" | "void" | "delete" | "yield" => {
                self.pos += 1;
                self.parse_postfix_expr()?;
                Ok(Expr::Other)
            }
            "class" => {
                self.skip_class()?;
                Ok(Expr::Other)
            }
            _ if self.peek_at(1).is_some_and(|t| t.is_punct("=>") && !t.newline_before) => {
                self.parse_single_param_arrow(false)
            }
            _ => {
                self.pos += 1;
                Ok(Expr::Ident(tok.text.clone()))
            }
        }
    }

    /// `x => ...`, positioned on `x`.
    fn parse_single_param_arrow(&mut self, is_async: bool) -> ParseResult<Expr> {
        let name = self.expect_identifier()?;
        self.expect("=>")?;
        self.skip_arrow_body()?;
        Ok(Expr::Function(FunctionSig {
            params: vec![Param {
                pattern: Pattern::Ident(name),
                optional: false,
                ty: None,
                has_default: false,
            }],
            is_async,
        }))
    }

    /// Attempts `(params): Ret => body` at the current `(`, restoring the
    /// position when the tokens are not an arrow function.
    fn try_arrow(&mut self, is_async: bool) -> ParseResult<Option<FunctionSig>> {
        let save = self.pos;
        match self.arrow_head() {
            Ok(params) => {
                self.expect("=>")?;
                self.skip_arrow_body()?;
                Ok(Some(FunctionSig { params, is_async }))
            }
            Err(_) => {
                self.pos = save;
                Ok(None)
            }
        }
    }

    fn arrow_head(&mut self) -> ParseResult<Vec<Param>> {
        let params = self.parse_params()?;
        if self.eat(":") {
            self.parse_type()?;
        }
        if self.check("=>") && !self.newline_before() {
            Ok(params)
        } else {
            Err(self.unexpected("expected `=>`"))
        }
    }

    fn skip_arrow_body(&mut self) -> ParseResult<()> {
        if self.check("{") {
            self.skip_group()
        } else {
            self.skip_expr();
            Ok(())
        }
    }

    fn parse_object_literal(&mut self) -> ParseResult<Expr> {
        self.expect("{")?;
        let mut props = Vec::new();
        while !self.check("}") {
            if self.at_end() {
                return Err(self.unexpected("expected `}`"));
            }
            if self.eat("...") {
                self.skip_expr();
                self.eat(",");
                continue;
            }
            let modifier_follows = |p: &Self| {
                p.peek_at(1).is_some_and(|t| {
                    !(t.is_punct(":") || t.is_punct("(") || t.is_punct(",") || t.is_punct("}"))
                })
            };
            if (self.check_ident("get") || self.check_ident("set")) && modifier_follows(self) {
                self.pos += 1;
                self.parse_property_key()?;
                self.parse_function_rest(false)?;
                self.eat(",");
                continue;
            }
            let is_async = self.check_ident("async") && modifier_follows(self);
            if is_async {
                self.pos += 1;
            }
            self.eat("*");

            let key = self.parse_property_key()?;
            let value = if self.eat(":") {
                self.parse_expr()?
            } else if self.check("(") || self.check("<") {
                Expr::Function(self.parse_function_rest(is_async)?)
            } else if let Some(key) = &key {
                Expr::Ident(key.clone())
            } else {
                Expr::Other
            };
            if let Some(key) = key {
                props.push(ObjectProp { key, value });
            }
            if !self.eat(",") {
                break;
            }
        }
        self.expect("}")?;
        Ok(Expr::Object(props))
    }

    // ---- types ----

    fn parse_type(&mut self) -> ParseResult<TypeNode> {
        let ty = self.parse_union_type()?;
        if self.check_ident("extends") && !self.newline_before() {
            // conditional type
            self.pos += 1;
            self.parse_union_type()?;
            self.expect("?")?;
            self.parse_type()?;
            self.expect(":")?;
            self.parse_type()?;
            return Ok(TypeNode::Other);
        }
        Ok(ty)
    }

    fn parse_union_type(&mut self) -> ParseResult<TypeNode> {
        self.eat("|");
        let mut members = vec![self.parse_intersection_type()?];
        while self.eat("|") {
            members.push(self.parse_intersection_type()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeNode::Union(members)
        })
    }

    fn parse_intersection_type(&mut self) -> ParseResult<TypeNode> {
        self.eat("&");
        let mut members = vec![self.parse_postfix_type()?];
        while self.eat("&") {
            members.push(self.parse_postfix_type()?);
        }
        Ok(if members.len() == 1 {
            members.remove(0)
        } else {
            TypeNode::Intersection(members)
        })
    }

    fn parse_postfix_type(&mut self) -> ParseResult<TypeNode> {
        let mut ty = self.parse_primary_type()?;
        while self.check("[") && !self.newline_before() {
            if self.nth_is_punct(1, "]") {
                self.pos += 2;
                ty = TypeNode::Array(Box::new(ty));
            } else {
                // indexed access
                self.skip_group()?;
                ty = TypeNode::Other;
            }
        }
        Ok(ty)
    }

    fn parse_primary_type(&mut self) -> ParseResult<TypeNode> {
        let Some(tok) = self.peek().cloned() else {
            return Err(self.unexpected("expected type"));
        };
        match tok.kind {
            TokenKind::Str => {
                self.pos += 1;
                Ok(TypeNode::Literal(LiteralType::Str(
                    tok.string_value().unwrap_or_default(),
                )))
            }
            TokenKind::Number => {
                self.pos += 1;
                Ok(TypeNode::Literal(LiteralType::Num(tok.text.clone())))
            }
            TokenKind::Template => {
                self.pos += 1;
                Ok(TypeNode::Other)
            }
            TokenKind::Punct => match tok.text.as_str() {
                "(" => {
                    if self.try_function_type() {
                        return Ok(TypeNode::Other);
                    }
                    self.pos += 1;
                    let inner = self.parse_type()?;
                    self.expect(")")?;
                    Ok(inner)
                }
                "<" => {
                    self.skip_angle()?;
                    if self.try_function_type() {
                        Ok(TypeNode::Other)
                    } else {
                        Err(self.unexpected("expected function type"))
                    }
                }
                "{" if self.is_mapped_type() => {
                    self.skip_group()?;
                    Ok(TypeNode::Other)
                }
                "{" => Ok(TypeNode::Object(self.parse_object_type_members()?)),
                "[" => {
                    self.skip_group()?;
                    Ok(TypeNode::Other)
                }
                "-" if self.nth_kind(1, TokenKind::Number) => {
                    let text = self.peek_at(1).map(|t| t.text.clone()).unwrap_or_default();
                    self.pos += 2;
                    Ok(TypeNode::Literal(LiteralType::Num(format!("-{text}"))))
                }
                _ => Err(self.unexpected("expected type")),
            },
            TokenKind::Ident => self.parse_named_type(&tok),
            TokenKind::Regex | TokenKind::Jsx => Err(self.unexpected("expected type")),
        }
    }

    fn parse_named_type(&mut self, tok: &Token) -> ParseResult<TypeNode> {
        match tok.text.as_str() {
            "keyof" => {
                self.pos += 1;
                if self.eat_ident("typeof") {
                    let name = self.qualified_name()?;
                    return Ok(TypeNode::KeyofTypeof(name));
                }
                self.parse_postfix_type()?;
                Ok(TypeNode::Other)
            }
            "typeof" => {
                self.pos += 1;
                self.qualified_name()?;
                if self.check("<") {
                    self.skip_angle()?;
                }
                Ok(TypeNode::Other)
            }
            "readonly" => {
                self.pos += 1;
                self.parse_postfix_type()
            }
            "unique" | "infer" => {
                self.pos += 1;
                self.parse_primary_type()?;
                Ok(TypeNode::Other)
            }
            "abstract" | "new" => {
                self.pos += 1;
                self.eat_ident("new");
                if self.check("<") {
                    self.skip_angle()?;
                }
                if self.try_function_type() {
                    Ok(TypeNode::Other)
                } else {
                    Err(self.unexpected("expected constructor type"))
                }
            }
            "asserts" if self.nth_kind(1, TokenKind::Ident) => {
                self.pos += 2;
                if self.eat_ident("is") {
                    self.parse_type()?;
                }
                Ok(TypeNode::Other)
            }
            "true" | "false" => {
                self.pos += 1;
                Ok(TypeNode::Literal(LiteralType::Bool(tok.text == "true")))
            }
            kw if TYPE_KEYWORDS.contains(&kw) => {
                self.pos += 1;
                Ok(TypeNode::Keyword(kw.to_string()))
            }
            _ => {
                let name = self.qualified_name()?;
                if self.check_ident("is") && !self.newline_before() {
                    // type predicate: `x is T`
                    self.pos += 1;
                    self.parse_type()?;
                    return Ok(TypeNode::Other);
                }
                if name == "this" {
                    return Ok(TypeNode::Other);
                }
                let args = if self.check("<") {
                    self.parse_type_args()?
                } else {
                    Vec::new()
                };
                Ok(TypeNode::Reference { name, args })
            }
        }
    }

    fn parse_type_args(&mut self) -> ParseResult<Vec<TypeNode>> {
        self.expect("<")?;
        let mut args = Vec::new();
        while !self.check(">") {
            args.push(self.parse_type()?);
            if !self.eat(",") {
                break;
            }
        }
        self.expect(">")?;
        Ok(args)
    }

    /// Attempts `(params) => Ret` at the current `(`.
    fn try_function_type(&mut self) -> bool {
        let save = self.pos;
        let parsed = self.parse_params().is_ok()
            && self.eat("=>")
            && self.parse_type().is_ok();
        if !parsed {
            self.pos = save;
        }
        parsed
    }

    fn is_mapped_type(&self) -> bool {
        let modifier = self
            .peek_at(1)
            .is_some_and(|t| t.is_ident("readonly") || t.is_punct("+") || t.is_punct("-"));
        modifier || (self.nth_is_punct(1, "[") && self.nth_is_ident(3, "in"))
    }

    fn parse_object_type_members(&mut self) -> ParseResult<Vec<PropSig>> {
        self.expect("{")?;
        let mut members = Vec::new();
        while !self.check("}") {
            if self.at_end() {
                return Err(self.unexpected("expected `}`"));
            }
            if self.eat(";") || self.eat(",") {
                continue;
            }
            let doc = self.peek().and_then(|t| t.doc.clone());

            let keyed_next = |p: &Self| {
                p.peek_at(1)
                    .is_some_and(|t| matches!(t.kind, TokenKind::Ident | TokenKind::Str | TokenKind::Number))
            };
            if self.check_ident("readonly") && (keyed_next(self) || self.nth_is_punct(1, "[")) {
                self.pos += 1;
            }
            let accessor = (self.check_ident("get") || self.check_ident("set")) && keyed_next(self);
            let construct = self.check_ident("new") && (self.nth_is_punct(1, "(") || self.nth_is_punct(1, "<"));
            if self.check("[") || self.check("(") || self.check("<") || accessor || construct {
                self.skip_type_member();
                continue;
            }

            let key = match self.peek() {
                Some(t) if matches!(t.kind, TokenKind::Ident | TokenKind::Number) => t.text.clone(),
                Some(t) if t.kind == TokenKind::Str => t.string_value().unwrap_or_default(),
                _ => return Err(self.unexpected("expected property signature")),
            };
            self.pos += 1;
            let optional = self.eat("?");
            let method = self.check("(") || self.check("<");
            let ty = if method {
                // method signature
                if self.check("<") {
                    self.skip_angle()?;
                }
                self.parse_params()?;
                if self.eat(":") {
                    self.parse_type()?;
                }
                Some(TypeNode::Other)
            } else if self.eat(":") {
                Some(self.parse_type()?)
            } else {
                None
            };
            members.push(PropSig {
                key,
                optional,
                ty,
                doc,
                method,
            });

            let separated = self.eat(";") || self.eat(",");
            if !separated && !self.check("}") && !self.newline_before() {
                return Err(self.unexpected("expected `;` or `,` between members"));
            }
        }
        self.expect("}")?;
        Ok(members)
    }
}

fn number_value(text: &str, negative: bool) -> Value {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let sign = if negative { -1 } else { 1 };
    let int = match cleaned.get(..2) {
        Some("0x" | "0X") => i64::from_str_radix(&cleaned[2..], 16).ok(),
        Some("0b" | "0B") => i64::from_str_radix(&cleaned[2..], 2).ok(),
        Some("0o" | "0O") => i64::from_str_radix(&cleaned[2..], 8).ok(),
        _ => cleaned.parse::<i64>().ok(),
    };
    if let Some(i) = int {
        return Value::from(sign * i);
    }
    cleaned
        .parse::<f64>()
        .ok()
        .and_then(|f| serde_json::Number::from_f64(f * sign as f64))
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Module {
        parse_module(src).unwrap()
    }

    #[test]
    fn exported_async_function_with_destructured_param() {
        let module = parse(
            r#"
            import { z } from "zod";
            export async function handler({ param }: { param: "hey" }) {
                return { ok: true };
            }
            "#,
        );
        let Some(Binding::Function(f)) = module.binding("handler") else {
            panic!("handler not found");
        };
        assert_eq!(f.export, ExportKind::Named);
        assert!(f.sig.is_async);
        let param = &f.sig.params[0];
        assert!(matches!(&param.pattern, Pattern::Object(p) if p[0].key == "param"));
        let Some(TypeNode::Object(members)) = &param.ty else {
            panic!("expected object type");
        };
        assert_eq!(
            members[0].ty,
            Some(TypeNode::Literal(LiteralType::Str("hey".into())))
        );
    }

    #[test]
    fn arrow_assigned_to_const_with_asi() {
        let module = parse(
            "const a = 1\nexport const handler = async (input: Input) => {\n  return a\n}\nexport const other = handler\n",
        );
        let Some(Binding::Variable(v)) = module.binding("handler") else {
            panic!("handler not found");
        };
        assert!(matches!(v.init, Some(Expr::Function(_))));
        let Some(Binding::Variable(other)) = module.binding("other") else {
            panic!("other not found");
        };
        assert_eq!(other.init, Some(Expr::Ident("handler".into())));
    }

    #[test]
    fn wrapped_handler_is_a_call() {
        let module = parse("export const handler = withAuth(withLog(impl), { strict: true });");
        let Some(Binding::Variable(v)) = module.binding("handler") else {
            panic!("handler not found");
        };
        let Some(Expr::Call { args, .. }) = &v.init else {
            panic!("expected call");
        };
        assert!(matches!(&args[0], Expr::Call { .. }));
    }

    #[test]
    fn destructuring_defaults_are_literals() {
        let module = parse(
            r#"export function handler({ test = 3, worldString = "Hello", flag = -1.5 }: T) {}"#,
        );
        let Some(Binding::Function(f)) = module.binding("handler") else {
            panic!("handler not found");
        };
        let Pattern::Object(props) = &f.sig.params[0].pattern else {
            panic!("expected object pattern");
        };
        assert_eq!(props[0].default_literal, Some(Value::from(3)));
        assert_eq!(props[1].default_literal, Some(Value::from("Hello")));
        assert_eq!(props[2].default_literal, Some(Value::from(-1.5)));
    }

    #[test]
    fn type_alias_union_and_arrays() {
        let module = parse("type Color = 'red' | \"green\";\ntype Rows = Array<{ id: number }>[];");
        let alias = module.type_alias("Color").unwrap();
        assert!(matches!(&alias.ty, TypeNode::Union(m) if m.len() == 2));
        let rows = module.type_alias("Rows").unwrap();
        assert!(matches!(&rows.ty, TypeNode::Array(inner)
            if matches!(inner.as_ref(), TypeNode::Reference { name, .. } if name == "Array")));
    }

    #[test]
    fn interface_members_keep_docs_and_order() {
        let module = parse(
            "interface Input extends Base<T> {\n  /** The name */\n  name: string\n  readonly age?: number;\n  [key: string]: unknown\n  greet(): void\n}",
        );
        let iface = module.interfaces("Input").next().unwrap();
        assert_eq!(iface.extends, vec!["Base".to_string()]);
        let keys: Vec<&str> = iface.members.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["name", "age", "greet"]);
        assert_eq!(iface.members[0].doc.as_deref(), Some(" The name "));
        assert!(iface.members[1].optional);
    }

    #[test]
    fn enum_members_with_and_without_values() {
        let module = parse("export enum Size { Small, Medium = 'md', Large = 1 << 2 }");
        let decl = module.enum_decl("Size").unwrap();
        assert_eq!(decl.members[0].value, None);
        assert_eq!(decl.members[1].value.as_deref(), Some("md"));
        assert_eq!(decl.members[2].value.as_deref(), Some("1 << 2"));
    }

    #[test]
    fn export_list_and_default_forms() {
        let module = parse("function impl() {}\nexport { impl as handler };\nexport default impl;");
        assert_eq!(module.exported_local("handler"), Some("impl"));
        assert_eq!(module.export_kind("impl"), ExportKind::Default);

        let module = parse("const handler = () => 1;\nexport { handler };");
        assert_eq!(module.export_kind("handler"), ExportKind::Named);
    }

    #[test]
    fn skips_statements_classes_and_jsx() {
        let module = parse(
            "\"use client\";\nif (x) { y() } else { z() }\nclass A extends B { m() { return 1 } }\nexport const Page = () => <div>Hi</div>;\nexport const actions = { a: (x) => x };",
        );
        assert!(module.binding("Page").is_some());
        let Some(Binding::Variable(v)) = module.binding("actions") else {
            panic!("actions not found");
        };
        assert!(matches!(&v.init, Some(Expr::Object(props)) if props[0].key == "a"));
    }

    #[test]
    fn object_literal_methods_and_shorthand() {
        let module = parse(
            "export const actions = { async save({ id }: { id: string }) {}, remove, ...rest, get x() { return 1 } };",
        );
        let Some(Binding::Variable(v)) = module.binding("actions") else {
            panic!("actions not found");
        };
        let Some(Expr::Object(props)) = &v.init else {
            panic!("expected object literal");
        };
        assert_eq!(props.len(), 2);
        assert!(matches!(&props[0].value, Expr::Function(sig) if sig.is_async));
        assert_eq!(props[1].value, Expr::Ident("remove".into()));
    }

    #[test]
    fn generic_and_function_types() {
        let module = parse(
            "type F = (a: string) => void;\ntype M = { [K in keyof T]: T[K] };\ntype K = keyof typeof Size;\ntype C = T extends string ? 'a' : 'b';",
        );
        assert_eq!(module.type_alias("F").unwrap().ty, TypeNode::Other);
        assert_eq!(module.type_alias("M").unwrap().ty, TypeNode::Other);
        assert_eq!(
            module.type_alias("K").unwrap().ty,
            TypeNode::KeyofTypeof("Size".into())
        );
        assert_eq!(module.type_alias("C").unwrap().ty, TypeNode::Other);
    }

    #[test]
    fn reports_position_of_syntax_errors() {
        let err = parse_module("type A = {\n  a: string\n  b: ;\n}").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("expected type"));
    }
}
