//! Tokenizer for the subset of TypeScript the extractor reads.
//!
//! The lexer never interprets function bodies; it only has to keep string,
//! template, regex, comment and JSX boundaries straight so that brace
//! matching and import scanning stay correct.

use crate::error::ParseError;

/// Token classes produced by [`tokenize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Str,
    Template,
    Number,
    Regex,
    Jsx,
    Punct,
}

/// A single token with its byte span and source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text, quotes included for strings
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    /// A line break separates this token from the previous one
    pub newline_before: bool,
    /// Body of the `/** ... */` block immediately preceding the token
    pub doc: Option<String>,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    /// Unquoted, unescaped value of a string literal token.
    pub fn string_value(&self) -> Option<String> {
        if self.kind != TokenKind::Str || self.text.len() < 2 {
            return None;
        }
        Some(unescape(&self.text[1..self.text.len() - 1]))
    }
}

// Multi-character punctuators, longest first. Nothing starting with `<` or
// `>` is fused so that nested generic brackets always close one at a time.
const PUNCTUATORS: &[&str] = &[
    "...", "===", "!==", "**=", "&&=", "||=", "??=", "=>", "==", "!=", "&&", "||", "??", "?.",
    "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "**",
];

const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Tokenize TypeScript (or TSX) source.
///
/// JSX is recognised only when the source contains closing-tag markers; if
/// that attempt fails the source is re-read as plain TypeScript, where `<`
/// in expression position is a generic or type assertion.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    if source.contains("</") || source.contains("/>") {
        if let Ok(tokens) = Lexer::new(source, true).run() {
            return Ok(tokens);
        }
    }
    Lexer::new(source, false).run()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    jsx: bool,
    newline: bool,
    pending_doc: Option<String>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, jsx: bool) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
            jsx,
            newline: false,
            pending_doc: None,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::new(message, self.line, self.column)
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        if self.src.starts_with("#!") {
            while self.peek().is_some_and(|c| c != '\n') {
                self.bump();
            }
        }

        loop {
            self.skip_trivia()?;
            let Some(c) = self.peek() else { break };
            let (start, line, column) = (self.pos, self.line, self.column);

            let kind = match c {
                '"' | '\'' => {
                    self.scan_string(c)?;
                    TokenKind::Str
                }
                '`' => {
                    self.scan_template()?;
                    TokenKind::Template
                }
                c if c.is_ascii_digit() => {
                    self.scan_number();
                    TokenKind::Number
                }
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => {
                    self.scan_number();
                    TokenKind::Number
                }
                c if is_ident_start(c) => {
                    self.scan_ident();
                    TokenKind::Ident
                }
                '/' if self.regex_allowed() => {
                    self.scan_regex()?;
                    TokenKind::Regex
                }
                '<' if self.jsx && self.regex_allowed() && self.jsx_starts_here() => {
                    self.scan_jsx_element()?;
                    TokenKind::Jsx
                }
                _ => {
                    self.scan_punct();
                    TokenKind::Punct
                }
            };

            self.tokens.push(Token {
                kind,
                text: self.src[start..self.pos].to_string(),
                start,
                end: self.pos,
                line,
                column,
                newline_before: std::mem::take(&mut self.newline),
                doc: self.pending_doc.take(),
            });
        }

        Ok(self.tokens)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some('\n') => {
                    self.newline = true;
                    self.bump();
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => self.skip_line_comment(),
                Some('/') if self.peek_at(1) == Some('*') => {
                    let body = self.skip_block_comment()?;
                    if body.contains('\n') {
                        self.newline = true;
                    }
                    if let Some(doc) = body.strip_prefix('*') {
                        if !doc.is_empty() {
                            self.pending_doc = Some(doc.to_string());
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
    }

    /// Skips `/* ... */` and returns the text between the delimiters.
    fn skip_block_comment(&mut self) -> Result<String, ParseError> {
        self.bump();
        self.bump();
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated block comment")),
                Some('*') if self.peek_at(1) == Some('/') => {
                    let body = self.src[start..self.pos].to_string();
                    self.bump();
                    self.bump();
                    return Ok(body);
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<(), ParseError> {
        self.bump();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some('\\') => {
                    self.bump();
                }
                Some(c) if c == quote => return Ok(()),
                Some(_) => {}
            }
        }
    }

    fn scan_template(&mut self) -> Result<(), ParseError> {
        self.bump();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated template literal")),
                Some('\\') => {
                    self.bump();
                }
                Some('`') => return Ok(()),
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    self.skip_embedded_expression()?;
                }
                Some(_) => {}
            }
        }
    }

    /// Skips to the `}` closing an embedded expression whose `{` was consumed.
    fn skip_embedded_expression(&mut self) -> Result<(), ParseError> {
        let mut depth = 1usize;
        let mut last_significant = '{';
        while depth > 0 {
            let Some(c) = self.peek() else {
                return Err(self.error("unterminated embedded expression"));
            };
            match c {
                '{' => {
                    depth += 1;
                    self.bump();
                }
                '}' => {
                    depth -= 1;
                    self.bump();
                }
                '"' | '\'' => self.scan_string(c)?,
                '`' => self.scan_template()?,
                '/' if self.peek_at(1) == Some('/') => self.skip_line_comment(),
                '/' if self.peek_at(1) == Some('*') => {
                    self.skip_block_comment()?;
                }
                '<' if self.jsx && opens_expression(last_significant) && self.jsx_starts_here() => {
                    self.scan_jsx_element()?;
                    last_significant = '>';
                    continue;
                }
                _ => {
                    self.bump();
                }
            }
            if !c.is_whitespace() {
                last_significant = c;
            }
        }
        Ok(())
    }

    fn scan_number(&mut self) {
        let hex = self.src[self.pos..].starts_with("0x") || self.src[self.pos..].starts_with("0X");
        while let Some(c) = self.peek() {
            let prev = self.src[..self.pos].chars().next_back();
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.bump();
            } else if (c == '+' || c == '-') && !hex && matches!(prev, Some('e' | 'E')) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn scan_ident(&mut self) {
        self.bump();
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
    }

    fn regex_allowed(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(tok) => match tok.kind {
                TokenKind::Punct => !matches!(tok.text.as_str(), ")" | "]" | "}"),
                TokenKind::Ident => REGEX_PREFIX_KEYWORDS.contains(&tok.text.as_str()),
                _ => false,
            },
        }
    }

    fn scan_regex(&mut self) -> Result<(), ParseError> {
        self.bump();
        let mut in_class = false;
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated regular expression")),
                Some('\\') => {
                    self.bump();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
        Ok(())
    }

    fn scan_punct(&mut self) {
        let rest = &self.src[self.pos..];
        if let Some(p) = PUNCTUATORS.iter().find(|p| rest.starts_with(*p)) {
            for _ in 0..p.len() {
                self.bump();
            }
        } else {
            self.bump();
        }
    }

    fn jsx_starts_here(&self) -> bool {
        matches!(self.peek_at(1), Some(c) if c == '>' || is_ident_start(c))
    }

    /// Scans one JSX element (or fragment) including its children.
    fn scan_jsx_element(&mut self) -> Result<(), ParseError> {
        self.bump();
        if self.peek() == Some('>') {
            self.bump();
            return self.scan_jsx_children();
        }
        while self
            .peek()
            .is_some_and(|c| is_ident_continue(c) || matches!(c, '.' | ':' | '-'))
        {
            self.bump();
        }
        if self.peek() == Some('<') {
            // generic type arguments on a component: <List<string> items={...} />
            self.skip_angle_in_jsx()?;
        }

        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }
            match self.peek() {
                None => return Err(self.error("unterminated JSX element")),
                Some('/') if self.peek_at(1) == Some('>') => {
                    self.bump();
                    self.bump();
                    return Ok(());
                }
                Some('>') => {
                    self.bump();
                    return self.scan_jsx_children();
                }
                Some('{') => {
                    self.bump();
                    self.skip_embedded_expression()?;
                }
                Some(c) if is_ident_start(c) => {
                    while self
                        .peek()
                        .is_some_and(|c| is_ident_continue(c) || matches!(c, '-' | ':'))
                    {
                        self.bump();
                    }
                    if self.peek() == Some('=') {
                        self.bump();
                        match self.peek() {
                            Some(q @ ('"' | '\'')) => self.scan_jsx_attribute_string(q)?,
                            Some('{') => {
                                self.bump();
                                self.skip_embedded_expression()?;
                            }
                            _ => return Err(self.error("invalid JSX attribute value")),
                        }
                    }
                }
                Some(_) => return Err(self.error("unexpected character in JSX tag")),
            }
        }
    }

    fn scan_jsx_children(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated JSX element")),
                Some('{') => {
                    self.bump();
                    self.skip_embedded_expression()?;
                }
                Some('<') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.bump() {
                        if c == '>' {
                            return Ok(());
                        }
                    }
                    return Err(self.error("unterminated JSX closing tag"));
                }
                Some('<') => self.scan_jsx_element()?,
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn scan_jsx_attribute_string(&mut self, quote: char) -> Result<(), ParseError> {
        self.bump();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated JSX attribute")),
                Some(c) if c == quote => return Ok(()),
                Some(_) => {}
            }
        }
    }

    fn skip_angle_in_jsx(&mut self) -> Result<(), ParseError> {
        let mut depth = 0usize;
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated type arguments")),
                Some('<') => depth += 1,
                Some('>') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(_) => {}
            }
        }
    }
}

fn opens_expression(c: char) -> bool {
    matches!(
        c,
        '(' | ',' | '=' | '{' | '?' | ':' | '&' | '|' | '>' | '[' | '!'
    )
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c == '#' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\n') | None => {}
            Some(other) => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn splits_arrow_and_generic_brackets() {
        let toks = kinds("const f = (x: Array<Array<string>>) => x;");
        let texts: Vec<&str> = toks.iter().map(|(_, t)| t.as_str()).collect();
        assert!(texts.contains(&"=>"));
        assert_eq!(texts.iter().filter(|t| **t == ">").count(), 2);
    }

    #[test]
    fn strings_hide_braces_and_comments() {
        let toks = kinds(r#"const a = "{ // not a comment }";"#);
        assert_eq!(toks[3].0, TokenKind::Str);
        assert_eq!(toks.len(), 5);
    }

    #[test]
    fn template_with_nested_expression() {
        let toks = kinds("const s = `a ${ {b: `c${d}`}.b } e`; next");
        assert_eq!(toks[3].0, TokenKind::Template);
        assert!(toks.last().unwrap().1 == "next");
    }

    #[test]
    fn regex_versus_division() {
        let toks = kinds("const r = /a{2}\\//g; const d = a / b / c;");
        assert_eq!(toks[3].0, TokenKind::Regex);
        assert!(toks.iter().filter(|(k, _)| *k == TokenKind::Regex).count() == 1);
    }

    #[test]
    fn doc_comments_attach_to_next_token() {
        let tokens = tokenize("/** The user name */\nname: string").unwrap();
        assert_eq!(tokens[0].doc.as_deref(), Some(" The user name "));
        assert!(tokens[0].newline_before);
        assert!(tokens[1].doc.is_none());
    }

    #[test]
    fn newline_flag_is_tracked() {
        let tokens = tokenize("a\nb c").unwrap();
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert!(!tokens[2].newline_before);
    }

    #[test]
    fn jsx_text_with_apostrophe_is_one_token() {
        let src = "export default function Page() { return <p className=\"x\">Don't {items.map(i => <li key={i}>{i}</li>)}</p>; }";
        let tokens = tokenize(src).unwrap();
        assert_eq!(
            tokens.iter().filter(|t| t.kind == TokenKind::Jsx).count(),
            1
        );
        assert!(tokens.last().unwrap().is_punct("}"));
    }

    #[test]
    fn generic_arrow_without_jsx_markers() {
        let tokens = tokenize("const id = <T>(x: T) => x;").unwrap();
        assert!(tokens.iter().all(|t| t.kind != TokenKind::Jsx));
    }

    #[test]
    fn unterminated_string_reports_position() {
        let err = tokenize("const a = 'oops\nconst b = 1;").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn string_value_unescapes() {
        let tokens = tokenize(r#"'it\'s' "a\nb""#).unwrap();
        assert_eq!(tokens[0].string_value().as_deref(), Some("it's"));
        assert_eq!(tokens[1].string_value().as_deref(), Some("a\nb"));
    }
}
