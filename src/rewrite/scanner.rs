//! Line-state-aware Python scanner.
//!
//! Detectors never look at raw substrings. They walk the token stream built
//! here, where comments and string literals are opaque single tokens, so a
//! symbol that only appears inside a comment or a string can never match.
//! Logical statements are delimited the way the Python tokenizer does it:
//! newlines inside brackets and after a backslash do not end a statement,
//! `;` does.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    Str,
    Op,
    Comment,
    /// End of a logical statement (newline at bracket depth 0, or `;`).
    Newline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

/// A logical statement: a run of code tokens between two `Newline` tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Index range into [`Source::code`].
    pub tokens: Range<usize>,
    /// Byte span from the first token start to the last token end.
    pub span: Range<usize>,
    /// Column of the first token.
    pub indent: usize,
}

const TWO_CHAR_OPS: &[&[u8; 2]] = &[
    b"==", b"!=", b"<=", b">=", b"->", b":=", b"**", b"//", b"<<", b">>", b"+=", b"-=", b"*=",
    b"/=", b"%=", b"&=", b"|=", b"^=", b"@=",
];
const THREE_CHAR_OPS: &[&[u8; 3]] = &[b"**=", b"//=", b">>=", b"<<=", b"..."];

/// Scanned view of a Python buffer.
#[derive(Debug)]
pub struct Source<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    code: Vec<Token>,
    statements: Vec<Statement>,
}

impl<'a> Source<'a> {
    pub fn scan(text: &'a str) -> Self {
        let tokens = tokenize(text);
        let code: Vec<Token> = tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Comment)
            .cloned()
            .collect();
        let statements = split_statements(text, &code);
        Self {
            text,
            tokens,
            code,
            statements,
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Every token, comments included.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Tokens with comments removed; `Newline` separators are kept.
    pub fn code(&self) -> &[Token] {
        &self.code
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn statement_tokens(&self, statement: &Statement) -> &[Token] {
        &self.code[statement.tokens.clone()]
    }

    pub fn slice(&self, span: Range<usize>) -> &'a str {
        &self.text[span]
    }

    pub fn token_text(&self, token: &Token) -> &'a str {
        &self.text[token.span.clone()]
    }

    /// True when `token` is a name token spelled exactly `name`.
    pub fn is_name(&self, token: &Token, name: &str) -> bool {
        token.kind == TokenKind::Name && self.token_text(token) == name
    }

    /// True when `token` is an operator spelled exactly `op`.
    pub fn is_op(&self, token: &Token, op: &str) -> bool {
        token.kind == TokenKind::Op && self.token_text(token) == op
    }

    /// Index of the statement whose code tokens contain `code_index`.
    pub fn statement_of(&self, code_index: usize) -> Option<&Statement> {
        self.statements
            .iter()
            .find(|s| s.tokens.contains(&code_index))
    }

    /// Byte offset of the start of the line containing `pos`.
    pub fn line_start(&self, pos: usize) -> usize {
        self.text[..pos].rfind('\n').map_or(0, |i| i + 1)
    }

    /// Byte offset just past the newline ending the line containing `pos`,
    /// or the end of the text when the line is unterminated.
    pub fn line_end(&self, pos: usize) -> usize {
        self.text[pos..]
            .find('\n')
            .map_or(self.text.len(), |i| pos + i + 1)
    }

    /// True when the lines spanned by `statement` hold no other code.
    pub fn statement_owns_lines(&self, statement: &Statement) -> bool {
        let lines = self.line_start(statement.span.start)..self.line_end(statement.span.end);
        self.code.iter().enumerate().all(|(i, tok)| {
            statement.tokens.contains(&i)
                || tok.kind == TokenKind::Newline
                || !ranges_overlap(&tok.span, &lines)
        })
    }

    /// True when `statement` is the only statement of an indented block
    /// (the body of a `try:`, `except:`, `if:` and so on).
    pub fn is_sole_statement_in_block(&self, statement: &Statement) -> bool {
        if statement.indent == 0 {
            return false;
        }
        let Some(pos) = self.statements.iter().position(|s| s == statement) else {
            return false;
        };
        let same_block = |s: &Statement| s.indent == statement.indent;
        let before = self.statements[..pos]
            .iter()
            .rev()
            .find(|s| s.indent <= statement.indent);
        let after = self.statements[pos + 1..]
            .iter()
            .find(|s| s.indent <= statement.indent);
        !(before.is_some_and(same_block) || after.is_some_and(same_block))
    }

    /// True when deleting the lines of `statement` leaves valid code: the
    /// lines hold nothing else and the enclosing block keeps a body.
    pub fn is_removable(&self, statement: &Statement) -> bool {
        self.statement_owns_lines(statement) && !self.is_sole_statement_in_block(statement)
    }

    /// Byte span covering the full lines of `statement`, trailing comment
    /// and newline included.
    pub fn statement_lines(&self, statement: &Statement) -> Range<usize> {
        self.line_start(statement.span.start)..self.line_end(statement.span.end)
    }

    /// Comment tokens that fall inside `span`.
    pub fn has_comment_within(&self, span: &Range<usize>) -> bool {
        self.tokens.iter().any(|t| {
            t.kind == TokenKind::Comment && t.span.start >= span.start && t.span.end <= span.end
        })
    }

    /// Index into [`Source::code`] of the bracket closing the one opened at
    /// `open`, if the buffer is balanced up to that point.
    pub fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0_usize;
        for (i, tok) in self.code.iter().enumerate().skip(open) {
            if tok.kind != TokenKind::Op {
                continue;
            }
            match self.token_text(tok) {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

fn ranges_overlap(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn is_name_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic() || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit()
}

fn is_string_prefix(word: &[u8]) -> bool {
    word.len() <= 2
        && word
            .iter()
            .all(|c| matches!(c, b'r' | b'R' | b'b' | b'B' | b'u' | b'U' | b'f' | b'F'))
}

/// Tokenize `text`. Unterminated constructs end at the end of their line
/// (single-quoted strings) or the end of the buffer (triple-quoted strings),
/// so malformed input never panics.
pub fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut depth = 0_usize;
    let mut pending = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | b'\x0c' => i += 1,
            b'\n' => {
                if depth == 0 {
                    push_token(&mut tokens, TokenKind::Newline, i..i + 1, &mut pending);
                }
                i += 1;
            }
            b'\\' => {
                // Explicit line continuation.
                let mut j = i + 1;
                if bytes.get(j) == Some(&b'\r') {
                    j += 1;
                }
                if bytes.get(j) == Some(&b'\n') {
                    i = j + 1;
                } else {
                    push_token(&mut tokens, TokenKind::Op, i..i + 1, &mut pending);
                    i += 1;
                }
            }
            b'#' => {
                let end = text[i..].find('\n').map_or(bytes.len(), |n| i + n);
                push_token(&mut tokens, TokenKind::Comment, i..end, &mut pending);
                i = end;
            }
            b'"' | b'\'' => {
                let end = scan_string(bytes, i);
                push_token(&mut tokens, TokenKind::Str, i..end, &mut pending);
                i = end;
            }
            b'0'..=b'9' => {
                let end = scan_number(bytes, i);
                push_token(&mut tokens, TokenKind::Number, i..end, &mut pending);
                i = end;
            }
            b'.' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                let end = scan_number(bytes, i);
                push_token(&mut tokens, TokenKind::Number, i..end, &mut pending);
                i = end;
            }
            _ if is_name_start(b) => {
                let mut end = i;
                while end < bytes.len() && is_name_char(bytes[end]) {
                    end += 1;
                }
                if is_string_prefix(&bytes[i..end])
                    && matches!(bytes.get(end), Some(b'"' | b'\''))
                {
                    let str_end = scan_string(bytes, end);
                    push_token(&mut tokens, TokenKind::Str, i..str_end, &mut pending);
                    i = str_end;
                } else {
                    push_token(&mut tokens, TokenKind::Name, i..end, &mut pending);
                    i = end;
                }
            }
            _ => {
                let len = op_len(&bytes[i..]);
                match b {
                    b'(' | b'[' | b'{' => depth += 1,
                    b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                    _ => {}
                }
                if b == b';' && depth == 0 {
                    push_token(&mut tokens, TokenKind::Newline, i..i + 1, &mut pending);
                } else {
                    push_token(&mut tokens, TokenKind::Op, i..i + len, &mut pending);
                }
                i += len;
            }
        }
    }

    push_token(
        &mut tokens,
        TokenKind::Newline,
        bytes.len()..bytes.len(),
        &mut pending,
    );
    tokens
}

fn push_token(tokens: &mut Vec<Token>, kind: TokenKind, span: Range<usize>, pending: &mut bool) {
    match kind {
        // Collapse blank lines: only close a statement that has content.
        TokenKind::Newline => {
            if !*pending {
                return;
            }
            *pending = false;
        }
        TokenKind::Comment => {}
        _ => *pending = true,
    }
    tokens.push(Token { kind, span });
}

fn op_len(rest: &[u8]) -> usize {
    if rest.len() >= 3 && THREE_CHAR_OPS.iter().any(|op| rest.starts_with(&op[..])) {
        return 3;
    }
    if rest.len() >= 2 && TWO_CHAR_OPS.iter().any(|op| rest.starts_with(&op[..])) {
        return 2;
    }
    // Keep multi-byte characters whole so spans stay on char boundaries.
    match rest[0] {
        0xC0..=0xDF => 2.min(rest.len()),
        0xE0..=0xEF => 3.min(rest.len()),
        0xF0..=0xF7 => 4.min(rest.len()),
        _ => 1,
    }
}

fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() {
        let c = bytes[end];
        let exponent_sign = matches!(c, b'+' | b'-')
            && end > start
            && matches!(bytes[end - 1], b'e' | b'E')
            && !bytes[start..end].iter().any(|d| matches!(d, b'x' | b'X'));
        if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' || exponent_sign {
            end += 1;
        } else {
            break;
        }
    }
    end
}

/// Scan a string literal whose opening quote is at `quote_at`; returns the
/// byte offset just past the closing quote.
fn scan_string(bytes: &[u8], quote_at: usize) -> usize {
    let quote = bytes[quote_at];
    let triple = bytes.get(quote_at + 1) == Some(&quote) && bytes.get(quote_at + 2) == Some(&quote);
    let mut i = if triple { quote_at + 3 } else { quote_at + 1 };

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\\' {
            i += 2;
            continue;
        }
        if triple {
            if c == quote
                && bytes.get(i + 1) == Some(&quote)
                && bytes.get(i + 2) == Some(&quote)
            {
                return i + 3;
            }
        } else if c == quote {
            return i + 1;
        } else if c == b'\n' {
            return i;
        }
        i += 1;
    }
    bytes.len()
}

fn split_statements(text: &str, code: &[Token]) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut start = 0;
    for (i, tok) in code.iter().enumerate() {
        if tok.kind != TokenKind::Newline {
            continue;
        }
        if i > start {
            let first = &code[start];
            let last = &code[i - 1];
            let line_start = text[..first.span.start].rfind('\n').map_or(0, |p| p + 1);
            statements.push(Statement {
                tokens: start..i,
                span: first.span.start..last.span.end,
                indent: first.span.start - line_start,
            });
        }
        start = i + 1;
    }
    statements
}
