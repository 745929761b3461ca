use super::scanner::{Source, Statement, TokenKind};
use std::fmt;
use std::ops::Range;

/// One name bound by a `from <module> import ...` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
    /// `name` through the end of `as alias`, when present.
    pub span: Range<usize>,
    /// The comma token directly after this item, if any.
    pub trailing_comma: Option<Range<usize>>,
}

impl ImportedName {
    /// The local name this item binds.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A parsed `from <module> import a, b as c` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromImport {
    pub module: String,
    pub names: Vec<ImportedName>,
    pub star: bool,
    pub statement: Statement,
}

impl FromImport {
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.name == name)
    }

    pub fn root_package(&self) -> &str {
        root_package(&self.module)
    }
}

/// A parsed `import a.b, c as d` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainImport {
    pub modules: Vec<String>,
    pub statement: Statement,
}

/// An import a rewrite needs present in the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportSpec {
    pub module: String,
    pub name: String,
    pub alias: Option<String>,
}

impl ImportSpec {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// A spec is satisfied when some `from` import binds the same local name
    /// to the same source name from a module in the same root package.
    pub fn is_satisfied_by(&self, imports: &[FromImport]) -> bool {
        imports.iter().any(|import| {
            import.root_package() == root_package(&self.module)
                && import
                    .names
                    .iter()
                    .any(|n| n.name == self.name && n.binding() == self.binding())
        })
    }
}

impl fmt::Display for ImportSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from {} import {}", self.module, self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " as {alias}")?;
        }
        Ok(())
    }
}

pub fn root_package(module: &str) -> &str {
    module.split('.').next().unwrap_or(module)
}

/// All `from ... import ...` statements in the buffer, at any indentation.
pub fn from_imports(source: &Source<'_>) -> Vec<FromImport> {
    source
        .statements()
        .iter()
        .filter_map(|statement| parse_from_import(source, statement))
        .collect()
}

/// All plain `import ...` statements in the buffer.
pub fn plain_imports(source: &Source<'_>) -> Vec<PlainImport> {
    source
        .statements()
        .iter()
        .filter_map(|statement| parse_plain_import(source, statement))
        .collect()
}

pub fn is_import_statement(source: &Source<'_>, statement: &Statement) -> bool {
    source
        .statement_tokens(statement)
        .first()
        .is_some_and(|t| source.is_name(t, "from") || source.is_name(t, "import"))
}

/// True when the buffer imports anything from the SDK (`qiskit`,
/// `qiskit.*`, or a `qiskit_*` sibling package).
pub fn mentions_sdk(source: &Source<'_>) -> bool {
    let is_sdk = |module: &str| {
        let root = root_package(module);
        root == "qiskit" || root.starts_with("qiskit_")
    };
    from_imports(source).iter().any(|i| is_sdk(&i.module))
        || plain_imports(source)
            .iter()
            .any(|i| i.modules.iter().any(|m| is_sdk(m)))
}

fn parse_from_import(source: &Source<'_>, statement: &Statement) -> Option<FromImport> {
    let tokens = source.statement_tokens(statement);
    let mut iter = tokens.iter().peekable();
    if !source.is_name(iter.next()?, "from") {
        return None;
    }

    let mut module = String::new();
    loop {
        let tok = iter.next()?;
        if source.is_name(tok, "import") {
            break;
        }
        match tok.kind {
            TokenKind::Name | TokenKind::Op if !source.is_op(tok, "(") => {
                module.push_str(source.token_text(tok));
            }
            _ => return None,
        }
    }
    if module.is_empty() {
        return None;
    }

    let mut names = Vec::new();
    let mut star = false;
    let parenthesized = iter.peek().is_some_and(|t| source.is_op(t, "("));
    if parenthesized {
        iter.next();
    }

    while let Some(tok) = iter.next() {
        if parenthesized && source.is_op(tok, ")") {
            break;
        }
        if source.is_op(tok, "*") {
            star = true;
            continue;
        }
        if source.is_op(tok, ",") {
            let last: &mut ImportedName = names.last_mut()?;
            last.trailing_comma = Some(tok.span.clone());
            continue;
        }
        if tok.kind != TokenKind::Name {
            return None;
        }
        let name = source.token_text(tok).to_string();
        let mut span = tok.span.clone();
        let mut alias = None;
        if iter.peek().is_some_and(|t| source.is_name(t, "as")) {
            iter.next();
            let alias_tok = iter.next()?;
            if alias_tok.kind != TokenKind::Name {
                return None;
            }
            alias = Some(source.token_text(alias_tok).to_string());
            span.end = alias_tok.span.end;
        }
        names.push(ImportedName {
            name,
            alias,
            span,
            trailing_comma: None,
        });
    }

    if names.is_empty() && !star {
        return None;
    }
    Some(FromImport {
        module,
        names,
        star,
        statement: statement.clone(),
    })
}

fn parse_plain_import(source: &Source<'_>, statement: &Statement) -> Option<PlainImport> {
    let tokens = source.statement_tokens(statement);
    let (first, rest) = tokens.split_first()?;
    if !source.is_name(first, "import") {
        return None;
    }
    let mut modules = Vec::new();
    let mut current = String::new();
    let mut in_alias = false;
    for tok in rest {
        if source.is_op(tok, ",") {
            modules.push(std::mem::take(&mut current));
            in_alias = false;
        } else if source.is_name(tok, "as") {
            in_alias = true;
        } else if !in_alias {
            current.push_str(source.token_text(tok));
        }
    }
    if !current.is_empty() {
        modules.push(current);
    }
    Some(PlainImport {
        modules,
        statement: statement.clone(),
    })
}

/// Byte ranges to delete so that item `index` disappears from `import`
/// while the remaining list stays well-formed.
///
/// A middle or leading item takes its trailing separator with it, the last
/// item takes the separator before it. When that span would swallow a
/// comment, only the item and a single comma are removed.
pub fn excise_ranges(source: &Source<'_>, import: &FromImport, index: usize) -> Vec<Range<usize>> {
    let item = &import.names[index];
    if let Some(next) = import.names.get(index + 1) {
        let span = item.span.start..next.span.start;
        if !source.has_comment_within(&span) {
            return vec![span];
        }
        let end = item.trailing_comma.as_ref().map_or(item.span.end, |c| c.end);
        return vec![item.span.start..end];
    }

    let Some(prev) = index.checked_sub(1).map(|i| &import.names[i]) else {
        return vec![item.span.clone()];
    };
    let span = prev.span.end..item.span.end;
    if !source.has_comment_within(&span) {
        return vec![span];
    }
    match &prev.trailing_comma {
        Some(comma) => vec![comma.clone(), item.span.clone()],
        None => vec![item.span.clone()],
    }
}

/// Offset at which new import lines go: after the last import of the
/// leading import block, else after a module docstring, else after the
/// leading comment block, else the top of the file.
pub fn insertion_point(source: &Source<'_>) -> usize {
    let mut last_import_end = None;
    let mut docstring_end = None;

    for (i, statement) in source.statements().iter().enumerate() {
        if statement.indent != 0 {
            continue;
        }
        let tokens = source.statement_tokens(statement);
        if i == 0 && tokens.len() == 1 && tokens[0].kind == TokenKind::Str {
            docstring_end = Some(source.line_end(statement.span.end));
            continue;
        }
        if is_import_statement(source, statement) {
            last_import_end = Some(source.line_end(statement.span.end));
            continue;
        }
        break;
    }

    if let Some(end) = last_import_end.or(docstring_end) {
        return end;
    }

    let mut comment_end = 0;
    for tok in source.tokens() {
        if tok.kind != TokenKind::Comment {
            break;
        }
        comment_end = source.line_end(tok.span.end);
    }
    comment_end
}
