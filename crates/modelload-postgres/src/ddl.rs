//! Model DDL handling: statement splitting, classification, table
//! exclusion, and derivation of the drop statements used by undo.

use std::collections::BTreeSet;

/// The three DDL bundles a data model provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    Tables,
    Indexes,
    Constraints,
}

impl DdlKind {
    pub const ALL: [DdlKind; 3] = [DdlKind::Tables, DdlKind::Indexes, DdlKind::Constraints];

    pub fn as_str(&self) -> &'static str {
        match self {
            DdlKind::Tables => "tables",
            DdlKind::Indexes => "indexes",
            DdlKind::Constraints => "constraints",
        }
    }
}

/// What a single statement creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Table { table: String },
    Index { name: String, table: String },
    Constraint { name: String, table: String },
    Other,
}

/// One DDL statement and its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdlStatement {
    pub sql: String,
    pub kind: StatementKind,
}

impl DdlStatement {
    pub fn parse(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let kind = classify(&sql);
        Self { sql, kind }
    }

    /// Normalized, unqualified name of the table the statement touches.
    pub fn target_table(&self) -> Option<String> {
        match &self.kind {
            StatementKind::Table { table }
            | StatementKind::Index { table, .. }
            | StatementKind::Constraint { table, .. } => Some(normalize_identifier(table)),
            StatementKind::Other => None,
        }
    }

    /// The statement that removes what this statement creates.
    pub fn inverse(&self) -> Option<String> {
        match &self.kind {
            StatementKind::Table { table } => Some(format!("DROP TABLE {table}")),
            StatementKind::Index { name, table } => {
                let name = match (split_qualified(table).0, split_qualified(name).0) {
                    (Some(schema), None) => format!("{schema}.{name}"),
                    _ => name.clone(),
                };
                Some(format!("DROP INDEX {name}"))
            }
            StatementKind::Constraint { name, table } => {
                Some(format!("ALTER TABLE {table} DROP CONSTRAINT {name}"))
            }
            StatementKind::Other => None,
        }
    }
}

/// Create statements for one model version, grouped by bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelDdl {
    tables: Vec<DdlStatement>,
    indexes: Vec<DdlStatement>,
    constraints: Vec<DdlStatement>,
}

impl ModelDdl {
    pub fn from_sql(tables: &str, indexes: &str, constraints: &str) -> Self {
        let parse = |text: &str| {
            split_statements(text)
                .into_iter()
                .map(DdlStatement::parse)
                .collect::<Vec<_>>()
        };
        Self {
            tables: parse(tables),
            indexes: parse(indexes),
            constraints: parse(constraints),
        }
    }

    /// Drop every statement whose target table is in `excluded`.
    pub fn excluding(mut self, excluded: &[String]) -> Self {
        if excluded.is_empty() {
            return self;
        }
        let excluded: BTreeSet<String> = excluded.iter().map(|t| normalize_identifier(t)).collect();
        let keep = |statement: &DdlStatement| {
            statement
                .target_table()
                .is_none_or(|table| !excluded.contains(&table))
        };
        self.tables.retain(keep);
        self.indexes.retain(keep);
        self.constraints.retain(keep);
        self
    }

    pub fn statements(&self, kind: DdlKind) -> &[DdlStatement] {
        match kind {
            DdlKind::Tables => &self.tables,
            DdlKind::Indexes => &self.indexes,
            DdlKind::Constraints => &self.constraints,
        }
    }

    /// Drop statements for a bundle, in reverse creation order.
    pub fn drops(&self, kind: DdlKind) -> Vec<String> {
        self.statements(kind)
            .iter()
            .rev()
            .filter_map(DdlStatement::inverse)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len() + self.indexes.len() + self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split a SQL script on `;`, ignoring separators inside quotes, dollar
/// quotes and comments. Comment-only fragments are discarded.
pub fn split_statements(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = text[i..].find('\n').map_or(bytes.len(), |n| i + n + 1);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = text[i + 2..].find("*/").map_or(bytes.len(), |n| i + 2 + n + 2);
                continue;
            }
            quote @ (b'\'' | b'"') => {
                has_code = true;
                i = text[i + 1..]
                    .find(quote as char)
                    .map_or(bytes.len(), |n| i + 1 + n + 1);
                continue;
            }
            b'$' => {
                has_code = true;
                if let Some(tag) = dollar_tag(&text[i..]) {
                    let body = i + tag.len();
                    i = text[body..]
                        .find(tag)
                        .map_or(bytes.len(), |n| body + n + tag.len());
                    continue;
                }
            }
            b';' => {
                if has_code {
                    statements.push(text[start..i].trim().to_string());
                }
                start = i + 1;
                has_code = false;
            }
            byte if !byte.is_ascii_whitespace() => has_code = true,
            _ => {}
        }
        i += 1;
    }

    if has_code {
        statements.push(text[start..].trim().to_string());
    }
    statements
}

/// `$tag$` at the start of `text`, if it opens a dollar-quoted string.
fn dollar_tag(text: &str) -> Option<&str> {
    let end = text[1..].find('$')?;
    let tag = &text[1..1 + end];
    let valid = tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !tag.starts_with(|c: char| c.is_ascii_digit());
    valid.then(|| &text[..end + 2])
}

fn classify(sql: &str) -> StatementKind {
    let tokens = leading_tokens(sql, 12);
    classify_tokens(&mut Cursor {
        tokens: &tokens,
        pos: 0,
    })
    .unwrap_or(StatementKind::Other)
}

fn classify_tokens(cursor: &mut Cursor<'_>) -> Option<StatementKind> {
    if cursor.keyword("CREATE") {
        cursor.keyword("UNLOGGED");
        if cursor.keyword("TABLE") {
            cursor.keywords(&["IF", "NOT", "EXISTS"]);
            return Some(StatementKind::Table {
                table: cursor.ident()?,
            });
        }

        cursor.keyword("UNIQUE");
        if !cursor.keyword("INDEX") {
            return None;
        }
        cursor.keyword("CONCURRENTLY");
        cursor.keywords(&["IF", "NOT", "EXISTS"]);
        // unnamed indexes cannot be dropped by name
        if cursor.peek_keyword("ON") {
            return None;
        }
        let name = cursor.ident()?;
        if !cursor.keyword("ON") {
            return None;
        }
        cursor.keyword("ONLY");
        return Some(StatementKind::Index {
            name,
            table: cursor.ident()?,
        });
    }

    if cursor.keyword("ALTER") && cursor.keyword("TABLE") {
        cursor.keywords(&["IF", "EXISTS"]);
        cursor.keyword("ONLY");
        let table = cursor.ident()?;
        if cursor.keyword("ADD") && cursor.keyword("CONSTRAINT") {
            return Some(StatementKind::Constraint {
                name: cursor.ident()?,
                table,
            });
        }
    }

    None
}

struct Cursor<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl Cursor<'_> {
    fn peek_keyword(&self, keyword: &str) -> bool {
        self.tokens
            .get(self.pos)
            .is_some_and(|token| token.eq_ignore_ascii_case(keyword))
    }

    fn keyword(&mut self, keyword: &str) -> bool {
        let matched = self.peek_keyword(keyword);
        if matched {
            self.pos += 1;
        }
        matched
    }

    /// Consume a keyword sequence only if all of it matches.
    fn keywords(&mut self, keywords: &[&str]) -> bool {
        let matched = keywords.iter().enumerate().all(|(offset, keyword)| {
            self.tokens
                .get(self.pos + offset)
                .is_some_and(|token| token.eq_ignore_ascii_case(keyword))
        });
        if matched {
            self.pos += keywords.len();
        }
        matched
    }

    fn ident(&mut self) -> Option<String> {
        let token = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        Some(token)
    }
}

/// The first `limit` word tokens of a statement, skipping comments.
/// Quoted identifiers stay intact, including qualified `"a"."b"` forms.
fn leading_tokens(sql: &str, limit: usize) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();

    while tokens.len() < limit {
        let Some(&ch) = chars.peek() else {
            break;
        };

        if ch.is_whitespace() || matches!(ch, '(' | ')' | ',' | ';') {
            chars.next();
            continue;
        }

        if ch == '-' {
            chars.next();
            if chars.peek() == Some(&'-') {
                chars.by_ref().find(|c| *c == '\n');
                continue;
            }
            tokens.push("-".to_string());
            continue;
        }

        if ch == '/' {
            chars.next();
            if chars.peek() == Some(&'*') {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                continue;
            }
            tokens.push("/".to_string());
            continue;
        }

        let mut token = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | ',' | ';') {
                break;
            }
            chars.next();
            token.push(c);
            if c == '"' {
                for quoted in chars.by_ref() {
                    token.push(quoted);
                    if quoted == '"' {
                        break;
                    }
                }
            }
        }
        tokens.push(token);
    }

    tokens
}

/// Split `schema.name` on the last dot outside double quotes.
pub fn split_qualified(ident: &str) -> (Option<&str>, &str) {
    let mut in_quotes = false;
    let mut split_at = None;
    for (idx, ch) in ident.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => split_at = Some(idx),
            _ => {}
        }
    }
    match split_at {
        Some(idx) => (Some(&ident[..idx]), &ident[idx + 1..]),
        None => (None, ident),
    }
}

/// Unqualified identifier as Postgres stores it: quoted names keep their
/// case, unquoted names fold to lower case.
pub fn normalize_identifier(ident: &str) -> String {
    let name = split_qualified(ident.trim()).1;
    match name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) {
        Some(quoted) => quoted.replace("\"\"", "\""),
        None => name.to_ascii_lowercase(),
    }
}

/// Quote an identifier for use in generated SQL.
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
