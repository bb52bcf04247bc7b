//! Statement classification and lightweight SQL scanning
//!
//! Nothing here parses SQL. Classification looks at the single leading
//! keyword; the scanner only tokenizes far enough to skip comments, string
//! literals and quoted identifiers so that clause detection and name
//! extraction are not fooled by their contents.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{ShelfError, ShelfResult};

/// Intent class of a statement, from its leading keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementClass {
    /// SELECT, PRAGMA, EXPLAIN
    Read,
    /// INSERT, UPDATE, DELETE, REPLACE
    Write,
    /// CREATE, DROP, ALTER
    Schema,
    /// Anything else, including WITH and statements opening with a comment
    Other,
}

impl StatementClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementClass::Read => "read",
            StatementClass::Write => "write",
            StatementClass::Schema => "schema",
            StatementClass::Other => "other",
        }
    }
}

impl std::fmt::Display for StatementClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The leading keyword, uppercased, or an empty string
pub fn leading_keyword(sql: &str) -> String {
    sql.trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Classify a statement by its leading keyword
pub fn classify(sql: &str) -> StatementClass {
    match leading_keyword(sql).as_str() {
        "SELECT" | "PRAGMA" | "EXPLAIN" => StatementClass::Read,
        "INSERT" | "UPDATE" | "DELETE" | "REPLACE" => StatementClass::Write,
        "CREATE" | "DROP" | "ALTER" => StatementClass::Schema,
        _ => StatementClass::Other,
    }
}

/// Trim trailing whitespace and semicolons
pub fn strip_trailing_semicolons(sql: &str) -> &str {
    sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Whether a `LIMIT` or `OFFSET` clause appears outside parentheses
pub fn has_top_level_limit(sql: &str) -> bool {
    let mut depth = 0usize;
    for token in tokenize(sql) {
        match token {
            Token::Symbol('(') => depth += 1,
            Token::Symbol(')') => depth = depth.saturating_sub(1),
            Token::Word(word)
                if depth == 0
                    && (word.eq_ignore_ascii_case("LIMIT")
                        || word.eq_ignore_ascii_case("OFFSET")) =>
            {
                return true;
            }
            _ => {}
        }
    }
    false
}

/// Table name declared by `CREATE [VIRTUAL] TABLE [IF NOT EXISTS] name`
///
/// Temporary tables are refused: they vanish with the connection that made
/// them, and every operation runs on its own connection.
pub fn created_table_name(sql: &str) -> ShelfResult<String> {
    let mut cursor = Cursor::new(sql);
    let malformed = || ShelfError::InvalidArgument("expected a CREATE TABLE statement".to_string());

    if !cursor.keyword("CREATE") {
        return Err(malformed());
    }
    if cursor.keyword("TEMP") || cursor.keyword("TEMPORARY") {
        return Err(temporary_refused());
    }
    let _ = cursor.keyword("VIRTUAL");
    if !cursor.keyword("TABLE") {
        return Err(malformed());
    }
    cursor.if_not_exists();

    let (schema, table) = cursor.qualified_name().ok_or_else(malformed)?;
    if schema.as_deref().is_some_and(is_temp_schema) {
        return Err(temporary_refused());
    }
    Ok(table)
}

/// Index and table names of `CREATE [UNIQUE] INDEX [IF NOT EXISTS] name ON table`
pub fn created_index_names(sql: &str) -> ShelfResult<(String, String)> {
    let mut cursor = Cursor::new(sql);
    let malformed =
        || ShelfError::InvalidArgument("expected a CREATE INDEX ... ON table statement".to_string());

    if !cursor.keyword("CREATE") {
        return Err(malformed());
    }
    let _ = cursor.keyword("UNIQUE");
    if !cursor.keyword("INDEX") {
        return Err(malformed());
    }
    cursor.if_not_exists();

    let (schema, index) = cursor.qualified_name().ok_or_else(malformed)?;
    if schema.as_deref().is_some_and(is_temp_schema) {
        return Err(temporary_refused());
    }
    if !cursor.keyword("ON") {
        return Err(malformed());
    }
    let table = cursor.name().ok_or_else(malformed)?;

    Ok((index, table))
}

/// Whether a `;` separates statements, ignoring trailing ones
///
/// Semicolons inside string literals, quoted identifiers and comments do not
/// count.
pub fn has_statement_separator(sql: &str) -> bool {
    tokenize(strip_trailing_semicolons(sql))
        .iter()
        .any(|token| *token == Token::Symbol(';'))
}

fn is_temp_schema(schema: &str) -> bool {
    schema.eq_ignore_ascii_case("temp") || schema.eq_ignore_ascii_case("temporary")
}

fn temporary_refused() -> ShelfError {
    ShelfError::InvalidArgument(
        "temporary objects do not outlive the call that creates them".to_string(),
    )
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    /// Identifier written as "x", `x` or [x], unescaped
    Quoted(String),
    Literal,
    Symbol(char),
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || !c.is_ascii()
}

fn tokenize(sql: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        match ch {
            c if c.is_whitespace() => {}
            '-' if matches!(chars.peek(), Some((_, '-'))) => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut prev = '\0';
                for (_, c) in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            '\'' => {
                read_quoted(&mut chars, '\'');
                tokens.push(Token::Literal);
            }
            '"' | '`' => tokens.push(Token::Quoted(read_quoted(&mut chars, ch))),
            '[' => {
                let name: String = chars.by_ref().map(|(_, c)| c).take_while(|c| *c != ']').collect();
                tokens.push(Token::Quoted(name));
            }
            c if is_word_char(c) => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if !is_word_char(next) {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Word(&sql[start..end]));
            }
            c => tokens.push(Token::Symbol(c)),
        }
    }

    tokens
}

fn read_quoted(chars: &mut Peekable<CharIndices<'_>>, quote: char) -> String {
    let mut out = String::new();
    while let Some((_, c)) = chars.next() {
        if c != quote {
            out.push(c);
        } else if matches!(chars.peek(), Some(&(_, q)) if q == quote) {
            chars.next();
            out.push(quote);
        } else {
            break;
        }
    }
    out
}

struct Cursor<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            tokens: tokenize(sql),
            pos: 0,
        }
    }

    fn keyword(&mut self, keyword: &str) -> bool {
        match self.tokens.get(self.pos) {
            Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn if_not_exists(&mut self) {
        let start = self.pos;
        if !(self.keyword("IF") && self.keyword("NOT") && self.keyword("EXISTS")) {
            self.pos = start;
        }
    }

    fn name(&mut self) -> Option<String> {
        let name = match self.tokens.get(self.pos)? {
            Token::Word(word) => word.to_string(),
            Token::Quoted(name) => name.clone(),
            _ => return None,
        };
        self.pos += 1;
        Some(name)
    }

    /// `name` or `schema.name`, as `(schema, name)`
    fn qualified_name(&mut self) -> Option<(Option<String>, String)> {
        let first = self.name()?;
        if self.tokens.get(self.pos) == Some(&Token::Symbol('.')) {
            self.pos += 1;
            return Some((Some(first), self.name()?));
        }
        Some((None, first))
    }
}
