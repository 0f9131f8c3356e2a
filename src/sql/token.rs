//! SQL Tokens - the atomic units of SQL output.
//!
//! Tokens are dialect-agnostic representations that serialize
//! to dialect-specific strings. Bound values travel with the stream,
//! so serializing yields a [`SqlFragment`] whose bindings line up with
//! its `?` markers.

use serde_json::Value;

use super::dialect::{Dialect, SqlDialect};
use super::fragment::SqlFragment;

/// SQL Token - every element the statement builder emits.
///
/// Adding a new variant here will cause compile errors everywhere
/// it needs to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    Distinct,
    From,
    Where,
    And,
    As,
    On,
    Join,
    Inner,
    Left,
    Full,
    Cross,
    GroupBy,
    OrderBy,
    Asc,
    Desc,
    Limit,
    Offset,
    True,

    // === Punctuation ===
    Comma,
    Dot,
    LParen,
    RParen,

    // === Whitespace / Formatting ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic Content ===
    /// Simple identifier (table, column, alias)
    Ident(String),
    /// Dot-qualified identifier, each part quoted: `"schema"."table"`
    QualifiedIdent(Vec<String>),
    /// A single bound value, emitted as `?`
    Binding(Value),
    /// Pre-rendered SQL with its own bindings
    Fragment(SqlFragment),

    // === Escape Hatch ===
    /// Raw SQL passed directly to output without escaping.
    ///
    /// # Security Warning
    ///
    /// **Never pass user input to this variant.** Raw SQL is not sanitized.
    /// Request values belong in `Token::Binding`.
    Raw(String),
}

impl Token {
    /// Write this token into `out` for the given dialect.
    pub fn write(&self, dialect: Dialect, out: &mut SqlFragment) {
        match self {
            // Keywords
            Token::Select => out.push_sql("select"),
            Token::Distinct => out.push_sql("distinct"),
            Token::From => out.push_sql("from"),
            Token::Where => out.push_sql("where"),
            Token::And => out.push_sql("and"),
            Token::As => out.push_sql("as"),
            Token::On => out.push_sql("on"),
            Token::Join => out.push_sql("join"),
            Token::Inner => out.push_sql("inner"),
            Token::Left => out.push_sql("left"),
            Token::Full => out.push_sql("full"),
            Token::Cross => out.push_sql("cross"),
            Token::GroupBy => out.push_sql("group by"),
            Token::OrderBy => out.push_sql("order by"),
            Token::Asc => out.push_sql("asc"),
            Token::Desc => out.push_sql("desc"),
            Token::Limit => out.push_sql("limit"),
            Token::Offset => out.push_sql("offset"),
            Token::True => out.push_sql("true"),

            // Punctuation
            Token::Comma => out.push_sql(","),
            Token::Dot => out.push_sql("."),
            Token::LParen => out.push_sql("("),
            Token::RParen => out.push_sql(")"),

            // Whitespace
            Token::Space => out.push_sql(" "),
            Token::Newline => out.push_sql("\n"),
            Token::Indent(n) => out.push_sql(&"  ".repeat(*n)),

            // Dynamic - dialect-specific formatting
            Token::Ident(name) => out.push_sql(&dialect.quote_identifier(name)),
            Token::QualifiedIdent(parts) => {
                let quoted: Vec<String> =
                    parts.iter().map(|p| dialect.quote_identifier(p)).collect();
                out.push_sql(&quoted.join("."))
            }
            Token::Binding(value) => out.append(&SqlFragment::binding(value.clone())),
            Token::Fragment(fragment) => out.append(fragment),

            // Escape hatch
            Token::Raw(s) => out.push_sql(s),
        };
    }

    /// Serialize this token on its own.
    pub fn serialize(&self, dialect: Dialect) -> SqlFragment {
        let mut out = SqlFragment::default();
        self.write(dialect, &mut out);
        out
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Extend with multiple tokens.
    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    /// Serialize all tokens to SQL text plus bindings.
    pub fn serialize(&self, dialect: Dialect) -> SqlFragment {
        let mut out = SqlFragment::default();
        for token in &self.tokens {
            token.write(dialect, &mut out);
        }
        out
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn indent(&mut self, n: usize) -> &mut Self {
        self.push(Token::Indent(n))
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
    pub fn fragment(&mut self, fragment: &SqlFragment) -> &mut Self {
        self.push(Token::Fragment(fragment.clone()))
    }
}
