//! Statement builder - construct nested SELECT statements with a fluent API.
//!
//! A [`Statement`] is an owned value built once per compile and consumed by
//! rendering. Its `from` and join targets may themselves be statements, so
//! the model/segment/root levels of a compiled query nest to any depth.
//!
//! Expressions are [`SqlFragment`]s written against the neutral `?` marker.
//! Rendering walks the tree in clause order and concatenates bindings in the
//! same order, so the output fragment stays positionally aligned.

use super::dialect::{Dialect, SqlDialect};
use super::fragment::SqlFragment;
use super::token::{Token, TokenStream};

// =============================================================================
// Select Item (expression with optional alias)
// =============================================================================

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectItem {
    pub expr: SqlFragment,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: impl Into<SqlFragment>) -> Self {
        Self {
            expr: expr.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.fragment(&self.expr);
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

// =============================================================================
// Sources
// =============================================================================

/// A FROM or JOIN target.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Table name, dot-separated parts quoted individually.
    Table { name: String, alias: Option<String> },
    /// Raw SQL (a declared subquery), wrapped in parentheses.
    Raw {
        sql: SqlFragment,
        alias: Option<String>,
    },
    /// Nested statement, aliased by its own `alias`.
    Statement(Box<Statement>),
}

impl Source {
    pub fn table(name: &str) -> Self {
        Source::Table {
            name: name.into(),
            alias: None,
        }
    }

    pub fn raw(sql: impl Into<SqlFragment>) -> Self {
        Source::Raw {
            sql: sql.into(),
            alias: None,
        }
    }

    pub fn with_alias(self, alias: &str) -> Self {
        match self {
            Source::Table { name, .. } => Source::Table {
                name,
                alias: Some(alias.into()),
            },
            Source::Raw { sql, .. } => Source::Raw {
                sql,
                alias: Some(alias.into()),
            },
            Source::Statement(stmt) => Source::Statement(Box::new(stmt.with_alias(alias))),
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            Source::Table { alias, .. } | Source::Raw { alias, .. } => alias.as_deref(),
            Source::Statement(stmt) => stmt.alias.as_deref(),
        }
    }

    fn to_tokens(&self, dialect: Dialect, layout: Layout) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            Source::Table { name, .. } => {
                ts.push(Token::QualifiedIdent(
                    name.split('.').map(String::from).collect(),
                ));
            }
            Source::Raw { sql, .. } => {
                ts.lparen().fragment(sql).rparen();
            }
            Source::Statement(stmt) => {
                let inner = layout.nested();
                ts.lparen();
                inner.break_line(&mut ts, false);
                ts.append(&stmt.to_tokens_with_layout(dialect, inner));
                layout.break_line(&mut ts, false);
                ts.rparen();
            }
        }
        if let Some(alias) = self.alias() {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.to_string()));
        }
        ts
    }
}

impl From<Statement> for Source {
    fn from(stmt: Statement) -> Self {
        Source::Statement(Box::new(stmt))
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Full,
    Cross,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub source: Source,
    pub on: Option<SqlFragment>,
}

impl Join {
    fn to_tokens(&self, dialect: Dialect, layout: Layout) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(match self.kind {
            JoinKind::Inner => Token::Inner,
            JoinKind::Left => Token::Left,
            JoinKind::Full => Token::Full,
            JoinKind::Cross => Token::Cross,
        });
        ts.space().push(Token::Join).space();
        ts.append(&self.source.to_tokens(dialect, layout));

        if let Some(on) = &self.on {
            ts.space().push(Token::On).space().fragment(on);
        }

        ts
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// An ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: SqlFragment,
    pub dir: SortDir,
}

// =============================================================================
// Layout
// =============================================================================

/// Line-breaking mode for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    pub pretty: bool,
    depth: usize,
}

impl Layout {
    pub fn compact() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self {
            pretty: true,
            depth: 0,
        }
    }

    fn nested(self) -> Self {
        Self {
            pretty: self.pretty,
            depth: self.depth + 1,
        }
    }

    /// Clause separator: a newline at the current depth, or a single space.
    /// In compact mode `space` controls whether anything is emitted at all.
    fn break_line(&self, ts: &mut TokenStream, space: bool) {
        if self.pretty {
            ts.newline();
            if self.depth > 0 {
                ts.indent(self.depth);
            }
        } else if space {
            ts.space();
        }
    }
}

// =============================================================================
// Statement
// =============================================================================

/// A SELECT statement.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Statement has no effect until rendered with render() or to_sql()"]
pub struct Statement {
    pub distinct: bool,
    pub alias: Option<String>,
    pub select: Vec<SelectItem>,
    pub from: Option<Source>,
    pub joins: Vec<Join>,
    pub where_clause: Vec<SqlFragment>,
    pub group_by: Vec<SqlFragment>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Statement {
    /// Create a new empty statement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a SELECT item.
    pub fn select(mut self, item: SelectItem) -> Self {
        self.select.push(item);
        self
    }

    /// Add DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Alias used when this statement is nested as a source.
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the FROM source.
    pub fn from(mut self, source: impl Into<Source>) -> Self {
        self.from = Some(source.into());
        self
    }

    /// Add a JOIN.
    pub fn join(mut self, kind: JoinKind, source: impl Into<Source>, on: SqlFragment) -> Self {
        self.joins.push(Join {
            kind,
            source: source.into(),
            on: Some(on),
        });
        self
    }

    /// Add a CROSS JOIN.
    pub fn cross_join(mut self, source: impl Into<Source>) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Cross,
            source: source.into(),
            on: None,
        });
        self
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, condition: SqlFragment) -> Self {
        self.where_clause.push(condition);
        self
    }

    /// Add a GROUP BY expression.
    pub fn group_by(mut self, expr: SqlFragment) -> Self {
        self.group_by.push(expr);
        self
    }

    /// Add an ORDER BY item.
    pub fn order_by(mut self, expr: SqlFragment, dir: SortDir) -> Self {
        self.order_by.push(OrderByItem { expr, dir });
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Convert to token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        self.to_tokens_with_layout(dialect, Layout::compact())
    }

    /// Convert to token stream with an explicit layout.
    pub fn to_tokens_with_layout(&self, dialect: Dialect, layout: Layout) -> TokenStream {
        let mut ts = TokenStream::new();

        // SELECT
        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }

        // Columns
        let columns = layout.nested();
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            if layout.pretty {
                columns.break_line(&mut ts, true);
            } else {
                ts.space();
            }
            ts.append(&item.to_tokens());
        }

        // FROM
        if let Some(from) = &self.from {
            layout.break_line(&mut ts, true);
            ts.push(Token::From).space();
            ts.append(&from.to_tokens(dialect, layout));
        }

        // JOINs
        for join in &self.joins {
            layout.break_line(&mut ts, true);
            ts.append(&join.to_tokens(dialect, layout));
        }

        // WHERE
        if !self.where_clause.is_empty() {
            layout.break_line(&mut ts, true);
            ts.push(Token::Where).space();
            for (i, condition) in self.where_clause.iter().enumerate() {
                if i > 0 {
                    ts.space().push(Token::And).space();
                }
                ts.fragment(condition);
            }
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            layout.break_line(&mut ts, true);
            ts.push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.fragment(expr);
            }
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            layout.break_line(&mut ts, true);
            ts.push(Token::OrderBy).space();
            for (i, item) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.fragment(&item.expr).space().push(match item.dir {
                    SortDir::Asc => Token::Asc,
                    SortDir::Desc => Token::Desc,
                });
            }
        }

        // LIMIT / OFFSET
        let pagination = dialect.emit_limit_offset(self.limit, self.offset);
        if !pagination.is_empty() {
            layout.break_line(&mut ts, true);
            ts.append(&pagination);
        }

        ts
    }

    /// Render to SQL text with neutral `?` markers plus bindings.
    pub fn render(&self, dialect: Dialect) -> SqlFragment {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    /// Render with an explicit layout.
    pub fn render_with_layout(&self, dialect: Dialect, layout: Layout) -> SqlFragment {
        self.to_tokens_with_layout(dialect, layout).serialize(dialect)
    }

    /// Generate SQL text in the dialect's native placeholder syntax.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        dialect.translate_placeholders(&self.render(dialect).sql)
    }
}

impl std::fmt::Display for Statement {
    /// Formats the statement using the default dialect (ANSI).
    ///
    /// For dialect-specific SQL, use [`Statement::to_sql`] instead.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

// =============================================================================
// Tests
// =============================================================================
