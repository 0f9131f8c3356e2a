//! Per-compile state.
//!
//! A [`CompileSession`] lives for exactly one compile call. It owns the
//! member cache (so each member's SQL is produced at most once per compile)
//! and the stack of members currently being resolved, which is how template
//! cycles are caught. Nothing here is shared between compiles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::NaiveDateTime;
use serde_json::Value;

use super::member::QueryMember;
use crate::semantic::error::{SemanticError, SemanticResult};
use crate::semantic::repository::Repository;
use crate::sql::{Dialect, SqlFragment};

/// State scoped to a single compile.
pub struct CompileSession<'r> {
    repository: &'r Repository,
    dialect: Dialect,
    context: &'r Value,
    reference_time: NaiveDateTime,
    members: RefCell<HashMap<String, Rc<QueryMember<'r>>>>,
    resolving: RefCell<Vec<String>>,
}

impl<'r> CompileSession<'r> {
    pub fn new(
        repository: &'r Repository,
        dialect: Dialect,
        context: &'r Value,
        reference_time: NaiveDateTime,
    ) -> Self {
        Self {
            repository,
            dialect,
            context,
            reference_time,
            members: RefCell::new(HashMap::new()),
            resolving: RefCell::new(vec![]),
        }
    }

    /// A fresh session over the same inputs, used for nested queries.
    pub fn fork(&self) -> Self {
        Self::new(
            self.repository,
            self.dialect,
            self.context,
            self.reference_time,
        )
    }

    pub fn repository(&self) -> &'r Repository {
        self.repository
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn context(&self) -> &'r Value {
        self.context
    }

    pub fn reference_time(&self) -> NaiveDateTime {
        self.reference_time
    }

    /// Quote an identifier for this compile's dialect.
    pub fn quote(&self, ident: &str) -> String {
        self.dialect.dialect().quote_identifier(ident)
    }

    /// `"table"."column"`
    pub fn qualified(&self, table: &str, column: &str) -> SqlFragment {
        SqlFragment::new(format!("{}.{}", self.quote(table), self.quote(column)))
    }

    /// The cached member for `path`, resolving it on first use.
    pub fn member(&self, path: &str) -> SemanticResult<Rc<QueryMember<'r>>> {
        if let Some(member) = self.members.borrow().get(path) {
            return Ok(Rc::clone(member));
        }

        let resolved = self.repository.get_member(path)?;
        let member = Rc::new(QueryMember::new(resolved));
        self.members
            .borrow_mut()
            .insert(path.to_string(), Rc::clone(&member));
        Ok(member)
    }

    /// Number of members resolved so far.
    pub fn cached_members(&self) -> usize {
        self.members.borrow().len()
    }

    /// Mark `path` as being resolved until the guard drops.
    ///
    /// Fails with `CyclicReference` when `path` is already on the stack.
    pub(crate) fn enter(&self, path: &str) -> SemanticResult<ResolveGuard<'_>> {
        let mut stack = self.resolving.borrow_mut();
        if let Some(start) = stack.iter().position(|p| p == path) {
            let mut cycle = stack[start..].to_vec();
            cycle.push(path.to_string());
            return Err(SemanticError::CyclicReference(cycle));
        }
        stack.push(path.to_string());
        Ok(ResolveGuard {
            stack: &self.resolving,
        })
    }
}

/// Pops the resolving stack on drop.
pub(crate) struct ResolveGuard<'s> {
    stack: &'s RefCell<Vec<String>>,
}

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}
