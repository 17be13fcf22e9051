//! Alias allocation for appended statements.
//!
//! A query may carry dependent statements ([`Query::append_query`]) that run
//! in the same round trip as CTEs. At compile time the whole append tree is
//! flattened in pre-order (a dependent precedes its own dependents) and each
//! entry gets the next free alias from an [`AliasContext`]: `q`, `q2`, `q3`,
//! ... The main statement takes the alias after the last dependent.

use std::collections::HashSet;
use std::sync::Arc;

use crate::query::{Appended, Query};

/// Collision-free alias generator, fresh for every compilation.
#[derive(Clone, Debug, Default)]
pub struct AliasContext {
    counter: usize,
    used: HashSet<String>,
}

impl AliasContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a name so it is never generated.
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Next alias in the `q`, `q2`, `q3`, ... sequence not already in use.
    pub fn next(&mut self) -> String {
        loop {
            self.counter += 1;
            let candidate = if self.counter == 1 {
                "q".to_string()
            } else {
                format!("q{}", self.counter)
            };
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// A flattened dependent with its allocated alias.
#[derive(Clone, Debug)]
pub(crate) struct AliasedStatement {
    pub alias: String,
    pub query: Query,
    pub required: bool,
}

impl Query {
    /// Run `dependent` in the same round trip as a CTE whose rows are discarded.
    pub fn append_query(&self, dependent: &Query) -> Self {
        self.push_appended(dependent, false)
    }

    /// Like [`Query::append_query`], but the combined statement returns no rows
    /// (and execution fails with `NotFound`) when `dependent` yields none.
    pub fn append_query_required(&self, dependent: &Query) -> Self {
        self.push_appended(dependent, true)
    }

    fn push_appended(&self, dependent: &Query, required: bool) -> Self {
        let entry = Appended {
            query: dependent.clone(),
            required,
        };
        self.derive(|d| Arc::make_mut(&mut d.appended).push(entry))
    }
}

/// Flatten the append tree of `main` in pre-order, allocating aliases.
///
/// Returned dependents have their own append lists cleared.
pub(crate) fn flatten(main: &Query, ctx: &mut AliasContext) -> Vec<AliasedStatement> {
    let mut out = Vec::new();
    collect(main, ctx, &mut out);
    out
}

fn collect(query: &Query, ctx: &mut AliasContext, out: &mut Vec<AliasedStatement>) {
    for dep in query.data().appended.iter() {
        out.push(AliasedStatement {
            alias: ctx.next(),
            query: dep.query.clear(crate::query::Clause::Append),
            required: dep.required,
        });
        collect(&dep.query, ctx, out);
    }
}

/// Names that generated aliases must avoid: tables and user CTEs anywhere in the tree.
pub(crate) fn reserve_names(query: &Query, ctx: &mut AliasContext) {
    if let Some(reference) = query.reference() {
        ctx.reserve(&reference);
    }
    for cte in query.data().ctes.iter() {
        ctx.reserve(&cte.name);
    }
    for dep in query.data().appended.iter() {
        reserve_names(&dep.query, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Table;

    #[test]
    fn sequence_is_q_q2_q3() {
        let mut ctx = AliasContext::new();
        assert_eq!(ctx.next(), "q");
        assert_eq!(ctx.next(), "q2");
        assert_eq!(ctx.next(), "q3");
    }

    #[test]
    fn skips_reserved_names() {
        let mut ctx = AliasContext::new();
        ctx.reserve("q");
        ctx.reserve("q3");
        assert_eq!(ctx.next(), "q2");
        assert_eq!(ctx.next(), "q4");
    }

    #[test]
    fn nested_and_sequential_appends_flatten_identically() {
        let a = Table::new("a").query();
        let b = Table::new("b").query();
        let c = Table::new("c").query();

        let nested = a.append_query(&b.append_query(&c));
        let sequential = a.append_query(&b).append_query(&c);

        let names = |q: &Query| {
            let mut ctx = AliasContext::new();
            flatten(q, &mut ctx)
                .into_iter()
                .map(|s| (s.alias, s.query.reference().unwrap_or_default()))
                .collect::<Vec<_>>()
        };

        let expected = vec![("q".to_string(), "b".to_string()), ("q2".to_string(), "c".to_string())];
        assert_eq!(names(&nested), expected);
        assert_eq!(names(&sequential), expected);
    }

    #[test]
    fn flattened_dependents_drop_their_own_appends() {
        let a = Table::new("a").query();
        let b = Table::new("b").query().append_query(&Table::new("c").query());
        let mut ctx = AliasContext::new();
        let flat = flatten(&a.append_query(&b), &mut ctx);
        assert_eq!(flat.len(), 2);
        assert!(flat.iter().all(|s| s.query.data().appended.is_empty()));
    }
}
