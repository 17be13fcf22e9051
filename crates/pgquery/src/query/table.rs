use std::sync::Arc;

use crate::expr::Condition;
use crate::ident::Naming;

use super::{Query, QueryData, Source};

/// Name of the scope attached by [`Table::soft_delete`].
pub const DELETED_SCOPE: &str = "deleted";

/// Table binding: the starting point of every table query.
///
/// Carries the physical name, naming convention, declared logical columns,
/// and default scopes. Scopes are copied into each query created by
/// [`Table::query`], so a query can drop them without affecting the table.
#[derive(Clone, Debug)]
pub struct Table {
    name: String,
    schema: Option<String>,
    columns: Vec<String>,
    naming: Option<Naming>,
    soft_delete: Option<String>,
    scopes: Vec<(String, Condition)>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            columns: Vec::new(),
            naming: None,
            soft_delete: None,
            scopes: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Declare the logical column names.
    ///
    /// With snake_case naming, `SELECT *` expands to these columns so results
    /// come back under their logical names.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Map camelCase logical names to snake_case physical columns.
    pub fn snake_case(mut self, enabled: bool) -> Self {
        self.naming = Some(Naming::from_snake_case(enabled));
        self
    }

    /// Mark rows as deleted through `column` instead of removing them.
    ///
    /// Adds the default scope `column IS NULL` under [`DELETED_SCOPE`].
    pub fn soft_delete(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.scopes.retain(|(name, _)| name != DELETED_SCOPE);
        self.scopes
            .push((DELETED_SCOPE.to_string(), Condition::is_null(&column)));
        self.soft_delete = Some(column);
        self
    }

    /// Add a named default scope.
    pub fn scope(mut self, name: impl Into<String>, condition: Condition) -> Self {
        let name = name.into();
        self.scopes.retain(|(n, _)| *n != name);
        self.scopes.push((name, condition));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// `schema.name` or just `name`.
    pub fn path(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn declared_columns(&self) -> &[String] {
        &self.columns
    }

    pub fn naming(&self) -> Option<Naming> {
        self.naming
    }

    pub fn soft_delete_column(&self) -> Option<&str> {
        self.soft_delete.as_deref()
    }

    /// Create the initial descriptor for this table.
    pub fn query(&self) -> Query {
        let scopes = self.scopes.clone();
        Query {
            data: Arc::new(QueryData {
                source: Source::Table(Arc::new(self.clone())),
                scopes: Arc::new(scopes),
                ..QueryData::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_delete_adds_scope_once() {
        let table = Table::new("user").soft_delete("deletedAt").soft_delete("removedAt");
        let q = table.query();
        assert_eq!(q.data().scopes.len(), 1);
        assert_eq!(table.soft_delete_column(), Some("removedAt"));
    }

    #[test]
    fn path_includes_schema() {
        assert_eq!(Table::new("user").schema("auth").path(), "auth.user");
        assert_eq!(Table::new("user").path(), "user");
    }
}
