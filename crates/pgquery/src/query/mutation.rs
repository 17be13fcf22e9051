//! INSERT / UPDATE / DELETE payloads and RETURNING.

use std::sync::Arc;

use crate::expr::{ConflictAction, InsertSource, Mutation, OnConflict, Record, SelectItem, SetValue};
use crate::ident::ColumnRef;
use crate::value::Value;

use super::Query;

impl Query {
    fn with_mutation(&self, mutation: Mutation) -> Self {
        self.derive(|d| d.mutation = Some(Arc::new(mutation)))
    }

    /// `INSERT INTO table (cols) VALUES (...)`
    pub fn insert(&self, record: Record) -> Self {
        self.insert_many(vec![record])
    }

    /// Insert several rows; columns missing from a record render as `DEFAULT`.
    pub fn insert_many(&self, records: Vec<Record>) -> Self {
        self.with_mutation(Mutation::Insert {
            source: InsertSource::Values(records),
            on_conflict: None,
        })
    }

    /// `INSERT INTO table (cols) SELECT ...`
    pub fn insert_from<I, S>(&self, columns: I, query: &Query) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_mutation(Mutation::Insert {
            source: InsertSource::Query {
                columns: columns.into_iter().map(Into::into).collect(),
                query: Box::new(query.clone()),
            },
            on_conflict: None,
        })
    }

    fn on_conflict(&self, columns: &[&str], action: ConflictAction) -> Self {
        let conflict = OnConflict {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            action,
        };
        self.derive(|d| {
            if let Some(Mutation::Insert { on_conflict, .. }) = d.mutation.as_mut().map(Arc::make_mut) {
                *on_conflict = Some(conflict);
            }
        })
    }

    /// `ON CONFLICT (columns) DO NOTHING`; no-op unless this is an insert.
    pub fn on_conflict_do_nothing(&self, columns: &[&str]) -> Self {
        self.on_conflict(columns, ConflictAction::Nothing)
    }

    /// `ON CONFLICT (columns) DO UPDATE SET col = EXCLUDED.col` for each of `merge`.
    pub fn on_conflict_merge(&self, columns: &[&str], merge: &[&str]) -> Self {
        let merge = merge.iter().map(|c| c.to_string()).collect();
        self.on_conflict(columns, ConflictAction::Merge(merge))
    }

    /// `ON CONFLICT (columns) DO UPDATE SET ...`
    pub fn on_conflict_update(&self, columns: &[&str], set: Record) -> Self {
        self.on_conflict(columns, ConflictAction::Update(set))
    }

    /// `UPDATE table SET ...`
    pub fn update(&self, set: Record) -> Self {
        self.with_mutation(Mutation::Update(set))
    }

    /// Add one assignment, starting an UPDATE if needed.
    pub fn set(&self, column: &str, value: impl Into<Value>) -> Self {
        self.assign(|r| r.set(column, value))
    }

    /// `col = col + by`
    pub fn increment(&self, column: &str, by: impl Into<Value>) -> Self {
        self.assign(|r| r.increment(column, by))
    }

    /// `col = col - by`
    pub fn decrement(&self, column: &str, by: impl Into<Value>) -> Self {
        self.assign(|r| r.decrement(column, by))
    }

    fn assign(&self, f: impl FnOnce(Record) -> Record) -> Self {
        let record = match self.data().mutation.as_deref() {
            Some(Mutation::Update(existing)) => existing.clone(),
            _ => Record::new(),
        };
        self.update(f(record))
    }

    /// Delete matching rows; on a soft-delete table this sets the delete marker.
    pub fn delete(&self) -> Self {
        self.with_mutation(Mutation::Delete { hard: false })
    }

    /// `DELETE FROM` even on a soft-delete table.
    pub fn hard_delete(&self) -> Self {
        self.with_mutation(Mutation::Delete { hard: true })
    }

    pub fn returning<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<SelectItem> = columns
            .into_iter()
            .map(|c| SelectItem::Column {
                column: ColumnRef::parse(c.as_ref()),
                alias: None,
            })
            .collect();
        self.derive(|d| d.returning = Arc::new(items))
    }

    /// `RETURNING *`
    pub fn returning_all(&self) -> Self {
        self.returning(["*"])
    }
}

impl SetValue {
    pub(crate) fn is_relative(&self) -> bool {
        matches!(self, SetValue::Increment(_) | SetValue::Decrement(_))
    }
}
