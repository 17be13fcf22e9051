//! Descriptor tests.

use std::sync::Arc;

use crate::expr::{Condition, Mutation, Record, SetValue};
use crate::value::Value;

use super::{Clause, Query, ReturnKind, Source, Table};

#[test]
fn test_new_query_is_empty() {
    let q = Query::new();
    let d = q.data();
    assert!(matches!(d.source, Source::None));
    assert!(d.select.is_empty());
    assert!(d.conditions.is_empty());
    assert!(d.mutation.is_none());
    assert!(q.table().is_none());
}

#[test]
fn test_table_query_copies_scopes() {
    let table = Table::new("user")
        .soft_delete("deletedAt")
        .scope("active", Condition::eq("active", true));
    let q = table.query();
    let names: Vec<&str> = q.data().scopes.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["deleted", "active"]);
    assert_eq!(q.table().map(Table::name), Some("user"));
}

#[test]
fn test_refinement_returns_new_descriptor() {
    let base = Table::new("user").query();
    let refined = base.eq("id", 1);
    assert!(base.data().conditions.is_empty());
    assert_eq!(refined.data().conditions.len(), 1);
    assert!(!base.ptr_eq(&refined));
}

#[test]
fn test_clone_shares_record() {
    let q = Table::new("user").query().eq("id", 1);
    let copy = q.clone();
    assert!(q.ptr_eq(&copy));
}

#[test]
fn test_sibling_refinements_share_untouched_clauses() {
    let base = Table::new("user").query().select(["id"]).eq("a", 1);
    let left = base.order_by("id");
    let right = base.limit(10);
    assert!(Arc::ptr_eq(&left.data().select, &right.data().select));
    assert!(Arc::ptr_eq(&left.data().conditions, &base.data().conditions));
    assert!(right.data().order.is_empty());
    assert_eq!(left.data().limit, None);
}

#[test]
fn test_or_where_on_empty_query_is_plain_condition() {
    let q = Table::new("user").query().or_where(Condition::eq("a", 1));
    assert_eq!(q.data().conditions.len(), 1);
    assert!(matches!(q.data().conditions[0], Condition::Compare { .. }));
}

#[test]
fn test_eq_opt_skips_none() {
    let q = Table::new("user").query().eq_opt("a", None::<i64>).eq_opt("b", Some(2));
    assert_eq!(q.data().conditions.len(), 1);
}

#[test]
fn test_clear_resets_single_clause() {
    let q = Table::new("user")
        .query()
        .select(["id"])
        .eq("id", 1)
        .order_by("id")
        .limit(1)
        .offset(2)
        .for_update();

    assert!(q.clear(Clause::Select).data().select.is_empty());
    assert!(q.clear(Clause::Where).data().conditions.is_empty());
    assert!(q.clear(Clause::Order).data().order.is_empty());
    assert_eq!(q.clear(Clause::Limit).data().limit, None);
    assert_eq!(q.clear(Clause::Offset).data().offset, None);
    assert!(q.clear(Clause::Lock).data().lock.is_none());

    let cleared = q.clear(Clause::Where);
    assert_eq!(cleared.data().limit, Some(1));
    assert!(Arc::ptr_eq(&cleared.data().select, &q.data().select));
}

#[test]
fn test_include_deleted_only_drops_deleted_scope() {
    let q = Table::new("user")
        .soft_delete("deletedAt")
        .scope("active", Condition::eq("active", true))
        .query();
    let all = q.include_deleted();
    let names: Vec<&str> = all.data().scopes.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["active"]);
    assert_eq!(q.data().scopes.len(), 2);
}

#[test]
fn test_return_kind_defaults() {
    let users = Table::new("user");
    assert_eq!(users.query().return_kind(), ReturnKind::All);
    assert_eq!(users.query().eq("id", 1).delete().return_kind(), ReturnKind::RowCount);
    assert_eq!(
        users.query().eq("id", 1).delete().returning(["id"]).return_kind(),
        ReturnKind::All
    );
    assert_eq!(users.query().take().return_kind(), ReturnKind::One);
    assert_eq!(users.query().take_optional().return_kind(), ReturnKind::OneOptional);
    assert_eq!(users.query().pluck("id").return_kind(), ReturnKind::Pluck);
    assert_eq!(users.query().count().return_kind(), ReturnKind::Value);
    assert_eq!(users.query().void().return_kind(), ReturnKind::Void);
}

#[test]
fn test_take_on_mutation_does_not_limit() {
    let q = Table::new("user")
        .query()
        .insert(Record::new().set("name", "a"))
        .returning_all()
        .take();
    assert_eq!(q.data().limit, None);
    assert_eq!(q.return_kind(), ReturnKind::One);
}

#[test]
fn test_get_on_mutation_sets_returning() {
    let q = Table::new("user")
        .query()
        .insert(Record::new().set("name", "a"))
        .get("id");
    assert_eq!(q.data().returning.len(), 1);
    assert!(q.data().select.is_empty());
    assert_eq!(q.return_kind(), ReturnKind::Value);
}

#[test]
fn test_set_merges_into_existing_update() {
    let q = Table::new("user")
        .query()
        .eq("id", 1)
        .update(Record::new().set("a", 1))
        .set("b", 2)
        .set("a", 3)
        .increment("c", 1);
    let Some(Mutation::Update(record)) = q.data().mutation.as_deref() else {
        panic!("expected update");
    };
    let columns: Vec<&str> = record.columns().collect();
    assert_eq!(columns, vec!["a", "b", "c"]);
    assert!(matches!(record.get("a"), Some(SetValue::Value(Value::Int(3)))));
    assert!(matches!(record.get("c"), Some(SetValue::Increment(_))));
}

#[test]
fn test_on_conflict_ignored_without_insert() {
    let q = Table::new("user").query().on_conflict_do_nothing(&["id"]);
    assert!(q.data().mutation.is_none());
}

#[test]
fn test_is_mutation() {
    let users = Table::new("user");
    assert!(!users.query().is_mutation());
    assert!(users.query().hard_delete().is_mutation());
    assert!(users.query().insert(Record::new()).is_mutation());
}

#[test]
fn test_from_query_keeps_inner_untouched() {
    let inner = Table::new("user").query().eq("id", 1);
    let outer = Query::from_query(&inner, "u").eq("name", "x");
    assert_eq!(inner.data().conditions.len(), 1);
    assert_eq!(outer.reference().as_deref(), Some("u"));
    assert!(outer.table().is_none());
    assert!(outer.data().scopes.is_empty());
}

#[test]
fn test_paginate_clamps_and_saturates() {
    let q = Table::new("user").query().paginate(i64::MAX, 2);
    assert_eq!(q.data().limit, Some(2));
    assert_eq!(q.data().offset, Some(i64::MAX));

    let first = Table::new("user").query().paginate(0, 0);
    assert_eq!(first.data().limit, Some(1));
    assert_eq!(first.data().offset, Some(0));
}
