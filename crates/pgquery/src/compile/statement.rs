//! Rendering of a single statement (no appended dependents).

use crate::error::{PgError, PgResult};
use crate::expr::{
    Condition, ConflictAction, Cte, CteBody, Direction, Distinct, InsertSource, JoinKind,
    JoinSource, LockTable, Mutation, Nulls, OnConflict, Operand, Order, OrderTarget, Record,
    SelectItem, SetValue, WaitPolicy, WindowSpec,
};
use crate::ident::{self, ColumnRef, Naming};
use crate::query::{Query, QueryData, Source};
use crate::sql_buf::SqlBuf;
use crate::value::Value;

use super::CompileOptions;

/// Per-statement rendering state: how columns are qualified and named.
pub(super) struct StatementWriter<'a> {
    query: &'a Query,
    options: &'a CompileOptions,
    qualifier: Option<String>,
    naming: Naming,
}

impl<'a> StatementWriter<'a> {
    fn new(query: &'a Query, options: &'a CompileOptions) -> Self {
        let (qualifier, naming) = match &query.data().source {
            Source::Table(t) => (
                Some(t.name().to_string()),
                t.naming()
                    .unwrap_or_else(|| Naming::from_snake_case(options.snake_case)),
            ),
            // wrapped rows already carry their output names
            Source::Subquery { alias, .. } | Source::Raw { alias, .. } => {
                (Some(alias.clone()), Naming::Verbatim)
            }
            Source::None => (None, Naming::from_snake_case(options.snake_case)),
        };
        Self {
            query,
            options,
            qualifier,
            naming,
        }
    }

    /// Render `query` into `buf`.
    ///
    /// `as_cte` is set when the statement becomes a CTE of an appended chain;
    /// mutations then always get a RETURNING clause so the outer SELECT can
    /// read them.
    pub(super) fn write(
        query: &Query,
        options: &CompileOptions,
        buf: &mut SqlBuf,
        as_cte: bool,
    ) -> PgResult<()> {
        if !query.data().appended.is_empty() {
            return Err(PgError::validation(
                "appended queries are only supported on the outermost statement",
            ));
        }
        let writer = StatementWriter::new(query, options);
        writer.write_statement(buf, as_cte)
    }

    fn data(&self) -> &'a QueryData {
        self.query.data()
    }

    fn write_statement(&self, buf: &mut SqlBuf, as_cte: bool) -> PgResult<()> {
        let d = self.data();
        self.write_ctes(&d.ctes, buf)?;

        match d.mutation.as_deref() {
            None => self.write_select(buf),
            Some(mutation) => {
                match mutation {
                    Mutation::Insert {
                        source,
                        on_conflict,
                    } => self.write_insert(source, on_conflict.as_ref(), buf)?,
                    Mutation::Update(record) => self.write_update(record, buf)?,
                    Mutation::Delete { hard } => self.write_delete(*hard, buf)?,
                }
                self.write_returning(buf, as_cte)
            }
        }
    }

    // ==================== WITH ====================

    fn write_ctes(&self, ctes: &[Cte], buf: &mut SqlBuf) -> PgResult<()> {
        if ctes.is_empty() {
            return Ok(());
        }
        buf.push("WITH ");
        if ctes.iter().any(|c| c.recursive) {
            buf.push("RECURSIVE ");
        }
        for (i, cte) in ctes.iter().enumerate() {
            if i > 0 {
                buf.push(", ");
            }
            buf.push_ident(&cte.name)?;
            if !cte.columns.is_empty() {
                buf.push("(");
                self.write_ident_list(&cte.columns, buf)?;
                buf.push(")");
            }
            buf.push(" AS (");
            match &cte.body {
                CteBody::Query(q) => self.write_nested(q, buf)?,
                CteBody::Raw(sql) => sql.write_to(buf),
            }
            buf.push(")");
        }
        buf.push(" ");
        Ok(())
    }

    // ==================== SELECT ====================

    fn write_select(&self, buf: &mut SqlBuf) -> PgResult<()> {
        let d = self.data();
        buf.push("SELECT ");
        match &d.distinct {
            Some(Distinct::All) => {
                buf.push("DISTINCT ");
            }
            Some(Distinct::On(cols)) => {
                buf.push("DISTINCT ON (");
                for (i, col) in cols.iter().enumerate() {
                    if i > 0 {
                        buf.push(", ");
                    }
                    self.write_column(col, buf)?;
                }
                buf.push(") ");
            }
            None => {}
        }
        self.write_select_list(&d.select, buf)?;
        self.write_from(buf)?;
        self.write_joins(buf)?;

        let mut conditions: Vec<&Condition> = d.conditions.iter().collect();
        conditions.extend(d.scopes.iter().map(|(_, c)| c));
        self.write_where(&conditions, buf)?;

        if !d.group.is_empty() {
            buf.push(" GROUP BY ");
            for (i, item) in d.group.iter().enumerate() {
                if i > 0 {
                    buf.push(", ");
                }
                self.write_operand(item, buf)?;
            }
        }
        if !d.having.is_empty() {
            let having: Vec<&Condition> = d.having.iter().collect();
            self.write_conjunction(&having, " HAVING ", buf)?;
        }
        self.write_windows(&d.windows, buf)?;

        for op in d.set_ops.iter() {
            buf.push(" ").push(op.kind.as_sql()).push(" (");
            self.write_nested(&op.query, buf)?;
            buf.push(")");
        }

        // ORDER BY over a set operation sees only output column names
        self.write_order(&d.order, " ORDER BY ", d.set_ops.is_empty(), buf)?;
        if let Some(limit) = d.limit {
            buf.push(" LIMIT ").push_bind(Value::Int(limit));
        }
        if let Some(offset) = d.offset {
            buf.push(" OFFSET ").push_bind(Value::Int(offset));
        }
        self.write_lock(buf)
    }

    fn write_select_list(&self, items: &[SelectItem], buf: &mut SqlBuf) -> PgResult<()> {
        if !items.is_empty() {
            return self.write_items(items, buf);
        }

        if let Some(table) = self.query.table() {
            if self.naming == Naming::SnakeCase && !table.declared_columns().is_empty() {
                let expanded: Vec<SelectItem> = table
                    .declared_columns()
                    .iter()
                    .map(|c| SelectItem::column(c))
                    .collect();
                return self.write_items(&expanded, buf);
            }
        }

        match &self.qualifier {
            Some(q) if !self.data().joins.is_empty() => {
                buf.push(&ident::quote_path(q)?).push(".*");
            }
            _ => {
                buf.push("*");
            }
        }
        Ok(())
    }

    /// Result column name for `column` as the select list produced it.
    ///
    /// Listed columns come out under their logical name; a bare `*` yields
    /// physical names.
    fn output_name(&self, column: &str) -> String {
        let expands_declared = self.query.table().is_some_and(|t| {
            self.naming == Naming::SnakeCase && !t.declared_columns().is_empty()
        });
        if self.data().select.is_empty() && !expands_declared {
            self.naming.physical(column)
        } else {
            column.to_string()
        }
    }

    fn write_items(&self, items: &[SelectItem], buf: &mut SqlBuf) -> PgResult<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                buf.push(", ");
            }
            self.write_item(item, buf)?;
        }
        Ok(())
    }

    fn write_item(&self, item: &SelectItem, buf: &mut SqlBuf) -> PgResult<()> {
        let alias = match item {
            SelectItem::Column { column, alias } => {
                self.write_column(column, buf)?;
                match alias {
                    Some(a) => Some(a.as_str()),
                    None if !column.is_star() && self.naming.physical(&column.name) != column.name => {
                        Some(column.name.as_str())
                    }
                    None => None,
                }
            }
            SelectItem::Raw { sql, alias } => {
                sql.write_to(buf);
                alias.as_deref()
            }
            SelectItem::Aggregate {
                func,
                column,
                distinct,
                alias,
            } => {
                buf.push(func.as_sql()).push("(");
                if *distinct {
                    buf.push("DISTINCT ");
                }
                match column {
                    Some(col) => self.write_column(col, buf)?,
                    None => {
                        buf.push("*");
                    }
                }
                buf.push(")");
                alias.as_deref()
            }
            SelectItem::Window {
                call,
                window,
                alias,
            } => {
                call.write_to(buf);
                buf.push(" OVER ");
                buf.push_ident(window)?;
                alias.as_deref()
            }
            SelectItem::Query { query, alias } => {
                buf.push("(");
                self.write_nested(query, buf)?;
                buf.push(")");
                Some(alias.as_str())
            }
            SelectItem::Exists { query, alias } => {
                buf.push("EXISTS (");
                self.write_nested(query, buf)?;
                buf.push(")");
                Some(alias.as_str())
            }
        };
        if let Some(alias) = alias {
            buf.push(" AS ");
            buf.push_ident(alias)?;
        }
        Ok(())
    }

    fn write_from(&self, buf: &mut SqlBuf) -> PgResult<()> {
        match &self.data().source {
            Source::None => {}
            Source::Table(table) => {
                buf.push(" FROM ").push(&ident::quote_path(&table.path())?);
            }
            Source::Subquery { query, alias } => {
                buf.push(" FROM (");
                self.write_nested(query, buf)?;
                buf.push(") AS ");
                buf.push_ident(alias)?;
            }
            Source::Raw { sql, alias } => {
                buf.push(" FROM ");
                sql.write_to(buf);
                buf.push(" AS ");
                buf.push_ident(alias)?;
            }
        }
        Ok(())
    }

    fn write_join_source(&self, source: &JoinSource, buf: &mut SqlBuf) -> PgResult<()> {
        match source {
            JoinSource::Table { name, alias } => {
                buf.push(&ident::quote_path(name)?);
                if let Some(alias) = alias {
                    buf.push(" AS ");
                    buf.push_ident(alias)?;
                }
            }
            JoinSource::Query { query, alias } => {
                buf.push("(");
                self.write_nested(query, buf)?;
                buf.push(") AS ");
                buf.push_ident(alias)?;
            }
        }
        Ok(())
    }

    fn write_joins(&self, buf: &mut SqlBuf) -> PgResult<()> {
        for join in self.data().joins.iter() {
            buf.push(" ").push(join.kind.as_sql()).push(" ");
            self.write_join_source(&join.source, buf)?;
            if join.kind == JoinKind::Cross {
                continue;
            }
            buf.push(" ON ");
            match &join.on {
                Some(on) if !on.is_empty() => self.write_condition(on, buf)?,
                _ => {
                    buf.push("TRUE");
                }
            }
        }
        Ok(())
    }

    /// Joined sources of UPDATE/DELETE render as a FROM/USING list; their ON
    /// conditions move into WHERE.
    fn write_mutation_sources<'q>(
        &self,
        keyword: &str,
        buf: &mut SqlBuf,
        conditions: &mut Vec<&'q Condition>,
    ) -> PgResult<()>
    where
        'a: 'q,
    {
        let joins = &self.data().joins;
        if joins.is_empty() {
            return Ok(());
        }
        buf.push(keyword);
        for (i, join) in joins.iter().enumerate() {
            if !matches!(join.kind, JoinKind::Inner | JoinKind::Cross) {
                return Err(PgError::validation(format!(
                    "{} is not supported in UPDATE or DELETE",
                    join.kind.as_sql()
                )));
            }
            if i > 0 {
                buf.push(", ");
            }
            self.write_join_source(&join.source, buf)?;
            if let Some(on) = &join.on {
                conditions.push(on);
            }
        }
        Ok(())
    }

    fn write_windows(&self, windows: &[(String, WindowSpec)], buf: &mut SqlBuf) -> PgResult<()> {
        if windows.is_empty() {
            return Ok(());
        }
        buf.push(" WINDOW ");
        for (i, (name, spec)) in windows.iter().enumerate() {
            if i > 0 {
                buf.push(", ");
            }
            buf.push_ident(name)?.push(" AS (");
            let mut wrote = false;
            if !spec.partition_by.is_empty() {
                buf.push("PARTITION BY ");
                for (j, col) in spec.partition_by.iter().enumerate() {
                    if j > 0 {
                        buf.push(", ");
                    }
                    self.write_column(col, buf)?;
                }
                wrote = true;
            }
            if !spec.order_by.is_empty() {
                let keyword = if wrote { " ORDER BY " } else { "ORDER BY " };
                self.write_order(&spec.order_by, keyword, true, buf)?;
                wrote = true;
            }
            if let Some(frame) = &spec.frame {
                if wrote {
                    buf.push(" ");
                }
                frame.write_to(buf);
            }
            buf.push(")");
        }
        Ok(())
    }

    fn write_order(&self, order: &[Order], keyword: &str, qualify: bool, buf: &mut SqlBuf) -> PgResult<()> {
        if order.is_empty() {
            return Ok(());
        }
        buf.push(keyword);
        for (i, o) in order.iter().enumerate() {
            if i > 0 {
                buf.push(", ");
            }
            match &o.target {
                OrderTarget::Column(col) if !qualify && col.table.is_none() => {
                    buf.push_ident(&self.output_name(&col.name))?;
                }
                OrderTarget::Column(col) => self.write_column(col, buf)?,
                OrderTarget::Raw(sql) => sql.write_to(buf),
            }
            buf.push(match o.direction {
                Direction::Asc => " ASC",
                Direction::Desc => " DESC",
            });
            match o.nulls {
                Some(Nulls::First) => {
                    buf.push(" NULLS FIRST");
                }
                Some(Nulls::Last) => {
                    buf.push(" NULLS LAST");
                }
                None => {}
            }
        }
        Ok(())
    }

    fn write_lock(&self, buf: &mut SqlBuf) -> PgResult<()> {
        let Some(lock) = &self.data().lock else {
            return Ok(());
        };
        buf.push(" ").push(lock.mode.as_sql());
        if !lock.of.is_empty() {
            buf.push(" OF ");
            for (i, table) in lock.of.iter().enumerate() {
                if i > 0 {
                    buf.push(", ");
                }
                match table {
                    LockTable::Ident(name) => {
                        buf.push(&ident::quote_path(name)?);
                    }
                    LockTable::Raw(sql) => sql.write_to(buf),
                }
            }
        }
        match lock.wait {
            Some(WaitPolicy::NoWait) => {
                buf.push(" NOWAIT");
            }
            Some(WaitPolicy::SkipLocked) => {
                buf.push(" SKIP LOCKED");
            }
            None => {}
        }
        Ok(())
    }

    // ==================== mutations ====================

    fn target_table(&self, verb: &str) -> PgResult<String> {
        match self.query.table() {
            Some(table) => ident::quote_path(&table.path()),
            None => Err(PgError::validation(format!("{verb} requires a table source"))),
        }
    }

    /// UPDATE/DELETE must be narrowed by a user condition or explicitly marked `all()`.
    fn check_guard(&self, verb: &str) -> PgResult<()> {
        let d = self.data();
        let narrowed = d.conditions.iter().any(|c| !c.is_empty())
            || d.joins.iter().any(|j| j.on.as_ref().is_some_and(|c| !c.is_empty()));
        if narrowed || d.all {
            return Ok(());
        }
        Err(PgError::guard(format!(
            "{verb} without WHERE conditions; call all() to affect every row"
        )))
    }

    fn write_insert(
        &self,
        source: &InsertSource,
        on_conflict: Option<&OnConflict>,
        buf: &mut SqlBuf,
    ) -> PgResult<()> {
        buf.push("INSERT INTO ").push(&self.target_table("INSERT")?);

        match source {
            InsertSource::Values(records) => {
                let mut columns: Vec<&str> = Vec::new();
                for record in records {
                    for col in record.columns() {
                        if !columns.contains(&col) {
                            columns.push(col);
                        }
                    }
                }
                match (records.len(), columns.is_empty()) {
                    (0, _) => return Err(PgError::validation("INSERT requires at least one record")),
                    (1, true) => {
                        buf.push(" DEFAULT VALUES");
                    }
                    (_, true) => {
                        return Err(PgError::validation(
                            "INSERT of several records requires at least one column",
                        ));
                    }
                    _ => {
                        buf.push(" (");
                        self.write_physical_list(columns.iter().copied(), buf)?;
                        buf.push(") VALUES ");
                        for (i, record) in records.iter().enumerate() {
                            if i > 0 {
                                buf.push(", ");
                            }
                            buf.push("(");
                            for (j, col) in columns.iter().enumerate() {
                                if j > 0 {
                                    buf.push(", ");
                                }
                                match record.get(col) {
                                    Some(value) if value.is_relative() => {
                                        return Err(PgError::validation(format!(
                                            "cannot increment \"{col}\" in INSERT"
                                        )));
                                    }
                                    Some(value) => self.write_set_value(col, value, buf)?,
                                    None => {
                                        buf.push("DEFAULT");
                                    }
                                }
                            }
                            buf.push(")");
                        }
                    }
                }
            }
            InsertSource::Query { columns, query } => {
                if !columns.is_empty() {
                    buf.push(" (");
                    self.write_physical_list(columns.iter().map(String::as_str), buf)?;
                    buf.push(")");
                }
                buf.push(" ");
                self.write_nested(query, buf)?;
            }
        }

        if let Some(conflict) = on_conflict {
            buf.push(" ON CONFLICT");
            if !conflict.columns.is_empty() {
                buf.push(" (");
                self.write_physical_list(conflict.columns.iter().map(String::as_str), buf)?;
                buf.push(")");
            }
            match &conflict.action {
                ConflictAction::Nothing => {
                    buf.push(" DO NOTHING");
                }
                ConflictAction::Merge(_) | ConflictAction::Update(_) if conflict.columns.is_empty() => {
                    return Err(PgError::validation(
                        "ON CONFLICT DO UPDATE requires conflict target columns",
                    ));
                }
                ConflictAction::Merge(cols) => {
                    if cols.is_empty() {
                        return Err(PgError::validation("ON CONFLICT merge requires columns"));
                    }
                    buf.push(" DO UPDATE SET ");
                    for (i, col) in cols.iter().enumerate() {
                        if i > 0 {
                            buf.push(", ");
                        }
                        let physical = self.naming.physical(col);
                        buf.push_ident(&physical)?.push(" = EXCLUDED.");
                        buf.push_ident(&physical)?;
                    }
                }
                ConflictAction::Update(record) => {
                    buf.push(" DO UPDATE SET ");
                    self.write_assignments(record, buf)?;
                }
            }
        }
        Ok(())
    }

    fn write_update(&self, record: &Record, buf: &mut SqlBuf) -> PgResult<()> {
        self.check_guard("UPDATE")?;
        if record.is_empty() {
            return Err(PgError::validation("UPDATE requires at least one assignment"));
        }
        buf.push("UPDATE ").push(&self.target_table("UPDATE")?).push(" SET ");
        self.write_assignments(record, buf)?;
        self.write_mutation_filter(" FROM ", buf)
    }

    fn write_delete(&self, hard: bool, buf: &mut SqlBuf) -> PgResult<()> {
        self.check_guard("DELETE")?;
        let soft_column = match self.query.table() {
            Some(table) if !hard => table.soft_delete_column().map(str::to_string),
            _ => None,
        };

        match soft_column {
            Some(column) => {
                buf.push("UPDATE ").push(&self.target_table("DELETE")?).push(" SET ");
                buf.push_ident(&self.naming.physical(&column))?.push(" = now()");
                self.write_mutation_filter(" FROM ", buf)
            }
            None => {
                buf.push("DELETE FROM ").push(&self.target_table("DELETE")?);
                self.write_mutation_filter(" USING ", buf)
            }
        }
    }

    /// FROM/USING list, then WHERE: join conditions, user conditions, scopes.
    fn write_mutation_filter(&self, keyword: &str, buf: &mut SqlBuf) -> PgResult<()> {
        let d = self.data();
        let mut conditions: Vec<&Condition> = Vec::new();
        self.write_mutation_sources(keyword, buf, &mut conditions)?;
        conditions.extend(d.conditions.iter());
        conditions.extend(d.scopes.iter().map(|(_, c)| c));
        self.write_where(&conditions, buf)
    }

    fn write_assignments(&self, record: &Record, buf: &mut SqlBuf) -> PgResult<()> {
        for (i, (col, value)) in record.fields.iter().enumerate() {
            if i > 0 {
                buf.push(", ");
            }
            buf.push_ident(&self.naming.physical(col))?.push(" = ");
            self.write_set_value(col, value, buf)?;
        }
        Ok(())
    }

    fn write_set_value(&self, column: &str, value: &SetValue, buf: &mut SqlBuf) -> PgResult<()> {
        match value {
            SetValue::Value(v) => {
                buf.push_bind(v.clone());
            }
            SetValue::Raw(sql) => sql.write_to(buf),
            SetValue::Query(q) => {
                buf.push("(");
                self.write_nested(q, buf)?;
                buf.push(")");
            }
            SetValue::Default => {
                buf.push("DEFAULT");
            }
            SetValue::Increment(by) | SetValue::Decrement(by) => {
                self.write_column(&ColumnRef::parse(column), buf)?;
                buf.push(if matches!(value, SetValue::Increment(_)) {
                    " + "
                } else {
                    " - "
                });
                buf.push_bind(by.clone());
            }
        }
        Ok(())
    }

    fn write_returning(&self, buf: &mut SqlBuf, as_cte: bool) -> PgResult<()> {
        let returning = &self.data().returning;
        if returning.is_empty() {
            if as_cte {
                buf.push(" RETURNING 1");
            }
            return Ok(());
        }
        buf.push(" RETURNING ");
        self.write_items(returning, buf)
    }

    // ==================== conditions ====================

    fn write_where(&self, conditions: &[&Condition], buf: &mut SqlBuf) -> PgResult<()> {
        self.write_conjunction(conditions, " WHERE ", buf).map(|_| ())
    }

    /// Write `keyword` followed by the non-empty conditions joined with AND.
    fn write_conjunction(&self, conditions: &[&Condition], keyword: &str, buf: &mut SqlBuf) -> PgResult<bool> {
        let mut wrote = false;
        for cond in conditions.iter().filter(|c| !c.is_empty()) {
            buf.push(if wrote { " AND " } else { keyword });
            self.write_child(cond, matches!(cond, Condition::Or(_)), buf)?;
            wrote = true;
        }
        Ok(wrote)
    }

    fn write_child(&self, cond: &Condition, wrap: bool, buf: &mut SqlBuf) -> PgResult<()> {
        if wrap {
            buf.push("(");
            self.write_condition(cond, buf)?;
            buf.push(")");
            Ok(())
        } else {
            self.write_condition(cond, buf)
        }
    }

    fn write_condition(&self, cond: &Condition, buf: &mut SqlBuf) -> PgResult<()> {
        match cond {
            Condition::And(items) | Condition::Or(items) => {
                let is_and = matches!(cond, Condition::And(_));
                let sep = if is_and { " AND " } else { " OR " };
                let mut first = true;
                for item in items.iter().filter(|c| !c.is_empty()) {
                    if !first {
                        buf.push(sep);
                    }
                    let wrap = if is_and {
                        matches!(item, Condition::Or(_))
                    } else {
                        matches!(item, Condition::And(_))
                    };
                    self.write_child(item, wrap, buf)?;
                    first = false;
                }
            }
            Condition::Not(inner) => {
                buf.push("NOT (");
                self.write_condition(inner, buf)?;
                buf.push(")");
            }
            Condition::Compare { column, op, value } => {
                self.write_column(column, buf)?;
                buf.push(" ").push(op.as_sql()).push(" ");
                self.write_operand(value, buf)?;
            }
            Condition::NullCheck { column, is_null } => {
                self.write_column(column, buf)?;
                buf.push(if *is_null { " IS NULL" } else { " IS NOT NULL" });
            }
            Condition::InList {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    buf.push(if *negated { "TRUE" } else { "FALSE" });
                    return Ok(());
                }
                self.write_column(column, buf)?;
                buf.push(if *negated { " NOT IN (" } else { " IN (" });
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        buf.push(", ");
                    }
                    buf.push_bind(v.clone());
                }
                buf.push(")");
            }
            Condition::InQuery {
                column,
                query,
                negated,
            } => {
                self.write_column(column, buf)?;
                buf.push(if *negated { " NOT IN (" } else { " IN (" });
                self.write_nested(query, buf)?;
                buf.push(")");
            }
            Condition::Exists { query, negated } => {
                buf.push(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                self.write_nested(query, buf)?;
                buf.push(")");
            }
            Condition::Between {
                column,
                from,
                to,
                negated,
            } => {
                self.write_column(column, buf)?;
                buf.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                buf.push_bind(from.clone()).push(" AND ").push_bind(to.clone());
            }
            Condition::Raw(sql) => sql.write_to(buf),
            Condition::True => {
                buf.push("TRUE");
            }
            Condition::False => {
                buf.push("FALSE");
            }
        }
        Ok(())
    }

    fn write_operand(&self, operand: &Operand, buf: &mut SqlBuf) -> PgResult<()> {
        match operand {
            Operand::Column(col) => self.write_column(col, buf)?,
            Operand::Value(v) => {
                buf.push_bind(v.clone());
            }
            Operand::Raw(sql) => sql.write_to(buf),
            Operand::Query(q) => {
                buf.push("(");
                self.write_nested(q, buf)?;
                buf.push(")");
            }
        }
        Ok(())
    }

    // ==================== identifiers ====================

    /// `"table"."physical_name"`, qualified with this statement's table when
    /// the reference does not name one.
    fn write_column(&self, col: &ColumnRef, buf: &mut SqlBuf) -> PgResult<()> {
        if let Some(table) = col.table.as_deref().or(self.qualifier.as_deref()) {
            buf.push(&ident::quote_path(table)?).push(".");
        }
        if col.is_star() {
            buf.push("*");
        } else {
            buf.push_ident(&self.naming.physical(&col.name))?;
        }
        Ok(())
    }

    fn write_physical_list<'s>(&self, columns: impl Iterator<Item = &'s str>, buf: &mut SqlBuf) -> PgResult<()> {
        for (i, col) in columns.enumerate() {
            if i > 0 {
                buf.push(", ");
            }
            buf.push_ident(&self.naming.physical(col))?;
        }
        Ok(())
    }

    fn write_ident_list(&self, names: &[String], buf: &mut SqlBuf) -> PgResult<()> {
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                buf.push(", ");
            }
            buf.push_ident(name)?;
        }
        Ok(())
    }

    /// Subqueries render with their own qualifier, naming and scopes.
    fn write_nested(&self, query: &Query, buf: &mut SqlBuf) -> PgResult<()> {
        StatementWriter::write(query, self.options, buf, false)
    }
}
