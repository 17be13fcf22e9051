//! SQL text accumulator with deferred placeholder numbering.
//!
//! Fragments are stored as raw text pieces and parameter markers. Numbering
//! (`$1, $2, ...`) happens once, in [`SqlBuf::finish`], by walking the parts
//! left to right. Nested fragments (subqueries, CTEs, raw SQL) are appended as
//! parts, so the i-th marker in the text is always bound to `params[i - 1]`
//! no matter how deeply the pieces were composed.

use crate::error::PgResult;
use crate::ident;
use crate::value::Value;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SqlPart {
    Raw(String),
    Param,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct SqlBuf {
    parts: Vec<SqlPart>,
    params: Vec<Value>,
}

impl SqlBuf {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }
        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    pub(crate) fn push_bind(&mut self, value: Value) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self.params.push(value);
        self
    }

    /// Append a double-quoted identifier.
    pub(crate) fn push_ident(&mut self, name: &str) -> PgResult<&mut Self> {
        let mut quoted = String::with_capacity(name.len() + 2);
        ident::write_quoted(&mut quoted, name)?;
        Ok(self.push(&quoted))
    }

    /// Append pre-split parts and their values.
    pub(crate) fn push_parts(&mut self, parts: &[SqlPart], values: &[Value]) -> &mut Self {
        for part in parts {
            match part {
                SqlPart::Raw(s) => {
                    self.push(s);
                }
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.params.extend(values.iter().cloned());
        self
    }

    pub(crate) fn push_buf(&mut self, other: SqlBuf) -> &mut Self {
        for part in other.parts {
            match part {
                SqlPart::Raw(s) => {
                    self.push(&s);
                }
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.params.extend(other.params);
        self
    }

    pub(crate) fn param_count(&self) -> usize {
        self.params.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<SqlPart>, Vec<Value>) {
        (self.parts, self.params)
    }

    /// Render with `$1, $2, ...` placeholders in a single left-to-right pass.
    pub(crate) fn finish(self) -> (String, Vec<Value>) {
        let cap = self
            .parts
            .iter()
            .map(|p| match p {
                SqlPart::Raw(s) => s.len(),
                SqlPart::Param => 4,
            })
            .sum();

        let mut out = String::with_capacity(cap);
        let mut idx = 0usize;
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    out.push('$');
                    out.push_str(&idx.to_string());
                }
            }
        }
        debug_assert_eq!(idx, self.params.len());
        (out, self.params)
    }
}
