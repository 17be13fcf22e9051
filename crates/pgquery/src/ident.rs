//! SQL identifier handling.
//!
//! Every identifier the compiler emits is double-quoted, with embedded `"`
//! escaped as `""`. Column references may be dotted (`"user.id"`) to name the
//! owning table explicitly; otherwise the compiler qualifies them with the
//! query's own table or alias.
//!
//! Logical names written in camelCase map to snake_case physical names when
//! the table opts into snake_case naming (see [`Naming`]).

use heck::ToSnakeCase;

use crate::error::{PgError, PgResult};

/// Append `name` to `out` as a double-quoted identifier.
pub(crate) fn write_quoted(out: &mut String, name: &str) -> PgResult<()> {
    if name.is_empty() {
        return Err(PgError::validation("Empty identifier"));
    }
    if name.contains('\0') {
        return Err(PgError::validation(
            "Identifier cannot contain NUL character",
        ));
    }
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    Ok(())
}

/// Quote a single identifier.
pub fn quote(name: &str) -> PgResult<String> {
    let mut out = String::with_capacity(name.len() + 2);
    write_quoted(&mut out, name)?;
    Ok(out)
}

/// Quote a possibly schema-qualified name (`public.users` -> `"public"."users"`).
pub fn quote_path(path: &str) -> PgResult<String> {
    let mut out = String::with_capacity(path.len() + 4);
    for (i, part) in path.split('.').enumerate() {
        if i > 0 {
            out.push('.');
        }
        write_quoted(&mut out, part)?;
    }
    Ok(out)
}

/// Logical-to-physical column naming convention.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Naming {
    /// Column names are used as written.
    #[default]
    Verbatim,
    /// `createdAt` is stored as `created_at`.
    SnakeCase,
}

impl Naming {
    pub fn from_snake_case(snake_case: bool) -> Self {
        if snake_case {
            Naming::SnakeCase
        } else {
            Naming::Verbatim
        }
    }

    /// Physical column name for a logical name.
    pub fn physical(&self, logical: &str) -> String {
        match self {
            Naming::Verbatim => logical.to_string(),
            Naming::SnakeCase => logical.to_snake_case(),
        }
    }
}

/// A column reference as written by the caller: `col`, `table.col`, `*` or `table.*`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn parse(input: &str) -> Self {
        match input.rsplit_once('.') {
            Some((table, name)) if !table.is_empty() => Self {
                table: Some(table.to_string()),
                name: name.to_string(),
            },
            _ => Self {
                table: None,
                name: input.to_string(),
            },
        }
    }

    pub fn is_star(&self) -> bool {
        self.name == "*"
    }
}

impl From<&str> for ColumnRef {
    fn from(value: &str) -> Self {
        ColumnRef::parse(value)
    }
}

impl From<String> for ColumnRef {
    fn from(value: String) -> Self {
        ColumnRef::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_escapes() {
        assert_eq!(quote("user").unwrap(), r#""user""#);
        assert_eq!(quote(r#"we"ird"#).unwrap(), r#""we""ird""#);
        assert_eq!(quote_path("public.users").unwrap(), r#""public"."users""#);
    }

    #[test]
    fn rejects_empty_and_nul() {
        assert!(quote("").is_err());
        assert!(quote("a\0b").is_err());
        assert!(quote_path("public.").is_err());
    }

    #[test]
    fn snake_case_naming() {
        assert_eq!(Naming::SnakeCase.physical("createdAt"), "created_at");
        assert_eq!(Naming::SnakeCase.physical("id"), "id");
        assert_eq!(Naming::Verbatim.physical("createdAt"), "createdAt");
    }

    #[test]
    fn parses_dotted_columns() {
        assert_eq!(
            ColumnRef::parse("post.title"),
            ColumnRef {
                table: Some("post".into()),
                name: "title".into()
            }
        );
        assert_eq!(ColumnRef::parse("title").table, None);
        assert!(ColumnRef::parse("user.*").is_star());
    }
}
