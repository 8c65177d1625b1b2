//! Filter predicates with positional placeholders.
//!
//! # Invariants
//! - The number of anonymous `?` placeholders outside quoted literals and
//!   identifiers equals the number of bound arguments.
//! - Numbered (`?1`) and named (`:x`, `@x`, `$x`) parameters are rejected;
//!   arguments bind strictly by position.
//! - A blank clause is stored as "no clause" and carries no arguments.

use crate::model::value::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Problem detected while building a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateError {
    Arity { placeholders: usize, arguments: usize },
    /// A numbered or named parameter such as `?2` or `:name`.
    UnsupportedPlaceholder(String),
}

impl Display for PredicateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arity {
                placeholders,
                arguments,
            } => write!(
                f,
                "predicate has {placeholders} placeholders but {arguments} arguments"
            ),
            Self::UnsupportedPlaceholder(token) => write!(
                f,
                "placeholder `{token}` is not supported; use anonymous `?` placeholders"
            ),
        }
    }
}

impl Error for PredicateError {}

/// Optional boolean filter plus its ordered bound arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clause: Option<String>,
    args: Vec<Value>,
}

impl Predicate {
    /// Predicate that matches every row.
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a predicate, checking placeholder and argument counts.
    pub fn new(
        clause: impl Into<String>,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<Self, PredicateError> {
        let clause = clause.into();
        let args: Vec<Value> = args.into_iter().collect();
        let trimmed = clause.trim();
        let placeholders = count_placeholders(trimmed)?;

        if placeholders != args.len() {
            return Err(PredicateError::Arity {
                placeholders,
                arguments: args.len(),
            });
        }

        Ok(Self {
            clause: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            args,
        })
    }

    /// Builds a predicate without arguments.
    pub fn raw(clause: impl Into<String>) -> Result<Self, PredicateError> {
        Self::new(clause, Vec::new())
    }

    pub fn clause(&self) -> Option<&str> {
        self.clause.as_deref()
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.clause.is_none()
    }

    /// Restricts this predicate to the row whose `id_column` equals `id`.
    ///
    /// The id clause and argument come first; the caller clause is wrapped in
    /// parentheses so its own `OR`s cannot escape the id restriction.
    pub fn scoped_to_item(&self, id_column: &str, id: i64) -> Self {
        let clause = match self.clause.as_deref() {
            Some(clause) => format!("{id_column} = ? AND ({clause})"),
            None => format!("{id_column} = ?"),
        };
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(Value::Integer(id));
        args.extend(self.args.iter().cloned());

        Self {
            clause: Some(clause),
            args,
        }
    }

    /// `WHERE ...` suffix for a statement, or an empty string.
    pub(crate) fn where_sql(&self) -> String {
        self.clause
            .as_deref()
            .map(|clause| format!(" WHERE {clause}"))
            .unwrap_or_default()
    }
}

fn count_placeholders(clause: &str) -> Result<usize, PredicateError> {
    let mut chars = clause.char_indices().peekable();
    let mut quote: Option<char> = None;
    let mut count = 0;
    while let Some((start, ch)) = chars.next() {
        if let Some(open) = quote {
            // A doubled quote closes and reopens, which nets out.
            if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '?' | ':' | '@' | '$' => {
                let takes_name = |next: char| {
                    if ch == '?' {
                        next.is_ascii_digit()
                    } else {
                        next.is_ascii_alphanumeric() || next == '_'
                    }
                };
                match chars.peek().map(|&(_, next)| next) {
                    Some(next) if takes_name(next) => {
                        let mut end = start + ch.len_utf8();
                        while let Some(&(index, next)) = chars.peek() {
                            if !(next.is_ascii_alphanumeric() || next == '_') {
                                break;
                            }
                            end = index + next.len_utf8();
                            chars.next();
                        }
                        return Err(PredicateError::UnsupportedPlaceholder(
                            clause[start..end].to_string(),
                        ));
                    }
                    _ if ch == '?' => count += 1,
                    _ => {}
                }
            }
            _ => {}
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::{Predicate, PredicateError};
    use crate::model::value::Value;

    #[test]
    fn arity_mismatch_is_rejected() {
        let err = Predicate::new("name = ? AND team = ?", vec![Value::from("Ruth")]).unwrap_err();
        assert_eq!(
            err,
            PredicateError::Arity {
                placeholders: 2,
                arguments: 1,
            }
        );
        assert!(Predicate::new("", vec![Value::from(1)]).is_err());
    }

    #[test]
    fn question_marks_inside_literals_are_not_placeholders() {
        let predicate = Predicate::new("name = '?' OR name = 'It''s ?' OR id = ?", vec![Value::from(3)]);
        assert!(predicate.is_ok());
    }

    #[test]
    fn numbered_and_named_parameters_are_rejected() {
        for (clause, token) in [
            ("id = ?1", "?1"),
            ("id = ?12 AND name = ?", "?12"),
            ("name = :name", ":name"),
            ("name = @who", "@who"),
            ("name = $player_1", "$player_1"),
        ] {
            let err = Predicate::new(clause, vec![Value::from(1)]).unwrap_err();
            assert_eq!(err, PredicateError::UnsupportedPlaceholder(token.to_string()));
        }
    }

    #[test]
    fn parameter_markers_inside_quotes_are_text() {
        let predicate = Predicate::new(
            "note = 'at 10:30 ?1' AND \"odd:col\" = ? AND price = '$5'",
            vec![Value::from(1)],
        );
        assert!(predicate.is_ok());
        assert!(Predicate::raw("name LIKE '%?%'").is_ok());
    }

    #[test]
    fn blank_clause_means_no_filter() {
        let predicate = Predicate::raw("   ").unwrap();
        assert!(predicate.is_empty());
        assert_eq!(predicate.where_sql(), "");
    }

    #[test]
    fn item_scope_prefixes_id_clause_and_argument() {
        let predicate = Predicate::new("name = ?", vec![Value::from("Ruth")]).unwrap();
        let scoped = predicate.scoped_to_item("id", 5);
        assert_eq!(scoped.clause(), Some("id = ? AND (name = ?)"));
        assert_eq!(scoped.args(), &[Value::Integer(5), Value::from("Ruth")]);
    }

    #[test]
    fn item_scope_without_caller_clause_has_no_empty_group() {
        let scoped = Predicate::none().scoped_to_item("_id", 2);
        assert_eq!(scoped.clause(), Some("_id = ?"));
        assert_eq!(scoped.args(), &[Value::Integer(2)]);
    }
}
