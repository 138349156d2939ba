use std::collections::HashMap;

use common::err::{CResult, ReError};

/// A backend's native placeholder spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    /// SQLite, MySQL: `?`
    QuestionMark,
    /// PostgreSQL: `$1`, `$2`, ...
    DollarNumber,
    /// SQLite's native named form: `:name` / `@name`
    Named,
}

/// Output of rewriting a SQL template against a target `ParamStyle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenSql {
    pub sql: String,
    pub slot_count: usize,
    pub name_to_index: HashMap<String, usize>,
}

/// Rewrites `sql`, which may mix `?`, `$N` and `:name`/`@name` placeholders,
/// into `target`'s native spelling. Quote-aware: placeholders inside
/// `'...'`, `"..."` or `` `...` `` are left untouched. `enhanced` is the
/// per-driver capability flag resolving spec.md §9 Open Question #2 — when
/// false, any non-native placeholder in the template is rejected with
/// `UnsupportedBindingStyle` rather than silently rewritten.
pub fn rewrite(sql: &str, target: ParamStyle, enhanced: bool) -> CResult<RewrittenSql> {
    let mut out = String::with_capacity(sql.len());
    let mut name_to_index = HashMap::new();
    let mut slot_count = 0usize;

    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;
    let mut quote: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            '?' => {
                if !matches!(target, ParamStyle::QuestionMark) && !enhanced {
                    return Err(ReError::UnsupportedBindingStyle(
                        "backend does not support '?' placeholders".into(),
                    ));
                }
                slot_count += 1;
                push_placeholder(&mut out, target, slot_count);
                i += 1;
            }
            '$' if i + 1 < chars.len() && chars[i + 1].is_ascii_digit() => {
                if !matches!(target, ParamStyle::DollarNumber) && !enhanced {
                    return Err(ReError::UnsupportedBindingStyle(
                        "backend does not support '$N' placeholders".into(),
                    ));
                }
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
                slot_count += 1;
                push_placeholder(&mut out, target, slot_count);
                i = j;
            }
            ':' | '@' if i + 1 < chars.len() && is_ident_start(chars[i + 1]) => {
                if !enhanced && !matches!(target, ParamStyle::Named) {
                    return Err(ReError::UnsupportedBindingStyle(
                        "backend does not support named placeholders".into(),
                    ));
                }
                let mut j = i + 1;
                while j < chars.len() && is_ident_char(chars[j]) {
                    j += 1;
                }
                let name: String = chars[i + 1..j].iter().collect();
                // a name seen before reuses its slot instead of allocating a
                // new one, so `:fn` repeated twice binds to a single value.
                let slot_number = match name_to_index.get(&name) {
                    Some(existing) => existing + 1,
                    None => {
                        slot_count += 1;
                        name_to_index.insert(name, slot_count - 1);
                        slot_count
                    }
                };
                push_placeholder(&mut out, target, slot_number);
                i = j;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(RewrittenSql { sql: out, slot_count, name_to_index })
}

fn push_placeholder(out: &mut String, target: ParamStyle, slot_number: usize) {
    match target {
        ParamStyle::QuestionMark => out.push('?'),
        ParamStyle::DollarNumber => out.push_str(&format!("${slot_number}")),
        ParamStyle::Named => out.push_str(&format!(":p{slot_number}")),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn question_marks_rewrite_to_dollar_numbers() {
        let r = rewrite("SELECT * FROM t WHERE a = ? AND b = ?", ParamStyle::DollarNumber, true).unwrap();
        assert_eq!(r.sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
        assert_eq!(r.slot_count, 2);
    }

    #[test]
    fn named_params_populate_name_to_index() {
        let r = rewrite("WHERE a = :id AND b = :name", ParamStyle::QuestionMark, true).unwrap();
        assert_eq!(r.sql, "WHERE a = ? AND b = ?");
        assert_eq!(r.name_to_index.get("id"), Some(&0));
        assert_eq!(r.name_to_index.get("name"), Some(&1));
    }

    #[test]
    fn placeholders_inside_quotes_are_untouched() {
        let r = rewrite("SELECT '?' FROM t WHERE a = ?", ParamStyle::DollarNumber, true).unwrap();
        assert_eq!(r.sql, "SELECT '?' FROM t WHERE a = $1");
        assert_eq!(r.slot_count, 1);
    }

    #[test]
    fn non_native_style_rejected_without_enhanced_mapping() {
        let err = rewrite("WHERE a = :id", ParamStyle::DollarNumber, false).unwrap_err();
        assert!(matches!(err, ReError::UnsupportedBindingStyle(_)));
    }

    #[test]
    fn repeated_named_placeholder_reuses_a_single_slot() {
        let r = rewrite(
            "SELECT * FROM users WHERE first_name = :fn OR last_name = :fn",
            ParamStyle::DollarNumber,
            true,
        )
        .unwrap();
        assert_eq!(r.sql, "SELECT * FROM users WHERE first_name = $1 OR last_name = $1");
        assert_eq!(r.slot_count, 1);
        assert_eq!(r.name_to_index.get("fn"), Some(&0));
    }

    #[test]
    fn mixed_styles_rewrite_to_a_single_target_consistently() {
        let r = rewrite("a = ? AND b = $2 AND c = :name", ParamStyle::QuestionMark, true).unwrap();
        assert_eq!(r.sql, "a = ? AND b = ? AND c = ?");
        assert_eq!(r.slot_count, 3);
    }
}
