use regex::RegexBuilder;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("invalid filter pattern '{0}': {1}")]
    BadPattern(String, #[source] regex::Error),
}

/// A test-output transform (spec §4.6). `Filter` is the only variant the
/// original format defines.
#[derive(Debug, Clone)]
pub enum Transform {
    Filter { pattern: String },
}

impl Transform {
    /// Applies the transform to one operand. Dot matches newline, and the
    /// result is all non-overlapping matches joined with `\n`.
    pub fn apply(&self, input: &str) -> Result<String, TransformError> {
        match self {
            Transform::Filter { pattern } => {
                let re = RegexBuilder::new(pattern)
                    .dot_matches_new_line(true)
                    .build()
                    .map_err(|e| TransformError::BadPattern(pattern.clone(), e))?;
                Ok(re
                    .find_iter(input)
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }
    }
}

/// Applies a declaration-ordered chain of transforms to one operand.
pub fn apply_all(transforms: &[Transform], input: &str) -> Result<String, TransformError> {
    let mut current = input.to_string();
    for transform in transforms {
        current = transform.apply(&current)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_joins_non_overlapping_matches_with_newline() {
        let t = Transform::Filter {
            pattern: r"err: .*".to_string(),
        };
        let input = "ok\nerr: one\nok\nerr: two\n";
        assert_eq!(t.apply(input).unwrap(), "err: one\nerr: two");
    }

    #[test]
    fn filter_dot_matches_newline() {
        let t = Transform::Filter {
            pattern: r"BEGIN.*END".to_string(),
        };
        let input = "BEGIN\nmiddle\nEND";
        assert_eq!(t.apply(input).unwrap(), "BEGIN\nmiddle\nEND");
    }

    #[test]
    fn chain_applies_in_declaration_order() {
        let transforms = vec![
            Transform::Filter {
                pattern: r"\d+".to_string(),
            },
            Transform::Filter {
                pattern: r"[02468]".to_string(),
            },
        ];
        // First pass keeps digit runs "12" and "34"; second pass keeps lone
        // even digits out of those runs.
        let result = apply_all(&transforms, "a12b34c").unwrap();
        assert_eq!(result, "2\n4");
    }
}
