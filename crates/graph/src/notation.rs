//! Compact textual dependency lists.
//!
//! Process sheets list a step's predecessors as `CFA1:finish,CTA1:start`.
//! A code without a suffix is a `finish` dependency.

use shopfloor_core::{DependencyType, Error, Result};

/// A dependency on a step identified by its shop code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedDependency {
    /// Predecessor's step code
    pub code: String,
    /// Edge semantics
    pub dep_type: DependencyType,
}

/// Parse `"CFA1:finish, CTA1:start, PREP2"`. Blank input is an empty list.
pub fn parse_dependency_list(text: &str) -> Result<Vec<CodedDependency>> {
    let mut deps = Vec::new();
    for raw in text.split(',') {
        let item = raw.trim();
        if item.is_empty() {
            continue;
        }
        let (code, dep_type) = match item.split_once(':') {
            Some((code, kind)) => (code.trim(), kind.parse::<DependencyType>()?),
            None => (item, DependencyType::Finish),
        };
        if code.is_empty() {
            return Err(Error::validation(format!("missing step code in '{}'", item)));
        }
        deps.push(CodedDependency { code: code.to_string(), dep_type });
    }
    Ok(deps)
}

/// Render a list back into `CODE:type` notation.
pub fn format_dependency_list(deps: &[CodedDependency]) -> String {
    deps.iter()
        .map(|d| format!("{}:{}", d.code, d.dep_type))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_list() {
        let deps = parse_dependency_list("CFA1:finish, CTA1:START,PREP2").unwrap();
        assert_eq!(
            deps,
            vec![
                CodedDependency { code: "CFA1".into(), dep_type: DependencyType::Finish },
                CodedDependency { code: "CTA1".into(), dep_type: DependencyType::Start },
                CodedDependency { code: "PREP2".into(), dep_type: DependencyType::Finish },
            ]
        );
    }

    #[test]
    fn test_blank_is_empty() {
        assert!(parse_dependency_list("  ").unwrap().is_empty());
        assert!(parse_dependency_list("").unwrap().is_empty());
    }

    #[test]
    fn test_bad_items_rejected() {
        assert!(matches!(parse_dependency_list(":finish"), Err(Error::Validation(_))));
        assert!(matches!(parse_dependency_list("CFA1:after"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_format_uses_explicit_types() {
        let deps = parse_dependency_list("CFA1,CTA1:start").unwrap();
        assert_eq!(format_dependency_list(&deps), "CFA1:finish,CTA1:start");
    }
}
