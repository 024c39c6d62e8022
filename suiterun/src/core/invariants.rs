//! Declaration invariants checked before a run starts.

use std::collections::HashSet;

use crate::tree::{Child, SuiteId, SuiteTree};

/// Check declaration invariants:
/// - No empty test or module names
/// - No duplicate test names within one suite
/// - No duplicate module names within one parent
///
/// Returns stable messages in traversal order (empty on success).
pub fn validate_invariants(tree: &SuiteTree) -> Vec<String> {
    let mut errors = Vec::new();
    validate_suite(tree, tree.root(), &mut errors);
    errors
}

fn validate_suite(tree: &SuiteTree, suite: SuiteId, errors: &mut Vec<String>) {
    let node = tree.suite(suite);
    let path = display_path(&node.full_name);
    let mut test_names = HashSet::new();
    let mut suite_names = HashSet::new();

    for child in &node.entries {
        match child {
            Child::Test(id) => {
                let name = tree.test(*id).name.as_str();
                if name.trim().is_empty() {
                    errors.push(format!("{}: test name must not be empty", path));
                } else if !test_names.insert(name) {
                    errors.push(format!("{}: duplicate test name '{}'", path, name));
                }
            }
            Child::Suite(id) => {
                let name = tree.suite(*id).name.as_str();
                if name.trim().is_empty() {
                    errors.push(format!("{}: module name must not be empty", path));
                } else if !suite_names.insert(name) {
                    errors.push(format!("{}: duplicate module name '{}'", path, name));
                }
                validate_suite(tree, *id, errors);
            }
        }
    }
}

fn display_path(full_name: &[String]) -> String {
    if full_name.is_empty() {
        "<root>".to_string()
    } else {
        full_name.join(" > ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TestKind;

    #[test]
    fn valid_tree_has_no_errors() {
        let mut tree = SuiteTree::new();
        let a = tree.add_suite(tree.root(), "A");
        let b = tree.add_suite(tree.root(), "B");
        tree.add_test(a, "same", TestKind::Normal, false, None);
        tree.add_test(b, "same", TestKind::Normal, false, None);
        assert!(validate_invariants(&tree).is_empty());
    }

    #[test]
    fn reports_duplicates_and_empty_names() {
        let mut tree = SuiteTree::new();
        let root = tree.root();
        let a = tree.add_suite(root, "A");
        tree.add_suite(root, "A");
        tree.add_test(a, "dup", TestKind::Normal, false, None);
        tree.add_test(a, "dup", TestKind::Skip, false, None);
        tree.add_test(root, " ", TestKind::Normal, false, None);

        let errors = validate_invariants(&tree);
        assert_eq!(
            errors,
            vec![
                "A: duplicate test name 'dup'".to_string(),
                "<root>: duplicate module name 'A'".to_string(),
                "<root>: test name must not be empty".to_string(),
            ]
        );
    }
}
