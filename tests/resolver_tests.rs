mod common;

use common::{project_tree, write_module, DOUBLER_HANDLER};
use offstage::{HandlerResolver, HandlerSource, MatchPolicy, OffstageError, SourceCatalog};
use pretty_assertions::assert_eq;

fn resolver(root: &std::path::Path, policy: MatchPolicy) -> HandlerResolver {
    HandlerResolver::new(SourceCatalog::new(root, "mjs"), policy)
}

#[test]
fn test_unique_handler_resolves_to_its_module() {
    let tree = project_tree();
    let resolver = resolver(tree.path(), MatchPolicy::Strict);

    let path = resolver
        .resolve(&HandlerSource::new(DOUBLER_HANDLER))
        .unwrap();
    assert_eq!(path, tree.path().join("app").join("math.mjs"));
}

#[test]
fn test_zero_matches_is_handler_not_found() {
    let tree = project_tree();
    let resolver = resolver(tree.path(), MatchPolicy::Strict);

    let result = resolver.resolve(&HandlerSource::new("(x) => x + 999"));
    match result {
        Err(OffstageError::HandlerNotFound { searched }) => {
            assert_eq!(searched, tree.path());
        }
        other => panic!("expected HandlerNotFound, got {:?}", other),
    }
}

#[test]
fn test_duplicate_text_is_ambiguous_under_strict_policy() {
    let tree = project_tree();
    // same handler text shows up in a second module (for instance in a comment)
    write_module(
        tree.path(),
        "copycat.mjs",
        &format!("// reference implementation: {}\n", DOUBLER_HANDLER),
    );

    let resolver = resolver(tree.path(), MatchPolicy::Strict);
    match resolver.resolve(&HandlerSource::new(DOUBLER_HANDLER)) {
        Err(OffstageError::AmbiguousHandler { candidates }) => {
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected AmbiguousHandler, got {:?}", other),
    }
}

#[test]
fn test_first_match_policy_takes_traversal_order() {
    let tree = project_tree();
    write_module(
        tree.path(),
        "copycat.mjs",
        &format!("// reference implementation: {}\n", DOUBLER_HANDLER),
    );

    // subdirectories are scanned before files at each level, so the nested
    // module wins over the root-level copycat
    let resolver = resolver(tree.path(), MatchPolicy::FirstMatch);
    let path = resolver
        .resolve(&HandlerSource::new(DOUBLER_HANDLER))
        .unwrap();
    assert_eq!(path, tree.path().join("app").join("math.mjs"));
}
