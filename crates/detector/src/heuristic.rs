use children_loaded_core::TreeNode;

/// Whether the children of `element` can be assumed parsed.
///
/// True once the owning document is `interactive` or `complete`. While it is
/// still `loading`, true if `element` or any of its ancestors has a next
/// sibling: an incremental parser only appends a sibling after it has
/// finished the previous node's subtree.
///
/// That ordering does not hold for nodes inserted by script, so a `true`
/// here is an inference about parser progress, not a proof.
pub fn is_loaded_sync<N: TreeNode>(element: &N) -> bool {
    if element.ready_state().is_parsed() {
        return true;
    }

    let mut current = Some(element.clone());
    while let Some(node) = current {
        if node.next_sibling().is_some() {
            return true;
        }
        current = node.parent();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use children_loaded_core::ReadyState;
    use children_loaded_dom::{Document, Node};

    fn element(doc: &Document, parent: &Node, name: &str) -> Node {
        let node = doc.create_element(name);
        parent.append_child(&node).unwrap();
        node
    }

    #[test]
    fn parsed_documents_are_always_loaded() {
        for state in [ReadyState::Interactive, ReadyState::Complete] {
            let doc = Document::new();
            let html = element(&doc, doc.root(), "html");
            let orphan = doc.create_element("div");
            doc.set_ready_state(state).unwrap();

            assert!(is_loaded_sync(&html));
            assert!(is_loaded_sync(&orphan));
            assert!(is_loaded_sync(doc.root()));
        }
    }

    #[test]
    fn next_sibling_means_loaded() {
        let doc = Document::new();
        let html = element(&doc, doc.root(), "html");
        let body = element(&doc, &html, "body");
        let first = element(&doc, &body, "p");
        let last = element(&doc, &body, "p");

        assert!(is_loaded_sync(&first));
        assert!(!is_loaded_sync(&last));
    }

    #[test]
    fn sibling_of_an_ancestor_means_loaded() {
        let doc = Document::new();
        let html = element(&doc, doc.root(), "html");
        let b = element(&doc, &html, "div");
        let a = element(&doc, &b, "div");
        assert!(!is_loaded_sync(&a));

        element(&doc, &html, "span");

        assert!(is_loaded_sync(&a));
    }

    #[test]
    fn text_siblings_count() {
        let doc = Document::new();
        let html = element(&doc, doc.root(), "html");
        let div = element(&doc, &html, "div");
        html.append_child(&doc.create_text("\n")).unwrap();

        assert!(is_loaded_sync(&div));
    }

    #[test]
    fn lone_root_is_not_loaded_while_loading() {
        let doc = Document::new();
        let html = element(&doc, doc.root(), "html");

        assert!(!is_loaded_sync(&html));
        assert!(!is_loaded_sync(doc.root()));
    }

    #[test]
    fn alias_matches_primary_name() {
        let doc = Document::new();
        let html = element(&doc, doc.root(), "html");
        let head = element(&doc, &html, "head");
        let body = element(&doc, &html, "body");

        for node in [&html, &head, &body] {
            assert_eq!(crate::sync(node), is_loaded_sync(node));
        }
    }
}
