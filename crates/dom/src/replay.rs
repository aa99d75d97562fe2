use crate::document::Document;
use crate::error::DomError;
use crate::node::{Node, NodeData};
use children_loaded_core::ReadyState;
use scraper::Html;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

struct Step {
    /// Index into `ParseReplay::inserted`; 0 is the document node.
    parent: usize,
    data: NodeData,
}

/// Feeds a parsed page into a [`Document`] one node at a time.
///
/// Nodes arrive in tree order, so a node's next sibling is only inserted once
/// its whole subtree is in place. That is the order an incremental HTML
/// parser produces and the one the load heuristic relies on.
pub struct ParseReplay {
    document: Document,
    steps: VecDeque<Step>,
    inserted: Vec<Node>,
}

impl ParseReplay {
    /// Parses `markup` as a full HTML document. Doctypes and processing
    /// instructions are skipped; elements, text and comments are replayed.
    pub fn new(document: &Document, markup: &str) -> Self {
        let html = Html::parse_document(markup);
        let root = html.tree.root();

        let mut index_of = HashMap::new();
        index_of.insert(root.id(), 0usize);
        let mut steps = VecDeque::new();

        for node in root.descendants().skip(1) {
            let Some(parent) = node.parent().and_then(|p| index_of.get(&p.id()).copied()) else {
                continue;
            };
            let data = match node.value() {
                scraper::Node::Element(element) => NodeData::Element {
                    name: element.name().to_string(),
                    attrs: element
                        .attrs()
                        .map(|(name, value)| (name.to_string(), value.to_string()))
                        .collect(),
                },
                scraper::Node::Text(text) => NodeData::Text(String::from(&**text)),
                scraper::Node::Comment(comment) => NodeData::Comment(String::from(&**comment)),
                _ => continue,
            };
            index_of.insert(node.id(), steps.len() + 1);
            steps.push_back(Step { parent, data });
        }

        debug!(nodes = steps.len(), "prepared parse replay");
        Self {
            document: document.clone(),
            inserted: vec![document.root().clone()],
            steps,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Nodes still waiting to be inserted.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    pub fn is_done(&self) -> bool {
        self.steps.is_empty()
    }

    /// Inserts the next node and returns it, or `None` once everything is in.
    pub fn step(&mut self) -> Result<Option<Node>, DomError> {
        let Some(step) = self.steps.pop_front() else {
            return Ok(None);
        };
        let parent = self.inserted.get(step.parent).cloned().ok_or_else(|| {
            DomError::NotFound(format!("replay parent #{} was never inserted", step.parent))
        })?;
        let node = self.document.create_node(step.data);
        parent.append_child(&node)?;
        self.inserted.push(node.clone());
        Ok(Some(node))
    }

    /// Inserts nodes until one matching `predicate` has been inserted and
    /// returns it. Returns `None` if the replay runs out first.
    pub fn step_until<F>(&mut self, mut predicate: F) -> Result<Option<Node>, DomError>
    where
        F: FnMut(&Node) -> bool,
    {
        while let Some(node) = self.step()? {
            if predicate(&node) {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    /// Inserts up to `count` nodes and returns how many were inserted.
    pub fn advance(&mut self, count: usize) -> Result<usize, DomError> {
        let mut inserted = 0;
        while inserted < count && self.step()?.is_some() {
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Inserts every remaining node without touching the ready state.
    pub fn run_to_end(&mut self) -> Result<(), DomError> {
        while self.step()?.is_some() {}
        Ok(())
    }

    /// Inserts every remaining node and marks the document `interactive`,
    /// as a parser does when it reaches the end of input.
    pub fn finish(mut self) -> Result<Document, DomError> {
        self.run_to_end()?;
        self.document.set_ready_state(ReadyState::Interactive)?;
        Ok(self.document)
    }
}
