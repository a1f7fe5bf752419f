//! Access to the document being localized.
//!
//! The localizer only needs three things from a document: an ordered walk
//! over text leaves that skips non-prose subtrees, in-place text
//! replacement, and batched notifications when subtrees are inserted.
//! [`DocumentTree`] captures exactly that; [`Document`] is an in-memory
//! implementation.

use std::fmt;
use std::hash::Hash;

use tokio::sync::mpsc;

use crate::config::LocalizerConfig;
use crate::prelude::*;

/// Handle for cancelling a change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "sub-{_0}")]
pub struct SubscriptionId(u64);

/// Subtrees inserted since the previous batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch<N> {
    pub added: Vec<N>,
}

/// Receiving end of a change subscription.
#[derive(Debug)]
pub struct ChangeSubscription<N> {
    pub id: SubscriptionId,
    pub receiver: mpsc::UnboundedReceiver<ChangeBatch<N>>,
}

/// What a node is, as far as scanning cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind<'a> {
    Element { tag: &'a str },
    Text,
}

/// A tree of elements and text leaves.
pub trait DocumentTree {
    type NodeId: Copy + Eq + Hash + fmt::Debug;

    /// `None` for ids the tree does not know.
    fn kind(&self, node: Self::NodeId) -> Option<NodeKind<'_>>;

    /// Children in document order. Empty for text leaves.
    fn children(&self, node: Self::NodeId) -> &[Self::NodeId];

    /// `None` for the document root and detached nodes.
    fn parent(&self, node: Self::NodeId) -> Option<Self::NodeId>;

    /// Text of a leaf; `None` for elements.
    fn text(&self, node: Self::NodeId) -> Option<&str>;

    /// Replaces the text of a leaf without touching structure.
    /// Returns false when `node` is not a text leaf.
    fn set_text(&mut self, node: Self::NodeId, text: String) -> bool;

    /// Starts delivering a [`ChangeBatch`] whenever subtrees are inserted
    /// under `root`.
    fn subscribe(&mut self, root: Self::NodeId) -> ChangeSubscription<Self::NodeId>;

    fn unsubscribe(&mut self, id: SubscriptionId);
}

/// Whether `node` sits inside a non-prose element, looking at its
/// ancestors up to and including `root`.
pub fn inside_non_prose<D: DocumentTree>(
    doc: &D,
    node: D::NodeId,
    root: D::NodeId,
    config: &LocalizerConfig,
) -> bool {
    if node == root {
        return false;
    }
    let mut current = doc.parent(node);
    while let Some(id) = current {
        if matches!(doc.kind(id), Some(NodeKind::Element { tag }) if config.is_non_prose(tag)) {
            return true;
        }
        if id == root {
            break;
        }
        current = doc.parent(id);
    }
    false
}

/// Resumable depth-first walk over the text leaves under a root.
///
/// The cursor holds only its own stack, so the tree can be mutated between
/// steps. [`restart`](Self::restart) rewinds it to the root. It does not
/// look above the root; see [`inside_non_prose`].
#[derive(Debug, Clone)]
pub struct TextLeafCursor<'a, N> {
    root: N,
    stack: Vec<N>,
    config: &'a LocalizerConfig,
}

impl<'a, N: Copy> TextLeafCursor<'a, N> {
    /// Non-prose elements (per [`LocalizerConfig::is_non_prose`]) are
    /// skipped together with their subtree.
    pub fn new(root: N, config: &'a LocalizerConfig) -> Self {
        Self {
            root,
            stack: vec![root],
            config,
        }
    }

    pub fn restart(&mut self) {
        self.stack.clear();
        self.stack.push(self.root);
    }

    /// Next text leaf in document order, or `None` when the walk is done.
    pub fn next_leaf<D>(&mut self, doc: &D) -> Option<N>
    where
        D: DocumentTree<NodeId = N>,
    {
        while let Some(node) = self.stack.pop() {
            match doc.kind(node) {
                Some(NodeKind::Text) => return Some(node),
                Some(NodeKind::Element { tag }) => {
                    if self.config.is_non_prose(tag) {
                        continue;
                    }
                    self.stack.extend(doc.children(node).iter().rev().copied());
                }
                None => {}
            }
        }
        None
    }
}

/// Iterator form of [`TextLeafCursor`] for read-only walks.
pub struct TextLeaves<'a, D: DocumentTree> {
    doc: &'a D,
    cursor: TextLeafCursor<'a, D::NodeId>,
}

impl<'a, D: DocumentTree> TextLeaves<'a, D> {
    pub fn new(doc: &'a D, root: D::NodeId, config: &'a LocalizerConfig) -> Self {
        Self {
            doc,
            cursor: TextLeafCursor::new(root, config),
        }
    }
}

impl<D: DocumentTree> Iterator for TextLeaves<'_, D> {
    type Item = D::NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_leaf(self.doc)
    }
}

/// Node handle in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "#{_0}")]
pub struct NodeId(usize);

/// Error type for structural edits of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("node {0} already has a parent")]
    AlreadyAttached(NodeId),

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("inserting {0} there would make it its own ancestor")]
    Cycle(NodeId),
}

#[derive(Debug)]
enum NodeData {
    Element { tag: String, children: Vec<NodeId> },
    Text(String),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    data: NodeData,
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    root: NodeId,
    sender: mpsc::UnboundedSender<ChangeBatch<NodeId>>,
}

/// Arena-backed document. The root is a `body` element.
///
/// Every structural insertion is reported to subscribers whose root is an
/// ancestor of (or equal to) the insertion point. Inside
/// [`batch`](Self::batch) insertions are collected and delivered together.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
    batch: Option<Vec<NodeId>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                data: NodeData::Element {
                    tag: "body".to_string(),
                    children: Vec::new(),
                },
            }],
            root: NodeId(0),
            subscribers: Vec::new(),
            next_subscription: 0,
            batch: None,
        }
    }

    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.into(),
            children: Vec::new(),
        })
    }

    /// Creates a detached text leaf.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    /// Attaches a detached node as the last child of `parent`.
    ///
    /// # Errors
    /// `DocumentError` if either id is unknown, `parent` is a text leaf,
    /// `child` is already attached, or the insertion would form a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Attaches a detached node at `index` among `parent`'s children
    /// (clamped to the end).
    ///
    /// # Errors
    /// Same conditions as [`append_child`](Self::append_child).
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), DocumentError> {
        if self.node(child)?.parent.is_some() || child == self.root {
            return Err(DocumentError::AlreadyAttached(child));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(DocumentError::Cycle(child));
        }
        match &mut self.node_mut(parent)?.data {
            NodeData::Element { children, .. } => {
                let index = index.min(children.len());
                children.insert(index, child);
            }
            NodeData::Text(_) => return Err(DocumentError::NotAnElement(parent)),
        }
        self.nodes[child.0].parent = Some(parent);
        self.notify_added(child);
        Ok(())
    }

    /// Detaches `child` from `parent`. The node and its subtree stay in the
    /// arena and can be re-attached.
    ///
    /// # Errors
    /// `DocumentError::NotAChild` if `child` is not directly under `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        let NodeData::Element { children, .. } = &mut self.node_mut(parent)?.data else {
            return Err(DocumentError::NotAnElement(parent));
        };
        let position = children
            .iter()
            .position(|c| *c == child)
            .ok_or(DocumentError::NotAChild { parent, child })?;
        children.remove(position);
        self.nodes[child.0].parent = None;
        Ok(())
    }

    /// Creates an element and appends it to `parent`.
    ///
    /// # Errors
    /// See [`append_child`](Self::append_child).
    pub fn append_element(
        &mut self,
        parent: NodeId,
        tag: impl Into<String>,
    ) -> Result<NodeId, DocumentError> {
        let node = self.create_element(tag);
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Creates a text leaf and appends it to `parent`.
    ///
    /// # Errors
    /// See [`append_child`](Self::append_child).
    pub fn append_text(
        &mut self,
        parent: NodeId,
        text: impl Into<String>,
    ) -> Result<NodeId, DocumentError> {
        let node = self.create_text(text);
        self.append_child(parent, node)?;
        Ok(node)
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    /// Concatenated text of every leaf under `node`, non-prose included.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match self.nodes.get(current.0).map(|n| &n.data) {
                Some(NodeData::Text(text)) => out.push_str(text),
                Some(NodeData::Element { children, .. }) => {
                    stack.extend(children.iter().rev().copied());
                }
                None => {}
            }
        }
        out
    }

    /// Runs `f` with insert notifications held back, then delivers them as
    /// one batch per subscriber.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        if self.batch.is_some() {
            return f(self);
        }
        self.batch = Some(Vec::new());
        let result = f(self);
        if let Some(added) = self.batch.take() {
            self.deliver(&added);
        }
        result
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { parent: None, data });
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node, DocumentError> {
        self.nodes.get(id.0).ok_or(DocumentError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DocumentError> {
        self.nodes.get_mut(id.0).ok_or(DocumentError::UnknownNode(id))
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn notify_added(&mut self, node: NodeId) {
        match &mut self.batch {
            Some(pending) => pending.push(node),
            None => self.deliver(&[node]),
        }
    }

    fn deliver(&mut self, added: &[NodeId]) {
        if added.is_empty() {
            return;
        }
        let mut subscribers = std::mem::take(&mut self.subscribers);
        subscribers.retain(|subscriber| {
            let relevant: Vec<NodeId> = added
                .iter()
                .copied()
                .filter(|node| self.is_ancestor_or_self(subscriber.root, *node))
                .collect();
            if relevant.is_empty() {
                return true;
            }
            // a closed receiver means the subscriber went away
            subscriber
                .sender
                .send(ChangeBatch { added: relevant })
                .is_ok()
        });
        subscribers.append(&mut self.subscribers);
        self.subscribers = subscribers;
    }
}

impl DocumentTree for Document {
    type NodeId = NodeId;

    fn kind(&self, node: NodeId) -> Option<NodeKind<'_>> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { tag, .. } => Some(NodeKind::Element { tag }),
            NodeData::Text(_) => Some(NodeKind::Text),
        }
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        match self.nodes.get(node.0).map(|n| &n.data) {
            Some(NodeData::Element { children, .. }) => children,
            _ => &[],
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    fn set_text(&mut self, node: NodeId, text: String) -> bool {
        match self.nodes.get_mut(node.0).map(|n| &mut n.data) {
            Some(NodeData::Text(current)) => {
                *current = text;
                true
            }
            _ => false,
        }
    }

    fn subscribe(&mut self, root: NodeId) -> ChangeSubscription<NodeId> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber { id, root, sender });
        ChangeSubscription { id, receiver }
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|s| s.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_texts(doc: &Document, root: NodeId, config: &LocalizerConfig) -> Vec<String> {
        TextLeaves::new(doc, root, config)
            .filter_map(|leaf| doc.text(leaf).map(str::to_owned))
            .collect()
    }

    #[test]
    fn test_leaves_in_document_order_skipping_non_prose() {
        let mut doc = Document::new();
        let root = doc.root();
        let header = doc.append_element(root, "header").unwrap();
        doc.append_text(header, "one").unwrap();
        let script = doc.append_element(root, "SCRIPT").unwrap();
        doc.append_text(script, "var d = '2024-03-20';").unwrap();
        let p = doc.append_element(root, "p").unwrap();
        doc.append_text(p, "two").unwrap();
        let em = doc.append_element(p, "em").unwrap();
        doc.append_text(em, "three").unwrap();
        let style = doc.append_element(em, "style").unwrap();
        doc.append_text(style, "hidden").unwrap();
        doc.append_text(root, "four").unwrap();

        let config = LocalizerConfig::default();
        assert_eq!(leaf_texts(&doc, root, &config), ["one", "two", "three", "four"]);
        assert_eq!(leaf_texts(&doc, p, &config), ["two", "three"]);
        assert!(leaf_texts(&doc, script, &config).is_empty());
    }

    #[test]
    fn test_cursor_is_restartable_and_tolerates_edits() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.append_text(root, "a").unwrap();
        let b = doc.append_text(root, "b").unwrap();

        let config = LocalizerConfig::default();
        let mut cursor = TextLeafCursor::new(root, &config);
        assert_eq!(cursor.next_leaf(&doc), Some(a));
        assert!(doc.set_text(a, "A".to_string()));
        assert_eq!(cursor.next_leaf(&doc), Some(b));
        assert_eq!(cursor.next_leaf(&doc), None);

        cursor.restart();
        assert_eq!(cursor.next_leaf(&doc), Some(a));
        assert_eq!(doc.text(a), Some("A"));
    }

    #[test]
    fn test_text_root_yields_itself() {
        let mut doc = Document::new();
        let leaf = doc.append_text(doc.root(), "solo").unwrap();
        let config = LocalizerConfig::default();
        assert_eq!(TextLeaves::new(&doc, leaf, &config).collect::<Vec<_>>(), [leaf]);
    }

    #[test]
    fn test_inside_non_prose_checks_ancestors() {
        let mut doc = Document::new();
        let root = doc.root();
        let template = doc.append_element(root, "TEMPLATE").unwrap();
        let inner = doc.append_element(template, "p").unwrap();
        let hidden = doc.append_text(inner, "2024-03-20").unwrap();
        let p = doc.append_element(root, "p").unwrap();
        let shown = doc.append_text(p, "2024-03-20").unwrap();

        let config = LocalizerConfig::default();
        assert!(inside_non_prose(&doc, hidden, root, &config));
        assert!(inside_non_prose(&doc, inner, root, &config));
        assert!(!inside_non_prose(&doc, template, root, &config));
        assert!(!inside_non_prose(&doc, shown, root, &config));
        assert!(!inside_non_prose(&doc, root, root, &config));
        // ancestors above the walk root are not consulted
        assert!(!inside_non_prose(&doc, hidden, inner, &config));
        assert_eq!(leaf_texts(&doc, inner, &config), ["2024-03-20"]);
    }

    #[test]
    fn test_structural_errors() {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.append_element(root, "div").unwrap();
        let text = doc.append_text(div, "x").unwrap();

        assert_eq!(
            doc.append_child(root, div),
            Err(DocumentError::AlreadyAttached(div))
        );
        let orphan = doc.create_text("y");
        assert_eq!(
            doc.append_child(text, orphan),
            Err(DocumentError::NotAnElement(text))
        );
        doc.remove_child(root, div).unwrap();
        assert_eq!(doc.append_child(text, div), Err(DocumentError::Cycle(div)));
        assert_eq!(
            doc.remove_child(root, div),
            Err(DocumentError::NotAChild {
                parent: root,
                child: div
            })
        );
        assert!(!doc.set_text(root, "nope".to_string()));
    }

    #[test]
    fn test_subscribers_receive_relevant_inserts() {
        let mut doc = Document::new();
        let root = doc.root();
        let left = doc.append_element(root, "div").unwrap();
        let right = doc.append_element(root, "div").unwrap();

        let mut all = doc.subscribe(root);
        let mut only_right = doc.subscribe(right);

        let leaf = doc.append_text(left, "left").unwrap();
        assert_eq!(
            all.receiver.try_recv().unwrap(),
            ChangeBatch { added: vec![leaf] }
        );
        assert!(only_right.receiver.try_recv().is_err());

        let (a, b) = doc.batch(|doc| {
            let a = doc.append_text(right, "a").unwrap();
            let b = doc.append_text(right, "b").unwrap();
            (a, b)
        });
        assert_eq!(
            all.receiver.try_recv().unwrap(),
            ChangeBatch { added: vec![a, b] }
        );
        assert_eq!(
            only_right.receiver.try_recv().unwrap(),
            ChangeBatch { added: vec![a, b] }
        );

        doc.unsubscribe(all.id);
        doc.append_text(right, "c").unwrap();
        assert!(all.receiver.try_recv().is_err());
        assert!(only_right.receiver.try_recv().is_ok());
    }

    #[test]
    fn test_text_edits_do_not_notify() {
        let mut doc = Document::new();
        let root = doc.root();
        let leaf = doc.append_text(root, "x").unwrap();
        let mut sub = doc.subscribe(root);
        doc.set_text(leaf, "y".to_string());
        assert!(sub.receiver.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let mut doc = Document::new();
        let root = doc.root();
        let sub = doc.subscribe(root);
        assert_eq!(doc.subscriber_count(), 1);
        drop(sub);
        doc.append_text(root, "x").unwrap();
        assert_eq!(doc.subscriber_count(), 0);
    }

    #[test]
    fn test_text_content() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.append_element(root, "p").unwrap();
        doc.append_text(p, "Created: ").unwrap();
        doc.append_text(p, "2024-03-20").unwrap();
        assert_eq!(doc.text_content(root), "Created: 2024-03-20");
        assert_eq!(doc.tag(p), Some("p"));
        assert_eq!(doc.parent(p), Some(root));
    }
}
