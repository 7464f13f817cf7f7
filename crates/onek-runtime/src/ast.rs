use std::fmt::{self, Write};

use cranelift_entity::entity_impl;

use crate::{
    arena::Arena,
    grammar::Grammar,
    parser::ParserId,
    span::Span,
    Flags, TokenKind,
};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct AstId(u32);
entity_impl! { AstId }

/// A matched token or entered production.
///
/// Children are only ever attached to action roots, every other node is reachable just through
/// its `parent` link. This keeps the tree that actions see free of the intermediate productions
/// the grammar needed to express sequencing and repetition.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AstNode<'a> {
    pub token: TokenKind,
    pub text: Span,
    pub name: &'a str,
    pub flags: Flags,
    /// Parser node that produced this node, its action is the one used during evaluation.
    pub rule: Option<ParserId>,
    pub parent: Option<AstId>,
    pub first_child: Option<AstId>,
    pub last_child: Option<AstId>,
    pub next_sibling: Option<AstId>,
    /// Set on the action root that directly encloses a bracketed group.
    pub bracketed: bool,
    pub debug_id: u32,
    // bookkeeping for rollback
    attached_to: Option<AstId>,
    prev_sibling: Option<AstId>,
    marked_bracket: Option<AstId>,
}

impl<'a> AstNode<'a> {
    fn new(
        rule: Option<ParserId>,
        token: TokenKind,
        name: &'a str,
        parent: Option<AstId>,
        text: Span,
        flags: Flags,
        debug_id: u32,
    ) -> AstNode<'a> {
        AstNode {
            token,
            text,
            name,
            flags,
            rule,
            parent,
            first_child: None,
            last_child: None,
            next_sibling: None,
            bracketed: false,
            debug_id,
            attached_to: None,
            prev_sibling: None,
            marked_bracket: None,
        }
    }

    pub fn is_action_root(&self) -> bool {
        self.flags.contains(Flags::ACTION_ROOT)
    }
}

/// Saved length of an [`AstStore`], see [`AstStore::checkpoint`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AstCheckpoint {
    len: usize,
}

/// Every node created during one parse, in creation order.
pub struct AstStore<'a, V> {
    grammar: &'a Grammar<V>,
    src: &'a str,
    nodes: Arena<AstId, AstNode<'a>>,
    next_debug_id: u32,
}

impl<'a, V> AstStore<'a, V> {
    pub fn new(grammar: &'a Grammar<V>, src: &'a str) -> AstStore<'a, V> {
        AstStore {
            grammar,
            src,
            nodes: Arena::new(),
            next_debug_id: 0,
        }
    }

    pub fn src(&self) -> &'a str {
        self.src
    }
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    pub fn get(&self, id: AstId) -> Option<&AstNode<'a>> {
        self.nodes.get(id)
    }
    pub fn iter(&self) -> impl Iterator<Item = (AstId, &AstNode<'a>)> + '_ {
        self.nodes.iter_kv()
    }

    /// Appends a node and links it into the flattened tree.
    ///
    /// * An opening bracket marks the nearest enclosing action root as bracketed.
    /// * Brackets are never attached anywhere.
    /// * A production which is not an action root is not attached, unless it has no parent at
    ///   all in which case it becomes the `start` action root of the whole tree.
    /// * Everything else is appended to the children of the nearest enclosing action root.
    pub fn add_node(
        &mut self,
        rule: Option<ParserId>,
        token: TokenKind,
        name: &'a str,
        parent: Option<AstId>,
        text: Span,
        flags: Flags,
    ) -> AstId {
        let mut node = AstNode::new(rule, token, name, parent, text, flags, self.next_debug_id);
        self.next_debug_id += 1;

        if token == TokenKind::Open {
            if let Some(root) = self.action_root_of(parent) {
                if !self.nodes[root].bracketed {
                    self.nodes[root].bracketed = true;
                    node.marked_bracket = Some(root);
                }
            }
        }

        let id = self.nodes.alloc(node);
        if token.is_bracket() {
            return id;
        }

        if token == TokenKind::Composed && !flags.contains(Flags::ACTION_ROOT) {
            if parent.is_none() {
                let node = &mut self.nodes[id];
                node.flags.insert(Flags::ACTION_ROOT);
                node.name = "start";
            }
            return id;
        }

        if let Some(root) = self.action_root_of(parent) {
            self.attach(root, id);
        }
        id
    }

    /// Nearest action root among `start` and its ancestors.
    pub fn action_root_of(&self, mut start: Option<AstId>) -> Option<AstId> {
        while let Some(id) = start {
            let node = &self.nodes[id];
            if node.is_action_root() {
                return Some(id);
            }
            start = node.parent;
        }
        None
    }

    fn attach(&mut self, root: AstId, child: AstId) {
        let prev = self.nodes[root].last_child;
        match prev {
            Some(prev) => self.nodes[prev].next_sibling = Some(child),
            None => self.nodes[root].first_child = Some(child),
        }
        self.nodes[root].last_child = Some(child);

        let node = &mut self.nodes[child];
        node.attached_to = Some(root);
        node.prev_sibling = prev;
    }

    pub fn checkpoint(&self) -> AstCheckpoint {
        AstCheckpoint {
            len: self.nodes.len(),
        }
    }

    /// Removes every node created after `checkpoint` and undoes the links they made.
    ///
    /// Nodes are attached in creation order, so popping in reverse always detaches the last
    /// child of its action root.
    pub fn rollback(&mut self, checkpoint: AstCheckpoint) {
        while self.nodes.len() > checkpoint.len {
            let Some((id, node)) = self.nodes.pop() else {
                break;
            };

            if let Some(root) = node.attached_to {
                debug_assert_eq!(self.nodes[root].last_child, Some(id));
                self.nodes[root].last_child = node.prev_sibling;
                match node.prev_sibling {
                    Some(prev) => self.nodes[prev].next_sibling = None,
                    None => self.nodes[root].first_child = None,
                }
            }
            if let Some(root) = node.marked_bracket {
                self.nodes[root].bracketed = false;
            }
        }
    }

    /// The root of the tree, reached by climbing from the first node.
    pub fn root(&self) -> Option<AstId> {
        let mut id = self.nodes.keys().next()?;
        while let Some(parent) = self.nodes[id].parent {
            id = parent;
        }
        Some(id)
    }

    pub fn node(&self, id: AstId) -> Node<'_, 'a, V> {
        Node { store: self, id }
    }

    /// Evaluates the tree from its root, `None` for an empty store.
    pub fn execute(&self) -> Option<V> {
        self.root().map(|root| self.node(root).eval())
    }

    /// Writes the flattened tree, one node per line, indented by depth.
    pub fn display_into(&self, buf: &mut dyn Write) -> fmt::Result {
        if let Some(root) = self.root() {
            self.display_node(root, 0, buf)?;
        }
        Ok(())
    }

    fn display_node(&self, id: AstId, depth: usize, buf: &mut dyn Write) -> fmt::Result {
        let node = &self.nodes[id];
        for _ in 0..depth {
            buf.write_str("  ")?;
        }
        buf.write_str(node.name)?;
        if node.token != TokenKind::Composed {
            write!(buf, " '{}'", node.text.as_str(self.src))?;
        }
        if node.bracketed {
            buf.write_str(" (...)")?;
        }
        buf.write_char('\n')?;

        let mut child = node.first_child;
        while let Some(id) = child {
            self.display_node(id, depth + 1, buf)?;
            child = self.nodes[id].next_sibling;
        }
        Ok(())
    }
}

impl<V> fmt::Display for AstStore<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.display_into(f)
    }
}

impl<V> fmt::Debug for AstStore<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstStore")
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

/// View of one node of an [`AstStore`] handed to actions.
pub struct Node<'s, 'a, V> {
    store: &'s AstStore<'a, V>,
    id: AstId,
}

impl<V> Clone for Node<'_, '_, V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for Node<'_, '_, V> {}

impl<'s, 'a, V> Node<'s, 'a, V> {
    fn ast(self) -> &'s AstNode<'a> {
        &self.store.nodes[self.id]
    }
    fn relative(self, id: Option<AstId>) -> Option<Node<'s, 'a, V>> {
        id.map(|id| Node {
            store: self.store,
            id,
        })
    }

    pub fn id(self) -> AstId {
        self.id
    }
    pub fn store(self) -> &'s AstStore<'a, V> {
        self.store
    }
    pub fn token(self) -> TokenKind {
        self.ast().token
    }
    pub fn name(self) -> &'a str {
        self.ast().name
    }
    pub fn span(self) -> Span {
        self.ast().text
    }
    /// Matched text, empty for productions.
    pub fn text(self) -> &'a str {
        self.ast().text.as_str(self.store.src)
    }
    pub fn flags(self) -> Flags {
        self.ast().flags
    }
    pub fn is_bracketed(self) -> bool {
        self.ast().bracketed
    }
    pub fn debug_id(self) -> u32 {
        self.ast().debug_id
    }
    pub fn parent(self) -> Option<Node<'s, 'a, V>> {
        self.relative(self.ast().parent)
    }
    pub fn first_child(self) -> Option<Node<'s, 'a, V>> {
        self.relative(self.ast().first_child)
    }
    pub fn next_sibling(self) -> Option<Node<'s, 'a, V>> {
        self.relative(self.ast().next_sibling)
    }
    pub fn children(self) -> Children<'s, 'a, V> {
        Children {
            next: self.first_child(),
        }
    }

    /// Runs the action of the parser node that produced this node.
    ///
    /// Nodes without an action pass the value of their first child through. Nodes without
    /// children use the leaf action of the grammar.
    pub fn eval(self) -> V {
        match self.ast().rule.and_then(|rule| self.store.grammar.action(rule)) {
            Some(action) => action(self),
            None => self.pass_through(),
        }
    }

    pub fn pass_through(self) -> V {
        match self.first_child() {
            Some(first) => first.eval(),
            None => (self.store.grammar.leaf_action())(self),
        }
    }
}

impl<V> fmt::Debug for Node<'_, '_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("text", &self.text())
            .finish()
    }
}

pub struct Children<'s, 'a, V> {
    next: Option<Node<'s, 'a, V>>,
}

impl<'s, 'a, V> Iterator for Children<'s, 'a, V> {
    type Item = Node<'s, 'a, V>;
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next_sibling();
        Some(node)
    }
}
