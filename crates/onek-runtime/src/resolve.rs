use cranelift_entity::{packed_option::PackedOption, EntitySet, SecondaryMap};

use crate::{
    arena::Arena,
    error::GrammarError,
    grammar::{Action, BuildNode},
    parser::{Combinator, Composed, ParserId, ParserNode},
    Flags,
};

pub(crate) struct Resolved {
    pub nodes: Arena<ParserId, ParserNode>,
    pub parents: SecondaryMap<ParserId, PackedOption<ParserId>>,
}

/// Replaces the placeholders of a grammar with copies of the productions they stand for.
///
/// The graph is walked depth first from `root`, an unbound placeholder copies the nearest
/// production on the walked path that has the same name. The copy shares the children of that
/// production which is what makes the grammar recursive. Placeholders that are never reached
/// and have no binding are left as inert empty sequences.
pub(crate) fn resolve<V>(
    nodes: Arena<ParserId, BuildNode>,
    actions: &mut SecondaryMap<ParserId, Option<Action<V>>>,
    root: ParserId,
) -> Result<Resolved, GrammarError> {
    let mut resolver = Resolver {
        nodes,
        actions,
        parents: SecondaryMap::new(),
        visited: EntitySet::new(),
        path: Vec::new(),
    };

    resolver.visit(root)?;
    for id in resolver.nodes.keys() {
        let bound = matches!(
            &resolver.nodes[id],
            BuildNode::Placeholder(p) if p.binding.is_some()
        );
        if bound {
            resolver.visit(id)?;
        }
    }

    let nodes = resolver.nodes.map(|node| match node {
        BuildNode::Parser(node) => node,
        BuildNode::Placeholder(p) => ParserNode::Composed(Composed {
            name: p.name,
            combinator: Combinator::Sequence,
            left: None,
            right: None,
            repeat: p.repeat,
            delimiter: p.delimiter,
            flags: p.flags,
        }),
    });

    Ok(Resolved {
        nodes,
        parents: resolver.parents,
    })
}

struct Resolver<'m, V> {
    nodes: Arena<ParserId, BuildNode>,
    actions: &'m mut SecondaryMap<ParserId, Option<Action<V>>>,
    parents: SecondaryMap<ParserId, PackedOption<ParserId>>,
    visited: EntitySet<ParserId>,
    /// Productions enclosing the node being visited.
    path: Vec<ParserId>,
}

impl<V> Resolver<'_, V> {
    fn visit(&mut self, id: ParserId) -> Result<(), GrammarError> {
        if self.visited.contains(id) {
            return Ok(());
        }
        self.visited.insert(id);

        if let BuildNode::Placeholder(p) = &self.nodes[id] {
            let target = match p.binding {
                Some(binding) => self.follow_binding(&p.name, binding)?,
                None => self.find_enclosing(&p.name)?,
            };
            self.copy_behaviour(id, target);
        }

        let (left, right) = match &self.nodes[id] {
            BuildNode::Parser(ParserNode::Composed(c)) => (c.left, c.right),
            _ => (None, None),
        };
        let children = left.into_iter().chain(right);
        for child in children.clone() {
            if self.parents[child].is_none() {
                self.parents[child] = id.into();
            }
        }

        self.path.push(id);
        for child in children {
            self.visit(child)?;
        }
        self.path.pop();
        Ok(())
    }

    fn find_enclosing(&self, name: &str) -> Result<ParserId, GrammarError> {
        self.path
            .iter()
            .rev()
            .copied()
            .find(|&ancestor| self.nodes[ancestor].name() == name)
            .ok_or_else(|| GrammarError::UnresolvedPlaceholder {
                name: name.to_owned(),
            })
    }

    fn follow_binding(&self, name: &str, binding: ParserId) -> Result<ParserId, GrammarError> {
        let mut target = binding;
        // a chain longer than the grammar must be a cycle
        for _ in 0..self.nodes.len() {
            match &self.nodes[target] {
                BuildNode::Parser(_) => return Ok(target),
                BuildNode::Placeholder(p) => match p.binding {
                    Some(next) => target = next,
                    None => break,
                },
            }
        }
        Err(GrammarError::UnresolvedBinding {
            name: name.to_owned(),
        })
    }

    /// Turns the placeholder `id` into a copy of `target`, keeping its own repetition.
    fn copy_behaviour(&mut self, id: ParserId, target: ParserId) {
        let BuildNode::Placeholder(p) = &self.nodes[id] else {
            return;
        };
        let BuildNode::Parser(target_node) = &self.nodes[target] else {
            return;
        };

        let mut node = target_node.clone();
        let (repeat, delimiter) = node.repetition_mut();
        *repeat = p.repeat;
        *delimiter = p.delimiter.clone();
        if p.flags.contains(Flags::ACTION_ROOT) {
            node.flags_mut().insert(Flags::ACTION_ROOT);
        }

        self.nodes[id] = BuildNode::Parser(node);
        self.actions[id] = self.actions[target].clone();
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::GrammarError, grammar::GrammarBuilder, parser::ParserNode, Node, TokenKind,
    };

    fn builder() -> GrammarBuilder<usize> {
        GrammarBuilder::new(|_: Node<'_, '_, usize>| 0)
    }

    #[test]
    fn placeholder_copies_enclosing_production() {
        let b = builder();
        let item = b.literals(TokenKind::Ident, ["x"]);
        let open = b.literals(TokenKind::Open, ["("]);
        let close = b.literals(TokenKind::Close, [")"]);
        let nested = b.placeholder("list", false).zero_or_more();
        let list = (item | (open >> nested >> close)).named("list");
        let (list, nested) = (list.id(), nested.id());

        let grammar = b.resolve_placeholders(list).unwrap();
        let ParserNode::Composed(resolved) = grammar.node(nested) else {
            panic!("placeholder was not resolved");
        };
        let ParserNode::Composed(original) = grammar.node(list) else {
            unreachable!()
        };
        assert_eq!(resolved.name, "list");
        assert_eq!(resolved.left, original.left);
        assert_eq!(resolved.right, original.right);
        assert_eq!(resolved.repeat.min, 0);
        assert_eq!(original.repeat.min, 1);
        assert!(grammar.parent(nested).is_some());
    }

    #[test]
    fn unresolved_placeholder_is_an_error() {
        let b = builder();
        let item = b.literals(TokenKind::Ident, ["x"]);
        let root = (item >> b.placeholder("missing", false)).named("root").id();

        match b.resolve_placeholders(root) {
            Err(GrammarError::UnresolvedPlaceholder { name }) => assert_eq!(name, "missing"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn binding_cycle_is_an_error() {
        let b = builder();
        let first = b.placeholder("first", false);
        let second = b.placeholder("second", false);
        first.bind(second);
        second.bind(first);
        let root = (b.literals(TokenKind::Ident, ["x"]) >> first).id();

        assert!(matches!(
            b.resolve_placeholders(root),
            Err(GrammarError::UnresolvedBinding { .. })
        ));
    }

    #[test]
    fn binding_a_production_is_an_error() {
        let b = builder();
        let item = b.literals(TokenKind::Ident, ["x"]);
        item.bind(item);

        let id = item.id();
        assert!(matches!(
            b.resolve_placeholders(id),
            Err(GrammarError::NotAPlaceholder { .. })
        ));
    }
}
