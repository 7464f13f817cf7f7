use std::{
    borrow::Cow,
    cell::RefCell,
    ops::{BitOr, Shr},
    rc::Rc,
};

use cranelift_entity::{packed_option::PackedOption, SecondaryMap};

use crate::{
    arena::Arena,
    ast::{AstStore, Node},
    config::Config,
    error::{ErrorAccumulator, GrammarError, ParseFailure},
    parser::{Combinator, Composed, Matcher, ParseCx, ParserId, ParserNode, Repeat, Terminal},
    resolve,
    scan::ScanState,
    span::Span,
    trace::{LogTrace, Trace},
    Flags, TokenKind,
};

/// Semantic action computing the value of a node, usually from the values of its children.
pub type Action<V> = Rc<dyn Fn(Node<'_, '_, V>) -> V>;

/// Forward reference to a production, replaced during [`GrammarBuilder::resolve_placeholders`].
#[derive(Clone, Debug)]
pub(crate) struct Placeholder {
    pub name: Cow<'static, str>,
    pub repeat: Repeat,
    pub delimiter: Option<Cow<'static, str>>,
    pub flags: Flags,
    pub binding: Option<ParserId>,
}

#[derive(Clone, Debug)]
pub(crate) enum BuildNode {
    Parser(ParserNode),
    Placeholder(Placeholder),
}

impl BuildNode {
    pub fn name(&self) -> &str {
        match self {
            BuildNode::Parser(node) => node.name(),
            BuildNode::Placeholder(p) => &p.name,
        }
    }
    fn set_name(&mut self, name: Cow<'static, str>) {
        match self {
            BuildNode::Parser(node) => node.set_name(name),
            BuildNode::Placeholder(p) => p.name = name,
        }
    }
    fn repetition_mut(&mut self) -> (&mut Repeat, &mut Option<Cow<'static, str>>) {
        match self {
            BuildNode::Parser(node) => node.repetition_mut(),
            BuildNode::Placeholder(p) => (&mut p.repeat, &mut p.delimiter),
        }
    }
    fn flags_mut(&mut self) -> &mut Flags {
        match self {
            BuildNode::Parser(node) => node.flags_mut(),
            BuildNode::Placeholder(p) => &mut p.flags,
        }
    }
}

/// Collects the nodes of a grammar.
///
/// Nodes are handed out as [`Rule`]s which borrow the builder, combining them with `>>` and `|`
/// or the repetition methods allocates new nodes. Mistakes such as an invalid regex are
/// collected and reported by [`GrammarBuilder::resolve_placeholders`].
pub struct GrammarBuilder<V> {
    nodes: RefCell<Arena<ParserId, BuildNode>>,
    actions: RefCell<SecondaryMap<ParserId, Option<Action<V>>>>,
    errors: ErrorAccumulator,
    leaf: Action<V>,
    config: Config,
}

impl<V> GrammarBuilder<V> {
    /// `leaf` computes the value of nodes that have neither an action nor children, typically
    /// by converting the matched text.
    pub fn new(leaf: impl Fn(Node<'_, '_, V>) -> V + 'static) -> GrammarBuilder<V> {
        Self::with_config(Config::default(), leaf)
    }

    pub fn with_config(
        config: Config,
        leaf: impl Fn(Node<'_, '_, V>) -> V + 'static,
    ) -> GrammarBuilder<V> {
        GrammarBuilder {
            nodes: RefCell::new(Arena::new()),
            actions: RefCell::new(SecondaryMap::new()),
            errors: ErrorAccumulator::default(),
            leaf: Rc::new(leaf),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn alloc(&self, node: BuildNode) -> Rule<'_, V> {
        let id = self.nodes.borrow_mut().alloc(node);
        Rule { builder: self, id }
    }

    /// Rule for a node allocated earlier.
    pub fn rule(&self, id: ParserId) -> Rule<'_, V> {
        Rule { builder: self, id }
    }

    pub fn terminal(&self, token: TokenKind, matcher: Matcher) -> Rule<'_, V> {
        let name = token.name();
        self.alloc(BuildNode::Parser(ParserNode::Terminal(Terminal {
            token,
            name: name.into(),
            expected: matcher.describe(name),
            matcher,
            repeat: Repeat::ONCE,
            delimiter: None,
            flags: Flags::empty(),
        })))
    }

    /// Terminal matching `pattern` at the cursor.
    pub fn regex(&self, token: TokenKind, pattern: &str) -> Rule<'_, V> {
        let matcher = match Matcher::regex(pattern) {
            Ok(matcher) => matcher,
            Err(source) => {
                self.errors.error(GrammarError::InvalidPattern {
                    name: token.name().to_owned(),
                    source,
                });
                Matcher::Literals(Vec::new())
            }
        };
        self.terminal(token, matcher)
    }

    pub fn literals<S: Into<Cow<'static, str>>>(
        &self,
        token: TokenKind,
        literals: impl IntoIterator<Item = S>,
    ) -> Rule<'_, V> {
        self.terminal(token, Matcher::literals(literals))
    }

    pub fn custom(
        &self,
        token: TokenKind,
        f: impl Fn(&ScanState<'_>) -> Option<usize> + 'static,
    ) -> Rule<'_, V> {
        self.terminal(token, Matcher::custom(f))
    }

    pub fn end_of_input(&self) -> Rule<'_, V> {
        self.terminal(TokenKind::End, Matcher::End)
    }

    /// Stands in for the enclosing production called `name`, or for the target given to
    /// [`GrammarBuilder::bind`].
    pub fn placeholder(
        &self,
        name: impl Into<Cow<'static, str>>,
        is_action_root: bool,
    ) -> Rule<'_, V> {
        let mut flags = Flags::PLACEHOLDER;
        if is_action_root {
            flags |= Flags::ACTION_ROOT;
        }
        self.alloc(BuildNode::Placeholder(Placeholder {
            name: name.into(),
            repeat: Repeat::ONCE,
            delimiter: None,
            flags,
            binding: None,
        }))
    }

    fn composed(
        &self,
        name: &'static str,
        combinator: Combinator,
        left: Rule<'_, V>,
        right: Rule<'_, V>,
    ) -> Rule<'_, V> {
        debug_assert!(std::ptr::eq(left.builder, self) && std::ptr::eq(right.builder, self));
        self.alloc(BuildNode::Parser(ParserNode::Composed(Composed {
            name: name.into(),
            combinator,
            left: Some(left.id),
            right: Some(right.id),
            repeat: Repeat::ONCE,
            delimiter: None,
            flags: Flags::empty(),
        })))
    }

    pub fn sequence(&self, left: Rule<'_, V>, right: Rule<'_, V>) -> Rule<'_, V> {
        self.composed("sequence", Combinator::Sequence, left, right)
    }

    /// Ordered choice, `right` is only tried when `left` fails.
    pub fn choice(&self, left: Rule<'_, V>, right: Rule<'_, V>) -> Rule<'_, V> {
        self.composed("choice", Combinator::Choice, left, right)
    }

    /// Copy of `rule` matched between `min` and `max` times.
    pub fn repeat(&self, rule: Rule<'_, V>, min: usize, max: usize) -> Rule<'_, V> {
        let copy = self.clone_node(rule);
        let mut nodes = self.nodes.borrow_mut();
        let node = &mut nodes[copy.id];
        let repeat = Repeat::new(min, max);
        if !repeat.is_valid() {
            self.errors.error(GrammarError::InvalidRepeat {
                name: node.name().to_owned(),
                min,
                max,
            });
        }
        *node.repetition_mut().0 = repeat;
        copy
    }

    pub fn optional(&self, rule: Rule<'_, V>) -> Rule<'_, V> {
        self.repeat(rule, 0, 1)
    }
    pub fn zero_or_more(&self, rule: Rule<'_, V>) -> Rule<'_, V> {
        self.repeat(rule, 0, crate::MANY)
    }
    pub fn one_or_more(&self, rule: Rule<'_, V>) -> Rule<'_, V> {
        self.repeat(rule, 1, crate::MANY)
    }

    /// Copy of `rule` requiring `delimiter` between its repetitions.
    pub fn separated(
        &self,
        rule: Rule<'_, V>,
        delimiter: impl Into<Cow<'static, str>>,
    ) -> Rule<'_, V> {
        let copy = self.clone_node(rule);
        let mut nodes = self.nodes.borrow_mut();
        let node = &mut nodes[copy.id];
        *node.repetition_mut().1 = Some(delimiter.into());
        copy
    }

    /// Shallow copy, the children are shared with `rule`.
    pub fn clone_node(&self, rule: Rule<'_, V>) -> Rule<'_, V> {
        let node = self.nodes.borrow()[rule.id].clone();
        let copy = self.alloc(node);
        let action = self.actions.borrow()[rule.id].clone();
        self.actions.borrow_mut()[copy.id] = action;
        copy
    }

    pub fn name(&self, rule: Rule<'_, V>, name: impl Into<Cow<'static, str>>) {
        self.nodes.borrow_mut()[rule.id].set_name(name.into());
    }

    pub fn flags(&self, rule: Rule<'_, V>, flags: Flags) {
        self.nodes.borrow_mut()[rule.id].flags_mut().insert(flags);
    }

    /// Attaches `action` to `rule` and makes it an action root.
    pub fn action(&self, rule: Rule<'_, V>, action: impl Fn(Node<'_, '_, V>) -> V + 'static) {
        self.flags(rule, Flags::ACTION_ROOT);
        self.actions.borrow_mut()[rule.id] = Some(Rc::new(action));
    }

    /// Resolves `placeholder` to `target` instead of searching its enclosing productions.
    pub fn bind(&self, placeholder: Rule<'_, V>, target: Rule<'_, V>) {
        let mut nodes = self.nodes.borrow_mut();
        match &mut nodes[placeholder.id] {
            BuildNode::Placeholder(p) => p.binding = Some(target.id),
            BuildNode::Parser(node) => self.errors.error(GrammarError::NotAPlaceholder {
                name: node.name().to_owned(),
            }),
        }
    }

    /// Replaces every placeholder reachable from `root` and seals the grammar.
    pub fn resolve_placeholders(self, root: ParserId) -> Result<Grammar<V>, GrammarError> {
        let mut errors = self.errors.take().into_iter();
        if let Some(first) = errors.next() {
            for err in errors {
                log::error!("{err}");
            }
            return Err(first);
        }

        let mut actions = self.actions.into_inner();
        let resolved = resolve::resolve(self.nodes.into_inner(), &mut actions, root)?;
        Ok(Grammar {
            nodes: resolved.nodes,
            parents: resolved.parents,
            actions,
            root,
            leaf: self.leaf,
            config: self.config,
        })
    }
}

/// Handle to a node of a [`GrammarBuilder`].
///
/// `a >> b` is a sequence and `a | b` an ordered choice. Repetition methods return new nodes,
/// while [`Rule::named`], [`Rule::action`] and [`Rule::with_flags`] modify the node in place.
pub struct Rule<'b, V> {
    builder: &'b GrammarBuilder<V>,
    id: ParserId,
}

impl<V> Clone for Rule<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for Rule<'_, V> {}

impl<'b, V> Rule<'b, V> {
    pub fn id(self) -> ParserId {
        self.id
    }
    pub fn optional(self) -> Self {
        self.builder.optional(self)
    }
    pub fn zero_or_more(self) -> Self {
        self.builder.zero_or_more(self)
    }
    pub fn one_or_more(self) -> Self {
        self.builder.one_or_more(self)
    }
    pub fn repeat(self, min: usize, max: usize) -> Self {
        self.builder.repeat(self, min, max)
    }
    pub fn separated_by(self, delimiter: impl Into<Cow<'static, str>>) -> Self {
        self.builder.separated(self, delimiter)
    }
    pub fn clone_node(self) -> Self {
        self.builder.clone_node(self)
    }
    pub fn named(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.builder.name(self, name);
        self
    }
    pub fn with_flags(self, flags: Flags) -> Self {
        self.builder.flags(self, flags);
        self
    }
    pub fn action(self, action: impl Fn(Node<'_, '_, V>) -> V + 'static) -> Self {
        self.builder.action(self, action);
        self
    }
    pub fn bind(self, target: Rule<'_, V>) -> Self {
        self.builder.bind(self, target);
        self
    }
}

impl<'b, V> Shr for Rule<'b, V> {
    type Output = Rule<'b, V>;
    fn shr(self, rhs: Self) -> Self::Output {
        self.builder.sequence(self, rhs)
    }
}

impl<'b, V> BitOr for Rule<'b, V> {
    type Output = Rule<'b, V>;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.builder.choice(self, rhs)
    }
}

/// A resolved grammar, immutable and reusable for any number of parses.
pub struct Grammar<V> {
    nodes: Arena<ParserId, ParserNode>,
    parents: SecondaryMap<ParserId, PackedOption<ParserId>>,
    actions: SecondaryMap<ParserId, Option<Action<V>>>,
    root: ParserId,
    leaf: Action<V>,
    config: Config,
}

impl<V> Grammar<V> {
    #[cfg(test)]
    pub(crate) fn empty(leaf: Action<V>) -> Grammar<V> {
        use cranelift_entity::EntityRef;

        Grammar {
            nodes: Arena::new(),
            parents: SecondaryMap::new(),
            actions: SecondaryMap::new(),
            root: ParserId::new(0),
            leaf,
            config: Config::default(),
        }
    }

    pub fn root(&self) -> ParserId {
        self.root
    }
    pub fn node(&self, id: ParserId) -> &ParserNode {
        &self.nodes[id]
    }
    /// The production `id` was first found in during resolution.
    pub fn parent(&self, id: ParserId) -> Option<ParserId> {
        self.parents[id].expand()
    }
    pub fn action(&self, id: ParserId) -> Option<&Action<V>> {
        self.actions[id].as_ref()
    }
    pub fn leaf_action(&self) -> &Action<V> {
        &self.leaf
    }
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parses `src` from the root, logging the parse through [`LogTrace`].
    pub fn parse<'a>(&'a self, src: &'a str) -> Result<AstStore<'a, V>, ParseFailure> {
        self.parse_with(self.root, src, &mut LogTrace::new())
    }

    pub fn parse_with<'a>(
        &'a self,
        root: ParserId,
        src: &'a str,
        trace: &mut dyn Trace,
    ) -> Result<AstStore<'a, V>, ParseFailure> {
        ParseFailure::check_input_len(src.len())?;
        let mut cx = ParseCx::new(self, src, trace);

        // a terminal cannot collect children, give it a root to attach to
        let parent = match self.node(root) {
            ParserNode::Terminal(_) => Some(cx.ast.add_node(
                None,
                TokenKind::Composed,
                "start",
                None,
                Span::at(0),
                Flags::empty(),
            )),
            ParserNode::Composed(_) => None,
        };

        if !cx.parse_node(root, parent, true) {
            return Err(cx.failure.finish(src));
        }

        let mut ast = cx.ast;
        if ast.is_empty() {
            ast.add_node(
                Some(root),
                TokenKind::Composed,
                "start",
                None,
                Span::at(0),
                Flags::empty(),
            );
        }
        Ok(ast)
    }
}

impl<V> std::fmt::Debug for Grammar<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("root", &self.root)
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}
