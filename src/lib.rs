//! Backtracking pattern matcher with memoized repetition closures.
//!
//! A pattern is a tree of [`Node`]s: literals, `^`/`$` anchors, two-way
//! alternation and greedy zero-or-more repetition.  Every node carries an
//! optional *continuation* (`rest`), the node that must match immediately
//! after it, so a pattern such as `a*ab` is the chain
//!
//! ```text
//! Repetition(Literal "a") ──rest──> Literal "ab"
//! ```
//!
//! Matching asks a node to consume input starting at a byte offset and
//! returns either the offset reached after the node *and its continuation*
//! matched, or `None`.  Offset `0` is an ordinary successful result.
//!
//! # Repetition
//!
//! The naive way to match `child*` followed by `rest` tries the largest
//! repeat count first and backtracks one repetition at a time, re-running
//! `rest` at every candidate.  Chaining repetitions (`a*a*a*b`) makes the
//! same `(node, offset)` pairs get re-derived exponentially many times.
//!
//! Instead, a repetition:
//!
//! 1. Computes the **closure** of `child` from the start offset: every
//!    distinct offset reachable by zero, one, two, ... applications of the
//!    child, stopping when the child fails or revisits a seen offset.
//! 2. Walks the closure **longest first** and evaluates `rest` at each
//!    candidate; the first success wins (greedy).
//! 3. **Memoizes** both the continuation result per candidate offset and
//!    the repetition's overall result per start offset.
//!
//! With memoization, the number of continuation evaluations is bounded by
//! the number of distinct offsets rather than by the number of nested
//! repetition layers: m chained `a*` followed by `b`, against `"a"`×N,
//! costs O(m·N²) node attempts rather than a count exponential in m.
//!
//! # Memo state
//!
//! A compiled [`Pattern`] is immutable and holds no memo state, so it can be
//! shared freely (including across threads).  All memo tables live in a
//! [`MatcherMemory`], which is reset for every subject string by
//! [`MatcherMemory::matcher`].
//!
//! ```
//! use regex_closure_memo::{Node, Pattern};
//!
//! // a*ab
//! let pattern = Pattern::new(
//!     Node::repetition(Node::literal("a")).then(Node::literal("ab")),
//! );
//! assert_eq!(pattern.match_prefix("aaab"), Some(4));
//! assert!(!pattern.is_match("bbb"));
//! ```

use std::convert::Infallible;
use std::fmt;
use std::io::Write;
use std::ops::{ControlFlow, Index, Range};

use indexmap::IndexSet;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// An error that aborts a search before it could decide match or no-match.
///
/// Not matching is never an error; it is reported as `None` / `false`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A [`StepLimit`] observer saw more node attempts than it allows.
    StepLimitExceeded {
        /// The configured maximum number of attempts.
        limit: u64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepLimitExceeded { limit } => {
                write!(f, "step limit of {} node attempts exceeded", limit)
            }
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Node kinds
// ---------------------------------------------------------------------------

/// The kind tag of a [`Node`].
///
/// Observers and the engine agree on node identity through this tag rather
/// than by inspecting which payload fields a node carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A fixed run of bytes.
    Literal,
    /// `^` — start of input.
    Start,
    /// `$` — end of input.
    End,
    /// `left|right`.
    Alternation,
    /// Greedy `child*`.
    Repetition,
}

impl Kind {
    /// Every kind, in declaration order.
    pub const ALL: [Kind; 5] = [
        Kind::Literal,
        Kind::Start,
        Kind::End,
        Kind::Alternation,
        Kind::Repetition,
    ];

    /// A short lowercase name, suitable for logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Literal => "literal",
            Kind::Start => "start",
            Kind::End => "end",
            Kind::Alternation => "alternation",
            Kind::Repetition => "repetition",
        }
    }

    #[inline]
    fn idx(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind-specific payload of a [`Node`].
#[derive(Clone, Debug)]
enum NodeKind {
    Literal(Box<str>),
    Start,
    End,
    Alternation { left: Box<Node>, right: Box<Node> },
    Repetition { child: Box<Node> },
}

// ---------------------------------------------------------------------------
// Node tree
// ---------------------------------------------------------------------------

/// Identity of a node inside a compiled [`Pattern`] (pre-order position).
///
/// [`NodeIdx::NONE`] marks a node that has not been compiled yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct NodeIdx(u32);

impl NodeIdx {
    const NONE: Self = Self(u32::MAX);

    #[inline]
    fn idx(self) -> usize {
        debug_assert!(self != Self::NONE, "NodeIdx::NONE used as index");
        self.0 as usize
    }
}

impl fmt::Display for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of a pattern: a literal, an anchor, an alternation or a
/// repetition, followed by an optional continuation.
///
/// Trees are built bottom-up with the constructors below and then handed
/// to [`Pattern::new`], after which they can no longer be modified.
#[derive(Clone, Debug)]
pub struct Node {
    kind: NodeKind,
    rest: Option<Box<Node>>,
    idx: NodeIdx,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            rest: None,
            idx: NodeIdx::NONE,
        }
    }

    /// Match `text` exactly (byte-wise).  The empty literal always matches
    /// without consuming input.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::new(NodeKind::Literal(text.into().into_boxed_str()))
    }

    /// Zero-width assertion that succeeds only at offset 0.
    pub fn start() -> Self {
        Self::new(NodeKind::Start)
    }

    /// Zero-width assertion that succeeds only at the end of the subject.
    pub fn end() -> Self {
        Self::new(NodeKind::End)
    }

    /// Try `left`, then `right`.  Whichever branch succeeds is followed by
    /// this node's continuation; if the continuation fails after `left`,
    /// `right` is tried.
    pub fn alternation(left: Node, right: Node) -> Self {
        Self::new(NodeKind::Alternation {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Greedy zero-or-more repetition of `child`.
    ///
    /// Each application of `child` contributes the single end offset its own
    /// match produces; any continuation attached to `child` is part of the
    /// repeated unit (`Literal "a" -> Literal "b"` repeats `ab`).
    pub fn repetition(child: Node) -> Self {
        Self::new(NodeKind::Repetition {
            child: Box::new(child),
        })
    }

    /// Append `rest` at the tail of this node's continuation chain.
    ///
    /// Each call walks the existing chain, so building a long chain with
    /// repeated `then` is quadratic; use [`Node::sequence`] for that.
    pub fn then(mut self, rest: Node) -> Self {
        let mut slot = &mut self.rest;
        while let Some(next) = slot {
            slot = &mut next.rest;
        }
        *slot = Some(Box::new(rest));
        self
    }

    /// Chain `nodes` one after another.  Returns `None` for an empty
    /// sequence.
    ///
    /// Links are made from the back, so each node is attached in constant
    /// time as long as the input nodes carry no continuation of their own.
    pub fn sequence(nodes: impl IntoIterator<Item = Node>) -> Option<Node> {
        let nodes: Vec<Node> = nodes.into_iter().collect();
        nodes.into_iter().rev().reduce(|rest, node| node.then(rest))
    }

    /// The kind tag of this node.
    pub fn kind(&self) -> Kind {
        match self.kind {
            NodeKind::Literal(_) => Kind::Literal,
            NodeKind::Start => Kind::Start,
            NodeKind::End => Kind::End,
            NodeKind::Alternation { .. } => Kind::Alternation,
            NodeKind::Repetition { .. } => Kind::Repetition,
        }
    }

    /// The node that must match immediately after this one, if any.
    pub fn rest(&self) -> Option<&Node> {
        self.rest.as_deref()
    }

    fn fmt_unit(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Literal(text) => f.write_str(text),
            NodeKind::Start => f.write_str("^"),
            NodeKind::End => f.write_str("$"),
            NodeKind::Alternation { left, right } => write!(f, "({}|{})", left, right),
            NodeKind::Repetition { child } => {
                let single = matches!(&child.kind, NodeKind::Literal(text) if text.chars().count() == 1)
                    && child.rest.is_none();
                if single {
                    write!(f, "{}*", child)
                } else {
                    write!(f, "({})*", child)
                }
            }
        }
    }
}

/// Renders the node chain in regex-like notation, e.g. `a*(ab|cd)$`.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut node = Some(self);
        while let Some(n) = node {
            n.fmt_unit(f)?;
            node = n.rest();
        }
        Ok(())
    }
}

/// Unlinks the tree onto an explicit stack so that long continuation
/// chains do not recurse once per node.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending: Vec<Box<Node>> = Vec::new();
        detach(self, &mut pending);
        while let Some(mut node) = pending.pop() {
            detach(&mut node, &mut pending);
        }
    }
}

/// Move `node`'s continuation and sub-nodes onto `pending`.
fn detach(node: &mut Node, pending: &mut Vec<Box<Node>>) {
    pending.extend(node.rest.take());
    match std::mem::replace(&mut node.kind, NodeKind::Start) {
        NodeKind::Alternation { left, right } => {
            pending.push(left);
            pending.push(right);
        }
        NodeKind::Repetition { child } => pending.push(child),
        NodeKind::Literal(_) | NodeKind::Start | NodeKind::End => {}
    }
}

// ---------------------------------------------------------------------------
// Compiled pattern
// ---------------------------------------------------------------------------

/// Index of a memo table row in [`MatcherMemory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SlotIdx(u32);

impl SlotIdx {
    /// The node owns no row in this table.
    const NONE: Self = Self(u32::MAX);

    #[inline]
    fn get(self) -> Option<usize> {
        (self != Self::NONE).then_some(self.0 as usize)
    }
}

/// An immutable, numbered node tree ready for matching.
///
/// A `Pattern` holds no mutable state; it is `Send + Sync` and may be shared
/// between any number of concurrent searches, each with its own
/// [`MatcherMemory`].
#[derive(Clone, Debug)]
pub struct Pattern {
    root: Node,
    /// Per node: row in [`MatcherMemory::repeats`], set for repetitions.
    repeat_slots: Box<[SlotIdx]>,
    /// Per node: row in [`MatcherMemory::rests`], set for nodes that are
    /// the continuation of a repetition or an alternation.
    rest_slots: Box<[SlotIdx]>,
    repetitions: usize,
    continuations: usize,
}

impl Pattern {
    /// Compile `root` into a pattern, assigning every node its identity and
    /// its memo rows.
    pub fn new(mut root: Node) -> Self {
        let mut numbering = Numbering::default();
        numbering.number(&mut root);
        Self {
            root,
            repeat_slots: numbering.repeat_slots.into_boxed_slice(),
            rest_slots: numbering.rest_slots.into_boxed_slice(),
            repetitions: numbering.repetitions as usize,
            continuations: numbering.continuations as usize,
        }
    }

    /// The root node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.repeat_slots.len()
    }

    /// Always `false`: a pattern has at least its root node.
    pub fn is_empty(&self) -> bool {
        self.repeat_slots.is_empty()
    }

    /// `true` when the root is a `^` anchor, so only offset 0 can match.
    pub fn is_anchored(&self) -> bool {
        self.root.kind() == Kind::Start
    }

    /// Whether the pattern matches anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        MatcherMemory::default().matcher(self, text).is_match()
    }

    /// The leftmost match in `text`.
    pub fn find(&self, text: &str) -> Option<Match> {
        MatcherMemory::default().matcher(self, text).find()
    }

    /// The end offset of a match starting at offset 0, if any.
    pub fn match_prefix(&self, text: &str) -> Option<usize> {
        MatcherMemory::default().matcher(self, text).match_prefix()
    }

    /// Emit a Graphviz DOT representation of the node tree.
    pub fn to_dot(&self, mut buffer: impl Write) -> std::io::Result<()> {
        writeln!(buffer, "digraph pattern {{")?;
        writeln!(buffer, "\trankdir=LR;")?;
        writeln!(buffer, "\t{} [shape=box];", self.root.idx)?;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            let label = match &node.kind {
                NodeKind::Literal(text) => text.to_string(),
                _ => node.kind().name().to_owned(),
            };
            writeln!(buffer, "\t{} [label={:?}];", node.idx, label)?;
            match &node.kind {
                NodeKind::Alternation { left, right } => {
                    writeln!(buffer, "\t{} -> {} [label=\"left\"];", node.idx, left.idx)?;
                    writeln!(buffer, "\t{} -> {} [label=\"right\"];", node.idx, right.idx)?;
                    stack.push(left);
                    stack.push(right);
                }
                NodeKind::Repetition { child } => {
                    writeln!(buffer, "\t{} -> {} [label=\"*\"];", node.idx, child.idx)?;
                    stack.push(child);
                }
                _ => {}
            }
            match node.rest() {
                Some(rest) => {
                    writeln!(buffer, "\t{} -> {};", node.idx, rest.idx)?;
                    stack.push(rest);
                }
                None => writeln!(buffer, "\t{} [peripheries=2];", node.idx)?,
            }
        }
        writeln!(buffer, "}}")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root, f)
    }
}

/// Pre-order numbering pass run by [`Pattern::new`].
#[derive(Default)]
struct Numbering {
    repeat_slots: Vec<SlotIdx>,
    rest_slots: Vec<SlotIdx>,
    repetitions: u32,
    continuations: u32,
}

impl Numbering {
    /// Number `root` and its descendants in pre-order.
    ///
    /// Walks an explicit stack rather than recursing, since continuation
    /// chains can be arbitrarily long.  The continuation of a repetition or
    /// an alternation gets a memo row: both may evaluate it more than once
    /// at the same offset.
    fn number(&mut self, root: &mut Node) {
        let mut stack: Vec<(&mut Node, bool)> = vec![(root, false)];
        while let Some((node, memoized)) = stack.pop() {
            let Node { kind, rest, idx } = node;
            *idx = NodeIdx(self.repeat_slots.len() as u32);

            let repeat = if matches!(kind, NodeKind::Repetition { .. }) {
                self.repetitions += 1;
                SlotIdx(self.repetitions - 1)
            } else {
                SlotIdx::NONE
            };
            let rest_slot = if memoized {
                self.continuations += 1;
                SlotIdx(self.continuations - 1)
            } else {
                SlotIdx::NONE
            };
            self.repeat_slots.push(repeat);
            self.rest_slots.push(rest_slot);

            let backtracks = matches!(
                kind,
                NodeKind::Repetition { .. } | NodeKind::Alternation { .. }
            );
            // Pushed first so it is numbered after the sub-nodes.
            if let Some(next) = rest.as_deref_mut() {
                stack.push((next, backtracks));
            }
            match kind {
                NodeKind::Alternation { left, right } => {
                    stack.push((&mut **right, false));
                    stack.push((&mut **left, false));
                }
                NodeKind::Repetition { child } => stack.push((&mut **child, false)),
                NodeKind::Literal(_) | NodeKind::Start | NodeKind::End => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Match result
// ---------------------------------------------------------------------------

/// A successful match: the byte range `start..end` of the subject.
///
/// `start == end` is a valid, empty match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Match {
    start: usize,
    end: usize,
}

impl Match {
    fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Offset where the match begins.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Offset just past the last consumed byte.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of bytes consumed.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// `true` for a zero-width match.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// `start..end`.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Hook invoked once per node attempt.
///
/// Returning [`ControlFlow::Break`] aborts the search; the break value is
/// handed back to the caller of the `*_with` method.  The unit observer
/// `()` does nothing and can never break.
pub trait Observer {
    /// Value produced when the observer aborts a search.
    type Break;

    /// Called before a node of kind `kind` tries to match at offset `at`.
    fn on_attempt(&mut self, kind: Kind, at: usize) -> ControlFlow<Self::Break>;
}

impl Observer for () {
    type Break = Infallible;

    #[inline]
    fn on_attempt(&mut self, _kind: Kind, _at: usize) -> ControlFlow<Infallible> {
        ControlFlow::Continue(())
    }
}

impl<O: Observer + ?Sized> Observer for &mut O {
    type Break = O::Break;

    #[inline]
    fn on_attempt(&mut self, kind: Kind, at: usize) -> ControlFlow<Self::Break> {
        (**self).on_attempt(kind, at)
    }
}

/// Counts node attempts, in total and per [`Kind`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttemptCounts {
    total: u64,
    by_kind: [u64; Kind::ALL.len()],
}

impl AttemptCounts {
    /// Total number of node attempts observed.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Forget everything counted so far.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Observer for AttemptCounts {
    type Break = Infallible;

    #[inline]
    fn on_attempt(&mut self, kind: Kind, _at: usize) -> ControlFlow<Infallible> {
        self.total += 1;
        self.by_kind[kind.idx()] += 1;
        ControlFlow::Continue(())
    }
}

/// `counts[kind]` — attempts observed for one node kind.
impl Index<Kind> for AttemptCounts {
    type Output = u64;

    #[inline]
    fn index(&self, kind: Kind) -> &u64 {
        &self.by_kind[kind.idx()]
    }
}

impl fmt::Display for AttemptCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "total={}", self.total)?;
        for kind in Kind::ALL {
            write!(f, " {}={}", kind, self[kind])?;
        }
        Ok(())
    }
}

/// Aborts a search with [`Error::StepLimitExceeded`] after `limit` node
/// attempts, forwarding every attempt to an inner observer first.
#[derive(Clone, Debug)]
pub struct StepLimit<O = ()> {
    limit: u64,
    steps: u64,
    inner: O,
}

impl StepLimit {
    /// Allow at most `limit` node attempts.
    pub fn new(limit: u64) -> Self {
        Self::with_observer(limit, ())
    }
}

impl<O> StepLimit<O> {
    /// Allow at most `limit` node attempts, also reporting them to `inner`.
    pub fn with_observer(limit: u64, inner: O) -> Self {
        Self {
            limit,
            steps: 0,
            inner,
        }
    }

    /// Attempts observed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The wrapped observer.
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Unwrap the inner observer.
    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: Observer<Break = Infallible>> Observer for StepLimit<O> {
    type Break = Error;

    fn on_attempt(&mut self, kind: Kind, at: usize) -> ControlFlow<Error> {
        if self.steps >= self.limit {
            tracing::warn!(limit = self.limit, %kind, at, "step limit exceeded, aborting search");
            return ControlFlow::Break(Error::StepLimitExceeded { limit: self.limit });
        }
        self.steps += 1;
        match self.inner.on_attempt(kind, at) {
            ControlFlow::Continue(()) => ControlFlow::Continue(()),
            ControlFlow::Break(never) => match never {},
        }
    }
}

// ---------------------------------------------------------------------------
// Matcher memory
// ---------------------------------------------------------------------------

/// A memoized result of matching one node at one offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Memo {
    Unknown,
    NoMatch,
    End(usize),
}

impl Memo {
    #[inline]
    fn get(self) -> Option<Option<usize>> {
        match self {
            Memo::Unknown => None,
            Memo::NoMatch => Some(None),
            Memo::End(end) => Some(Some(end)),
        }
    }
}

impl From<Option<usize>> for Memo {
    #[inline]
    fn from(result: Option<usize>) -> Self {
        result.map_or(Memo::NoMatch, Memo::End)
    }
}

/// Reusable memo tables for [`Matcher`].  Create once, call
/// [`matcher`](Self::matcher) for each subject string.
///
/// Both tables are dense: one row per memoized node, one column per offset
/// in `0..=text.len()`.
#[derive(Debug, Default)]
pub struct MatcherMemory {
    /// Repetition results, keyed by (repetition row, start offset).
    repeats: Vec<Memo>,
    /// Continuation results, keyed by (continuation row, offset).
    rests: Vec<Memo>,
    /// Columns per row: `text.len() + 1`.
    width: usize,
}

impl MatcherMemory {
    /// Clear all memo state for `text` and return a matcher over it.
    ///
    /// Memo results are only valid for the subject they were computed on,
    /// so every call starts from empty tables.  Heap capacity is kept.
    pub fn matcher<'a>(&'a mut self, pattern: &'a Pattern, text: &'a str) -> Matcher<'a> {
        self.width = text.len() + 1;
        self.repeats.clear();
        self.repeats
            .resize(pattern.repetitions * self.width, Memo::Unknown);
        self.rests.clear();
        self.rests
            .resize(pattern.continuations * self.width, Memo::Unknown);
        tracing::trace!(
            repetitions = pattern.repetitions,
            continuations = pattern.continuations,
            width = self.width,
            "reset matcher memory"
        );

        Matcher {
            memory: self,
            pattern,
            text,
        }
    }

    #[inline]
    fn cell(&self, row: usize, at: usize) -> usize {
        debug_assert!(at < self.width);
        row * self.width + at
    }
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Runs a pattern against one subject string.
///
/// Memo results accumulate across calls on the same `Matcher`, which is
/// sound because they depend only on the node, the offset and the subject.
#[derive(Debug)]
pub struct Matcher<'a> {
    memory: &'a mut MatcherMemory,
    pattern: &'a Pattern,
    text: &'a str,
}

impl<'a> Matcher<'a> {
    /// The subject string.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Whether the pattern matches anywhere in the subject.
    pub fn is_match(&mut self) -> bool {
        self.find().is_some()
    }

    /// Like [`is_match`](Self::is_match), reporting attempts to `observer`.
    pub fn is_match_with<O: Observer>(&mut self, observer: O) -> Result<bool, O::Break> {
        Ok(self.find_with(observer)?.is_some())
    }

    /// The leftmost match: start offsets are tried in increasing order and
    /// the first one at which the pattern succeeds is reported, together
    /// with the end offset its greedy match reached.
    ///
    /// Anchored patterns only try offset 0.
    pub fn find(&mut self) -> Option<Match> {
        match self.find_with(()) {
            Ok(found) => found,
            Err(never) => match never {},
        }
    }

    /// Like [`find`](Self::find), reporting attempts to `observer`.
    pub fn find_with<O: Observer>(&mut self, mut observer: O) -> Result<Option<Match>, O::Break> {
        let pattern = self.pattern;
        let anchored = pattern.is_anchored();
        let last = if anchored { 0 } else { self.text.len() };
        tracing::debug!(
            nodes = pattern.len(),
            subject_len = self.text.len(),
            anchored,
            "searching"
        );

        for start in 0..=last {
            if let Some(end) = self.attempt(&pattern.root, start, &mut observer)? {
                tracing::debug!(start, end, "match found");
                return Ok(Some(Match::new(start, end)));
            }
        }
        tracing::debug!("no match");
        Ok(None)
    }

    /// The end offset of a match that starts at offset 0.
    ///
    /// Trailing input after the match is allowed unless the pattern ends
    /// with `$`.  `Some(0)` is an empty match, distinct from `None`.
    pub fn match_prefix(&mut self) -> Option<usize> {
        self.attempt_at(0)
    }

    /// Like [`match_prefix`](Self::match_prefix), reporting attempts to
    /// `observer`.
    pub fn match_prefix_with<O: Observer>(&mut self, observer: O) -> Result<Option<usize>, O::Break> {
        self.attempt_at_with(0, observer)
    }

    /// Run the root node at offset `at`.  Offsets past the end never match.
    pub fn attempt_at(&mut self, at: usize) -> Option<usize> {
        match self.attempt_at_with(at, ()) {
            Ok(end) => end,
            Err(never) => match never {},
        }
    }

    /// Like [`attempt_at`](Self::attempt_at), reporting attempts to
    /// `observer`.
    pub fn attempt_at_with<O: Observer>(
        &mut self,
        at: usize,
        mut observer: O,
    ) -> Result<Option<usize>, O::Break> {
        if at > self.text.len() {
            return Ok(None);
        }
        let pattern = self.pattern;
        self.attempt(&pattern.root, at, &mut observer)
    }

    /// Match `node` (and its continuation) at `at`.
    fn attempt<O: Observer>(
        &mut self,
        node: &'a Node,
        at: usize,
        observer: &mut O,
    ) -> Result<Option<usize>, O::Break> {
        if let ControlFlow::Break(b) = observer.on_attempt(node.kind(), at) {
            return Err(b);
        }

        match &node.kind {
            NodeKind::Literal(literal) => {
                let end = at + literal.len();
                if self.text.as_bytes().get(at..end) != Some(literal.as_bytes()) {
                    return Ok(None);
                }
                self.proceed(node, end, observer)
            }
            NodeKind::Start => {
                if at != 0 {
                    return Ok(None);
                }
                self.proceed(node, at, observer)
            }
            NodeKind::End => {
                if at != self.text.len() {
                    return Ok(None);
                }
                self.proceed(node, at, observer)
            }
            NodeKind::Alternation { left, right } => {
                for branch in [left, right] {
                    let Some(after) = self.attempt(branch, at, observer)? else {
                        continue;
                    };
                    let end = match node.rest() {
                        Some(rest) => self.continue_at(rest, after, observer)?,
                        None => Some(after),
                    };
                    if end.is_some() {
                        return Ok(end);
                    }
                }
                Ok(None)
            }
            NodeKind::Repetition { child } => self.repeat(node, child, at, observer),
        }
    }

    /// Run `node`'s continuation at `at`, or succeed at `at` if it has none.
    #[inline]
    fn proceed<O: Observer>(
        &mut self,
        node: &'a Node,
        at: usize,
        observer: &mut O,
    ) -> Result<Option<usize>, O::Break> {
        match node.rest() {
            Some(rest) => self.attempt(rest, at, observer),
            None => Ok(Some(at)),
        }
    }

    /// Greedy `child*` followed by `node`'s continuation, starting at
    /// `start`.
    fn repeat<O: Observer>(
        &mut self,
        node: &'a Node,
        child: &'a Node,
        start: usize,
        observer: &mut O,
    ) -> Result<Option<usize>, O::Break> {
        let row = self.pattern.repeat_slots[node.idx.idx()].get();
        let cell = row.map(|row| self.memory.cell(row, start));
        if let Some(known) = cell.and_then(|cell| self.memory.repeats[cell].get()) {
            return Ok(known);
        }

        let ends = self.closure(child, start, observer)?;
        let mut result = None;
        // Longest first: the last offset discovered needed the most
        // applications of `child`.
        for &pos in ends.iter().rev() {
            let after = match node.rest() {
                Some(rest) => self.continue_at(rest, pos, observer)?,
                None => Some(pos),
            };
            if after.is_some() {
                result = after;
                break;
            }
        }

        if let Some(cell) = cell {
            self.memory.repeats[cell] = Memo::from(result);
        }
        Ok(result)
    }

    /// Every offset reachable from `start` by applying `child` zero or more
    /// times, in discovery order.  `start` itself is always first.
    fn closure<O: Observer>(
        &mut self,
        child: &'a Node,
        start: usize,
        observer: &mut O,
    ) -> Result<IndexSet<usize>, O::Break> {
        let mut ends = IndexSet::new();
        ends.insert(start);
        let mut pos = start;
        while let Some(next) = self.attempt(child, pos, observer)? {
            // A seen offset means the child stopped advancing.
            if !ends.insert(next) {
                break;
            }
            pos = next;
        }
        Ok(ends)
    }

    /// Evaluate the continuation `rest` at `at`, memoized per offset.
    fn continue_at<O: Observer>(
        &mut self,
        rest: &'a Node,
        at: usize,
        observer: &mut O,
    ) -> Result<Option<usize>, O::Break> {
        let Some(row) = self.pattern.rest_slots[rest.idx.idx()].get() else {
            return self.attempt(rest, at, observer);
        };
        let cell = self.memory.cell(row, at);
        if let Some(known) = self.memory.rests[cell].get() {
            return Ok(known);
        }
        let result = self.attempt(rest, at, observer)?;
        self.memory.rests[cell] = Memo::from(result);
        Ok(result)
    }
}
