//! Grammar compiler
//!
//! Turns a [`RuleSet`] into a [`RuleGraph`]. Rules are compiled in
//! generations: terminals first, then every rule whose references are all
//! compiled, shortest body first. When a generation makes no progress the
//! remaining rules contain cycles; these are split into weakly connected
//! components, checked for an escape, and compiled behind
//! [`RuleKind::Cyclic`] placeholders that are bound once their bodies
//! exist.
//!
//! Anonymous constituents are interned by fingerprint, so structurally
//! identical pieces share one rule, and two names with identical bodies
//! end up as aliases of one rule.

use super::analysis;
use super::error::{GrammarError, Result};
use super::fragment::{Fragment, RuleDefinition, RuleSet};
use super::label::{Label, LabelKind};
use super::regex_cache;
use super::repetition::Repetition;
use super::rule::{Rule, RuleGraph, RuleId, RuleKind, TagSet};
use hashbrown::HashMap;
use std::collections::{BTreeSet, VecDeque};

/// Output of compilation
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    pub(crate) graph: RuleGraph,
    pub(crate) root: RuleId,
    pub(crate) root_name: String,
    pub(crate) names: HashMap<String, RuleId>,
    pub(crate) conditions: BTreeSet<String>,
}

/// A built constituent plus the tags it carries to its enclosing position
struct Built {
    id: RuleId,
    tags: TagSet,
}

impl Built {
    fn plain(id: RuleId) -> Self {
        Self {
            id,
            tags: TagSet::new(),
        }
    }
}

/// Compiles one rule set
pub struct Compiler {
    rules: RuleSet,
    graph: RuleGraph,
    names: HashMap<String, RuleId>,
    conditions: BTreeSet<String>,
    root_name: String,
    /// Definition being compiled, for error messages
    current: String,
}

/// Where a fragment sits: `preceding` earlier members of its own sequence,
/// and its position in the nearest enclosing sequence if there is one
#[derive(Clone, Copy)]
struct Position {
    preceding: usize,
    enclosing: Option<usize>,
}

impl Compiler {
    /// Prepare to compile `rules`
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            graph: RuleGraph::new(),
            names: HashMap::new(),
            conditions: BTreeSet::new(),
            root_name: String::new(),
            current: String::new(),
        }
    }

    /// Run the compiler
    pub fn compile(mut self) -> Result<CompiledGrammar> {
        self.root_name = self
            .rules
            .root()
            .ok_or(GrammarError::NoRootFound)?
            .to_string();
        if self.rules.get(&self.root_name).is_none() {
            return Err(GrammarError::NoRootFound);
        }
        let definitions: Vec<RuleDefinition> = self.rules.rules().to_vec();
        let mut seen = BTreeSet::new();
        for def in &definitions {
            if !seen.insert(def.name.as_str()) {
                return Err(GrammarError::DuplicateRule {
                    name: def.name.clone(),
                });
            }
        }

        self.create_deferred(&definitions);

        let mut pending: Vec<&RuleDefinition> = Vec::new();
        for def in &definitions {
            if def.condition.is_none() && def.body.len() == 1 && def.body[0].is_plain_terminal() {
                self.current = def.to_string();
                let built = self.build_fragment(&def.body[0], Position::TOP)?;
                self.bind(&def.name, built.id, 1);
            } else {
                pending.push(def);
            }
        }

        let mut generation = 2;
        while !pending.is_empty() {
            let (mut ready, rest): (Vec<&RuleDefinition>, Vec<&RuleDefinition>) = pending
                .into_iter()
                .partition(|def| def.references().iter().all(|r| self.names.contains_key(r)));
            if ready.is_empty() {
                self.resolve_cycles(&rest, generation)?;
            } else {
                ready.sort_by_key(|def| def.body_text().len());
                log_debug!(
                    "generation {}: {}",
                    generation,
                    ready.iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(", ")
                );
                for def in ready {
                    let id = self.compile_definition(def)?;
                    self.bind(&def.name, id, generation);
                }
            }
            generation += 1;
            pending = rest
                .into_iter()
                .filter(|def| !self.names.contains_key(&def.name))
                .collect();
        }

        let root = self
            .names
            .get(self.root_name.as_str())
            .copied()
            .ok_or(GrammarError::NoRootFound)?;
        analysis::annotate(&mut self.graph);
        Ok(CompiledGrammar {
            graph: self.graph,
            root,
            root_name: self.root_name,
            names: self.names,
            conditions: self.conditions,
        })
    }

    /// Placeholders for every name used but never defined
    fn create_deferred(&mut self, definitions: &[RuleDefinition]) {
        let mut undefined = BTreeSet::new();
        for def in definitions {
            for name in def.references() {
                if self.rules.get(&name).is_none() {
                    undefined.insert(name);
                }
            }
        }
        for name in undefined {
            let mut rule = Rule::new(
                RuleKind::Deferred {
                    name: name.clone(),
                    target: None,
                },
                Label::new(LabelKind::Indeterminate, name.clone()),
                format!("<{}>", name),
            );
            rule.generation = 0;
            let id = self.graph.push(rule);
            self.names.insert(name, id);
        }
    }

    fn label_kind(&self, name: &str) -> LabelKind {
        if name == self.root_name {
            LabelKind::Root
        } else {
            LabelKind::Explicit
        }
    }

    fn bind(&mut self, name: &str, id: RuleId, generation: i32) {
        let kind = self.label_kind(name);
        self.graph.bind_name(id, name, kind, generation);
        self.names.insert(name.to_string(), id);
    }

    fn resolve_cycles(&mut self, rest: &[&RuleDefinition], generation: i32) -> Result<()> {
        let deps: HashMap<String, BTreeSet<String>> = rest
            .iter()
            .map(|def| {
                let uncompiled = def
                    .references()
                    .into_iter()
                    .filter(|r| !self.names.contains_key(r))
                    .collect();
                (def.name.clone(), uncompiled)
            })
            .collect();

        let mut remaining: BTreeSet<String> = deps.keys().cloned().collect();
        remove_strictly_dominating(&mut remaining, &deps);

        for component in separate_cycles(&remaining, &deps) {
            let members: Vec<&RuleDefinition> = rest
                .iter()
                .copied()
                .filter(|def| component.contains(&def.name))
                .collect();
            let has_escape = members
                .iter()
                .any(|def| def.body.iter().any(|f| escapes(f, &component)));
            if !has_escape {
                return Err(GrammarError::UnescapableCycle {
                    rules: component.iter().map(|n| format!("<{}>", n)).collect(),
                });
            }
            log_debug!(
                "resolving cycle {:?} at generation {}",
                component,
                generation
            );

            let mut placeholders = Vec::with_capacity(members.len());
            for def in &members {
                let mut rule = Rule::new(
                    RuleKind::Cyclic {
                        name: def.name.clone(),
                        target: None,
                    },
                    Label::new(self.label_kind(&def.name), def.name.clone()),
                    format!("<{}>", def.name),
                );
                rule.generation = generation;
                let id = self.graph.push(rule);
                self.names.insert(def.name.clone(), id);
                placeholders.push(id);
            }
            for (def, placeholder) in members.iter().zip(placeholders) {
                let body = self.compile_definition(def)?;
                if !self.graph.get(body).kind.is_placeholder() {
                    let kind = self.label_kind(&def.name);
                    self.graph.bind_name(body, &def.name, kind, generation);
                }
                bind_placeholder(&mut self.graph, placeholder, body)?;
            }
        }
        Ok(())
    }

    fn compile_definition(&mut self, def: &RuleDefinition) -> Result<RuleId> {
        self.current = def.to_string();
        let mut id = self.build_sequence(&def.body, None)?.id;
        if let Some(condition) = &def.condition {
            self.conditions.extend(condition.names());
            id = self.graph.intern(RuleKind::Conditional {
                inner: id,
                condition: condition.clone(),
            });
        }
        Ok(id)
    }

    /// `enclosing` is the position of this list in the nearest enclosing
    /// sequence; a list of several fragments is a sequence itself
    fn build_sequence(&mut self, fragments: &[Fragment], enclosing: Option<usize>) -> Result<Built> {
        match fragments {
            [] => Err(GrammarError::ill_formed(self.current.as_str(), "empty rule body")),
            [single] => self.build_fragment(
                single,
                Position {
                    preceding: 0,
                    enclosing,
                },
            ),
            _ => {
                let mut items = Vec::with_capacity(fragments.len());
                let mut tags = Vec::with_capacity(fragments.len());
                for (i, f) in fragments.iter().enumerate() {
                    let at = Position {
                        preceding: i,
                        enclosing: Some(i),
                    };
                    let built = self.build_fragment(f, at)?;
                    items.push(built.id);
                    tags.push(built.tags);
                }
                Ok(Built::plain(
                    self.graph.intern(RuleKind::Sequence { items, tags }),
                ))
            }
        }
    }

    fn build_fragment(&mut self, fragment: &Fragment, at: Position) -> Result<Built> {
        match fragment {
            Fragment::Reference { name, repetition } => {
                let id = *self
                    .names
                    .get(name)
                    .ok_or_else(|| GrammarError::ill_formed(format!("<{}>", name), "unknown rule"))?;
                Ok(self.repeat(id, *repetition, TagSet::new()))
            }
            Fragment::Literal { text, repetition } => {
                let id = self.graph.intern(RuleKind::Literal { text: text.clone() });
                Ok(self.repeat(id, *repetition, TagSet::new()))
            }
            Fragment::Regex {
                pattern,
                flags,
                repetition,
            } => {
                let regex = regex_cache::get_or_compile(pattern, flags)?;
                let id = self.graph.intern(RuleKind::Regex {
                    pattern: pattern.clone(),
                    flags: *flags,
                    regex,
                });
                Ok(self.repeat(id, *repetition, TagSet::new()))
            }
            Fragment::Group {
                alternatives,
                tags,
                repetition,
            } => {
                let inner = if alternatives.len() == 1 {
                    self.build_sequence(&alternatives[0], at.enclosing)?
                } else {
                    self.build_alternation(alternatives, at.enclosing)?
                };
                let mut all_tags = inner.tags;
                all_tags.extend(tags.iter().cloned());
                Ok(self.repeat(inner.id, *repetition, all_tags))
            }
            Fragment::Assertion {
                positive,
                forward,
                inner,
            } => {
                let subject = self.build_fragment(inner, at)?.id;
                let run = if *forward {
                    subject
                } else {
                    reverse(&mut self.graph, subject)?
                };
                Ok(Built::plain(self.graph.intern(RuleKind::Assertion {
                    subject,
                    run,
                    positive: *positive,
                    forward: *forward,
                })))
            }
            Fragment::BackReference { index } => {
                if *index > at.preceding && *index > 0 {
                    return Err(GrammarError::bad_back_reference(
                        self.current.as_str(),
                        format!("back reference {} is too big", index),
                    ));
                }
                let index = zero_based(*index, fragment)?;
                Ok(Built::plain(
                    self.graph.intern(RuleKind::BackReference { index }),
                ))
            }
            Fragment::UpLevelBackReference { index, repetition } => {
                let reason = match at.enclosing {
                    None => Some(format!("{}^ is not inside a sequence", index)),
                    Some(p) if *index == p + 1 => {
                        Some(format!("{}^ references its own position", index))
                    }
                    Some(p) if *index > p + 1 => {
                        Some(format!("{}^ references position after its own", index))
                    }
                    Some(_) => None,
                };
                if let Some(reason) = reason.filter(|_| *index > 0) {
                    return Err(GrammarError::bad_back_reference(
                        self.current.as_str(),
                        reason,
                    ));
                }
                let index = zero_based(*index, fragment)?;
                let id = self
                    .graph
                    .intern(RuleKind::UpLevelBackReference { index });
                Ok(self.repeat(id, *repetition, TagSet::new()))
            }
            Fragment::Barrier { double } => Ok(Built::plain(
                self.graph.intern(RuleKind::Barrier { double: *double }),
            )),
        }
    }

    /// Alternatives that build to the same rule collapse into one position
    /// carrying the union of their tags
    fn build_alternation(
        &mut self,
        alternatives: &[Vec<Fragment>],
        enclosing: Option<usize>,
    ) -> Result<Built> {
        let mut ids: Vec<RuleId> = Vec::with_capacity(alternatives.len());
        let mut tags: Vec<TagSet> = Vec::with_capacity(alternatives.len());
        for alt in alternatives {
            let built = self.build_sequence(alt, enclosing)?;
            match ids.iter().position(|id| *id == built.id) {
                Some(pos) => tags[pos].extend(built.tags),
                None => {
                    ids.push(built.id);
                    tags.push(built.tags);
                }
            }
        }
        if ids.len() == 1 {
            return Ok(Built {
                id: ids[0],
                tags: tags.pop().unwrap_or_default(),
            });
        }
        Ok(Built::plain(self.graph.intern(RuleKind::Alternation {
            alternatives: ids,
            tags,
        })))
    }

    fn repeat(&mut self, id: RuleId, repetition: Repetition, tags: TagSet) -> Built {
        if repetition.is_redundant() {
            return Built { id, tags };
        }
        Built::plain(self.graph.intern(RuleKind::Repetition {
            inner: id,
            repetition,
            tags,
        }))
    }
}

impl Position {
    const TOP: Position = Position {
        preceding: 0,
        enclosing: None,
    };
}

fn zero_based(index: usize, fragment: &Fragment) -> Result<usize> {
    index.checked_sub(1).ok_or_else(|| {
        GrammarError::bad_back_reference(
            fragment.to_string(),
            "back references must be greater than 0",
        )
    })
}

/// Drop rules nothing else in the set depends on, until none remain to drop
fn remove_strictly_dominating(
    remaining: &mut BTreeSet<String>,
    deps: &HashMap<String, BTreeSet<String>>,
) {
    loop {
        let depended: BTreeSet<String> = remaining
            .iter()
            .filter_map(|n| deps.get(n))
            .flatten()
            .filter(|d| remaining.contains(*d))
            .cloned()
            .collect();
        let before = remaining.len();
        remaining.retain(|n| depended.contains(n));
        if remaining.len() == before {
            return;
        }
    }
}

/// Split the cyclic remainder into weakly connected components
///
/// Each search starts from the rule with the fewest dependencies.
fn separate_cycles(
    remaining: &BTreeSet<String>,
    deps: &HashMap<String, BTreeSet<String>>,
) -> Vec<BTreeSet<String>> {
    let mut neighbours: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for name in remaining {
        for dep in deps.get(name).into_iter().flatten() {
            if remaining.contains(dep) {
                neighbours.entry(name.as_str()).or_default().insert(dep.as_str());
                neighbours.entry(dep.as_str()).or_default().insert(name.as_str());
            }
        }
    }
    let dependency_count = |n: &str| {
        deps.get(n)
            .map_or(0, |d| d.iter().filter(|x| remaining.contains(*x)).count())
    };

    let mut unassigned: BTreeSet<&str> = remaining.iter().map(String::as_str).collect();
    let mut components = Vec::new();
    while let Some(start) = unassigned
        .iter()
        .copied()
        .min_by_key(|n| (dependency_count(*n), *n))
    {
        let mut component = BTreeSet::new();
        let mut queue = VecDeque::from([start]);
        unassigned.remove(start);
        while let Some(n) = queue.pop_front() {
            component.insert(n.to_string());
            for next in neighbours.get(n).into_iter().flatten() {
                if unassigned.remove(next) {
                    queue.push_back(*next);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Whether a fragment offers a way out of the cycle `members`
fn escapes(fragment: &Fragment, members: &BTreeSet<String>) -> bool {
    match fragment {
        Fragment::Reference { name, repetition } => {
            !members.contains(name) || repetition.lower == 0
        }
        Fragment::Literal { .. }
        | Fragment::Regex { .. }
        | Fragment::BackReference { .. }
        | Fragment::UpLevelBackReference { .. } => true,
        Fragment::Group {
            alternatives,
            repetition,
            ..
        } => {
            repetition.lower == 0
                || alternatives
                    .iter()
                    .any(|alt| alt.iter().any(|f| escapes(f, members)))
        }
        Fragment::Assertion { inner, .. } => escapes(inner, members),
        Fragment::Barrier { .. } => false,
    }
}

/// Fill a placeholder's slot
///
/// A reversed twin created earlier for a lookbehind is filled too.
pub(crate) fn bind_placeholder(graph: &mut RuleGraph, placeholder: RuleId, target: RuleId) -> Result<()> {
    let rule = graph.get_mut(placeholder);
    match &mut rule.kind {
        RuleKind::Cyclic { name, target: slot } => {
            if slot.is_some() {
                return Err(GrammarError::CyclicRuleAlreadyResolved { name: name.clone() });
            }
            *slot = Some(target);
        }
        RuleKind::Deferred { name, target: slot } => {
            if slot.is_some() {
                return Err(GrammarError::AlreadyDefined { name: name.clone() });
            }
            *slot = Some(target);
        }
        _ => {
            return Err(GrammarError::AlreadyDefined {
                name: rule.label.id.clone(),
            })
        }
    }
    if let Some(twin) = graph.reversals.get(&placeholder).copied() {
        if twin != placeholder && graph.get(twin).is_reversed() {
            let reversed = reverse(graph, target)?;
            set_target(graph, twin, reversed);
        }
    }
    Ok(())
}

fn set_target(graph: &mut RuleGraph, placeholder: RuleId, value: RuleId) {
    if let RuleKind::Cyclic { target, .. } | RuleKind::Deferred { target, .. } =
        &mut graph.get_mut(placeholder).kind
    {
        *target = Some(value);
    }
}

/// The rule that matches the character-reversed language of `id`
///
/// Results are memoized in both directions, so reversing a reversed rule
/// gives back the original.
pub(crate) fn reverse(graph: &mut RuleGraph, id: RuleId) -> Result<RuleId> {
    if let Some(reversed) = graph.reversals.get(&id) {
        return Ok(*reversed);
    }
    let cannot = |graph: &RuleGraph| GrammarError::CannotReverse {
        rule: graph.display_name(id),
    };
    let kind = graph.get(id).kind.clone();
    let reversed = match kind.clone() {
        RuleKind::Literal { text } => graph.intern_reversed(
            RuleKind::Literal {
                text: text.chars().rev().collect(),
            },
            id,
        ),
        RuleKind::Regex { flags, .. } => {
            if !flags.reversible {
                return Err(cannot(graph));
            }
            id
        }
        RuleKind::Alternation { alternatives, tags } => {
            let alternatives = alternatives
                .into_iter()
                .map(|a| reverse(graph, a))
                .collect::<Result<Vec<_>>>()?;
            graph.intern_reversed(RuleKind::Alternation { alternatives, tags }, id)
        }
        RuleKind::Sequence { items, tags } => reverse_sequence(graph, id, items, tags)?,
        RuleKind::Repetition {
            inner,
            repetition,
            tags,
        } => {
            let inner = reverse(graph, inner)?;
            graph.intern_reversed(
                RuleKind::Repetition {
                    inner,
                    repetition,
                    tags,
                },
                id,
            )
        }
        // reading backward flips the direction an assertion looks in
        RuleKind::Assertion {
            subject,
            run,
            positive,
            forward,
        } => {
            let target = if forward { subject } else { run };
            graph.intern_reversed(
                RuleKind::Assertion {
                    subject: target,
                    run: target,
                    positive,
                    forward: !forward,
                },
                id,
            )
        }
        RuleKind::Barrier { .. } => id,
        RuleKind::Conditional { inner, condition } => {
            let inner = reverse(graph, inner)?;
            graph.intern_reversed(RuleKind::Conditional { inner, condition }, id)
        }
        RuleKind::BackReference { .. } | RuleKind::UpLevelBackReference { .. } => {
            return Err(cannot(graph))
        }
        RuleKind::Cyclic { ref name, target } | RuleKind::Deferred { ref name, target } => {
            let twin_kind = if matches!(kind, RuleKind::Cyclic { .. }) {
                RuleKind::Cyclic {
                    name: name.clone(),
                    target: None,
                }
            } else {
                RuleKind::Deferred {
                    name: name.clone(),
                    target: None,
                }
            };
            let fingerprint = format!("<{}>:r", name);
            let mut twin = Rule::new(twin_kind, Label::implicit(fingerprint.clone()), fingerprint);
            twin.reversed_from = Some(id);
            let twin = graph.push(twin);
            graph.reversals.insert(id, twin);
            graph.reversals.insert(twin, id);
            if let Some(t) = target {
                let reversed_target = reverse(graph, t)?;
                set_target(graph, twin, reversed_target);
            }
            return Ok(twin);
        }
    };
    graph.reversals.insert(id, reversed);
    graph.reversals.entry(reversed).or_insert(id);
    Ok(reversed)
}

/// Reverse a sequence so every plain back reference still points backward
///
/// A referent and the references to it form a group. In reading order the
/// last member of each group takes the referent and the others become
/// references to it; after reversal that member comes first.
fn reverse_sequence(
    graph: &mut RuleGraph,
    id: RuleId,
    items: Vec<RuleId>,
    tags: Vec<TagSet>,
) -> Result<RuleId> {
    let n = items.len();
    let referent_of = |graph: &RuleGraph, mut pos: usize| -> usize {
        while let RuleKind::BackReference { index } = graph.get(items[pos]).kind {
            if index >= pos {
                break;
            }
            pos = index;
        }
        pos
    };

    // source position for each slot, or the slot a back reference copies
    let mut arranged: Vec<std::result::Result<usize, usize>> = (0..n).map(Ok).collect();
    let mut last_in_group: HashMap<usize, usize> = HashMap::new();
    for pos in 0..n {
        if matches!(graph.get(items[pos]).kind, RuleKind::BackReference { .. }) {
            let referent = referent_of(graph, pos);
            let last = last_in_group.entry(referent).or_insert(referent);
            *last = (*last).max(pos);
        }
    }
    for (&referent, &last) in &last_in_group {
        for pos in referent..=last {
            let member = pos == referent
                || (matches!(graph.get(items[pos]).kind, RuleKind::BackReference { .. })
                    && referent_of(graph, pos) == referent);
            if member {
                arranged[pos] = if pos == last {
                    Ok(referent)
                } else {
                    Err(n - 1 - last)
                };
            }
        }
    }

    let mut reversed_items = Vec::with_capacity(n);
    let mut reversed_tags = Vec::with_capacity(n);
    for pos in (0..n).rev() {
        let item = match arranged[pos] {
            Ok(source) => reverse(graph, items[source])?,
            Err(index) => graph.intern(RuleKind::BackReference { index }),
        };
        reversed_items.push(item);
        reversed_tags.push(tags.get(pos).cloned().unwrap_or_default());
    }
    Ok(graph.intern_reversed(
        RuleKind::Sequence {
            items: reversed_items,
            tags: reversed_tags,
        },
        id,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(text: &str) -> Result<CompiledGrammar> {
        Compiler::new(RuleSet::parse(text)?).compile()
    }

    fn id(c: &CompiledGrammar, name: &str) -> RuleId {
        c.names[name]
    }

    #[test]
    fn test_generations() {
        let c = compile("ROOT = <a> <b>\na = 'a'\nb = <a>+ 'c'").unwrap();
        assert_eq!(c.graph.get(id(&c, "a")).generation(), 1);
        assert_eq!(c.graph.get(id(&c, "b")).generation(), 2);
        assert_eq!(c.graph.get(c.root).generation(), 3);
        assert_eq!(c.graph.get(c.root).label().kind, LabelKind::Root);
    }

    #[test]
    fn test_deferred_generation_zero() {
        let c = compile("ROOT = <later> 'x'").unwrap();
        let later = c.graph.get(id(&c, "later"));
        assert_eq!(later.generation(), 0);
        assert!(matches!(later.kind(), RuleKind::Deferred { target: None, .. }));
    }

    #[test]
    fn test_identical_bodies_become_aliases() {
        let c = compile("ROOT = <a> <b>\na = 'x'\nb = 'x'").unwrap();
        assert_eq!(id(&c, "a"), id(&c, "b"));
        let names: Vec<String> = c.graph.names_of(id(&c, "a")).into_iter().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_reference_alias() {
        let c = compile("ROOT = <a>\na = 'x'").unwrap();
        assert_eq!(c.root, id(&c, "a"));
        assert_eq!(c.graph.name(c.root), Some("a"));
        assert!(c.graph.names_of(c.root).contains("ROOT"));
    }

    #[test]
    fn test_anonymous_dedup() {
        let c = compile("ROOT = [ 'a' 'b' ] [ 'a' 'b' ]").unwrap();
        match c.graph.get(c.root).kind() {
            RuleKind::Sequence { items, .. } => assert_eq!(items[0], items[1]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cycle_resolution() {
        let c = compile("ROOT = '(' <ROOT> ')' | 'x'").unwrap();
        let placeholder = c.graph.get(c.root);
        match placeholder.kind() {
            RuleKind::Cyclic { target: Some(t), .. } => {
                assert!(matches!(c.graph.get(*t).kind(), RuleKind::Alternation { .. }));
                assert_eq!(c.graph.get(*t).label().id, "ROOT");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mutual_recursion() {
        let c = compile("ROOT = <a>\na = 'x' <b> | 'y'\nb = 'z' <a>").unwrap();
        assert!(matches!(
            c.graph.get(id(&c, "a")).kind(),
            RuleKind::Cyclic { target: Some(_), .. }
        ));
        assert!(matches!(
            c.graph.get(id(&c, "b")).kind(),
            RuleKind::Cyclic { target: Some(_), .. }
        ));
    }

    #[test]
    fn test_unescapable_cycle() {
        let err = compile("ROOT = <a>\na = <b>\nb = <a>").unwrap_err();
        assert_eq!(
            err,
            GrammarError::UnescapableCycle {
                rules: vec!["<a>".into(), "<b>".into()]
            }
        );
    }

    #[test]
    fn test_optional_reference_escapes() {
        assert!(compile("ROOT = <ROOT>? <ROOT>").is_ok());
    }

    #[test]
    fn test_no_root() {
        assert_eq!(
            Compiler::new(RuleSet::new()).compile().unwrap_err(),
            GrammarError::NoRootFound
        );
        let mut rs = RuleSet::parse("a = 'x'").unwrap();
        rs.set_root("missing");
        assert_eq!(Compiler::new(rs).compile().unwrap_err(), GrammarError::NoRootFound);
    }

    #[test]
    fn test_conditions_collected() {
        let c = compile("ROOT = /\\d+/ (big & !odd)").unwrap();
        let names: Vec<&str> = c.conditions.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["big", "odd"]);
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            compile("ROOT = /[/").unwrap_err(),
            GrammarError::InvalidRegex { .. }
        ));
    }

    #[test]
    fn test_reverse_literal_and_sequence() {
        let c = compile("ROOT = ~-[ 'ab' 'c' ] 'd'").unwrap();
        let mut graph = c.graph.clone();
        let assertion = match graph.get(c.root).kind() {
            RuleKind::Sequence { items, .. } => items[0],
            other => panic!("unexpected {:?}", other),
        };
        let run = match graph.get(assertion).kind() {
            RuleKind::Assertion { run, forward, .. } => {
                assert!(!forward);
                *run
            }
            other => panic!("unexpected {:?}", other),
        };
        match graph.get(run).kind() {
            RuleKind::Sequence { items, .. } => {
                assert!(matches!(graph.get(items[0]).kind(), RuleKind::Literal { text } if text == "c"));
                assert!(matches!(graph.get(items[1]).kind(), RuleKind::Literal { text } if text == "ba"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(graph.origin(run), graph.reversals[&run]);
        let back = reverse(&mut graph, run).unwrap();
        assert_eq!(graph.reversals[&run], back);
    }

    #[test]
    fn test_reverse_swaps_back_reference() {
        let c = compile("ROOT = ~-[ /a+/r 'x' 1 ] 'y'").unwrap();
        let seq = c
            .graph
            .iter()
            .find(|(_, r)| r.is_reversed() && matches!(r.kind(), RuleKind::Sequence { .. }))
            .map(|(id, _)| id)
            .unwrap();
        match c.graph.get(seq).kind() {
            RuleKind::Sequence { items, .. } => {
                assert!(matches!(c.graph.get(items[0]).kind(), RuleKind::Regex { .. }));
                assert!(matches!(c.graph.get(items[2]).kind(), RuleKind::BackReference { index: 0 }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reverse_several_back_references() {
        let c = compile("ROOT = ~-[ 'a' 1 'b' 1 ] 'c'").unwrap();
        let seq = c
            .graph
            .iter()
            .find(|(_, r)| r.is_reversed() && matches!(r.kind(), RuleKind::Sequence { .. }))
            .map(|(id, _)| id)
            .unwrap();
        let kinds: Vec<&RuleKind> = match c.graph.get(seq).kind() {
            RuleKind::Sequence { items, .. } => items.iter().map(|i| c.graph.get(*i).kind()).collect(),
            other => panic!("unexpected {:?}", other),
        };
        assert!(matches!(kinds[0], RuleKind::Literal { text } if text == "a"));
        assert!(matches!(kinds[1], RuleKind::Literal { text } if text == "b"));
        assert!(matches!(kinds[2], RuleKind::BackReference { index: 0 }));
        assert!(matches!(kinds[3], RuleKind::BackReference { index: 0 }));
    }

    #[test]
    fn test_reverse_chained_back_references() {
        let c = compile("ROOT = ~-[ /[a-z]/r 1 2 ] 'c'").unwrap();
        let seq = c
            .graph
            .iter()
            .find(|(_, r)| r.is_reversed() && matches!(r.kind(), RuleKind::Sequence { .. }))
            .map(|(id, _)| id)
            .unwrap();
        match c.graph.get(seq).kind() {
            RuleKind::Sequence { items, .. } => {
                assert!(matches!(c.graph.get(items[0]).kind(), RuleKind::Regex { .. }));
                assert!(matches!(c.graph.get(items[1]).kind(), RuleKind::BackReference { index: 0 }));
                assert!(matches!(c.graph.get(items[2]).kind(), RuleKind::BackReference { index: 0 }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    fn compile_fragments(body: Vec<Fragment>) -> Result<CompiledGrammar> {
        let rules = RuleSet::new().rule(RuleDefinition::new("ROOT", body))?;
        Compiler::new(rules).compile()
    }

    #[test]
    fn test_back_reference_range_checked() {
        let too_big = compile_fragments(vec![
            Fragment::literal("a"),
            Fragment::literal("b"),
            Fragment::BackReference { index: 7 },
        ]);
        assert!(matches!(too_big, Err(GrammarError::BadBackReference { .. })));

        let alone = compile_fragments(vec![Fragment::BackReference { index: 1 }]);
        assert!(matches!(alone, Err(GrammarError::BadBackReference { .. })));

        let zero = compile_fragments(vec![
            Fragment::literal("a"),
            Fragment::BackReference { index: 0 },
        ]);
        assert!(matches!(zero, Err(GrammarError::BadBackReference { .. })));

        let ok = compile_fragments(vec![
            Fragment::literal("a"),
            Fragment::BackReference { index: 1 },
        ]);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_up_level_position_checked() {
        let up = |index| Fragment::UpLevelBackReference {
            index,
            repetition: Repetition::ONCE,
        };
        let outside = compile_fragments(vec![up(1)]);
        assert!(matches!(outside, Err(GrammarError::BadBackReference { .. })));

        let own = compile_fragments(vec![
            Fragment::literal("a"),
            Fragment::group(vec![vec![up(2)], vec![Fragment::literal("b")]]),
        ]);
        assert!(matches!(own, Err(GrammarError::BadBackReference { .. })));

        let fine = compile_fragments(vec![
            Fragment::literal("a"),
            Fragment::group(vec![vec![up(1)], vec![Fragment::literal("b")]]),
        ]);
        assert!(fine.is_ok());
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let json = r#"{"root":null,"rules":[
            {"name":"a","body":[],"condition":null},
            {"name":"a","body":[],"condition":null}]}"#;
        let rules: RuleSet = serde_json::from_str(json).unwrap();
        assert_eq!(
            Compiler::new(rules).compile().unwrap_err(),
            GrammarError::DuplicateRule { name: "a".into() }
        );
    }

    #[test]
    fn test_cannot_reverse() {
        assert!(matches!(
            compile("ROOT = ~-/a/ 'b'").unwrap_err(),
            GrammarError::CannotReverse { .. }
        ));
        assert!(matches!(
            compile("ROOT = ~-[ 'a' 1^ ] 'b'").unwrap_err(),
            GrammarError::CannotReverse { .. }
        ));
        assert!(compile("ROOT = ~-/a/r 'b'").is_ok());
    }

    #[test]
    fn test_reversed_cyclic_placeholder() {
        let c = compile("ROOT = 'x' ~-<p>\np = 'a' <p> | 'b'").unwrap();
        let twin = c
            .graph
            .iter()
            .find(|(_, r)| r.is_reversed() && matches!(r.kind(), RuleKind::Cyclic { .. }))
            .map(|(id, _)| id)
            .unwrap();
        assert!(matches!(
            c.graph.get(twin).kind(),
            RuleKind::Cyclic { target: Some(_), .. }
        ));
    }

    #[test]
    fn test_bind_placeholder_once() {
        let mut c = compile("ROOT = <later>").unwrap();
        let later = id(&c, "later");
        let lit = c.graph.intern(RuleKind::Literal { text: "x".into() });
        bind_placeholder(&mut c.graph, later, lit).unwrap();
        assert_eq!(
            bind_placeholder(&mut c.graph, later, lit).unwrap_err(),
            GrammarError::AlreadyDefined { name: "later".into() }
        );
    }

    #[test]
    fn test_escapes() {
        let members: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        assert!(!escapes(&Fragment::reference("a"), &members));
        assert!(escapes(&Fragment::reference("b"), &members));
        assert!(escapes(&Fragment::reference("a").repeated(Repetition::STAR), &members));
        assert!(!escapes(&Fragment::Barrier { double: false }, &members));
        assert!(escapes(
            &Fragment::group(vec![vec![Fragment::reference("a")], vec![Fragment::literal("x")]]),
            &members
        ));
    }
}
