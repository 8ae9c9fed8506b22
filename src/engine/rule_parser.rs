//! Textual rule syntax
//!
//! Turns grammar text into a [`RuleSet`]. One rule per line:
//!
//! ```text
//! # comment
//! ROOT = <word> [ ',' <word> ]*      # a comma-separated list
//! word = /\w+/
//! <quoted> = ['"' | "'"] /[^'"]*/ 1  (nonempty)
//! ```
//!
//! Body elements:
//!
//! | syntax | meaning |
//! |---|---|
//! | `'..'` `".."` | literal, backslash escapes |
//! | `/../flags` | regex; flags `r i s m d u x` |
//! | `<name>` | reference |
//! | `[ {t1,t2} a b \| c ]` | group with optional tags |
//! | `* + ? {n} {n,} {,m} {n,m}` | repetition, then `+` possessive or `?` stingy |
//! | `:` `::` | backtracking barriers |
//! | `~` `!` `~-` `!-` `~+` `!+` | assertions on the next element |
//! | `N` | back reference to the Nth element of this sequence |
//! | `N^` | back reference to the nearest enclosing sequence, repeatable |
//! | `( expr )` | trailing condition |
//!
//! The first rule is the root.

use super::condition::ConditionExpr;
use super::error::{GrammarError, Result};
use super::fragment::{Fragment, RegexFlags, RuleDefinition, RuleSet};
use super::repetition::Repetition;
use super::source_location::SourcePosition;
use std::collections::BTreeSet;

/// Parse a whole grammar
pub fn parse_rules(text: &str) -> Result<RuleSet> {
    let mut set = RuleSet::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if let Some(def) = parse_line(text, offset, trimmed)? {
            set.add(def)?;
        }
        offset += line.len();
    }
    if set.is_empty() {
        return Err(GrammarError::NoRootFound);
    }
    Ok(set)
}

/// Parse a single rule line; blank and comment lines yield `None`
pub fn parse_rule(line: &str) -> Result<Option<RuleDefinition>> {
    parse_line(line, 0, line)
}

fn parse_line(source: &str, base: usize, line: &str) -> Result<Option<RuleDefinition>> {
    let body_start = line.len() - line.trim_start().len();
    let rest = &line[body_start..];
    if rest.is_empty() || rest.starts_with('#') {
        return Ok(None);
    }
    let Some(eq) = rest.find('=') else {
        return Err(GrammarError::ill_formed(line, "expected '='"));
    };
    let raw_name = rest[..eq].trim();
    let name = raw_name
        .strip_prefix('<')
        .and_then(|n| n.strip_suffix('>'))
        .unwrap_or(raw_name);
    if name.is_empty() || !name.chars().all(is_word_char) {
        return Err(GrammarError::ill_formed(line, "bad rule name"));
    }
    let body_offset = body_start + eq + 1;
    let mut parser = BodyParser {
        source,
        line,
        base: base + body_offset,
        body: &line[body_offset..],
        pos: 0,
    };
    let (alternatives, condition) = parser.alternatives(None)?;
    let mut body = if alternatives.len() == 1 {
        alternatives.into_iter().next().unwrap_or_default()
    } else {
        vec![Fragment::group(alternatives)]
    };
    check_barriers(&body, line)?;
    check_up_level(&mut body, None, line)?;
    let mut def = RuleDefinition::new(name, body);
    def.condition = condition;
    Ok(Some(def))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

struct BodyParser<'a> {
    source: &'a str,
    line: &'a str,
    base: usize,
    body: &'a str,
    pos: usize,
}

impl<'a> BodyParser<'a> {
    fn error(&self, reason: impl Into<String>) -> GrammarError {
        let position = SourcePosition::from_offset(self.source, self.base + self.pos);
        GrammarError::ill_formed(
            self.line,
            format!("{} at {}", reason.into(), position),
        )
    }

    fn peek(&self) -> Option<char> {
        self.body[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        let rest = &self.body[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn repetition(&mut self) -> Result<Repetition> {
        match Repetition::parse_suffix(&self.body[self.pos..]) {
            Ok((rep, used)) => {
                self.pos += used;
                Ok(rep)
            }
            Err(reason) => Err(self.error(reason)),
        }
    }

    /// Alternatives up to `close` (or end of line), plus a trailing condition
    fn alternatives(&mut self, close: Option<char>) -> Result<(Vec<Vec<Fragment>>, Option<ConditionExpr>)> {
        let mut alternatives: Vec<Vec<Fragment>> = vec![Vec::new()];
        let mut condition = None;
        let mut closed = false;
        loop {
            self.skip_ws();
            let Some(c) = self.peek() else { break };
            if Some(c) == close {
                self.pos += 1;
                closed = true;
                break;
            }
            match c {
                '|' => {
                    if alternatives.last().is_some_and(|a| a.is_empty()) {
                        return Err(self.error("empty alternative"));
                    }
                    self.pos += 1;
                    alternatives.push(Vec::new());
                }
                '#' if close.is_none() => break,
                '(' if close.is_none() => {
                    if alternatives.iter().all(|a| a.is_empty()) {
                        return Err(self.error("condition without rule"));
                    }
                    condition = Some(self.condition()?);
                    self.skip_ws();
                    if !matches!(self.peek(), None | Some('#')) {
                        return Err(self.error(
                            "no content other than a comment permitted after a condition",
                        ));
                    }
                    break;
                }
                ':' => {
                    let count = self.body[self.pos..].chars().take_while(|&c| c == ':').count();
                    if count > 2 {
                        return Err(self.error("too many colons; barriers must appear singly"));
                    }
                    let current = alternatives.last().map_or(0, Vec::len);
                    if count == 1 && current == 0 {
                        return Err(self.error("':' is redundant as the first element of a sequence"));
                    }
                    self.pos += count;
                    push(&mut alternatives, Fragment::Barrier { double: count == 2 });
                }
                _ => {
                    let preceding = alternatives.last().map_or(0, Vec::len);
                    let frag = self.element(preceding)?;
                    push(&mut alternatives, frag);
                }
            }
        }
        if let Some(close) = close {
            if !closed {
                return Err(self.error(format!("could not find closing '{}'", close)));
            }
        }
        if alternatives.last().is_some_and(|a| a.is_empty()) {
            return Err(self.error(if alternatives.len() == 1 {
                "empty rule body"
            } else {
                "empty alternative"
            }));
        }
        Ok((alternatives, condition))
    }

    /// One element other than a barrier; `preceding` counts the earlier
    /// members of the current sequence
    fn element(&mut self, preceding: usize) -> Result<Fragment> {
        let Some(c) = self.peek() else {
            return Err(self.error("unexpected end of rule"));
        };
        match c {
            '[' => {
                self.pos += 1;
                self.skip_ws();
                let tags = self.tags()?;
                let (mut alternatives, _) = self.alternatives(Some(']'))?;
                let repetition = self.repetition()?;
                if repetition.is_redundant()
                    && tags.is_empty()
                    && alternatives.len() == 1
                    && alternatives[0].len() == 1
                {
                    // [ x ] is just x
                    return Ok(alternatives.remove(0).remove(0));
                }
                Ok(Fragment::Group {
                    alternatives,
                    tags,
                    repetition,
                })
            }
            '/' => self.regex(),
            '"' | '\'' => {
                let text = self.literal(c)?;
                let repetition = self.repetition()?;
                Ok(Fragment::Literal { text, repetition })
            }
            '<' => {
                let rest = &self.body[self.pos + 1..];
                let Some(end) = rest.find('>') else {
                    return Err(self.error("unterminated rule reference"));
                };
                let name = &rest[..end];
                if name.is_empty() || !name.chars().all(is_word_char) {
                    return Err(self.error("bad rule reference"));
                }
                self.pos += end + 2;
                let repetition = self.repetition()?;
                Ok(Fragment::Reference {
                    name: name.to_string(),
                    repetition,
                })
            }
            '~' | '!' => self.assertion(preceding),
            c if c.is_ascii_digit() => self.back_reference(preceding),
            _ => Err(self.error(format!("unexpected character '{}'", c))),
        }
    }

    fn assertion(&mut self, preceding: usize) -> Result<Fragment> {
        let positive = self.peek() == Some('~');
        self.pos += 1;
        let mut forward = true;
        match self.peek() {
            Some('+') => self.pos += 1,
            Some('-') => {
                forward = false;
                self.pos += 1;
            }
            _ => {}
        }
        self.skip_ws();
        match self.peek() {
            None | Some('|') | Some(']') | Some('#') => {
                Err(self.error("no rule after assertion marker"))
            }
            Some('~') | Some('!') => Err(self.error("two consecutive assertion markers")),
            Some(':') => Err(self.error(
                "assertion marker immediately before backtracking barrier",
            )),
            Some('(') => Err(self.error("assertion marker immediately before condition")),
            Some(_) => {
                let inner = self.element(preceding)?;
                Ok(Fragment::Assertion {
                    positive,
                    forward,
                    inner: Box::new(inner),
                })
            }
        }
    }

    fn back_reference(&mut self, preceding: usize) -> Result<Fragment> {
        let digits: String = self.body[self.pos..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let index: usize = digits
            .parse()
            .map_err(|_| self.error("bad back reference"))?;
        self.pos += digits.len();
        if index == 0 {
            return Err(GrammarError::bad_back_reference(
                self.line,
                "back references must be greater than 0",
            ));
        }
        if self.peek() == Some('^') {
            self.pos += 1;
            let repetition = self.repetition()?;
            return Ok(Fragment::UpLevelBackReference { index, repetition });
        }
        let repetition = self.repetition()?;
        if repetition != Repetition::ONCE {
            return Err(GrammarError::NonRepeatableBackReference {
                rule: self.line.to_string(),
            });
        }
        if index > preceding {
            return Err(GrammarError::bad_back_reference(
                self.line,
                format!("back reference {} is too big", index),
            ));
        }
        Ok(Fragment::BackReference { index })
    }

    fn tags(&mut self) -> Result<BTreeSet<String>> {
        let mut tags = BTreeSet::new();
        if self.peek() != Some('{') {
            return Ok(tags);
        }
        self.pos += 1;
        let mut current = String::new();
        let mut escaped = false;
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            if escaped {
                current.push(c);
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                ',' | '}' => {
                    let tag = current.trim().to_string();
                    if tag.is_empty() {
                        return Err(self.error("zero length tag"));
                    }
                    tags.insert(tag);
                    current.clear();
                    if c == '}' {
                        return Ok(tags);
                    }
                }
                c => current.push(c),
            }
        }
        Err(self.error("could not find closing '}' of tag list"))
    }

    fn literal(&mut self, delimiter: char) -> Result<String> {
        self.pos += 1;
        let mut text = String::new();
        let mut escaped = false;
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            if escaped {
                text.push(match c {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == delimiter {
                return Ok(text);
            } else {
                text.push(c);
            }
        }
        Err(self.error(format!("could not find closing {}", delimiter)))
    }

    fn regex(&mut self) -> Result<Fragment> {
        self.pos += 1;
        let mut pattern = String::new();
        let mut escaped = false;
        let mut terminated = false;
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            if escaped {
                if c != '/' {
                    pattern.push('\\');
                }
                pattern.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '/' {
                terminated = true;
                break;
            } else {
                pattern.push(c);
            }
        }
        if !terminated {
            return Err(self.error("could not find closing '/'"));
        }
        let flag_text: String = self.body[self.pos..]
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        let flags = RegexFlags::parse(&flag_text)
            .map_err(|c| self.error(format!("unknown regex flag '{}'", c)))?;
        self.pos += flag_text.len();
        let repetition = self.repetition()?;
        Ok(Fragment::Regex {
            pattern,
            flags,
            repetition,
        })
    }

    fn condition(&mut self) -> Result<ConditionExpr> {
        let start = self.pos;
        let mut depth = 0usize;
        for (i, c) in self.body[start..].char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let inner = &self.body[start + 1..start + i];
                        self.pos = start + i + 1;
                        if inner.trim().is_empty() {
                            return Err(self.error("zero-width condition identifier"));
                        }
                        return ConditionExpr::parse(inner);
                    }
                }
                _ => {}
            }
        }
        Err(self.error("unbalanced parentheses in condition"))
    }
}

fn push(alternatives: &mut [Vec<Fragment>], frag: Fragment) {
    if let Some(last) = alternatives.last_mut() {
        last.push(frag);
    }
}

/// A barrier must share its list with at least one other element
fn check_barriers(list: &[Fragment], line: &str) -> Result<()> {
    for frag in list {
        if list.len() == 1 && matches!(frag, Fragment::Barrier { .. }) {
            return Err(GrammarError::ill_formed(
                line,
                "all backtracking barriers must occur as members of a sequence",
            ));
        }
        if let Fragment::Group { alternatives, .. } = frag {
            for alt in alternatives {
                check_barriers(alt, line)?;
            }
        }
    }
    Ok(())
}

/// Validate up-level references against the nearest enclosing sequence
///
/// `limit` is the number of enclosing-sequence elements that precede the
/// element being checked, or `None` outside any sequence.
fn check_up_level(list: &mut [Fragment], limit: Option<usize>, line: &str) -> Result<()> {
    let is_sequence = list.len() > 1;
    for (i, frag) in list.iter_mut().enumerate() {
        let here = if is_sequence { Some(i) } else { limit };
        check_fragment(frag, here, line)?;
    }
    Ok(())
}

fn check_fragment(frag: &mut Fragment, limit: Option<usize>, line: &str) -> Result<()> {
    match frag {
        Fragment::UpLevelBackReference { index, .. } => match limit {
            None => Err(GrammarError::bad_back_reference(
                line,
                format!("{}^ is not inside a sequence", index),
            )),
            Some(p) if *index == p + 1 => Err(GrammarError::bad_back_reference(
                line,
                format!("{}^ references its own position", index),
            )),
            Some(p) if *index > p + 1 => Err(GrammarError::bad_back_reference(
                line,
                format!("{}^ references position after its own", index),
            )),
            Some(_) => Ok(()),
        },
        Fragment::Group { alternatives, .. } => {
            for alt in alternatives.iter_mut() {
                check_up_level(alt, limit, line)?;
            }
            Ok(())
        }
        Fragment::Assertion { inner, .. } => check_fragment(inner, limit, line),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(line: &str) -> Vec<Fragment> {
        parse_rule(line).unwrap().unwrap().body
    }

    fn err(line: &str) -> String {
        parse_rule(line).unwrap_err().to_string()
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_rule("").unwrap(), None);
        assert_eq!(parse_rule("   # hi").unwrap(), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(parse_rule("<a> = 'x'").unwrap().unwrap().name, "a");
        assert_eq!(parse_rule("ROOT = 'x'").unwrap().unwrap().name, "ROOT");
        assert!(parse_rule("a b = 'x'").is_err());
        assert!(parse_rule("'x'").is_err());
    }

    #[test]
    fn test_top_level_alternation() {
        let b = body("ROOT = 'a' | 'b'");
        assert_eq!(
            b,
            vec![Fragment::group(vec![
                vec![Fragment::literal("a")],
                vec![Fragment::literal("b")]
            ])]
        );
    }

    #[test]
    fn test_sequence_with_group_and_backref() {
        let b = body("ROOT = ['-'|'_'] 'foo' 1");
        assert_eq!(b.len(), 3);
        assert!(matches!(&b[0], Fragment::Group { alternatives, .. } if alternatives.len() == 2));
        assert_eq!(b[1], Fragment::literal("foo"));
        assert_eq!(b[2], Fragment::BackReference { index: 1 });
    }

    #[test]
    fn test_single_element_group_flattens() {
        assert_eq!(body("a = [ 'x' ] 'y'")[0], Fragment::literal("x"));
        assert!(matches!(body("a = [{t} 'x' ] 'y'")[0], Fragment::Group { .. }));
    }

    #[test]
    fn test_literal_escapes() {
        assert_eq!(body(r#"a = 'it\'s' "\\""#)[0], Fragment::literal("it's"));
        assert_eq!(body(r#"a = "\\""#)[0], Fragment::literal("\\"));
        assert_eq!(body(r#"a = "a\nb""#)[0], Fragment::literal("a\nb"));
    }

    #[test]
    fn test_regex_and_flags() {
        let b = body(r"a = /\d+\/x/ri+");
        match &b[0] {
            Fragment::Regex {
                pattern,
                flags,
                repetition,
            } => {
                assert_eq!(pattern, r"\d+/x");
                assert!(flags.reversible && flags.case_insensitive);
                assert_eq!(*repetition, Repetition::PLUS);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(err("a = /x/q").contains("unknown regex flag"));
    }

    #[test]
    fn test_tags() {
        match &body("a = [{foo,bar} 'a'++ 'b' ] | [{quux} 'c'++ 'd']")[0] {
            Fragment::Group { alternatives, .. } => match &alternatives[0][0] {
                Fragment::Group { tags, .. } => {
                    assert!(tags.contains("foo") && tags.contains("bar"));
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        assert!(err("a = [{} 'x' ]").contains("zero length tag"));
    }

    #[test]
    fn test_assertions() {
        let b = body("ROOT = ~- '@' <b>");
        assert_eq!(
            b[0],
            Fragment::Assertion {
                positive: true,
                forward: false,
                inner: Box::new(Fragment::literal("@")),
            }
        );
        assert!(err("a = ~ ~'x' 'y'").contains("two consecutive assertion markers"));
        assert!(err("a = 'x' ! :: 'y'").contains("before backtracking barrier"));
        assert!(err("a = 'x' !").contains("no rule after assertion marker"));
        assert!(err("a = 'x' ! (c)").contains("before condition"));
    }

    #[test]
    fn test_barriers() {
        let b = body("ROOT = <a>+ : <b>");
        assert_eq!(b[1], Fragment::Barrier { double: false });
        assert_eq!(body("a = 'x' :: 'y'")[1], Fragment::Barrier { double: true });
        assert!(err("a = : 'x'").contains("redundant"));
        assert!(err("a = ::").contains("members of a sequence"));
        assert!(err("a = 'x' ::: 'y'").contains("too many colons"));
        assert!(err("a = [ 'x' | :: ]").contains("members of a sequence"));
    }

    #[test]
    fn test_back_reference_errors() {
        assert!(err("a = 'x' 0").contains("greater than 0"));
        assert!(err("a = 'x' 2").contains("too big"));
        assert!(matches!(
            parse_rule("a = 'x' 1+").unwrap_err(),
            GrammarError::NonRepeatableBackReference { .. }
        ));
    }

    #[test]
    fn test_up_level_back_references() {
        assert!(parse_rule("ROOT = /[ab]/ 'foo' 1^{2}").is_ok());
        assert!(parse_rule("ROOT = /[ab]/ 'foo' [ 1^ | 'c' ]").is_ok());
        assert!(parse_rule("ROOT = /[ab]/ 'foo' [ [ 1^{2} | 'c' ]{2} | 'd' ]").is_ok());
        assert!(err("ROOT = /[ab]/ 'foo' [ 0^ | 'c' ]").contains("greater than 0"));
        assert!(err("ROOT = /[ab]/ 'foo' [ 3^ | 'c' ]").contains("references its own position"));
        assert!(err("ROOT = /[ab]/ 'foo' 3^++").contains("references its own position"));
        assert!(err("ROOT = /[ab]/ 'foo' [ 4^ | 'c' ]").contains("references position after its own"));
        assert!(err("ROOT = /[ab]/ 'foo' 4^++").contains("references position after its own"));
        assert!(err("ROOT = [ 1^ | 'c' ]").contains("not inside a sequence"));
    }

    #[test]
    fn test_condition() {
        let def = parse_rule("ROOT = /\\d+/ (lt100 & !odd) # comment").unwrap().unwrap();
        assert_eq!(def.condition.unwrap().to_string(), "lt100 & !odd");
        assert!(err("ROOT = /\\d+/ (a) 'x'").contains("no content other than a comment"));
        assert!(err("ROOT = (a)").contains("condition without rule"));
        assert!(err("ROOT = 'x' ()").contains("zero-width condition"));
    }

    #[test]
    fn test_unclosed_brackets_and_empty_bodies() {
        assert!(err("a = [ 'x' 'y'").contains("closing ']'"));
        assert!(err("a = ").contains("empty rule body"));
        assert!(err("a = 'x' | ").contains("empty alternative"));
        assert!(err("a = 'x' || 'y'").contains("empty alternative"));
    }

    #[test]
    fn test_parse_rules_lines() {
        let rules = parse_rules("ROOT = <a>+ : <b>\n\n# nothing\na = 'a'\nb = 'ab'\n").unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.root(), Some("ROOT"));
        assert!(matches!(
            parse_rules("a = 'x'\na = 'y'"),
            Err(GrammarError::DuplicateRule { .. })
        ));
        assert!(matches!(parse_rules("# only\n"), Err(GrammarError::NoRootFound)));
    }

    #[test]
    fn test_error_position() {
        let e = parse_rules("a = 'x'\nb = [ 'y'").unwrap_err().to_string();
        assert!(e.contains("line 2"), "{}", e);
    }
}
