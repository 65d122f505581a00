//! A small CSS selector subset for fixture documents
//!
//! Supported: type (`li`), id (`#sidebar`), class (`.tag`), attribute
//! (`[data-test-id]`, `=`, `^=`, `$=`, `*=`), the descendant and child (`>`)
//! combinators, and comma-separated groups.

use std::fmt;

/// The element view a selector needs.
pub trait SelectorTarget: Sized {
    fn tag(&self) -> &str;
    fn attr(&self, name: &str) -> Option<String>;
    fn has_class(&self, class: &str) -> bool;
    fn parent(&self) -> Option<Self>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError(pub String);

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid selector: {}", self.0)
    }
}

impl std::error::Error for SelectorError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Prefix,
    Suffix,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

/// One comma-free selector: compounds joined by combinators, stored
/// left to right. The combinator on the first compound is unused.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    parts: Vec<(Combinator, Compound)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    groups: Vec<Complex>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let groups = split_groups(input)
            .into_iter()
            .map(parse_complex)
            .collect::<Result<Vec<_>, _>>()?;
        if groups.is_empty() {
            return Err(SelectorError(format!("empty selector '{}'", input)));
        }
        Ok(Self { groups })
    }

    pub fn matches<T: SelectorTarget>(&self, element: &T) -> bool {
        self.groups
            .iter()
            .any(|complex| matches_from(&complex.parts, complex.parts.len() - 1, element))
    }
}

/// Split on commas that are not inside brackets or quotes.
fn split_groups(input: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                groups.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    groups.push(input[start..].trim());
    groups.into_iter().filter(|g| !g.is_empty()).collect()
}

fn parse_complex(input: &str) -> Result<Complex, SelectorError> {
    let chars: Vec<char> = input.chars().collect();
    let mut pos = 0;
    let mut parts = Vec::new();
    let mut pending = Combinator::Descendant;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
            continue;
        }
        if c == '>' {
            if parts.is_empty() {
                return Err(SelectorError(format!("leading '>' in '{}'", input)));
            }
            pending = Combinator::Child;
            pos += 1;
            continue;
        }
        let compound = parse_compound(&chars, &mut pos, input)?;
        parts.push((pending, compound));
        pending = Combinator::Descendant;
    }

    if parts.is_empty() {
        return Err(SelectorError(format!("empty selector '{}'", input)));
    }
    if pending == Combinator::Child {
        return Err(SelectorError(format!("trailing '>' in '{}'", input)));
    }
    Ok(Complex { parts })
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn parse_compound(chars: &[char], pos: &mut usize, input: &str) -> Result<Compound, SelectorError> {
    let mut compound = Compound::default();
    let start = *pos;

    if *pos < chars.len() && chars[*pos] == '*' {
        *pos += 1;
    } else if *pos < chars.len() && is_ident_char(chars[*pos]) {
        compound.tag = Some(read_ident(chars, pos).to_lowercase());
    }

    while *pos < chars.len() {
        match chars[*pos] {
            '#' => {
                *pos += 1;
                compound.id = Some(read_ident(chars, pos));
            }
            '.' => {
                *pos += 1;
                compound.classes.push(read_ident(chars, pos));
            }
            '[' => {
                *pos += 1;
                compound.attrs.push(parse_attr(chars, pos, input)?);
            }
            _ => break,
        }
    }

    if *pos == start {
        return Err(SelectorError(format!(
            "unexpected '{}' in '{}'",
            chars[*pos], input
        )));
    }
    Ok(compound)
}

fn parse_attr(chars: &[char], pos: &mut usize, input: &str) -> Result<AttrMatch, SelectorError> {
    let unterminated = || SelectorError(format!("unterminated attribute in '{}'", input));
    let name = read_ident(chars, pos);
    if name.is_empty() {
        return Err(SelectorError(format!("missing attribute name in '{}'", input)));
    }

    let op = match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            return Ok(AttrMatch {
                name,
                op: AttrOp::Exists,
                value: String::new(),
            });
        }
        Some('=') => {
            *pos += 1;
            AttrOp::Equals
        }
        Some(c @ ('^' | '$' | '*')) if chars.get(*pos + 1) == Some(&'=') => {
            let op = match c {
                '^' => AttrOp::Prefix,
                '$' => AttrOp::Suffix,
                _ => AttrOp::Contains,
            };
            *pos += 2;
            op
        }
        _ => return Err(unterminated()),
    };

    let value = match chars.get(*pos) {
        Some(&q @ ('"' | '\'')) => {
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != q {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err(unterminated());
            }
            let value: String = chars[start..*pos].iter().collect();
            *pos += 1;
            value
        }
        _ => read_ident(chars, pos),
    };

    if chars.get(*pos) != Some(&']') {
        return Err(unterminated());
    }
    *pos += 1;
    Ok(AttrMatch { name, op, value })
}

fn matches_compound<T: SelectorTarget>(compound: &Compound, element: &T) -> bool {
    if let Some(tag) = &compound.tag {
        if !element.tag().eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if element.attr("id").as_deref() != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.iter().all(|c| element.has_class(c)) {
        return false;
    }
    compound.attrs.iter().all(|a| {
        let Some(actual) = element.attr(&a.name) else {
            return false;
        };
        match a.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == a.value,
            AttrOp::Prefix => actual.starts_with(&a.value),
            AttrOp::Suffix => actual.ends_with(&a.value),
            AttrOp::Contains => actual.contains(&a.value),
        }
    })
}

/// Match `parts[..=index]` with `parts[index]` anchored on `element`.
fn matches_from<T: SelectorTarget>(parts: &[(Combinator, Compound)], index: usize, element: &T) -> bool {
    let (combinator, compound) = &parts[index];
    if !matches_compound(compound, element) {
        return false;
    }
    if index == 0 {
        return true;
    }
    match combinator {
        Combinator::Child => element
            .parent()
            .is_some_and(|parent| matches_from(parts, index - 1, &parent)),
        Combinator::Descendant => {
            let mut ancestor = element.parent();
            while let Some(current) = ancestor {
                if matches_from(parts, index - 1, &current) {
                    return true;
                }
                ancestor = current.parent();
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Path-shaped element: the last entry is the element, earlier entries
    /// are its ancestors.
    #[derive(Clone)]
    struct PathEl(Vec<(&'static str, Vec<(&'static str, &'static str)>)>);

    impl SelectorTarget for PathEl {
        fn tag(&self) -> &str {
            self.0.last().map(|e| e.0).unwrap_or("")
        }
        fn attr(&self, name: &str) -> Option<String> {
            self.0
                .last()?
                .1
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
        fn has_class(&self, class: &str) -> bool {
            self.attr("class")
                .is_some_and(|c| c.split_whitespace().any(|x| x == class))
        }
        fn parent(&self) -> Option<Self> {
            (self.0.len() > 1).then(|| PathEl(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    fn tag_label() -> PathEl {
        PathEl(vec![
            ("div", vec![("data-test-id", "workflows-list-item")]),
            ("ul", vec![]),
            ("li", vec![("data-test-id", "tag"), ("class", "chip small")]),
            ("span", vec![]),
        ])
    }

    #[test]
    fn child_and_descendant_combinators() {
        let el = tag_label();
        assert!(Selector::parse(r#"li[data-test-id="tag"] > span"#).unwrap().matches(&el));
        assert!(Selector::parse(r#"[data-test-id="workflows-list-item"] span"#).unwrap().matches(&el));
        assert!(!Selector::parse(r#"[data-test-id="workflows-list-item"] > span"#).unwrap().matches(&el));
        assert!(!Selector::parse("li").unwrap().matches(&el));
    }

    #[test]
    fn attribute_operators() {
        let li = tag_label().parent().unwrap();
        assert!(Selector::parse("[data-test-id]").unwrap().matches(&li));
        assert!(Selector::parse("[data-test-id^=ta]").unwrap().matches(&li));
        assert!(Selector::parse("[data-test-id$='ag']").unwrap().matches(&li));
        assert!(Selector::parse(r#"[class*="small"]"#).unwrap().matches(&li));
        assert!(Selector::parse("li.chip.small").unwrap().matches(&li));
        assert!(!Selector::parse("li.large").unwrap().matches(&li));
    }

    #[test]
    fn groups_match_any() {
        let el = tag_label();
        assert!(Selector::parse("nav, ul > li > span").unwrap().matches(&el));
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("> li").is_err());
        assert!(Selector::parse("li >").is_err());
        assert!(Selector::parse("li[data").is_err());
        assert!(Selector::parse("li[x=\"open]").is_err());
        assert!(Selector::parse("li ~ span").is_err());
    }
}
