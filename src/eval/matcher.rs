use log::trace;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "formula.pest"]
struct FormulaMatcher;

/// A `%NAME` or `%NAME(raw args)` occurrence matched at the start of a slice.
#[derive(Debug, PartialEq)]
pub(crate) struct Reference<'a> {
    /// The full matched text, including the leading `%` and any parentheses.
    pub matched: &'a str,
    pub name: &'a str,
    /// Unsplit argument text; `None` for the macro form without parentheses.
    pub raw_args: Option<&'a str>,
}

/// A full-string `left OP right` comparison, `OP` being a cluster of `<=>!`.
#[derive(Debug, PartialEq)]
pub(crate) struct Comparison<'a> {
    pub left: &'a str,
    pub op: &'a str,
    pub right: &'a str,
}

/// Tries to match a reference at the start of `input`. Trailing text is fine;
/// the caller anchors this at an unescaped `%`.
pub(crate) fn reference_at(input: &str) -> Option<Reference<'_>> {
    let pair = FormulaMatcher::parse(Rule::reference, input).ok()?.next()?;
    let matched = pair.as_str();
    let mut name = "";
    let mut raw_args = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::name => name = inner.as_str(),
            Rule::call => raw_args = inner.into_inner().next().map(|p| p.as_str()),
            _ => {}
        }
    }
    trace!("matched reference {matched:?} (name {name:?}, args {raw_args:?})");
    Some(Reference {
        matched,
        name,
        raw_args,
    })
}

/// Matches `input` as a whole against the comparison pattern.
pub(crate) fn comparison(input: &str) -> Option<Comparison<'_>> {
    let pair = FormulaMatcher::parse(Rule::comparison, input).ok()?.next()?;
    let mut sides = [""; 2];
    let mut seen = 0;
    let mut op = "";
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::cmp_side if seen < 2 => {
                sides[seen] = inner.as_str();
                seen += 1;
            }
            Rule::cmp_op => op = inner.as_str(),
            _ => {}
        }
    }
    if op.is_empty() {
        return None;
    }
    Some(Comparison {
        left: sides[0],
        op,
        right: sides[1],
    })
}

/// Finds the leftmost innermost parenthesized group of `input`, returning the
/// byte range covering the group including both parentheses.
pub(crate) fn innermost_group(input: &str) -> Option<(usize, usize)> {
    for (at, ch) in input.char_indices() {
        if ch != '(' {
            continue;
        }
        if let Ok(mut pairs) = FormulaMatcher::parse(Rule::flat_group, &input[at..]) {
            if let Some(pair) = pairs.next() {
                return Some((at, at + pair.as_str().len()));
            }
        }
    }
    None
}
