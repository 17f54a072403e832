//! HTML extraction for genealogy record pages.
//!
//! The site serves one page per record id. A page either describes a
//! mathematician (name, institution, graduation year, advisor and
//! student links) or reports that the id does not exist; the latter
//! parses to `None`.

use crate::record::{Record, RecordId};
use ego_tree::NodeRef;
use regex::Regex;
use scraper::node::Node;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Page text returned for an id that is not a number at all.
const NON_NUMERIC_ID: &str = "Non-numeric id supplied. Aborting.";

/// First-paragraph text returned for a well-formed id with no record.
const MISSING_ID: &str = "You have specified an ID that does not exist in the database. \
                          Please back up and try again.";

struct Selectors {
    p: Selector,
    h2: Selector,
    span: Selector,
    table: Selector,
    anchor: Selector,
    detail_div: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| Selectors {
        p: Selector::parse("p").expect("static selector"),
        h2: Selector::parse("h2").expect("static selector"),
        span: Selector::parse("span").expect("static selector"),
        table: Selector::parse("table").expect("static selector"),
        anchor: Selector::parse("a").expect("static selector"),
        detail_div: Selector::parse(
            r#"div[style="line-height: 30px; text-align: center; margin-bottom: 1ex"]"#,
        )
        .expect("static selector"),
    })
}

fn advisor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("(Advisor|Promotor)").expect("static regex"))
}

fn space_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(" {2,}").expect("static regex"))
}

/// Parse a fetched page into a record, or `None` when the page says
/// no such record exists.
pub fn parse_record(id: RecordId, html: &str) -> Option<Record> {
    let doc = Html::parse_document(html);

    if is_missing(&doc) {
        return None;
    }

    Some(Record {
        id,
        name: name(&doc),
        institution: institution(&doc),
        year: year(&doc),
        descendants: descendants(&doc),
        advisors: advisors(&doc),
    })
}

fn is_missing(doc: &Html) -> bool {
    let root_text: String = doc.root_element().text().collect();
    if normalized(&root_text) == NON_NUMERIC_ID {
        return true;
    }

    match doc.select(&selectors().p).next() {
        None => true,
        Some(p) => {
            let text: String = p.text().collect();
            normalized(&text) == MISSING_ID
        }
    }
}

/// Collapse all whitespace runs to single spaces and trim, so sentinel
/// comparisons are insensitive to the page's line wrapping.
fn normalized(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The mathematician's name: first `<h2>`, fragment-trimmed, with
/// redundant interior spaces removed.
fn name(doc: &Html) -> String {
    let raw: String = doc
        .select(&selectors().h2)
        .next()
        .map(|el| el.text().map(str::trim).collect())
        .unwrap_or_default();
    space_run_re().replace_all(raw.trim(), " ").into_owned()
}

/// The degree-granting institution, when the detail block carries one.
fn institution(doc: &Html) -> Option<String> {
    for div in doc.select(&selectors().detail_div) {
        if let Some(outer) = div.select(&selectors().span).next() {
            if let Some(inner) = outer.select(&selectors().span).next() {
                let text: String = inner.text().collect();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// The graduation year. Records occasionally list several years
/// separated by commas; the first one wins.
fn year(doc: &Html) -> Option<i32> {
    for div in doc.select(&selectors().detail_div) {
        let Some(outer) = div.select(&selectors().span).next() else {
            continue;
        };
        let Some(last) = outer.children().last() else {
            continue;
        };
        let Some(text) = last.value().as_text() else {
            continue;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        let first = trimmed.split(',').next().unwrap_or("").trim();
        if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(parsed) = first.parse() {
                return Some(parsed);
            }
        }
    }
    None
}

/// Student links: every `<a>` inside the first `<table>`.
fn descendants(doc: &Html) -> Vec<RecordId> {
    let Some(table) = doc.select(&selectors().table).next() else {
        return Vec::new();
    };
    table
        .select(&selectors().anchor)
        .filter_map(|a| a.value().attr("href").and_then(extract_id))
        .collect()
}

/// Advisor links: for each text node naming an advisor (or promotor),
/// the first element that follows it in document order carries the
/// link. "Advisor: Unknown" entries have no link and are skipped.
fn advisors(doc: &Html) -> Vec<RecordId> {
    let mut out = Vec::new();
    let mut cursor = Some(*doc.root_element());
    while let Some(node) = cursor {
        if let Some(text) = node.value().as_text() {
            if advisor_re().is_match(text) && !text.contains("Advisor: Unknown") {
                let id = next_element(node)
                    .and_then(|el| el.value().as_element().and_then(|e| e.attr("href")))
                    .and_then(extract_id);
                if let Some(id) = id {
                    out.push(id);
                }
            }
        }
        cursor = successor(node);
    }
    out
}

/// Pull the trailing id out of an `id.php?id=N` href.
fn extract_id(href: &str) -> Option<RecordId> {
    href.rsplit('=').next()?.parse().ok().map(RecordId)
}

/// Preorder successor of `node`, i.e. the next node in document order.
fn successor<'a>(node: NodeRef<'a, Node>) -> Option<NodeRef<'a, Node>> {
    if let Some(child) = node.first_child() {
        return Some(child);
    }
    let mut current = node;
    loop {
        if let Some(sibling) = current.next_sibling() {
            return Some(sibling);
        }
        current = current.parent()?;
    }
}

/// First element node after `node` in document order.
fn next_element<'a>(node: NodeRef<'a, Node>) -> Option<NodeRef<'a, Node>> {
    let mut next = successor(node);
    while let Some(candidate) = next {
        if candidate.value().is_element() {
            return Some(candidate);
        }
        next = successor(candidate);
    }
    None
}
