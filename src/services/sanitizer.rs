//! Description cleaning.
//!
//! A raw fragment is re-serialized node by node: dropped subtrees are skipped,
//! attributes are never written, tags outside the allowlist are unwrapped and
//! empty elements vanish. The result is parsed and serialized once more so
//! the output is always a balanced tree.

use ego_tree::NodeRef;
use regex::{Captures, Regex, RegexBuilder};
use scraper::{Html, Node};

use crate::error::{AppError, Result};
use crate::models::SanitizerConfig;
use crate::utils::normalize_whitespace;

/// Tags that survive sanitization.
pub const ALLOWED_TAGS: &[&str] = &["p", "ul", "ol", "li", "br", "strong", "em", "h2", "h3", "h4"];

/// Subtrees removed with all their content.
const DROPPED_TAGS: &[&str] = &[
    "a", "script", "style", "noscript", "template", "button", "svg", "img", "picture", "video",
    "audio", "iframe", "canvas", "object", "embed", "form", "input", "select", "textarea",
    "label", "nav", "header", "footer", "aside", "link", "meta", "head", "title",
];

/// Unwrapped without padding; everything else is treated as a block.
const INLINE_TAGS: &[&str] = &[
    "span", "b", "i", "u", "font", "small", "sub", "sup", "mark", "abbr", "code", "time",
];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Boilerplate removal is repeated while it keeps changing the text.
const MAX_BOILERPLATE_PASSES: usize = 4;

/// Kept inline tags that may split a phrase in serialized output.
const PHRASE_GAP: &str = r"(?:</?(?:strong|em)>)*";
const PHRASE_SPACE: &str = r"(?:\s|</?(?:strong|em)>)+";

/// Sanitized description. Both fields are `None` when nothing usable remained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    pub html: Option<String>,
    pub text: Option<String>,
}

pub struct DescriptionSanitizer {
    min_chars: usize,
    promo_classes: Vec<String>,
    promo_headings: Vec<String>,
    /// Phrases in raw text nodes
    boilerplate: Option<Regex>,
    /// Phrases in serialized output, across `<strong>`/`<em>` boundaries
    boilerplate_markup: Option<Regex>,
    block_spacing: Regex,
    tags: Regex,
}

impl DescriptionSanitizer {
    pub fn new(config: &SanitizerConfig) -> Result<Self> {
        let mut phrases: Vec<String> = config
            .boilerplate_phrases
            .iter()
            .map(|p| normalize_whitespace(p))
            .filter(|p| !p.is_empty())
            .collect();
        // Longest first so a phrase never leaves a fragment of a longer one behind.
        phrases.sort_by_key(|p| std::cmp::Reverse(p.len()));
        phrases.dedup();

        let boilerplate = phrase_regex(phrases.iter().map(|p| regex::escape(p)))?;
        let boilerplate_markup = phrase_regex(phrases.iter().map(|p| markup_phrase_pattern(p)))?;

        let block = ALLOWED_TAGS
            .iter()
            .filter(|t| !matches!(**t, "strong" | "em"))
            .copied()
            .collect::<Vec<_>>()
            .join("|");
        let block_spacing = Regex::new(&format!(r"\s*(</?(?:{block})>)\s*"))
            .map_err(|e| AppError::config(e.to_string()))?;
        let tags = Regex::new(r"<[^>]+>").map_err(|e| AppError::config(e.to_string()))?;

        Ok(Self {
            min_chars: config.min_description_chars,
            promo_classes: config
                .promo_class_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            promo_headings: config
                .promo_heading_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            boilerplate,
            boilerplate_markup,
            block_spacing,
            tags,
        })
    }

    /// Non-empty, not a bare "Similar Jobs" stub, and long enough.
    pub fn is_meaningful(&self, text: &str) -> bool {
        let normalized = normalize_whitespace(text);
        let stub = normalized
            .trim_end_matches(|c: char| !c.is_alphanumeric())
            .eq_ignore_ascii_case("similar jobs");
        !normalized.is_empty() && !stub && normalized.chars().count() >= self.min_chars
    }

    /// Sanitize the first candidate that is meaningful before and after cleaning.
    pub fn clean(&self, candidates: &[String]) -> Description {
        for raw in candidates {
            let raw_text = fragment_text(raw);
            if !self.is_meaningful(&raw_text) {
                continue;
            }
            let description = self.sanitize(raw);
            if description.text.as_deref().is_some_and(|t| self.is_meaningful(t)) {
                return description;
            }
        }
        Description::default()
    }

    /// Clean one fragment unconditionally.
    pub fn sanitize(&self, raw: &str) -> Description {
        let first = self.serialize(raw);
        let first = self.strip_markup_boilerplate(&first);
        let html = self.serialize(&first);

        if html.is_empty() {
            return Description::default();
        }

        let text = normalize_whitespace(&decode_entities(&self.tags.replace_all(&html, " ")));
        Description {
            html: Some(html),
            text: (!text.is_empty()).then_some(text),
        }
    }

    fn serialize(&self, fragment: &str) -> String {
        let document = Html::parse_fragment(fragment);
        let mut out = String::new();
        self.render_children(*document.root_element(), &mut out);

        let collapsed = normalize_whitespace(&out);
        self.block_spacing
            .replace_all(&collapsed, "$1")
            .trim()
            .to_string()
    }

    /// Render children of `parent`. Returns whether any text or `<br>` was written.
    fn render_children(&self, parent: NodeRef<Node>, out: &mut String) -> bool {
        let mut wrote = false;
        let mut in_promo_block = false;

        for child in parent.children() {
            match child.value() {
                Node::Text(text) => {
                    if !in_promo_block {
                        wrote |= self.push_text(text, out);
                    }
                }
                Node::Element(element) => {
                    let name = element.name();
                    let is_heading = HEADINGS.contains(&name);

                    if in_promo_block {
                        if !is_heading {
                            continue;
                        }
                        in_promo_block = false;
                    }
                    if DROPPED_TAGS.contains(&name) || self.is_promo_element(element) {
                        continue;
                    }
                    if is_heading && self.is_promo_heading(child) {
                        in_promo_block = true;
                        continue;
                    }
                    wrote |= self.render_element(child, name, out);
                }
                _ => {}
            }
        }
        wrote
    }

    fn render_element(&self, node: NodeRef<Node>, name: &str, out: &mut String) -> bool {
        if name == "br" {
            out.push_str("<br>");
            return true;
        }

        let mut inner = String::new();
        let wrote = self.render_children(node, &mut inner);

        if ALLOWED_TAGS.contains(&name) {
            if wrote {
                out.push('<');
                out.push_str(name);
                out.push('>');
                out.push_str(&inner);
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        } else if INLINE_TAGS.contains(&name) {
            out.push_str(&inner);
        } else {
            out.push(' ');
            out.push_str(&inner);
            out.push(' ');
        }
        wrote
    }

    fn push_text(&self, raw: &str, out: &mut String) -> bool {
        let spaced = raw.replace('\u{a0}', " ");
        let kept = self.strip_boilerplate(&spaced);
        let trimmed = normalize_whitespace(&kept);

        if trimmed.is_empty() {
            if !kept.is_empty() {
                out.push(' ');
            }
            return false;
        }
        if kept.starts_with(char::is_whitespace) {
            out.push(' ');
        }
        out.push_str(&escape_html(&trimmed));
        if kept.ends_with(char::is_whitespace) {
            out.push(' ');
        }
        true
    }

    fn strip_boilerplate(&self, text: &str) -> String {
        let Some(pattern) = &self.boilerplate else {
            return text.to_string();
        };
        until_stable(text, |current| pattern.replace_all(current, "").into_owned())
    }

    /// Remove phrases from serialized output. Tags inside a match are kept so
    /// the markup stays balanced; emptied elements vanish on re-serialization.
    fn strip_markup_boilerplate(&self, html: &str) -> String {
        let Some(pattern) = &self.boilerplate_markup else {
            return html.to_string();
        };
        until_stable(html, |current| {
            pattern
                .replace_all(current, |caps: &Captures| {
                    let tags = self
                        .tags
                        .find_iter(&caps[0])
                        .map(|m| m.as_str())
                        .collect::<String>();
                    format!(" {tags} ")
                })
                .into_owned()
        })
    }

    fn is_promo_element(&self, element: &scraper::node::Element) -> bool {
        let marker = [element.attr("class"), element.attr("id")]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        !marker.is_empty() && self.promo_classes.iter().any(|p| marker.contains(p.as_str()))
    }

    fn is_promo_heading(&self, node: NodeRef<Node>) -> bool {
        let text = node
            .descendants()
            .filter_map(|n| n.value().as_text().map(|t| t.to_string()))
            .collect::<String>()
            .to_lowercase();
        self.promo_headings.iter().any(|p| text.contains(p.as_str()))
    }
}

fn phrase_regex(patterns: impl Iterator<Item = String>) -> Result<Option<Regex>> {
    let alternation = patterns.collect::<Vec<_>>().join("|");
    if alternation.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| AppError::config(format!("invalid boilerplate phrase: {e}")))
}

/// Pattern for a phrase as it appears in escaped output, where `<strong>` or
/// `<em>` may open or close anywhere inside it.
fn markup_phrase_pattern(phrase: &str) -> String {
    let escaped = escape_html(phrase);
    let mut pattern = String::new();
    let mut chars = escaped.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ' ' {
            pattern.push_str(PHRASE_SPACE);
            continue;
        }
        pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        if chars.peek().is_some_and(|next| *next != ' ') {
            pattern.push_str(PHRASE_GAP);
        }
    }
    pattern
}

fn until_stable(text: &str, strip: impl Fn(&str) -> String) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_BOILERPLATE_PASSES {
        let next = strip(&current);
        if next == current {
            break;
        }
        current = normalize_spacing(&next);
    }
    current
}

/// Collapse whitespace runs but keep a single leading/trailing space.
fn normalize_spacing(text: &str) -> String {
    let core = normalize_whitespace(text);
    if core.is_empty() {
        return if text.is_empty() { String::new() } else { " ".to_string() };
    }
    let lead = if text.starts_with(char::is_whitespace) { " " } else { "" };
    let tail = if text.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{core}{tail}")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Visible text of a fragment, for the meaningful-content check.
fn fragment_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> DescriptionSanitizer {
        DescriptionSanitizer::new(&SanitizerConfig::default()).unwrap()
    }

    const RAW: &str = r#"
        <div class="content" style="color:red">
          <h2 id="about">About the role</h2>
          <p class="lead">We are hiring a <b>senior</b> engineer to <strong>own</strong> our data platform.</p>
          <p><a href="/apply">Apply now</a></p>
          <ul><li data-x="1">Rust</li><li>  </li><li>Postgres<br></li></ul>
          <p>Find Your Next Remote Job! Only hand-screened, legit jobs</p>
          <button>Save</button><img src="x.png"><script>track()</script>
          <div class="similar-jobs"><p>Other job</p></div>
          <h3>Similar Jobs</h3>
          <p>Promo listing one</p>
          <ul><li>Promo listing two</li></ul>
          <h3>Benefits</h3>
          <p>Health &amp; dental</p>
        </div>
    "#;

    fn walk_tags(html: &str) -> Vec<String> {
        let fragment = Html::parse_fragment(html);
        fragment
            .root_element()
            .descendants()
            .filter_map(|n| n.value().as_element().map(|e| e.name().to_string()))
            .filter(|name| name != "html")
            .collect()
    }

    #[test]
    fn cleans_fragment() {
        let out = sanitizer().sanitize(RAW);
        let html = out.html.unwrap();

        assert_eq!(
            html,
            "<h2>About the role</h2>\
             <p>We are hiring a senior engineer to <strong>own</strong> our data platform.</p>\
             <ul><li>Rust</li><li>Postgres<br></li></ul>\
             <h3>Benefits</h3><p>Health &amp; dental</p>"
        );
        assert_eq!(
            out.text.as_deref(),
            Some(
                "About the role We are hiring a senior engineer to own our data platform. \
                 Rust Postgres Benefits Health & dental"
            )
        );
    }

    #[test]
    fn only_allowlisted_tags_remain() {
        let html = sanitizer().sanitize(RAW).html.unwrap();
        for tag in walk_tags(&html) {
            assert!(ALLOWED_TAGS.contains(&tag.as_str()), "unexpected <{tag}>");
        }
        assert!(!html.contains("class="));
        assert!(!html.contains("Apply now"));
    }

    #[test]
    fn never_contains_boilerplate() {
        let config = SanitizerConfig::default();
        let html = sanitizer().sanitize(RAW).html.unwrap().to_lowercase();
        for phrase in &config.boilerplate_phrases {
            assert!(!html.contains(&phrase.to_lowercase()), "found '{phrase}'");
        }
    }

    #[test]
    fn removes_boilerplate_split_by_inline_tags() {
        let out = sanitizer().sanitize(
            "<p>Find Your <strong>Next</strong> Remote Job with us. We build tools for distributed teams.</p>\
             <p>No ads, <em>scams</em>, or junk</p>",
        );
        let text = out.text.unwrap().to_lowercase();
        assert!(!text.contains("find your next remote job"));
        assert!(!text.contains("no ads, scams, or junk"));
        assert_eq!(
            out.html.as_deref(),
            Some("<p>with us. We build tools for distributed teams.</p>")
        );
    }

    #[test]
    fn phrase_spanning_tag_open_keeps_markup_balanced() {
        let out = sanitizer().sanitize(
            "<p>Find <strong>Your Next Remote Job and grow</strong> with a team that ships daily.</p>",
        );
        let html = out.html.unwrap();
        assert_eq!(html.matches("<strong>").count(), 1);
        assert_eq!(html.matches("</strong>").count(), 1);
        assert_eq!(
            out.text.as_deref(),
            Some("and grow with a team that ships daily.")
        );
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let s = sanitizer();
        let once = s.sanitize(RAW);
        let twice = s.sanitize(once.html.as_deref().unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn balances_broken_markup() {
        let out = sanitizer().sanitize("<p>open <strong>bold</p> tail</em></li>");
        let html = out.html.unwrap();
        assert_eq!(html.matches("<strong>").count(), html.matches("</strong>").count());
        assert!(!html.contains("</em>"));
        assert!(!html.contains("</li>"));
    }

    #[test]
    fn meaningful_predicate() {
        let s = sanitizer();
        assert!(!s.is_meaningful("   "));
        assert!(!s.is_meaningful("Similar Jobs"));
        assert!(!s.is_meaningful("Too short."));
        assert!(s.is_meaningful(&"Long enough description text. ".repeat(3)));
    }

    #[test]
    fn clean_picks_first_meaningful_candidate() {
        let s = sanitizer();
        let candidates = vec![
            "<h3>Similar Jobs</h3>".to_string(),
            "<p>Tiny</p>".to_string(),
            format!("<p>{}</p>", "A real description of the job. ".repeat(3)),
        ];
        let out = s.clean(&candidates);
        assert!(out.html.unwrap().starts_with("<p>A real description"));

        assert_eq!(s.clean(&["<p>short</p>".to_string()]), Description::default());
    }
}
