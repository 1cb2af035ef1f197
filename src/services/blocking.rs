//! Anti-scraping response classification.

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::AppError;
use crate::utils::http::FetchResponse;
use crate::utils::normalize_whitespace;

/// Status codes the site answers with when it throttles or blocks.
const BLOCKING_STATUSES: [u16; 3] = [403, 429, 503];

/// Challenge markers sit at the top of the page; later mentions are page content.
const MAX_CHALLENGE_TEXT_LEN: usize = 5000;

const CHALLENGE_PHRASES: &[&str] = &[
    "access denied",
    "captcha",
    "are you a robot",
    "just a moment",
    "verify you are human",
    "attention required",
    "request unsuccessful",
    "unusual traffic",
];

/// Outcome of classifying a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    Blocked { status: Option<u16>, reason: String },
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    /// Turn a blocked verdict into the retryable error carried up to the retry loop.
    pub fn into_result(self, url: &str) -> Result<(), AppError> {
        match self {
            Self::Ok => Ok(()),
            Self::Blocked { status, reason } => Err(AppError::blocked(url, status, reason)),
        }
    }
}

/// Classifies fetched responses as ok or blocked.
#[derive(Debug, Clone)]
pub struct BlockingDetector {
    phrases: Vec<String>,
}

impl Default for BlockingDetector {
    fn default() -> Self {
        Self {
            phrases: CHALLENGE_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl BlockingDetector {
    pub fn classify(&self, response: &FetchResponse, document: &Html) -> Verdict {
        if BLOCKING_STATUSES.contains(&response.status) {
            return Verdict::Blocked {
                status: Some(response.status),
                reason: format!("received {} status code", response.status),
            };
        }

        let title = page_title(document).to_lowercase();
        if let Some(phrase) = self.matching_phrase(&title) {
            return Verdict::Blocked {
                status: Some(response.status),
                reason: format!("challenge title contains '{phrase}'"),
            };
        }

        let head = visible_text(document)
            .chars()
            .take(MAX_CHALLENGE_TEXT_LEN)
            .collect::<String>()
            .to_lowercase();
        if let Some(phrase) = self.matching_phrase(&head) {
            return Verdict::Blocked {
                status: Some(response.status),
                reason: format!("challenge content contains '{phrase}'"),
            };
        }

        Verdict::Ok
    }

    fn matching_phrase(&self, haystack: &str) -> Option<&str> {
        self.phrases
            .iter()
            .find(|p| haystack.contains(p.as_str()))
            .map(|p| p.as_str())
    }
}

fn page_title(document: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default()
}

/// Text of the body, skipping scripts and styles.
fn visible_text(document: &Html) -> String {
    fn collect(element: ElementRef, out: &mut String) {
        if matches!(
            element.value().name(),
            "script" | "style" | "noscript" | "template"
        ) {
            return;
        }
        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    out.push_str(text);
                    out.push(' ');
                }
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        collect(el, out);
                    }
                }
                _ => {}
            }
        }
    }

    let mut out = String::new();
    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next());
    collect(body.unwrap_or_else(|| document.root_element()), &mut out);
    normalize_whitespace(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> (FetchResponse, Html) {
        (
            FetchResponse {
                url: "https://example.com/job/1".into(),
                status,
                body: body.into(),
            },
            Html::parse_document(body),
        )
    }

    #[test]
    fn blocks_on_status() {
        let detector = BlockingDetector::default();
        for status in [403, 429, 503] {
            let (resp, doc) = response(status, "<html><body>ok</body></html>");
            assert!(detector.classify(&resp, &doc).is_blocked());
        }
    }

    #[test]
    fn blocks_on_challenge_title_case_insensitive() {
        let detector = BlockingDetector::default();
        let (resp, doc) = response(200, "<html><head><title>Just a Moment...</title></head></html>");
        assert!(detector.classify(&resp, &doc).is_blocked());
    }

    #[test]
    fn blocks_on_challenge_body() {
        let detector = BlockingDetector::default();
        let (resp, doc) = response(
            200,
            "<html><body><h1>Please verify</h1><p>Are you a ROBOT?</p></body></html>",
        );
        let verdict = detector.classify(&resp, &doc);
        assert!(verdict.is_blocked());
        let err = verdict.into_result(&resp.url).unwrap_err();
        assert!(err.is_blocking());
    }

    #[test]
    fn ignores_script_content() {
        let detector = BlockingDetector::default();
        let (resp, doc) = response(
            200,
            "<html><body><script>loadCaptcha()</script><h1>Engineer</h1></body></html>",
        );
        assert_eq!(detector.classify(&resp, &doc), Verdict::Ok);
    }

    #[test]
    fn late_mentions_are_not_a_challenge() {
        let detector = BlockingDetector::default();
        let filler = "Build reliable tooling for remote teams. ".repeat(150);
        let (resp, doc) = response(
            200,
            &format!("<html><body><p>{filler}</p><p>Experience with captcha solvers.</p></body></html>"),
        );
        assert_eq!(detector.classify(&resp, &doc), Verdict::Ok);
    }

    #[test]
    fn challenge_with_long_footer_is_blocked() {
        let detector = BlockingDetector::default();
        let footer = "Terms of service and privacy policy. ".repeat(200);
        let (resp, doc) = response(
            200,
            &format!("<html><body><h1>Access Denied</h1><footer>{footer}</footer></body></html>"),
        );
        assert!(matches!(
            detector.classify(&resp, &doc),
            Verdict::Blocked { status: Some(200), .. }
        ));
    }
}
