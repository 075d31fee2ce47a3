// src/core/scanner/scoring.rs

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

use crate::core::knowledge_base::{
    Signature, DOCTYPE_HTML4, DOCTYPE_XHTML10, DRUPAL_OLD, ERROR_KEYWORDS, IMAGE_LIMIT,
    INLINE_STYLE_LIMIT, JOOMLA_OLD, LEGACY_CHARSETS, LEGACY_GENERATORS, MIN_BODY_CHARS,
    MODERN_FRAMEWORKS, OBSOLETE_TAGS, PARKING_KEYWORDS, POWERED_BY_SIGNATURES, REASON_EMPTY,
    REASON_ERROR_PAGE, REASON_PARKING, SECURITY_HEADERS, SERVER_SIGNATURES, STRUCTURAL_MIN_KINDS,
    STRUCTURAL_TAGS, TYPO3_OLD, WORDPRESS_THRESHOLDS,
};
use crate::core::models::{Headers, ScoreResult};

static RE_META_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"charset\s*=\s*["']?iso-8859"#).unwrap());
// 3.0 to 3.2 only: "joomla! 3.10" must not match.
static RE_JOOMLA_3_EARLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"joomla! 3\.[0-2](?:\D|$)").unwrap());
static RE_WORDPRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"wordpress[/\s]+(\d+)\.(\d+)").unwrap());
static RE_GENERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<meta\s+name=["']generator["']\s+content=["']([^"']+)"#).unwrap()
});
static RE_STRUCTURAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"<({})[\s>/]", STRUCTURAL_TAGS.join("|"))).unwrap()
});

/// Computes the staleness score of a response.
///
/// Rules run in a fixed order and are additive, except for four short-circuits
/// (dead site, empty body, parking page, error page) which discard everything
/// accumulated so far. Header names are matched case-insensitively. The
/// function is pure and total: unparsable input only means fewer matches.
pub fn score(status: u16, headers: &Headers, body_sample: &str) -> ScoreResult {
    if status >= 400 {
        return ScoreResult::short_circuit(-100, format!("Site non accessible (HTTP {})", status));
    }

    let headers: Headers = headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
        .collect();
    let mut result = ScoreResult::default();

    if status == 200 {
        result.add(5, "Site actif (HTTP 200)");
    }

    score_platform_headers(&headers, &mut result);

    let content_type = header(&headers, "content-type");
    if LEGACY_CHARSETS.iter().any(|c| content_type.contains(c)) {
        result.add(15, format!("Charset ancien ({})", content_type));
    }

    if body_sample.chars().count() < MIN_BODY_CHARS {
        return ScoreResult::short_circuit(-50, REASON_EMPTY);
    }

    let body = body_sample.to_lowercase();

    if PARKING_KEYWORDS.iter().any(|k| body.contains(k)) {
        return ScoreResult::short_circuit(-80, REASON_PARKING);
    }
    if ERROR_KEYWORDS.iter().any(|k| body.contains(k)) {
        return ScoreResult::short_circuit(-60, REASON_ERROR_PAGE);
    }

    score_markup(&body, &mut result);
    score_cms(&body, &mut result);
    score_active_content(&body, &mut result);

    if let Some(generator) = RE_GENERATOR.captures(&body).and_then(|c| c.get(1)) {
        let generator = generator.as_str();
        if LEGACY_GENERATORS.iter().any(|g| generator.contains(g)) {
            result.add(20, format!("Générateur ancien: {}", generator));
        }
    }

    let missing = SECURITY_HEADERS.iter().filter(|h| !headers.contains_key(**h)).count();
    match missing {
        4 => result.add(15, "Manque 4/4 headers de sécurité"),
        3 => result.add(10, "Manque 3/4 headers de sécurité"),
        _ => {}
    }

    if let Some(framework) = MODERN_FRAMEWORKS.iter().find(|f| body.contains(**f)) {
        result.add(-15, format!("Framework moderne détecté ({})", framework));
    }

    debug!(score = result.score, rules = result.reasons.len(), "Scoring finished.");
    result
}

fn header<'a>(headers: &'a Headers, name: &str) -> &'a str {
    headers.get(name).map(String::as_str).unwrap_or("")
}

fn apply_signatures(value: &str, signatures: &[Signature], result: &mut ScoreResult) {
    if value.is_empty() {
        return;
    }
    for sig in signatures {
        if sig.needles.iter().any(|n| value.contains(n)) {
            result.add(sig.points, format!("{} ({})", sig.label, value));
        }
    }
}

fn score_platform_headers(headers: &Headers, result: &mut ScoreResult) {
    apply_signatures(header(headers, "server"), SERVER_SIGNATURES, result);

    let powered = header(headers, "x-powered-by");
    apply_signatures(powered, POWERED_BY_SIGNATURES, result);
    // ASP.NET Core does not advertise itself here; the classic stack does.
    if powered.contains("asp.net") && !powered.contains("core") {
        result.add(10, "ASP.NET classique");
    }
}

fn score_markup(body: &str, result: &mut ScoreResult) {
    if body.contains(DOCTYPE_HTML4) {
        result.add(20, "DOCTYPE HTML 4");
    }
    if body.contains(DOCTYPE_XHTML10) {
        result.add(15, "DOCTYPE XHTML 1.0");
    }
    if RE_META_CHARSET.is_match(body) {
        result.add(15, "Meta charset ISO-8859");
    }
    if let Some(tag) = OBSOLETE_TAGS.iter().find(|t| body.contains(**t)) {
        result.add(10, format!("Balise obsolète: {}", tag));
    }
    if body.matches("style=").count() > INLINE_STYLE_LIMIT {
        result.add(5, "Nombreux styles inline");
    }
    if !body.contains("viewport") {
        result.add(5, "Pas de meta viewport");
    }
}

fn score_cms(body: &str, result: &mut ScoreResult) {
    if JOOMLA_OLD.iter().any(|j| body.contains(j)) {
        result.add(25, "Joomla! ancien (1.x/2.x)");
    } else if RE_JOOMLA_3_EARLY.is_match(body) {
        result.add(20, "Joomla! 3.0-3.2");
    }

    if let Some((major, minor)) = wordpress_version(body) {
        if let Some((_, points)) = WORDPRESS_THRESHOLDS.iter().find(|(limit, _)| major < *limit) {
            result.add(*points, format!("WordPress ancien ({}.{})", major, minor));
        }
    }

    if TYPO3_OLD.iter().any(|t| body.contains(t)) {
        result.add(20, "TYPO3 4.x ancien");
    }
    if DRUPAL_OLD.iter().any(|d| body.contains(d)) {
        result.add(20, "Drupal 6/7 ancien");
    }
}

/// `major.minor` following the literal "wordpress". Out-of-range numbers yield `None`.
fn wordpress_version(body: &str) -> Option<(u32, u32)> {
    let caps = RE_WORDPRESS.captures(body)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    Some((major, minor))
}

fn score_active_content(body: &str, result: &mut ScoreResult) {
    let kinds: BTreeSet<&str> = RE_STRUCTURAL
        .captures_iter(body)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if kinds.len() >= STRUCTURAL_MIN_KINDS {
        result.add(10, format!("Contenu structuré ({} types de balises)", kinds.len()));
    }

    let images = body.matches("<img").count();
    if images > IMAGE_LIMIT {
        result.add(5, format!("Nombreuses images ({})", images));
    }
}
