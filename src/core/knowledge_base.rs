//! Static signature tables used by the scoring engine.
//!
//! Every needle is lower-case: the scorer lower-cases headers and body before
//! matching.

/// Reason stored when no rule contributed.
pub const NO_REASON: &str = "Aucun critère d'ancienneté détecté";

/// Extra points for a site only reachable over plain HTTP.
pub const HTTP_PENALTY: i32 = 25;
pub const HTTP_PENALTY_PREFIX: &str = "Pas de HTTPS; ";

pub const REASON_EMPTY: &str = "Contenu insuffisant (site parking ou vide)";
pub const REASON_PARKING: &str = "Page parking / domaine à vendre";
pub const REASON_ERROR_PAGE: &str = "Page d'erreur ou en construction";

/// Bodies shorter than this (in characters) are treated as empty.
pub const MIN_BODY_CHARS: usize = 100;

/// A group of substrings that all describe the same legacy component.
pub struct Signature {
    /// Substrings searched in the lower-cased header value. Any one matches.
    pub needles: &'static [&'static str],
    /// Score contribution when matched.
    pub points: i32,
    /// Reason label; the matched header value is appended in parentheses.
    pub label: &'static str,
}

/// Old server builds advertised in the `Server` header.
pub static SERVER_SIGNATURES: &[Signature] = &[
    Signature {
        needles: &["apache/1.", "apache/2.0", "apache/2.2"],
        points: 15,
        label: "Apache ancien",
    },
    Signature { needles: &["iis/5", "iis/6", "iis/7"], points: 15, label: "IIS ancien" },
    Signature {
        needles: &["php/4", "php/5.0", "php/5.1", "php/5.2"],
        points: 20,
        label: "PHP très ancien",
    },
    Signature { needles: &["php/5.3", "php/5.4", "php/5.5"], points: 15, label: "PHP 5.x ancien" },
];

/// Old runtimes advertised in the `X-Powered-By` header.
pub static POWERED_BY_SIGNATURES: &[Signature] = &[
    Signature {
        needles: &["php/4", "php/5.0", "php/5.1", "php/5.2"],
        points: 20,
        label: "X-Powered-By PHP ancien",
    },
    Signature {
        needles: &["php/5.3", "php/5.4", "php/5.5"],
        points: 15,
        label: "X-Powered-By PHP 5.x",
    },
];

pub const LEGACY_CHARSETS: &[&str] = &["iso-8859", "windows-1252"];

/// Domain-for-sale and parking provider phrases (FR + EN).
pub const PARKING_KEYWORDS: &[&str] = &[
    "domain for sale",
    "this domain is for sale",
    "buy this domain",
    "domain is parked",
    "parked domain",
    "domain parking",
    "domaine à vendre",
    "ce domaine est à vendre",
    "domaine en vente",
    "acheter ce domaine",
    "sedo",
    "godaddy parking",
];

/// Error and placeholder page phrases (FR + EN).
pub const ERROR_KEYWORDS: &[&str] = &[
    "page not found",
    "error 404",
    "under construction",
    "coming soon",
    "page introuvable",
    "page non trouvée",
    "erreur 404",
    "site en construction",
    "bientôt disponible",
];

pub const DOCTYPE_HTML4: &str = "<!doctype html public \"-//w3c//dtd html 4";
pub const DOCTYPE_XHTML10: &str = "<!doctype html public \"-//w3c//dtd xhtml 1.0";

/// Presentational tags removed from modern HTML. Only the first hit scores.
pub const OBSOLETE_TAGS: &[&str] = &["<font", "<center", "<marquee", "<blink", "<frame"];

/// More inline `style=` attributes than this scores as hand-styled markup.
pub const INLINE_STYLE_LIMIT: usize = 20;

pub const JOOMLA_OLD: &[&str] = &["joomla! 1.", "joomla! 2."];
pub const TYPO3_OLD: &[&str] = &["typo3 4."];
pub const DRUPAL_OLD: &[&str] = &["drupal 6", "drupal 7"];

/// WordPress majors and the points awarded below each, checked in order.
pub const WORDPRESS_THRESHOLDS: &[(u32, i32)] = &[(3, 30), (4, 20), (5, 10)];

/// Structural HTML5-era tags. Needs this many distinct kinds to score.
pub const STRUCTURAL_TAGS: &[&str] = &["article", "section", "nav", "main", "p", "h1", "h2"];
pub const STRUCTURAL_MIN_KINDS: usize = 3;
pub const IMAGE_LIMIT: usize = 5;

/// WYSIWYG authoring tools named in `<meta name="generator">`.
pub const LEGACY_GENERATORS: &[&str] = &["frontpage", "dreamweaver", "golive"];

pub const SECURITY_HEADERS: &[&str] = &[
    "strict-transport-security",
    "x-frame-options",
    "x-content-type-options",
    "content-security-policy",
];

/// Markers of a modern front-end stack. Only the first hit applies.
pub const MODERN_FRAMEWORKS: &[&str] = &[
    "react",
    "vue.js",
    "angular",
    "next.js",
    "nuxt",
    "tailwind",
    "bootstrap 5",
];
