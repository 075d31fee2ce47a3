// src/core/domains.rs

use color_eyre::eyre::{Result, WrapErr};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::core::models::Domain;

const SAMPLE_DOMAINS: &[&str] = &[
    "admin.ch",
    "sbb.ch",
    "cff.ch",
    "swisscom.ch",
    "post.ch",
    "srf.ch",
    "rts.ch",
    "epfl.ch",
    "ethz.ch",
    "uzh.ch",
    "unige.ch",
    "unil.ch",
    "migros.ch",
    "coop.ch",
    "manor.ch",
    "galaxus.ch",
    "digitec.ch",
    "20min.ch",
    "blick.ch",
    "tagesanzeiger.ch",
    "nzz.ch",
    "watson.ch",
];

/// Parses a line-delimited domain list.
///
/// Blank lines and `#` comments are skipped; repeated domains keep their first
/// position. Nothing else is validated: a malformed entry simply fails to
/// connect later.
pub fn parse_domains(text: &str) -> Vec<Domain> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Domain::new)
        .filter(|domain| seen.insert(domain.clone()))
        .collect()
}

/// Reads the domain list at `path`. Failing to open it is fatal to the run.
pub async fn read_domains(path: &Path) -> Result<Vec<Domain>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("cannot read domain list {}", path.display()))?;
    let domains = parse_domains(&text);
    info!(path = %path.display(), count = domains.len(), "Domain list loaded.");
    Ok(domains)
}

/// Writes an example domain list.
pub async fn write_sample(path: &Path) -> Result<()> {
    let mut text = String::from(
        "# Example list of .ch domains to scan\n\
         # One domain per line; lines starting with # are ignored\n\n",
    );
    for domain in SAMPLE_DOMAINS {
        text.push_str(domain);
        text.push('\n');
    }
    tokio::fs::write(path, text)
        .await
        .wrap_err_with(|| format!("cannot write sample list {}", path.display()))?;
    debug!(path = %path.display(), "Sample domain list written.");
    Ok(())
}
