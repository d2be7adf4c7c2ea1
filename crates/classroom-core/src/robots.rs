//! Crawler policy.

use crate::roles::PROTECTED_PATH_PREFIXES;

/// Render `robots.txt`: everything is crawlable except the signed-in
/// portals, the API and messaging.
pub fn robots_txt(site_url: Option<&str>) -> String {
    let mut lines = vec!["User-agent: *".to_string(), "Allow: /".to_string()];
    lines.extend(
        PROTECTED_PATH_PREFIXES
            .iter()
            .map(|prefix| format!("Disallow: {}", prefix)),
    );

    if let Some(site_url) = site_url.map(|s| s.trim_end_matches('/')).filter(|s| !s.is_empty()) {
        lines.push(String::new());
        lines.push(format!("Sitemap: {}/sitemap.xml", site_url));
    }

    let mut body = lines.join("\n");
    body.push('\n');
    body
}
