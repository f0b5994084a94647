//! Directory-index parsing for the archive HTTP server.

/// Every `href` target in `html` that names a `.nc` file, in page order,
/// without duplicates.
pub fn extract_nc_links(html: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for target in hrefs(html) {
        let path = target.split(['?', '#']).next().unwrap_or(target);
        if path.ends_with(".nc") && !links.iter().any(|l| l == target) {
            links.push(target.to_string());
        }
    }
    links
}

/// Raw `href` attribute values, quoted or bare.
fn hrefs(html: &str) -> Vec<&str> {
    let lower = html.to_ascii_lowercase();
    let mut values = Vec::new();
    let mut pos = 0;

    while let Some(found) = lower[pos..].find("href") {
        let mut i = pos + found + 4;
        pos = i;

        let bytes = html.as_bytes();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let (start, end) = match bytes[i] {
            quote @ (b'"' | b'\'') => {
                let start = i + 1;
                match html[start..].find(quote as char) {
                    Some(len) => (start, start + len),
                    None => break,
                }
            }
            _ => {
                let start = i;
                let len = html[start..]
                    .find(|c: char| c.is_ascii_whitespace() || c == '>')
                    .unwrap_or(html.len() - start);
                (start, start + len)
            }
        };
        values.push(html[start..end].trim());
        pos = end;
    }
    values
}

/// Absolute URL of `href` as linked from the index page at `folder_url`.
pub fn resolve(folder_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!(
            "{}/{}",
            folder_url.trim_end_matches('/'),
            href.trim_start_matches("./").trim_start_matches('/')
        )
    }
}

/// Local file name for a link: its last path segment.
pub fn file_name(href: &str) -> Option<&str> {
    let path = href.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|name| !name.is_empty())
}
