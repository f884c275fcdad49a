use regex::Regex;
use url::Url;

use crate::domain::PageContext;

/// Parse a host document address into video-page identifiers.
///
/// Qualifying addresses have a `/video/{id}` path segment; an optional `p={n}`
/// query parameter selects one part of a multi-part upload. Returns `None`
/// for anything else (non-qualifying page).
pub fn parse_video_page(address: &str) -> Option<PageContext> {
    let url = Url::parse(address).ok()?;

    // Matches the id segment after /video/
    let re = Regex::new(r"/video/([A-Za-z0-9]+)").ok()?;
    let caps = re.captures(url.path())?;
    let video_id = caps[1].to_string();

    let part = url
        .query_pairs()
        .find(|(k, _)| k == "p")
        .and_then(|(_, v)| v.parse::<u32>().ok());

    Some(PageContext { video_id, part })
}

/// Sanitize a title into a safe file name: disallowed filename characters
/// become `_`, runs of whitespace collapse to a single space, and leading or
/// trailing dots/spaces are trimmed.
pub fn sanitize_filename(filename: &str) -> String {
    let replaced: String = filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect();

    replaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c| c == '.' || c == ' ')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_page() {
        let ctx = parse_video_page("https://www.bilibili.com/video/BV1xx411c7mD").unwrap();
        assert_eq!(ctx.video_id, "BV1xx411c7mD");
        assert_eq!(ctx.part, None);
    }

    #[test]
    fn test_parse_video_page_with_part() {
        let ctx =
            parse_video_page("https://www.bilibili.com/video/BV1xx411c7mD?p=3&t=12").unwrap();
        assert_eq!(ctx.video_id, "BV1xx411c7mD");
        assert_eq!(ctx.part, Some(3));
    }

    #[test]
    fn test_parse_non_qualifying_pages() {
        assert!(parse_video_page("https://www.bilibili.com/").is_none());
        assert!(parse_video_page("https://www.bilibili.com/bangumi/play/ep1").is_none());
        assert!(parse_video_page("not a url").is_none());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(r#"a/b:c*d"e"#), "a_b_c_d_e");
        assert_eq!(sanitize_filename("test/file.mp3"), "test_file.mp3");
        assert_eq!(sanitize_filename("normal-name"), "normal-name");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_filename("  a   b\t c  "), "a b c");
        assert_eq!(sanitize_filename("trailing dots..."), "trailing dots");
    }
}
