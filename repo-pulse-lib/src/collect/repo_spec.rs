use crate::Result;
use crate::model::RepoKey;
use ohno::{IntoAppError, bail};
use url::Url;

const GITHUB_HOSTS: &[&str] = &["github.com", "www.github.com"];

/// Extract `owner/name` from a GitHub repository URL.
///
/// Trailing slashes, a `.git` suffix on the repository segment and any deeper path
/// (`/tree/main/...`, `/blob/...`, `/issues`) are ignored.
pub fn parse_github_url(url: &str) -> Result<RepoKey> {
    let parsed = Url::parse(url.trim()).into_app_err_with(|| format!("invalid repository URL '{url}'"))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("unsupported URL scheme in '{url}'");
    }

    let host = parsed.host_str().unwrap_or_default();
    if !GITHUB_HOSTS.iter().any(|h| host.eq_ignore_ascii_case(h)) {
        bail!("not a GitHub repository URL: '{url}'");
    }

    let mut segments = parsed.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
    let (Some(owner), Some(repo)) = (segments.next(), segments.next()) else {
        bail!("missing owner or repository name in '{url}'");
    };

    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if repo.is_empty() {
        bail!("missing repository name in '{url}'");
    }

    Ok(RepoKey::new(owner, repo))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> String {
        parse_github_url(url).unwrap().to_string()
    }

    #[test]
    fn test_parse_plain_url() {
        assert_eq!(parse("https://github.com/bitcoin/bitcoin"), "bitcoin/bitcoin");
    }

    #[test]
    fn test_parse_normalizes_suffixes_and_paths() {
        assert_eq!(parse("https://github.com/ethereum/go-ethereum/"), "ethereum/go-ethereum");
        assert_eq!(parse("https://github.com/ethereum/go-ethereum.git"), "ethereum/go-ethereum");
        assert_eq!(parse("https://github.com/solana-labs/solana/tree/master/sdk"), "solana-labs/solana");
        assert_eq!(parse("https://github.com/solana-labs/solana/blob/master/README.md"), "solana-labs/solana");
        assert_eq!(parse("https://www.github.com/a/b"), "a/b");
        assert_eq!(parse("http://GitHub.com/a/b"), "a/b");
    }

    #[test]
    fn test_git_suffix_stripped_only_once() {
        assert_eq!(parse("https://github.com/foo/bar.git.git"), "foo/bar.git");
    }

    #[test]
    fn test_reject_other_hosts() {
        let _ = parse_github_url("https://gitlab.com/a/b").unwrap_err();
        let _ = parse_github_url("https://github.com.evil.example/a/b").unwrap_err();
    }

    #[test]
    fn test_reject_missing_segments() {
        let _ = parse_github_url("https://github.com/").unwrap_err();
        let _ = parse_github_url("https://github.com/bitcoin").unwrap_err();
        let _ = parse_github_url("https://github.com//bitcoin").unwrap_err();
        let _ = parse_github_url("https://github.com/owner/.git").unwrap_err();
    }

    #[test]
    fn test_reject_malformed_and_non_http() {
        let _ = parse_github_url("not a url").unwrap_err();
        let _ = parse_github_url("").unwrap_err();
        let _ = parse_github_url("ftp://github.com/a/b").unwrap_err();
    }
}
