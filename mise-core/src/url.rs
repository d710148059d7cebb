//! Source URL canonicalization and cache-key derivation.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::PipelineError;

/// Canonicalizes URLs by dropping fragments and tracking parameters.
#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl UrlNormalizer {
    /// Build a normalizer from a deny-list. Entries ending in `*` match by prefix.
    pub fn new<S: AsRef<str>>(tracking_params: &[S]) -> Self {
        let mut exact = Vec::new();
        let mut prefixes = Vec::new();
        for param in tracking_params {
            let param = param.as_ref().trim().to_ascii_lowercase();
            if param.is_empty() {
                continue;
            }
            match param.strip_suffix('*') {
                Some(prefix) => prefixes.push(prefix.to_string()),
                None => exact.push(param),
            }
        }
        Self { exact, prefixes }
    }

    fn is_tracking(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.exact.iter().any(|p| *p == name) || self.prefixes.iter().any(|p| name.starts_with(p))
    }

    /// Normalize a URL.
    ///
    /// Scheme and host are lowercased by the parser; the fragment and all
    /// deny-listed query parameters are removed. Remaining parameters keep
    /// their order and their original encoding.
    pub fn normalize(&self, raw: &str) -> Result<String, PipelineError> {
        let mut url =
            Url::parse(raw.trim()).map_err(|e| PipelineError::MalformedUrl(format!("{raw}: {e}")))?;

        if url.host_str().is_none() {
            return Err(PipelineError::MalformedUrl(format!("{raw}: missing host")));
        }

        url.set_fragment(None);

        let kept: Option<Vec<String>> = url.query().map(|query| {
            query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .filter(|pair| {
                    let name = pair.split('=').next().unwrap_or_default();
                    let decoded = percent_decode(name);
                    !self.is_tracking(&decoded)
                })
                .map(str::to_string)
                .collect()
        });

        match kept {
            Some(pairs) if !pairs.is_empty() => url.set_query(Some(&pairs.join("&"))),
            _ => url.set_query(None),
        }

        Ok(url.to_string())
    }
}

impl Default for UrlNormalizer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TRACKING_PARAMS)
    }
}

fn percent_decode(name: &str) -> String {
    url::form_urlencoded::parse(name.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}

/// Derives the cache key for a source URL.
#[derive(Debug)]
pub struct ContentHasher {
    normalizer: UrlNormalizer,
    memo: DashMap<String, String>,
    memo_capacity: usize,
}

impl ContentHasher {
    pub fn new(normalizer: UrlNormalizer, memo_capacity: usize) -> Self {
        Self {
            normalizer,
            memo: DashMap::new(),
            memo_capacity,
        }
    }

    pub fn normalizer(&self) -> &UrlNormalizer {
        &self.normalizer
    }

    /// SHA-256 of the normalized URL as 64 lowercase hex characters.
    pub fn hash(&self, url: &str) -> Result<String, PipelineError> {
        if url.trim().is_empty() {
            return Err(PipelineError::InvalidArgument(
                "url must not be blank".to_string(),
            ));
        }

        if let Some(hash) = self.memo.get(url) {
            return Ok(hash.clone());
        }

        let normalized = self.normalizer.normalize(url)?;
        let hash = sha256_hex(&normalized);

        if self.memo_capacity > 0 {
            if self.memo.len() >= self.memo_capacity {
                self.memo.clear();
            }
            self.memo.insert(url.to_string(), hash.clone());
        }

        Ok(hash)
    }

    /// Number of memoized entries.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> ContentHasher {
        ContentHasher::new(UrlNormalizer::default(), 16)
    }

    #[test]
    fn test_normalize_lowercases_scheme_and_host() {
        let normalizer = UrlNormalizer::default();
        assert_eq!(
            normalizer
                .normalize("HTTPS://Example.COM/Recipes/Chili")
                .unwrap(),
            "https://example.com/Recipes/Chili"
        );
    }

    #[test]
    fn test_normalize_strips_fragment_and_tracking() {
        let normalizer = UrlNormalizer::default();
        assert_eq!(
            normalizer
                .normalize("https://example.com/chili?utm_source=x&id=4&FBCLID=abc&page=2#step-3")
                .unwrap(),
            "https://example.com/chili?id=4&page=2"
        );
    }

    #[test]
    fn test_normalize_drops_empty_query() {
        let normalizer = UrlNormalizer::default();
        assert_eq!(
            normalizer
                .normalize("https://example.com/chili?utm_medium=email&gclid=1")
                .unwrap(),
            "https://example.com/chili"
        );
    }

    #[test]
    fn test_normalize_preserves_encoding_of_kept_params() {
        let normalizer = UrlNormalizer::default();
        assert_eq!(
            normalizer
                .normalize("https://example.com/search?q=chili%20beans&utm_term=x")
                .unwrap(),
            "https://example.com/search?q=chili%20beans"
        );
    }

    #[test]
    fn test_normalize_matches_encoded_tracking_names() {
        let normalizer = UrlNormalizer::default();
        assert_eq!(
            normalizer
                .normalize("https://example.com/a?utm%5Fsource=x&b=1")
                .unwrap(),
            "https://example.com/a?b=1"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = UrlNormalizer::default();
        let once = normalizer
            .normalize("HTTP://WWW.Example.com:8080/a/b?x=1&utm_id=2#frag")
            .unwrap();
        assert_eq!(normalizer.normalize(&once).unwrap(), once);
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        let normalizer = UrlNormalizer::default();
        assert!(matches!(
            normalizer.normalize("not a url"),
            Err(PipelineError::MalformedUrl(_))
        ));
        assert!(matches!(
            normalizer.normalize("mailto:cook@example.com"),
            Err(PipelineError::MalformedUrl(_))
        ));
    }

    #[test]
    fn test_custom_deny_list() {
        let normalizer = UrlNormalizer::new(&["session*", "src"]);
        assert_eq!(
            normalizer
                .normalize("https://example.com/?sessionid=1&src=feed&utm_source=kept")
                .unwrap(),
            "https://example.com/?utm_source=kept"
        );
    }

    #[test]
    fn test_hash_is_stable_under_noise() {
        let hasher = hasher();
        let base = hasher.hash("https://example.com/chili?id=4").unwrap();
        assert_eq!(base.len(), 64);
        assert_eq!(
            hasher
                .hash("HTTPS://EXAMPLE.com/chili?id=4&utm_campaign=fall#top")
                .unwrap(),
            base
        );
        assert_ne!(hasher.hash("https://example.com/chili?id=5").unwrap(), base);
    }

    #[test]
    fn test_hash_rejects_blank() {
        let hasher = hasher();
        assert!(matches!(
            hasher.hash("   "),
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_memo_is_bounded() {
        let hasher = ContentHasher::new(UrlNormalizer::default(), 2);
        for i in 0..5 {
            hasher.hash(&format!("https://example.com/{i}")).unwrap();
        }
        assert!(hasher.memo_len() <= 2);

        let disabled = ContentHasher::new(UrlNormalizer::default(), 0);
        disabled.hash("https://example.com/").unwrap();
        assert_eq!(disabled.memo_len(), 0);
    }
}
