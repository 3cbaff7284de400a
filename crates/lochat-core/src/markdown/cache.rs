//! Markdown Cache
//!
//! Memoises rendered HTML for finished messages so the transcript can be
//! rebuilt on every chunk without re-rendering the whole history.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::theme::RenderTheme;

/// Cached rendered markdown keyed by content hash
pub struct MarkdownCache {
    cache: HashMap<u64, Arc<String>>,
    /// Theme the cached entries were rendered with
    theme_name: String,
}

impl Default for MarkdownCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            theme_name: String::new(),
        }
    }

    /// Hash used as the cache key
    fn content_hash(content: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        hasher.finish()
    }

    /// Check if the theme changed and invalidate if needed
    /// Returns true if cache was invalidated
    pub fn check_theme(&mut self, theme: &RenderTheme) -> bool {
        if self.theme_name != theme.name {
            self.cache.clear();
            self.theme_name = theme.name.clone();
            true
        } else {
            false
        }
    }

    /// Get or render markdown, caching the result
    pub fn get_or_render(&mut self, content: &str, theme: &RenderTheme) -> Arc<String> {
        self.check_theme(theme);
        let key = Self::content_hash(content);

        if let Some(cached) = self.cache.get(&key) {
            Arc::clone(cached)
        } else {
            let rendered = Arc::new(super::render_with_theme(content, theme));
            self.cache.insert(key, Arc::clone(&rendered));
            rendered
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::theme::{daylight, midnight};

    #[test]
    fn test_hit_returns_same_arc() {
        let mut cache = MarkdownCache::new();
        let theme = midnight();
        let first = cache.get_or_render("**hi**", &theme);
        let second = cache.get_or_render("**hi**", &theme);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_theme_change_invalidates() {
        let mut cache = MarkdownCache::new();
        cache.get_or_render("# title", &midnight());
        assert!(cache.check_theme(&daylight()));
        assert!(cache.is_empty());
        assert!(!cache.check_theme(&daylight()));
    }
}
