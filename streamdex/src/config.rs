//! Configuration loading from environment variables.
//!
//! # Environment Variables
//!
//! - `STREAMDEX_PAGE_CACHE_PAGES`: Index pages kept in memory per open tree
//!   (default: `256`, `0` disables the cache)
//! - `STREAMDEX_OBJECT_ROOT`: Directory that backs `--remote` object names
//!   (default: `./objects`)
//! - `STREAMDEX_LEAF_LAYOUT`: Leaf entry layout, `head-tail` or `head-only`
//!   (default: `head-tail`)
//!
//! # Invariants
//!
//! - `object_root` is always a valid path (may not exist yet)
//! - `leaf_layout` is one of the two supported layouts

use std::path::PathBuf;

use crate::btree::LeafLayout;

/// Runtime configuration.
///
/// # Post-conditions
///
/// When constructed via `from_env()`, every field holds either the parsed
/// environment value or its documented default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Capacity of the index page cache, in pages.
    pub page_cache_pages: usize,
    /// Root directory for the directory-backed object store.
    pub object_root: PathBuf,
    /// Leaf layout the index was written with.
    pub leaf_layout: LeafLayout,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_cache_pages: Self::DEFAULT_PAGE_CACHE_PAGES,
            object_root: PathBuf::from(Self::DEFAULT_OBJECT_ROOT),
            leaf_layout: LeafLayout::default(),
        }
    }
}

impl Config {
    /// Default page cache capacity.
    pub const DEFAULT_PAGE_CACHE_PAGES: usize = 256;
    /// Default object store root directory.
    pub const DEFAULT_OBJECT_ROOT: &'static str = "./objects";

    const PAGE_CACHE_PAGES: &'static str = "STREAMDEX_PAGE_CACHE_PAGES";
    const OBJECT_ROOT: &'static str = "STREAMDEX_OBJECT_ROOT";
    const LEAF_LAYOUT: &'static str = "STREAMDEX_LEAF_LAYOUT";

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `STREAMDEX_PAGE_CACHE_PAGES` is set but not a non-negative integer
    /// - `STREAMDEX_LEAF_LAYOUT` is set but names no known layout
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let page_cache_pages = match lookup(Self::PAGE_CACHE_PAGES) {
            Some(value) => value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                name: Self::PAGE_CACHE_PAGES.to_string(),
                message: format!("'{value}' is not a page count"),
            })?,
            None => Self::DEFAULT_PAGE_CACHE_PAGES,
        };

        let object_root = lookup(Self::OBJECT_ROOT)
            .filter(|value| !value.is_empty())
            .map_or_else(|| PathBuf::from(Self::DEFAULT_OBJECT_ROOT), PathBuf::from);

        let leaf_layout = match lookup(Self::LEAF_LAYOUT) {
            Some(value) => parse_leaf_layout(&value).ok_or_else(|| ConfigError::InvalidValue {
                name: Self::LEAF_LAYOUT.to_string(),
                message: format!("'{value}' is not one of: head-tail, head-only"),
            })?,
            None => LeafLayout::default(),
        };

        Ok(Self {
            page_cache_pages,
            object_root,
            leaf_layout,
        })
    }
}

/// Parse a leaf layout name.
#[must_use]
pub fn parse_leaf_layout(value: &str) -> Option<LeafLayout> {
    match value.trim() {
        "head-tail" => Some(LeafLayout::HeadAndTail),
        "head-only" => Some(LeafLayout::HeadOnly),
        _ => None,
    }
}
