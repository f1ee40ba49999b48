//! Evaluation options.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default nesting depth at which evaluation gives up with
/// [`Error::RecursionLimit`](crate::Error::RecursionLimit).
pub const DEFAULT_RECURSION_LIMIT: usize = 256;

/// Instance-wide evaluation policy of a namespace.
///
/// ```rust
/// use reflex_core::Options;
///
/// let options = Options::from_json(r#"{ "lazy_eval": false }"#).unwrap();
/// assert!(options.use_cache);
/// assert!(!options.lazy_eval);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Keep computed values until an input changes.
    pub use_cache: bool,

    /// Compute on read. When false, every write immediately recomputes the
    /// downstream names nothing else reads, so errors surface at write time.
    pub lazy_eval: bool,

    /// Emit a `tracing` event for every internal operation.
    pub verbose: bool,

    /// Maximum nesting of derived evaluations before a cycle is assumed.
    pub recursion_limit: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            use_cache: true,
            lazy_eval: true,
            verbose: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl Options {
    /// Parse options from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set `use_cache`.
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Set `lazy_eval`.
    pub fn lazy_eval(mut self, lazy_eval: bool) -> Self {
        self.lazy_eval = lazy_eval;
        self
    }

    /// Set `verbose`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set `recursion_limit`.
    pub fn recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = recursion_limit;
        self
    }

    /// Apply the fields present in `update`.
    pub fn apply(&mut self, update: OptionsUpdate) {
        if let Some(use_cache) = update.use_cache {
            self.use_cache = use_cache;
        }
        if let Some(lazy_eval) = update.lazy_eval {
            self.lazy_eval = lazy_eval;
        }
        if let Some(verbose) = update.verbose {
            self.verbose = verbose;
        }
        if let Some(recursion_limit) = update.recursion_limit {
            self.recursion_limit = recursion_limit;
        }
    }
}

/// A partial change to [`Options`]. Absent fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsUpdate {
    /// New `use_cache`, if changing.
    pub use_cache: Option<bool>,
    /// New `lazy_eval`, if changing.
    pub lazy_eval: Option<bool>,
    /// New `verbose`, if changing.
    pub verbose: Option<bool>,
    /// New `recursion_limit`, if changing.
    pub recursion_limit: Option<usize>,
}

impl OptionsUpdate {
    /// An update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn the cache on or off. Existing cache entries are kept.
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    /// Switch between lazy and eager evaluation. Takes effect on the next write.
    pub fn lazy_eval(mut self, lazy_eval: bool) -> Self {
        self.lazy_eval = Some(lazy_eval);
        self
    }

    /// Turn operation tracing on or off.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Change the maximum nesting of derived evaluations.
    pub fn recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = Some(recursion_limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cache_and_stay_lazy() {
        let options = Options::default();
        assert!(options.use_cache);
        assert!(options.lazy_eval);
        assert!(!options.verbose);
        assert_eq!(options.recursion_limit, DEFAULT_RECURSION_LIMIT);
    }

    #[test]
    fn json_fills_missing_fields() {
        let options = Options::from_json(r#"{ "use_cache": false, "recursion_limit": 8 }"#).unwrap();
        assert_eq!(
            options,
            Options::default().use_cache(false).recursion_limit(8)
        );
    }

    #[test]
    fn json_rejects_wrong_types() {
        assert!(Options::from_json(r#"{ "verbose": "yes" }"#).is_err());
    }

    #[test]
    fn update_touches_only_present_fields() {
        let mut options = Options::default().verbose(true);
        options.apply(OptionsUpdate::new().lazy_eval(false));

        assert!(options.use_cache);
        assert!(!options.lazy_eval);
        assert!(options.verbose);
    }
}
