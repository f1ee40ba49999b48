//! Reflex Core
//!
//! This crate provides an incremental computation engine over a namespace of
//! named values. It implements:
//!
//! - A namespace mapping names to literals or deferred computations
//! - Dependency discovery by recording what each computation reads
//! - Caching with cascading invalidation on writes
//! - Lazy or eager recomputation of downstream values
//! - Sources that push change notifications from outside
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: the namespace, descriptors, sources and options
//! - `graph`: the dependency graph the namespace records into
//!
//! # Example
//!
//! ```rust
//! use reflex_core::{Namespace, Options};
//!
//! let mut ns: Namespace<f64> = Namespace::with_options(Options::default().lazy_eval(false));
//! ns.set("width", 3.0).unwrap();
//! ns.set("height", 4.0).unwrap();
//!
//! let area = ns
//!     .call(|args| Ok(args.get("width")? * args.get("height")?))
//!     .params(["width", "height"])
//!     .build();
//! ns.define("area", area).unwrap();
//! assert_eq!(ns.get("area").unwrap(), 12.0);
//!
//! // Only `area` is recomputed.
//! ns.set("width", 5.0).unwrap();
//! assert_eq!(ns.get("area").unwrap(), 20.0);
//! ```

pub mod graph;
pub mod reactive;

mod error;

pub use error::{BoxError, Error, Result};
pub use reactive::{
    Arg, Args, Call, CallBuilder, Descriptor, Entry, FileSource, Function, Getter, InputSource,
    Namespace, NamespaceId, Options, OptionsUpdate, OverrideContext, SharedNamespace, Source,
    SubscriberId, UpdateHook, UpdateHooks,
};
