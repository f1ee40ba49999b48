//! Reactive Namespace
//!
//! This module implements the namespace of named values and the descriptors
//! that compute them.
//!
//! # Concepts
//!
//! ## Entries
//!
//! Every name holds either a literal value or a [`Descriptor`]. Literals are
//! returned as stored. Descriptors are computed on demand from other names.
//!
//! ## Descriptors
//!
//! A [`Getter`] reads one name. A [`Call`] applies a function to argument
//! slots that may themselves be names, getters or nested calls. A [`Source`]
//! is a root value owned by something outside the namespace, which pushes
//! change notifications through update hooks.
//!
//! ## Dependencies
//!
//! Edges are recorded while computing: a derived name depends on exactly the
//! names its last computation read. Writing a name invalidates the cached
//! values of everything downstream of it.
//!
//! # Implementation Notes
//!
//! Evaluation is recursive over the namespace, with an explicit depth
//! counter standing in for the call stack. Source notifications may arrive
//! on any thread; they are queued and applied at the start of the next
//! operation on the namespace.

mod context;
mod descriptor;
mod namespace;
mod options;
mod shared;
mod source;
mod subscriber;

pub use context::OverrideContext;
pub use descriptor::{Arg, Args, Call, CallBuilder, Descriptor, Function, Getter};
pub use namespace::{Entry, Namespace, NamespaceId};
pub use options::{Options, OptionsUpdate, DEFAULT_RECURSION_LIMIT};
pub use shared::SharedNamespace;
pub use source::{FileSource, InputSource, Source};
pub use subscriber::{SubscriberId, UpdateHook, UpdateHooks};
