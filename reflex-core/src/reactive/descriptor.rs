//! Computation Descriptors
//!
//! A descriptor is a deferred computation stored under a name in place of a
//! literal value. There are three kinds:
//!
//! - [`Getter`]: reads one other name of a namespace.
//! - [`Call`]: applies a function to argument slots. A slot holds a literal,
//!   an unregistered name reference, a getter, or another call, so calls
//!   compose into trees.
//! - [`Source`]: a root value maintained outside the namespace that can ask
//!   to be recomputed when it changes.
//!
//! # Registration
//!
//! Calls are built without a namespace. Name references inside them stay
//! unresolved until the call is assigned to a name, at which point the
//! namespace binds each reference to a [`Getter`] owned by itself. A call
//! that was never assigned cannot report dependencies or be computed.
//!
//! # Example
//!
//! ```rust
//! use reflex_core::{Arg, Namespace};
//!
//! let mut ns: Namespace<i64> = Namespace::new();
//! ns.set("a", 2).unwrap();
//! ns.set("b", 5).unwrap();
//!
//! // `params` stands in for the function's parameter list: anything not
//! // passed explicitly reads the name equal to the parameter.
//! let product = ns
//!     .call(|args| Ok(args.get("a")? * args.get("b")?))
//!     .params(["a", "b"])
//!     .build();
//! ns.define("c", product).unwrap();
//! assert_eq!(ns.get("c").unwrap(), 10);
//!
//! let shifted = ns
//!     .call(|args| Ok(args.at(0)? + args.get("by")?))
//!     .arg(Arg::name("c"))
//!     .kwarg("by", Arg::value(1))
//!     .build();
//! ns.define("d", shifted).unwrap();
//! assert_eq!(ns.get("d").unwrap(), 11);
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::namespace::NamespaceId;
use super::source::Source;
use crate::error::{BoxError, Error, Result};

/// A user function applied by a [`Call`].
pub type Function<V> = Arc<dyn Fn(&Args<V>) -> Result<V, BoxError> + Send + Sync>;

/// Reference to a name in one particular namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Getter {
    owner: NamespaceId,
    name: String,
}

impl Getter {
    /// Create a getter reading `name` from the namespace `owner`.
    pub fn new(owner: NamespaceId, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }

    /// The namespace this getter reads from.
    pub fn owner(&self) -> NamespaceId {
        self.owner
    }

    /// The name this getter reads.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One argument slot of a [`Call`].
#[derive(Clone)]
pub enum Arg<V> {
    /// A literal passed through unchanged.
    Value(V),
    /// A name in whichever namespace the call is registered with.
    Name(String),
    /// A name in a specific namespace.
    Getter(Getter),
    /// A nested call, computed first.
    Call(Box<Call<V>>),
}

impl<V> Arg<V> {
    /// A literal argument.
    pub fn value(value: V) -> Self {
        Arg::Value(value)
    }

    /// An argument read from `name` once registered.
    pub fn name(name: impl Into<String>) -> Self {
        Arg::Name(name.into())
    }

    fn register(&mut self, owner: NamespaceId) {
        match self {
            Arg::Name(name) => {
                let name = std::mem::take(name);
                *self = Arg::Getter(Getter::new(owner, name));
            }
            Arg::Call(call) => call.register(owner),
            Arg::Value(_) | Arg::Getter(_) => {}
        }
    }

    fn collect_dependencies(&self, into: &mut Vec<Getter>) -> Result<()> {
        match self {
            Arg::Value(_) => Ok(()),
            Arg::Name(_) => Err(Error::Unregistered),
            Arg::Getter(getter) => {
                into.push(getter.clone());
                Ok(())
            }
            Arg::Call(call) => call.collect_dependencies(into),
        }
    }
}

impl<V> From<Getter> for Arg<V> {
    fn from(getter: Getter) -> Self {
        Arg::Getter(getter)
    }
}

impl<V> From<Call<V>> for Arg<V> {
    fn from(call: Call<V>) -> Self {
        Arg::Call(Box::new(call))
    }
}

impl<V> From<CallBuilder<V>> for Arg<V> {
    fn from(builder: CallBuilder<V>) -> Self {
        Arg::Call(Box::new(builder.into_call()))
    }
}

impl<V: Debug> Debug for Arg<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Arg::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Arg::Getter(getter) => f.debug_tuple("Getter").field(getter).finish(),
            Arg::Call(call) => f.debug_tuple("Call").field(call).finish(),
        }
    }
}

/// A deferred function application.
#[derive(Clone)]
pub struct Call<V> {
    function: Function<V>,
    params: Arc<[String]>,
    positional: SmallVec<[Arg<V>; 4]>,
    keyword: IndexMap<String, Arg<V>>,
    extra: IndexMap<String, Arg<V>>,
    registered: bool,
}

impl<V> Call<V> {
    /// Start building a call of `function`.
    pub fn builder<F>(function: F) -> CallBuilder<V>
    where
        F: Fn(&Args<V>) -> Result<V, BoxError> + Send + Sync + 'static,
    {
        CallBuilder::new(function)
    }

    /// Declared parameter names, after dropping a leading `self`.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Positional argument slots.
    pub fn positional(&self) -> &[Arg<V>] {
        &self.positional
    }

    /// Keyword argument slots, including auto-filled parameters.
    pub fn keyword(&self) -> &IndexMap<String, Arg<V>> {
        &self.keyword
    }

    /// Extra bound slots.
    pub fn extra(&self) -> &IndexMap<String, Arg<V>> {
        &self.extra
    }

    /// True once the call has been attached to a namespace.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Getters read by this call and every call nested in it.
    pub fn dependencies(&self) -> Result<Vec<Getter>> {
        let mut dependencies = Vec::new();
        self.collect_dependencies(&mut dependencies)?;
        Ok(dependencies)
    }

    pub(crate) fn bind(
        &self,
        positional: Vec<V>,
        keyword: IndexMap<String, V>,
        extra: IndexMap<String, V>,
    ) -> Args<V> {
        Args::new(Arc::clone(&self.params), positional, keyword, extra)
    }

    pub(crate) fn invoke(&self, args: &Args<V>) -> Result<V> {
        (self.function)(args).map_err(Error::from_user)
    }

    pub(crate) fn register(&mut self, owner: NamespaceId) {
        for arg in self.slots_mut() {
            arg.register(owner);
        }
        self.registered = true;
    }

    fn collect_dependencies(&self, into: &mut Vec<Getter>) -> Result<()> {
        if !self.registered {
            return Err(Error::Unregistered);
        }
        self.positional
            .iter()
            .chain(self.keyword.values())
            .chain(self.extra.values())
            .try_for_each(|arg| arg.collect_dependencies(into))
    }

    fn slots_mut(&mut self) -> impl Iterator<Item = &mut Arg<V>> {
        self.positional
            .iter_mut()
            .chain(self.keyword.values_mut())
            .chain(self.extra.values_mut())
    }
}

impl<V: Debug> Debug for Call<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("params", &self.params)
            .field("positional", &self.positional)
            .field("keyword", &self.keyword)
            .field("extra", &self.extra)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Call`].
pub struct CallBuilder<V> {
    function: Function<V>,
    params: Vec<String>,
    positional: SmallVec<[Arg<V>; 4]>,
    keyword: IndexMap<String, Arg<V>>,
    extra: IndexMap<String, Arg<V>>,
}

impl<V> CallBuilder<V> {
    /// Start a call of `function` with no arguments.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&Args<V>) -> Result<V, BoxError> + Send + Sync + 'static,
    {
        Self {
            function: Arc::new(function),
            params: Vec::new(),
            positional: SmallVec::new(),
            keyword: IndexMap::new(),
            extra: IndexMap::new(),
        }
    }

    /// Declare the function's parameter names.
    ///
    /// On [`build`](Self::build), parameters not covered by a positional or
    /// keyword argument read the name equal to the parameter. A leading
    /// `self` parameter is ignored.
    pub fn params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        if self.params.first().is_some_and(|param| param == "self") {
            self.params.remove(0);
        }
        self
    }

    /// Append a positional argument.
    pub fn arg(mut self, arg: impl Into<Arg<V>>) -> Self {
        self.positional.push(arg.into());
        self
    }

    /// Append a positional argument read from `name`.
    pub fn arg_name(self, name: impl Into<String>) -> Self {
        self.arg(Arg::Name(name.into()))
    }

    /// Append a literal positional argument.
    pub fn arg_value(self, value: V) -> Self {
        self.arg(Arg::Value(value))
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, key: impl Into<String>, arg: impl Into<Arg<V>>) -> Self {
        self.keyword.insert(key.into(), arg.into());
        self
    }

    /// Set a keyword argument read from `name`.
    pub fn kwarg_name(self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.kwarg(key, Arg::Name(name.into()))
    }

    /// Set a literal keyword argument.
    pub fn kwarg_value(self, key: impl Into<String>, value: V) -> Self {
        self.kwarg(key, Arg::Value(value))
    }

    /// Bind extra data, resolved like any other slot and exposed through
    /// [`Args::extra`].
    pub fn extra(mut self, key: impl Into<String>, arg: impl Into<Arg<V>>) -> Self {
        self.extra.insert(key.into(), arg.into());
        self
    }

    /// Finish as a [`Call`], filling undeclared parameters.
    pub fn into_call(mut self) -> Call<V> {
        for param in self.params.iter().skip(self.positional.len()) {
            if !self.keyword.contains_key(param) {
                self.keyword.insert(param.clone(), Arg::Name(param.clone()));
            }
        }

        Call {
            function: self.function,
            params: self.params.into(),
            positional: self.positional,
            keyword: self.keyword,
            extra: self.extra,
            registered: false,
        }
    }

    /// Finish as a [`Descriptor`].
    pub fn build(self) -> Descriptor<V> {
        Descriptor::Call(self.into_call())
    }
}

/// Resolved arguments passed to a [`Function`].
#[derive(Debug, Clone)]
pub struct Args<V> {
    params: Arc<[String]>,
    positional: Vec<V>,
    keyword: IndexMap<String, V>,
    extra: IndexMap<String, V>,
}

impl<V> Args<V> {
    pub(crate) fn new(
        params: Arc<[String]>,
        positional: Vec<V>,
        keyword: IndexMap<String, V>,
        extra: IndexMap<String, V>,
    ) -> Self {
        Self {
            params,
            positional,
            keyword,
            extra,
        }
    }

    /// Look up a parameter by name.
    ///
    /// Keyword arguments are checked first, then the positional argument
    /// at the parameter's declared position.
    pub fn get(&self, name: &str) -> Result<&V> {
        if let Some(value) = self.keyword.get(name) {
            return Ok(value);
        }
        self.params
            .iter()
            .position(|param| param == name)
            .and_then(|index| self.positional.get(index))
            .ok_or_else(|| Error::MissingArgument {
                name: name.to_string(),
            })
    }

    /// Positional argument at `index`.
    pub fn at(&self, index: usize) -> Result<&V> {
        self.positional
            .get(index)
            .ok_or(Error::MissingPositional { index })
    }

    /// All positional arguments, in order.
    pub fn positional(&self) -> &[V] {
        &self.positional
    }

    /// Keyword argument `name`, without falling back to positions.
    pub fn keyword(&self, name: &str) -> Option<&V> {
        self.keyword.get(name)
    }

    /// Keyword arguments in the order they were given, auto-filled ones last.
    pub fn keywords(&self) -> impl Iterator<Item = (&str, &V)> + '_ {
        self.keyword.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Extra argument `name`. These are never matched against parameters.
    pub fn extra(&self, name: &str) -> Option<&V> {
        self.extra.get(name)
    }

    /// Number of positional arguments.
    pub fn len(&self) -> usize {
        self.positional.len()
    }

    /// True if there are no positional arguments. Keywords are not counted,
    /// same as [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }
}

/// A deferred computation stored under a name.
#[derive(Clone)]
pub enum Descriptor<V> {
    /// Read another name.
    Getter(Getter),
    /// Apply a function.
    Call(Call<V>),
    /// Take the value of an external source.
    Source(Arc<dyn Source<V>>),
}

impl<V> Descriptor<V> {
    /// Wrap a source.
    pub fn source<S>(source: S) -> Self
    where
        S: Source<V> + 'static,
    {
        Descriptor::Source(Arc::new(source))
    }

    /// Getters this descriptor reads, including through nested calls.
    ///
    /// Fails with [`Error::Unregistered`] for a call never attached to a
    /// namespace.
    pub fn dependencies(&self) -> Result<Vec<Getter>> {
        match self {
            Descriptor::Getter(getter) => Ok(vec![getter.clone()]),
            Descriptor::Call(call) => call.dependencies(),
            Descriptor::Source(source) => Ok(source.dependencies()),
        }
    }

    /// True if the descriptor can be computed.
    pub fn is_registered(&self) -> bool {
        match self {
            Descriptor::Call(call) => call.is_registered(),
            Descriptor::Getter(_) | Descriptor::Source(_) => true,
        }
    }

    pub(crate) fn register(&mut self, owner: NamespaceId) {
        if let Descriptor::Call(call) = self {
            call.register(owner);
        }
    }
}

impl<V> From<Getter> for Descriptor<V> {
    fn from(getter: Getter) -> Self {
        Descriptor::Getter(getter)
    }
}

impl<V> From<Call<V>> for Descriptor<V> {
    fn from(call: Call<V>) -> Self {
        Descriptor::Call(call)
    }
}

impl<V> From<CallBuilder<V>> for Descriptor<V> {
    fn from(builder: CallBuilder<V>) -> Self {
        builder.build()
    }
}

impl<V: Debug> Debug for Descriptor<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Descriptor::Getter(getter) => f.debug_tuple("Getter").field(getter).finish(),
            Descriptor::Call(call) => f.debug_tuple("Call").field(call).finish(),
            Descriptor::Source(_) => f.write_str("Source(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(args: &Args<i64>) -> Result<i64, BoxError> {
        let positional: i64 = args.positional().iter().sum();
        let keyword: i64 = args.keywords().map(|(_, value)| value).sum();
        Ok(positional + keyword)
    }

    #[test]
    fn params_are_auto_filled() {
        let call = Call::builder(sum)
            .params(["self", "a", "b", "c"])
            .arg_name("x")
            .kwarg_value("c", 1)
            .into_call();

        assert_eq!(call.params(), ["a", "b", "c"]);
        assert_eq!(call.positional().len(), 1);
        let keys: Vec<_> = call.keyword().keys().cloned().collect();
        assert_eq!(keys, vec!["c", "b"]);
        assert!(matches!(&call.keyword()["b"], Arg::Name(name) if name == "b"));
    }

    #[test]
    fn unregistered_call_has_no_dependencies() {
        let call = Call::builder(sum).arg_name("a").into_call();
        assert!(matches!(call.dependencies(), Err(Error::Unregistered)));
    }

    #[test]
    fn registration_binds_nested_names() {
        let owner = NamespaceId::new();
        let inner = Call::builder(sum).arg_name("b");
        let mut descriptor = Call::builder(sum)
            .arg_name("a")
            .kwarg("inner", inner)
            .extra("scale", Arg::value(3))
            .build();
        assert!(!descriptor.is_registered());

        descriptor.register(owner);

        let mut names: Vec<_> = descriptor
            .dependencies()
            .unwrap()
            .into_iter()
            .inspect(|getter| assert_eq!(getter.owner(), owner))
            .map(|getter| getter.name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn getter_descriptor_depends_on_its_name() {
        let getter = Getter::new(NamespaceId::new(), "a");
        let descriptor: Descriptor<i64> = getter.clone().into();
        assert_eq!(descriptor.dependencies().unwrap(), vec![getter]);
    }

    #[test]
    fn args_lookup_by_param_and_keyword() {
        let params: Arc<[String]> = vec!["x".to_string(), "y".to_string()].into();
        let args = Args::new(
            params,
            vec![1, 2],
            [("z".to_string(), 3)].into_iter().collect(),
            IndexMap::new(),
        );

        assert_eq!(*args.get("x").unwrap(), 1);
        assert_eq!(*args.get("y").unwrap(), 2);
        assert_eq!(*args.get("z").unwrap(), 3);
        assert!(matches!(args.get("w"), Err(Error::MissingArgument { .. })));
        assert!(matches!(args.at(2), Err(Error::MissingPositional { index: 2 })));
    }

    #[test]
    fn keyword_only_args_count_as_empty() {
        let args = Args::new(
            Arc::from(Vec::<String>::new()),
            Vec::new(),
            [("by".to_string(), 1)].into_iter().collect(),
            IndexMap::new(),
        );

        assert_eq!(args.len(), 0);
        assert!(args.is_empty());
        assert_eq!(args.keywords().collect::<Vec<_>>(), vec![("by", &1)]);
    }

    #[test]
    fn nested_call_args_register_recursively() {
        let inner = Call::builder(sum).arg_name("a").into_call();
        let mut outer = Call::builder(sum).arg(inner).arg_value(2).into_call();
        outer.register(NamespaceId::new());

        assert!(matches!(&outer.positional()[0], Arg::Call(call) if call.is_registered()));
        let names: Vec<_> = outer
            .dependencies()
            .unwrap()
            .into_iter()
            .map(|getter| getter.name().to_string())
            .collect();
        assert_eq!(names, vec!["a"]);
    }
}
