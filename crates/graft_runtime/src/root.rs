//! The root of a schema: registry, application data, resolver strategies
//! and registered subscriptions.

use crate::binder::{Binder, Binding, BindingBuilder};
use crate::data::{Data, Object};
use crate::executor::{Executor, Response};
use crate::resolver::{AnyResolver, ValueResolver};
use crate::subscription::{Subscription, SubscriptionState};
use graft_core::{Errors, Map};
use graft_schema::{
    parse_executable, parse_sdl, validate_executable, BuiltinOptions, Decl, Executable, OpKind,
    Registry, SdlOptions, SdlParser, Type,
};
use graft_syntax::Lexer;
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::io::Read;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

/// Configuration for a [`Root`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootConfig {
    /// Depth budget for resolution. Data nested deeper is returned raw.
    pub max_depth: usize,
    /// Accept plain strings where enum symbols are expected.
    pub relaxed: bool,
    /// Optional built-in scalars.
    pub builtins: BuiltinOptions,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            max_depth: 100,
            relaxed: false,
            builtins: BuiltinOptions::default(),
        }
    }
}

impl RootConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the depth budget.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets relaxed enum coercion.
    #[must_use]
    pub fn with_relaxed(mut self, relaxed: bool) -> Self {
        self.relaxed = relaxed;
        self
    }

    /// Sets the optional built-in scalars.
    #[must_use]
    pub fn with_builtins(mut self, builtins: BuiltinOptions) -> Self {
        self.builtins = builtins;
        self
    }
}

/// Separate root data for each operation kind.
///
/// When the root data is anything else, every operation starts from it.
#[derive(Debug, Clone, Default)]
pub struct Operations {
    pub query: Data,
    pub mutation: Data,
    pub subscription: Data,
}

impl Operations {
    /// Creates operations with only query data.
    pub fn query(query: impl Into<Data>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Sets the mutation data.
    #[must_use]
    pub fn with_mutation(mut self, mutation: impl Into<Data>) -> Self {
        self.mutation = mutation.into();
        self
    }

    /// Sets the subscription data.
    #[must_use]
    pub fn with_subscription(mut self, subscription: impl Into<Data>) -> Self {
        self.subscription = subscription.into();
        self
    }

    fn get(&self, kind: OpKind) -> &Data {
        match kind {
            OpKind::Query => &self.query,
            OpKind::Mutation => &self.mutation,
            OpKind::Subscription => &self.subscription,
        }
    }
}

impl Object for Operations {}

/// A schema with the data and resolvers requests run against.
pub struct Root {
    registry: Arc<Registry>,
    config: RootConfig,
    data: Data,
    query_root: OnceLock<Data>,
    any_resolver: Arc<dyn AnyResolver>,
    binder: Binder,
    impls: RwLock<FxHashMap<TypeId, String>>,
    subscriptions: Mutex<Vec<Arc<Subscription>>>,
}

impl Default for Root {
    fn default() -> Self {
        Self::new(RootConfig::default())
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("config", &self.config)
            .field("types", &self.registry.types().count())
            .field("data", &self.data)
            .field("subscriptions", &self.subscription_count())
            .finish_non_exhaustive()
    }
}

impl Root {
    /// Creates a root with only the built-in types.
    #[must_use]
    pub fn new(config: RootConfig) -> Self {
        Self {
            registry: Arc::new(Registry::with_options(config.builtins)),
            config,
            data: Data::Null,
            query_root: OnceLock::new(),
            any_resolver: Arc::new(ValueResolver),
            binder: Binder::new(),
            impls: RwLock::new(FxHashMap::default()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RootConfig {
        &self.config
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn shared_registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Looks up a named type.
    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&Type> {
        self.registry.get_type(name)
    }

    /// Adds declarations as one transaction. On failure the registry is
    /// left unchanged.
    pub fn add_types(&mut self, decls: Vec<Decl>) -> Result<(), Errors> {
        Arc::make_mut(&mut self.registry).add_types(decls)
    }

    /// Parses SDL and adds its declarations.
    pub fn parse_sdl(&mut self, source: &str) -> Result<(), Errors> {
        let decls = parse_sdl(source, &self.registry)?;
        self.add_types(decls)
    }

    /// Reads SDL from `reader` and adds its declarations.
    pub fn parse_sdl_reader<R: Read>(&mut self, reader: R) -> Result<(), Errors> {
        let lexer = Lexer::from_reader(reader)?;
        let decls = SdlParser::from_lexer(lexer, &self.registry).parse()?;
        self.add_types(decls)
    }

    /// Returns the user declarations as canonical SDL.
    #[must_use]
    pub fn sdl(&self, options: &SdlOptions) -> String {
        self.registry.sdl(options)
    }

    /// Sets the root data.
    pub fn set_data(&mut self, data: impl Into<Data>) {
        self.data = data.into();
        self.query_root = OnceLock::new();
    }

    /// Sets separate root data per operation kind.
    pub fn set_operations(&mut self, operations: Operations) {
        self.set_data(Data::object(operations));
    }

    /// Replaces the resolver used for untyped data.
    pub fn set_any_resolver(&mut self, resolver: impl AnyResolver + 'static) {
        self.any_resolver = Arc::new(resolver);
    }

    pub(crate) fn any_resolver(&self) -> &dyn AnyResolver {
        self.any_resolver.as_ref()
    }

    pub(crate) fn binder(&self) -> &Binder {
        &self.binder
    }

    /// Registers the member binding for `T`. `T` is also registered as the
    /// implementation of the binding's GraphQL type.
    pub fn bind<T: Any + Send + Sync>(&self, builder: BindingBuilder<T>) -> Arc<Binding> {
        let binding = self.binder.bind(builder);
        self.register_impl::<T>(binding.type_name());
        binding
    }

    /// Registers `T` as the implementation of the GraphQL object type
    /// `type_name`, for interface and union values.
    pub fn register_impl<T: Any>(&self, type_name: impl Into<String>) {
        self.impls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), type_name.into());
    }

    pub(crate) fn impl_name(&self, id: TypeId) -> Option<String> {
        self.impls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Returns the data an operation of `kind` starts from. The query root
    /// is computed once.
    pub(crate) fn op_root(&self, kind: OpKind) -> Data {
        let pick = || {
            let ops = match &self.data {
                Data::Object(obj) => (**obj).as_any().downcast_ref::<Operations>(),
                _ => None,
            };
            ops.map_or_else(|| self.data.clone(), |ops| ops.get(kind).clone())
        };
        match kind {
            OpKind::Query => self.query_root.get_or_init(pick).clone(),
            _ => pick(),
        }
    }

    /// Parses and validates a request document.
    pub fn parse_executable(&self, source: &str) -> Result<Executable, Errors> {
        let mut doc = parse_executable(source, &self.registry)?;
        validate_executable(&self.registry, &mut doc)?;
        Ok(doc)
    }

    /// Executes an operation of `doc`. `op` may be omitted when the
    /// document holds a single operation. Variables may use JSON spellings.
    pub fn resolve_executable(&self, doc: &Executable, op: Option<&str>, vars: &Map) -> Response {
        let (response, subscriptions) = Executor::new(self, doc).execute(op, vars);
        if !subscriptions.is_empty() {
            tracing::debug!(count = subscriptions.len(), "subscriptions registered");
            self.lock_subscriptions()
                .extend(subscriptions.into_iter().map(Arc::new));
        }
        response
    }

    /// Parses, validates and executes a request.
    pub fn resolve_string(&self, source: &str, op: Option<&str>, vars: &Map) -> Response {
        match self.parse_executable(source) {
            Ok(doc) => self.resolve_executable(&doc, op, vars),
            Err(errors) => Response::failed(errors),
        }
    }

    /// Delivers an event to every subscription whose subscriber matches
    /// `id`. Returns how many deliveries succeeded. A failed delivery
    /// removes that subscription.
    ///
    /// Resolvers and subscribers run without the subscription list locked.
    pub fn add_event(&self, id: &str, payload: impl Into<Data>) -> usize {
        let payload = payload.into();
        let matching: Vec<Arc<Subscription>> = self
            .lock_subscriptions()
            .iter()
            .filter(|sub| sub.subscriber.matches(id))
            .cloned()
            .collect();

        let mut delivered = 0;
        let mut failed = Vec::new();
        for sub in matching {
            if sub.state() == SubscriptionState::Unsubscribed {
                continue;
            }
            let response = Executor::new(self, &sub.doc)
                .with_vars(sub.vars.clone())
                .deliver(&sub.field, &sub.ty, payload.clone());
            match sub.subscriber.send(response.to_value()) {
                Ok(()) => {
                    sub.delivered();
                    delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(id, error = %e, "delivery failed, unsubscribing");
                    failed.push(sub);
                }
            }
        }

        if !failed.is_empty() {
            self.lock_subscriptions()
                .retain(|sub| !failed.iter().any(|f| Arc::ptr_eq(f, sub)));
            for sub in &failed {
                sub.close();
            }
        }
        delivered
    }

    /// Removes every subscription whose subscriber matches `id`. Returns how
    /// many were removed.
    pub fn unsubscribe(&self, id: &str) -> usize {
        let removed: Vec<Arc<Subscription>> = {
            let mut subs = self.lock_subscriptions();
            let (removed, kept) = std::mem::take(&mut *subs)
                .into_iter()
                .partition(|sub| sub.subscriber.matches(id));
            *subs = kept;
            removed
        };
        for sub in &removed {
            sub.close();
        }
        removed.len()
    }

    /// Returns the number of registered subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.lock_subscriptions().len()
    }

    fn lock_subscriptions(&self) -> std::sync::MutexGuard<'_, Vec<Arc<Subscription>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::Value;

    const SDL: &str = "type Query { title: String }";

    #[test]
    fn test_failed_add_types_keeps_registry() {
        let mut root = Root::default();
        root.parse_sdl(SDL).unwrap();
        let before = root.sdl(&SdlOptions::new());

        let err = root
            .parse_sdl("type Song { artist: Artist }\ntype Query { x: Int }")
            .unwrap_err();
        assert!(!err.is_empty());
        assert_eq!(root.sdl(&SdlOptions::new()), before);
    }

    #[test]
    fn test_parse_sdl_reader() {
        let mut root = Root::default();
        root.parse_sdl_reader(SDL.as_bytes()).unwrap();
        assert!(root.get_type("Query").is_some());
    }

    #[test]
    fn test_op_root() {
        let mut root = Root::default();
        root.set_data(Value::from("all"));
        assert_eq!(root.op_root(OpKind::Mutation).into_raw(), Value::from("all"));

        root.set_operations(Operations::query(Value::from("q")).with_mutation(Value::from("m")));
        assert_eq!(root.op_root(OpKind::Query).into_raw(), Value::from("q"));
        assert_eq!(root.op_root(OpKind::Mutation).into_raw(), Value::from("m"));
        assert!(root.op_root(OpKind::Subscription).is_null());
    }

    #[test]
    fn test_config_builders() {
        let config = RootConfig::new().with_max_depth(3).with_relaxed(true);
        assert_eq!(config.max_depth, 3);
        assert!(config.relaxed);
        assert_eq!(RootConfig::default().max_depth, 100);
    }
}
