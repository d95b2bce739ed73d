//! Runtime for graft.
//!
//! This crate provides the GraphQL execution runtime:
//! - `root`: A schema with its data, resolvers and subscriptions
//! - `data`: Data passed to and returned from resolvers
//! - `resolver`: Resolver strategies for objects and untyped data
//! - `binder`: Field bindings for native types
//! - `executor`: Request execution and responses
//! - `introspection`: Objects backing `__schema` and `__type`
//! - `subscription`: Subscribers and event delivery

pub mod binder;
pub mod data;
pub mod executor;
pub mod introspection;
pub mod resolver;
pub mod root;
pub mod subscription;

pub use binder::{Binder, Binding, BindingBuilder};
pub use data::{runtime_type_id, AsAny, Data, Object};
pub use executor::Response;
pub use introspection::{
    DirectiveIntro, EnumValueIntro, FieldIntro, InputValueIntro, SchemaIntro, TypeIntro,
};
pub use resolver::{AnyResolver, Args, FnResolver, ListResolver, Resolver, ResolverMap, ValueResolver};
pub use root::{Operations, Root, RootConfig};
pub use subscription::{ChannelSubscriber, Subscriber, SubscriptionState};
