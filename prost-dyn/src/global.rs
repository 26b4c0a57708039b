use prost_reflect::DescriptorPool;

use crate::resolve::{resolver_from_pool, ResolverFromPool};

/// Creates a resolver over a snapshot of the global descriptor pool of `prost-reflect`.
///
/// By default the global pool contains the google well-known types. Files added to the global
/// pool after this call are not visible to the returned resolver.
///
/// ```
/// # use prost_dyn::{global_resolver, resolve::MessageResolver};
/// let resolver = global_resolver();
/// let message = resolver
///     .find_message_by_url("type.googleapis.com/google.protobuf.Duration")
///     .unwrap();
/// assert_eq!(message.full_name(), "google.protobuf.Duration");
/// ```
pub fn global_resolver() -> ResolverFromPool<DescriptorPool> {
    resolver_from_pool(DescriptorPool::global())
}
