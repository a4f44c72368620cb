/// per-resource serialization.
/// use cases:
/// * serialize updates to one account, document or counter while others run freely
/// * bound the memory used by locks when the set of resource ids is unbounded
///
/// `LockCache` hands out one async mutex per resource id and evicts idle ones
/// least-recently-used first; `run_with_lock` runs a unit of work under that mutex.
///
pub mod cache;
pub mod executor;

pub use cache::{LockCache, ResourceLock};
pub use executor::run_with_lock;
