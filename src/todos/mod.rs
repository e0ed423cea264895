pub mod cache;
pub mod cached_client;
pub mod client;
pub mod mutation;
pub mod resource;
pub mod types;

pub use cache::TODOS_ENDPOINT;
pub use cached_client::CachedTodoClient;
pub use client::TodoClient;
pub use mutation::PatchOutcome;
