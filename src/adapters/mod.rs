// Adapters layer: concrete implementations of the domain ports (entitlements, storage, generator).

pub mod backend;
pub mod memory;
pub mod supabase;

pub use backend::HttpGenerationBackend;
pub use memory::InMemoryEntitlements;
pub use supabase::{SupabaseEntitlements, SupabaseSigner};
