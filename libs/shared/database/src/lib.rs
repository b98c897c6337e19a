pub mod supabase;

pub use supabase::{encode_filter, DatabaseError, SupabaseClient};
