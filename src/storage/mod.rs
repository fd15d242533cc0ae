mod blogs;
mod metadata;
mod schema;
mod types;

pub use metadata::LAST_FETCHED_KEY;
pub use schema::Database;
pub use types::{BlogDraft, BlogRecord, Category, DatabaseError};
