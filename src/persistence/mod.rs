pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;
pub use traits::*;
