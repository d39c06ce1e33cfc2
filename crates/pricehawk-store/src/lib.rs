pub mod history;

pub use history::{DEFAULT_HISTORY_LIMIT, JsonHistoryStore};
