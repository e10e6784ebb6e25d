pub mod cli;
pub mod ssh;
pub mod storage;
pub mod utils;
pub mod vault;

pub use cli::{args, commands};
pub use storage::{LeaseRecord, StoredCredential};
pub use utils::{errors, paths};
pub use vault::{auth, client};
