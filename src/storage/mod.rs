pub mod credential;
pub mod lease;

pub use credential::StoredCredential;
pub use lease::LeaseRecord;
