/// Identifiers assigned by the remote inventory system (users, sites, sessions).
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
