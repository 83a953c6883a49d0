pub mod sqlite_accounts;
pub mod sqlite_repo;
