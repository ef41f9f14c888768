pub mod core;
pub mod invites;
pub mod outbox;
pub mod students;
