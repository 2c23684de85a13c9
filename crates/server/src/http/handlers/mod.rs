pub mod admin;
pub mod confirm;
pub mod open;
pub mod sse;
