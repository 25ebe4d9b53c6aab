pub mod coordinates;
pub mod retry;
pub mod time;
