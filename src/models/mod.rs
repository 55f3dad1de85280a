pub mod credential;
pub mod job;
pub mod preference;
