pub mod admin;
pub mod changes;
pub mod public;
