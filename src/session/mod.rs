//! The `session` module owns the per-process session identity that is
//! embedded in every outgoing topic.

pub mod manager;

pub use manager::SessionManager;

#[cfg(test)]
mod tests;
