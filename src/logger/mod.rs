//! Activity logging: a channel-fed logger thread writing append-only JSONL.

pub mod activity;
pub mod jsonl;
