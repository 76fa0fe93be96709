//! # DealSource Pipeline Worker
//!
//! Background service that works the vendor SMS pipeline: first contact for
//! new leads, timed follow-ups, and giving up on vendors who never reply.
//! Replies arrive through the API's SMS webhook, not here.
//!
//! ## Modules
//!
//! - `config`: `PIPELINE_*` timing, database and SMS gateway settings
//! - `queue`: conditional claims and stage moves on the `vendors` table
//! - `messages`: outbound SMS wording
//! - `pipeline`: the polling loop and per-tick steps

pub mod config;
pub mod messages;
pub mod pipeline;
pub mod queue;
