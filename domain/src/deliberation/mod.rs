//! Deliberation subdomain: the records a run accumulates and the run itself.
//!
//! A [`Run`](run::Run) is never mutated directly. Every change is an
//! [`RunEvent`](crate::events::RunEvent) folded in with
//! [`Run::apply`](run::Run::apply), so replaying the event log from sequence
//! zero always rebuilds the same snapshot.

pub mod adr;
pub mod failure;
pub mod phase;
pub mod records;
pub mod request;
pub mod run;
