//! Natural-language answers grounded in a workflow trace.
//!
//! The [`AnswerSynthesizer`] turns the final trace into the answer returned
//! to the caller. The [`Narrator`] writes the short per-step answers stored in
//! the trace and handles queries that needed no tools at all.

mod answer;
mod narrative;

pub use answer::{format_steps_for_prompt, AnswerSynthesizer};
pub use narrative::Narrator;
