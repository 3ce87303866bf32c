//! Resolution of reference tokens in planned steps.
//!
//! A parameter value that is exactly one of the following strings is a
//! reference, at any depth inside arrays or objects:
//!
//! - `$input`: path of the media attached to the query
//! - `$step[i]`: the whole output of trace entry `i`
//! - `$step[i].field.0.x`: a path into that output; numeric segments index arrays
//!
//! Every other value is a literal and is copied unchanged. Binding reads the
//! trace but never touches it, so the same step and trace prefix always bind
//! to the same [`ResolvedStep`].

use super::{PlanStep, ResolvedStep, Trace};
use crate::error::{Result, SkueError};
use crate::media::MediaRef;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Token naming the query's media.
pub const INPUT_TOKEN: &str = "$input";

fn step_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\$step\[(\d+)\]((?:\.[A-Za-z0-9_\-]+)*)$").expect("valid reference regex")
    })
}

/// A parsed reference token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Input,
    Step { index: usize, path: Vec<String> },
    /// A `$step[i]` token whose index does not fit in `usize`.
    IndexOverflow { digits: String },
}

impl Reference {
    /// Parse a string value; `None` means it is a literal.
    pub fn parse(value: &str) -> Option<Self> {
        if value == INPUT_TOKEN {
            return Some(Reference::Input);
        }
        let captures = step_reference_pattern().captures(value)?;
        let index = match captures[1].parse() {
            Ok(index) => index,
            Err(_) => {
                return Some(Reference::IndexOverflow {
                    digits: captures[1].to_string(),
                })
            }
        };
        let path = captures
            .get(2)
            .map(|m| {
                m.as_str()
                    .split('.')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Some(Reference::Step { index, path })
    }
}

/// Bind `step`, which will occupy trace position `index`, against `trace`.
pub fn resolve(
    step: &PlanStep,
    index: usize,
    trace: &Trace,
    media: Option<&MediaRef>,
) -> Result<ResolvedStep> {
    let binder = Binder { index, trace, media };

    let mut parameters = Map::new();
    for (name, value) in &step.parameters {
        parameters.insert(name.clone(), binder.bind_value(value)?);
    }

    Ok(ResolvedStep {
        index,
        task: step.task.clone(),
        tool: step.tool.clone(),
        parameters,
    })
}

struct Binder<'a> {
    index: usize,
    trace: &'a Trace,
    media: Option<&'a MediaRef>,
}

impl Binder<'_> {
    fn bind_value(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(s) => match Reference::parse(s) {
                Some(reference) => self.lookup(&reference, s),
                None => Ok(value.clone()),
            },
            Value::Array(items) => items
                .iter()
                .map(|item| self.bind_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut bound = Map::new();
                for (key, item) in map {
                    bound.insert(key.clone(), self.bind_value(item)?);
                }
                Ok(Value::Object(bound))
            }
            _ => Ok(value.clone()),
        }
    }

    fn lookup(&self, reference: &Reference, token: &str) -> Result<Value> {
        match reference {
            Reference::Input => self
                .media
                .map(|m| Value::String(m.path_str()))
                .ok_or_else(|| self.dangling(format!("{} used but no media was provided", token))),
            Reference::IndexOverflow { digits } => Err(self.dangling(format!(
                "{} refers to step {}, which can never exist",
                token, digits
            ))),
            Reference::Step { index, path } => {
                if *index >= self.index {
                    return Err(self.dangling(format!(
                        "{} refers to step {}, which does not run before step {}",
                        token, index, self.index
                    )));
                }
                let source = self.trace.get(*index).ok_or_else(|| {
                    self.dangling(format!(
                        "{} refers to step {}, but only {} step(s) have run",
                        token,
                        index,
                        self.trace.len()
                    ))
                })?;
                if source.is_failure() {
                    return Err(self.dangling(format!(
                        "{} refers to step {}, which failed",
                        token, index
                    )));
                }

                let mut current = &source.output;
                for segment in path {
                    let next = match current {
                        Value::Object(map) => map.get(segment),
                        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                        _ => None,
                    };
                    current = next.ok_or_else(|| {
                        self.dangling(format!(
                            "{}: step {} output has no field '{}'",
                            token, index, segment
                        ))
                    })?;
                }
                Ok(current.clone())
            }
        }
    }

    fn dangling(&self, reason: String) -> SkueError {
        SkueError::DanglingReference {
            step: self.index,
            reason,
        }
    }
}
