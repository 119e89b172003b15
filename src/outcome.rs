//! Typed result of a pipeline stage.

use serde::Serialize;

/// What a pipeline stage produced.
///
/// `Empty` means the stage's inputs were not satisfied (no dataset, stale or missing
/// selection) and there is nothing to show. `Failed` carries a user-facing message for a
/// computation that was attempted and went wrong. The presentation layer decides how each
/// case is rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    Ready(T),
    Empty,
    Failed(String),
}

impl<T> Outcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty)
    }

    /// Chain a fallible step; an `Err` becomes `Failed` with its display text.
    pub fn and_then<U, E: std::fmt::Display>(
        self,
        f: impl FnOnce(T) -> std::result::Result<U, E>,
    ) -> Outcome<U> {
        match self {
            Outcome::Ready(v) => match f(v) {
                Ok(u) => Outcome::Ready(u),
                Err(e) => Outcome::Failed(e.to_string()),
            },
            Outcome::Empty => Outcome::Empty,
            Outcome::Failed(msg) => Outcome::Failed(msg),
        }
    }
}
