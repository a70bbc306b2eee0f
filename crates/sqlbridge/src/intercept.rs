//! Per-resource command mutation from context values.
//!
//! A resource is configured with a list of context keys. For each key the
//! context carries:
//!
//! - QUERY/DELETE/UPDATE get `Where[key] = value` unless the caller already
//!   filters on `key`.
//! - INSERT/UPDATE get `Values[key] = value`, replacing whatever the caller set.

use crate::command::{Action, Command, Request};
use crate::context::Context;
use std::collections::HashMap;

/// Injects context values into commands before they are formatted.
#[derive(Debug, Clone, Default)]
pub struct Interceptor {
    resources: HashMap<String, Vec<String>>,
}

impl Interceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the context keys applied to `resource`.
    pub fn resource<I, S>(mut self, name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources
            .entry(name.into())
            .or_default()
            .extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn keys(&self, resource: &str) -> &[String] {
        self.resources
            .get(resource)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Mutate one command.
    pub fn apply(&self, ctx: &Context, cmd: &mut Command) {
        let Some(keys) = self.resources.get(&cmd.resource) else {
            return;
        };
        for key in keys {
            let Some(value) = ctx.value(key) else {
                continue;
            };
            if matches!(cmd.action, Action::Query | Action::Delete | Action::Update)
                && !cmd.where_.contains(key)
            {
                cmd.where_.insert(key.clone(), value.clone());
            }
            if matches!(cmd.action, Action::Insert | Action::Update) {
                cmd.values.insert(key.clone(), value.clone());
            }
        }
    }

    /// Mutate every command of a request. Statements pass through untouched.
    pub fn apply_request(&self, ctx: &Context, req: &mut Request) {
        match req {
            Request::Command(cmd) => self.apply(ctx, cmd),
            Request::Statement(_) => {}
            Request::Batch(reqs) => {
                for r in reqs {
                    self.apply_request(ctx, r);
                }
            }
        }
    }
}
