// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Evaluation context: the `$this`/`$index`/`$total` frame stack and
//! environment-variable (`%name`) resolution.
//!
//! Frames are immutable and `Arc`-linked (spec.md §3's "Context frames ...
//! live on a logical stack whose depth is bounded by expression nesting") —
//! entering a lambda or a `defineVariable` call produces a new child frame
//! that borrows its parent rather than mutating shared state, so a
//! higher-order function can hold many live frames (one per element)
//! without them interfering with each other.

use crate::model::{Collection, ModelProvider, Value};
use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;
use std::sync::Arc;

/// One level of the `$this`/`$index`/`$total`/local-variable stack.
#[derive(Debug)]
struct Frame {
    this: Value,
    index: Option<i64>,
    total: Option<Collection>,
    locals: HashMap<String, Collection>,
    parent: Option<Arc<Frame>>,
}

/// The evaluator's working context: current frame, environment variables,
/// and the model navigator for the active FHIR version.
#[derive(Clone)]
pub struct EvalContext {
    frame: Arc<Frame>,
    environment: Arc<HashMap<String, Collection>>,
    pub provider: Arc<dyn ModelProvider>,
    /// Captured once at the start of evaluation, per spec.md §3's "State
    /// carried", so `now()`, `today()`, and `timeOfDay()` agree within a
    /// single evaluation run.
    now: DateTime<FixedOffset>,
}

impl EvalContext {
    /// A fresh root context: `$this` is the input collection's sole focus
    /// value, no `$index`/`$total`, no local variables.
    pub fn root(
        this: Value,
        environment: HashMap<String, Collection>,
        provider: Arc<dyn ModelProvider>,
        now: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            frame: Arc::new(Frame { this, index: None, total: None, locals: HashMap::new(), parent: None }),
            environment: Arc::new(environment),
            provider,
            now,
        }
    }

    /// The evaluation-scoped timestamp (spec.md §4.4's Utility group).
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    pub fn this(&self) -> &Value {
        &self.frame.this
    }

    pub fn index(&self) -> Option<i64> {
        self.frame.index
    }

    /// `$total`: only meaningful inside `aggregate`, where it names the
    /// running accumulator. `None` everywhere else.
    pub fn total(&self) -> Option<Collection> {
        self.frame.total.clone()
    }

    /// Enter a lambda iteration: a new `$this`/`$index`, no locals of its
    /// own, parented to the current frame. `$total` is left unset — only
    /// `aggregate` (via [`with_aggregate_item`]) populates it.
    pub fn with_item(&self, item: Value, index: usize) -> Self {
        Self {
            frame: Arc::new(Frame {
                this: item,
                index: Some(index as i64),
                total: None,
                locals: HashMap::new(),
                parent: Some(self.frame.clone()),
            }),
            environment: self.environment.clone(),
            provider: self.provider.clone(),
            now: self.now,
        }
    }

    /// Enter one step of `aggregate(expr, init?)`: `$this` is the element,
    /// `$index` its position, `$total` the accumulator carried in from the
    /// previous step (or the `init` value on the first step).
    pub fn with_aggregate_item(&self, item: Value, index: usize, total: Collection) -> Self {
        Self {
            frame: Arc::new(Frame {
                this: item,
                index: Some(index as i64),
                total: Some(total),
                locals: HashMap::new(),
                parent: Some(self.frame.clone()),
            }),
            environment: self.environment.clone(),
            provider: self.provider.clone(),
            now: self.now,
        }
    }

    /// Bind a local variable (`defineVariable(name, value)`), keeping the
    /// current `$this`/`$index`/`$total` and chaining to the prior frame so
    /// earlier bindings stay visible.
    pub fn with_variable(&self, name: impl Into<String>, value: Collection) -> Self {
        let mut locals = HashMap::new();
        locals.insert(name.into(), value);
        Self {
            frame: Arc::new(Frame {
                this: self.frame.this.clone(),
                index: self.frame.index,
                total: self.frame.total.clone(),
                locals,
                parent: Some(self.frame.clone()),
            }),
            environment: self.environment.clone(),
            provider: self.provider.clone(),
            now: self.now,
        }
    }

    /// Resolve a local variable bound by `defineVariable`, walking up the
    /// frame chain from the innermost binding outward.
    pub fn lookup_local(&self, name: &str) -> Option<Collection> {
        let mut frame = &self.frame;
        loop {
            if let Some(value) = frame.locals.get(name) {
                return Some(value.clone());
            }
            match &frame.parent {
                Some(parent) => frame = parent,
                None => return None,
            }
        }
    }

    /// Resolve an environment variable (`%resource`, `%context`, `%ucum`,
    /// a user-supplied `%name`, ...).
    pub fn lookup_environment(&self, name: &str) -> Option<Collection> {
        self.environment.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FhirVersion;
    use crate::model::GenericJsonProvider;

    fn provider() -> Arc<dyn ModelProvider> {
        Arc::new(GenericJsonProvider::new(FhirVersion::R4))
    }

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap()
    }

    #[test]
    fn root_context_has_no_index_or_total() {
        let ctx = EvalContext::root(Value::Boolean(true), HashMap::new(), provider(), now());
        assert_eq!(ctx.index(), None);
        assert_eq!(ctx.total(), None);
    }

    #[test]
    fn with_item_sets_this_and_index_but_not_total() {
        let ctx = EvalContext::root(Value::Boolean(true), HashMap::new(), provider(), now());
        let child = ctx.with_item(Value::Integer(7), 2);
        assert_eq!(child.this(), &Value::Integer(7));
        assert_eq!(child.index(), Some(2));
        assert_eq!(child.total(), None);
    }

    #[test]
    fn with_aggregate_item_carries_the_accumulator() {
        let ctx = EvalContext::root(Value::Boolean(true), HashMap::new(), provider(), now());
        let acc = Collection::singleton(Value::Integer(5));
        let child = ctx.with_aggregate_item(Value::Integer(7), 2, acc.clone());
        assert_eq!(child.total(), Some(acc));
    }

    #[test]
    fn local_variables_are_visible_to_children_and_not_siblings() {
        let ctx = EvalContext::root(Value::Boolean(true), HashMap::new(), provider(), now());
        let with_var = ctx.with_variable("x", Collection::singleton(Value::Integer(1)));
        assert!(with_var.lookup_local("x").is_some());
        assert!(ctx.lookup_local("x").is_none());

        let grandchild = with_var.with_item(Value::Integer(9), 0);
        assert!(grandchild.lookup_local("x").is_some());
    }

    #[test]
    fn environment_variables_are_shared_across_frames() {
        let mut env = HashMap::new();
        env.insert("resource".to_string(), Collection::singleton(Value::Integer(42)));
        let ctx = EvalContext::root(Value::Boolean(true), env, provider(), now());
        let child = ctx.with_item(Value::Integer(1), 0);
        assert!(child.lookup_environment("resource").is_some());
    }

    #[test]
    fn now_is_stable_across_child_frames() {
        let ctx = EvalContext::root(Value::Boolean(true), HashMap::new(), provider(), now());
        let child = ctx.with_item(Value::Integer(1), 0);
        assert_eq!(child.now(), ctx.now());
    }
}
