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

//! The public facade: parse-and-cache plus the synchronous `evaluate()`
//! entry point, with one constructor per supported FHIR version.

use crate::ast::ExpressionNode;
use crate::error::Result;
use crate::evaluator::{self, EvalContext};
use crate::model::{Collection, FhirNode, GenericJsonProvider, ModelProvider, Value};
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Main FHIRPath engine: holds the active model navigator and a bounded
/// cache of already-parsed expressions.
#[derive(Clone)]
pub struct FhirPathEngine {
    provider: Arc<dyn ModelProvider>,
    expression_cache: HashMap<String, ExpressionNode>,
    max_cache_size: usize,
}

/// Alias kept for call sites that prefer the shorter name.
pub type Engine = FhirPathEngine;

impl FhirPathEngine {
    fn with_provider(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            expression_cache: HashMap::new(),
            max_cache_size: 1000,
        }
    }

    /// An engine backed by the FHIR R4 element model.
    pub fn r4() -> Self {
        Self::with_provider(Arc::new(GenericJsonProvider::new(crate::model::FhirVersion::R4)))
    }

    /// An engine backed by the FHIR R4B element model.
    pub fn r4b() -> Self {
        Self::with_provider(Arc::new(GenericJsonProvider::new(crate::model::FhirVersion::R4B)))
    }

    /// An engine backed by the FHIR R5 element model.
    pub fn r5() -> Self {
        Self::with_provider(Arc::new(GenericJsonProvider::new(crate::model::FhirVersion::R5)))
    }

    /// Evaluate `expression` against `resource`, with `variables` bound as
    /// `%name` environment lookups. Parsing is cached by expression text.
    pub fn evaluate(
        &mut self,
        expression: &str,
        resource: serde_json::Value,
        variables: HashMap<String, Collection>,
    ) -> Result<Collection> {
        log::trace!("evaluating {:.80}", expression);

        let ast = self.get_or_compile(expression)?.clone();
        let resource_type = resource
            .get("resourceType")
            .and_then(|v| v.as_str())
            .unwrap_or("Resource")
            .to_string();
        let root = Value::Node(FhirNode::new(Arc::new(resource), resource_type));

        let ctx = EvalContext::root(root.clone(), variables, self.provider.clone(), now());
        let result = evaluator::evaluate(&ast, &ctx, &Collection::singleton(root))?;
        Ok(evaluator::resolve_residual_conversions(result))
    }

    fn get_or_compile(&mut self, expression: &str) -> Result<&ExpressionNode> {
        if !self.expression_cache.contains_key(expression) {
            let ast = crate::parser::parse(expression)?;
            if self.expression_cache.len() >= self.max_cache_size {
                self.expression_cache.clear();
            }
            self.expression_cache.insert(expression.to_string(), ast);
        }
        Ok(self.expression_cache.get(expression).unwrap())
    }
}

impl Default for FhirPathEngine {
    fn default() -> Self {
        Self::r4()
    }
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&FixedOffset::east_opt(0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluates_a_simple_member_path() {
        let mut engine = FhirPathEngine::r4();
        let result = engine
            .evaluate(
                "Patient.name.given",
                json!({"resourceType": "Patient", "name": [{"given": ["Ada"]}]}),
                HashMap::new(),
            )
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn caches_repeated_expressions() {
        let mut engine = FhirPathEngine::r4();
        let resource = json!({"resourceType": "Patient", "active": true});
        for _ in 0..3 {
            let result = engine.evaluate("Patient.active", resource.clone(), HashMap::new()).unwrap();
            assert_eq!(result, Collection::singleton(Value::Boolean(true)));
        }
        assert_eq!(engine.expression_cache.len(), 1);
    }

    #[test]
    fn environment_variables_are_visible_to_external_constants() {
        let mut engine = FhirPathEngine::r4();
        let mut vars = HashMap::new();
        vars.insert("favoriteColor".to_string(), Collection::singleton(Value::string("teal")));
        let result = engine
            .evaluate("%favoriteColor", json!({"resourceType": "Patient"}), vars)
            .unwrap();
        assert_eq!(result, Collection::singleton(Value::string("teal")));
    }
}
