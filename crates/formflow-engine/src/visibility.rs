use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use formflow_spec::{ButtonKind, ConditionPredicate, ConditionsConfig, FormDefinition};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::flow_state::FlowStates;
use crate::registry::DependencyRegistry;
use crate::resolve::{PageScope, ValueResolver};
use crate::store::VariableStore;

/// Rendering-layer receiver of visibility decisions.
///
/// Implementations hiding a field are expected to disable its nested inputs as well, so hidden
/// fields are never submitted.
pub trait VisibilitySink {
    fn set_field_visible(&self, field_id: &str, visible: bool);
    fn set_page_visible(&self, page_id: &str, visible: bool);
}

/// Lifecycle of a conditioned field or page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    Registered,
    Visible,
    Hidden,
}

impl ArtifactState {
    fn from_visible(visible: bool) -> Self {
        if visible {
            ArtifactState::Visible
        } else {
            ArtifactState::Hidden
        }
    }
}

/// Problem found while walking dependency chains.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencyIssue {
    #[error("circular dependency detected for field '{field_id}': {}", .chain.join(" -> "))]
    Circular { field_id: String, chain: Vec<String> },
    #[error("'{owner}' depends on '{depends_on}', which is not a known field or variable")]
    Dangling { owner: String, depends_on: String },
}

impl DependencyIssue {
    /// Dangling references are warnings; only cycles make a registry invalid.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DependencyIssue::Circular { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub valid: bool,
    pub errors: Vec<DependencyIssue>,
}

impl DependencyReport {
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn cycles(&self) -> impl Iterator<Item = &DependencyIssue> {
        self.errors.iter().filter(|issue| issue.is_fatal())
    }
}

/// How many artifacts one evaluation pass touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationSummary {
    pub fields: usize,
    pub pages: usize,
}

/// Decides field and page visibility from the registered conditions.
pub struct VisibilityEngine {
    registry: DependencyRegistry,
    resolver: ValueResolver,
    sink: Rc<dyn VisibilitySink>,
    page_cache: HashMap<String, bool>,
    field_states: BTreeMap<String, ArtifactState>,
    page_states: BTreeMap<String, ArtifactState>,
    page_fields: BTreeMap<String, Vec<String>>,
}

impl VisibilityEngine {
    pub fn new(
        store: VariableStore,
        page_scope: PageScope,
        flows: FlowStates,
        sink: Rc<dyn VisibilitySink>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            registry: DependencyRegistry::default(),
            resolver: ValueResolver::new(store, page_scope, flows, config.flow_separator),
            sink,
            page_cache: HashMap::new(),
            field_states: BTreeMap::new(),
            page_states: BTreeMap::new(),
            page_fields: BTreeMap::new(),
        }
    }

    /// Replaces the registry with the rules of `form` and evaluates everything once.
    pub fn load(&mut self, form: &FormDefinition) -> EvaluationSummary {
        self.page_fields = form
            .pages
            .iter()
            .map(|page| {
                let fields = page.fields.iter().map(|field| field.id.clone()).collect();
                (page.id.clone(), fields)
            })
            .collect();
        self.resolver.clear_fields();
        self.install(DependencyRegistry::from_form(form));
        let summary = self.evaluate_all();
        info!(
            form = %form.id,
            fields = summary.fields,
            pages = summary.pages,
            "loaded form conditions"
        );
        summary
    }

    fn install(&mut self, registry: DependencyRegistry) {
        self.registry = registry;
        self.page_cache.clear();
        self.field_states = self
            .registry
            .conditioned_fields()
            .into_iter()
            .map(|field_id| (field_id.to_string(), ArtifactState::Registered))
            .collect();
        self.page_states = self
            .registry
            .page_groups()
            .iter()
            .map(|group| (group.page_id.clone(), ArtifactState::Registered))
            .collect();
    }

    pub fn evaluate_all(&mut self) -> EvaluationSummary {
        let fields = self.registry.field_conditions().len();
        let pages = self.registry.page_groups().len();
        for index in 0..fields {
            self.evaluate_field_at(index);
        }
        for index in 0..pages {
            self.evaluate_page_at(index);
        }
        EvaluationSummary { fields, pages }
    }

    /// Re-evaluates only the fields and pages that depend on one of `keys`, each at most once.
    pub fn handle_changes<'k, I>(&mut self, keys: I) -> EvaluationSummary
    where
        I: IntoIterator<Item = &'k str>,
    {
        let mut fields = BTreeSet::new();
        let mut pages = BTreeSet::new();
        for key in keys {
            fields.extend(self.registry.fields_depending_on(key).iter().copied());
            pages.extend(self.registry.pages_depending_on(key).iter().copied());
        }
        for &index in &fields {
            self.evaluate_field_at(index);
        }
        for &index in &pages {
            self.evaluate_page_at(index);
        }
        EvaluationSummary {
            fields: fields.len(),
            pages: pages.len(),
        }
    }

    /// Caches a raw field input and re-evaluates its dependents.
    pub fn field_input(&mut self, field_id: &str, value: Value) -> EvaluationSummary {
        self.resolver.record_field(field_id, value);
        self.handle_changes([field_id])
    }

    /// Re-evaluates the conditioned fields placed on a page that just became current.
    pub fn on_page_shown(&mut self, page_id: &str) -> EvaluationSummary {
        let Some(field_ids) = self.page_fields.get(page_id) else {
            return EvaluationSummary::default();
        };
        let indexes: Vec<usize> = self
            .registry
            .field_conditions()
            .iter()
            .enumerate()
            .filter(|(_, condition)| field_ids.contains(&condition.field_id))
            .map(|(index, _)| index)
            .collect();
        for &index in &indexes {
            self.evaluate_field_at(index);
        }
        EvaluationSummary {
            fields: indexes.len(),
            pages: 0,
        }
    }

    fn evaluate_field_at(&mut self, index: usize) -> bool {
        let condition = &self.registry.field_conditions()[index];
        let value = self
            .resolver
            .text(&condition.depends_on, condition.depends_on_page.as_deref());
        let visible = condition.test(&value);
        let field_id = condition.field_id.clone();
        debug!(
            field = %field_id,
            depends_on = %condition.depends_on,
            operator = %condition.operator,
            visible,
            "evaluated field condition"
        );
        self.field_states
            .insert(field_id.clone(), ArtifactState::from_visible(visible));
        self.sink.set_field_visible(&field_id, visible);
        visible
    }

    fn evaluate_page_at(&mut self, index: usize) -> bool {
        let group = &self.registry.page_groups()[index];
        let visible = group.evaluate(|predicate| self.test_predicate(predicate));
        let page_id = group.page_id.clone();
        debug!(page = %page_id, combinator = ?group.combinator, visible, "evaluated page group");
        self.page_cache.insert(page_id.clone(), visible);
        self.page_states
            .insert(page_id.clone(), ArtifactState::from_visible(visible));
        self.sink.set_page_visible(&page_id, visible);
        visible
    }

    fn test_predicate(&self, predicate: &ConditionPredicate) -> bool {
        predicate.test(&self.resolver.text(&predicate.depends_on, None))
    }

    /// Visibility of the page at `page_index`; unconditioned pages are always visible.
    pub fn is_page_visible(&mut self, page_index: usize) -> bool {
        let Some(group_index) = self.registry.page_group_index(page_index) else {
            return true;
        };
        let page_id = &self.registry.page_groups()[group_index].page_id;
        if let Some(&visible) = self.page_cache.get(page_id) {
            return visible;
        }
        self.evaluate_page_at(group_index)
    }

    /// Last evaluated visibility of a field; unconditioned fields are visible.
    pub fn is_field_visible(&self, field_id: &str) -> bool {
        !matches!(self.field_states.get(field_id), Some(ArtifactState::Hidden))
    }

    pub fn field_state(&self, field_id: &str) -> Option<ArtifactState> {
        self.field_states.get(field_id).copied()
    }

    pub fn page_state(&self, page_id: &str) -> Option<ArtifactState> {
        self.page_states.get(page_id).copied()
    }

    /// Result of a button's own rule group, or `None` when the page defines none.
    pub fn evaluate_button(&self, page_index: usize, button: ButtonKind) -> Option<bool> {
        self.registry
            .button_condition(page_index, button)
            .map(|condition| condition.evaluate(|predicate| self.test_predicate(predicate)))
    }

    /// Current value observed for a field, through the usual source priority.
    pub fn current_field_value(&self, field_id: &str) -> Option<Value> {
        self.resolver.resolve(field_id, None).map(|(value, _)| value)
    }

    /// Dependency keys that a flow state stored under `flow_key` could answer.
    pub fn keys_scoped_to(&self, flow_key: &str) -> Vec<String> {
        let prefix = format!("{flow_key}{}", self.resolver.separator());
        self.registry
            .dependency_keys()
            .into_iter()
            .filter(|key| key.starts_with(&prefix))
            .map(str::to_owned)
            .collect()
    }

    /// Walks every field's dependency chain looking for cycles and dangling references.
    pub fn validate(&self) -> DependencyReport {
        let mut errors = Vec::new();

        for field_id in self.registry.conditioned_fields() {
            if let Some(chain) = self.cycle_through(field_id) {
                errors.push(DependencyIssue::Circular {
                    field_id: field_id.to_string(),
                    chain,
                });
            }
        }

        let field_rules = self
            .registry
            .field_conditions()
            .iter()
            .map(|condition| (condition.field_id.as_str(), condition.depends_on.as_str()));
        let page_rules = self.registry.page_groups().iter().flat_map(|group| {
            group
                .conditions
                .iter()
                .map(move |predicate| (group.page_id.as_str(), predicate.depends_on.as_str()))
        });
        let button_rules = self.registry.button_conditions().iter().flat_map(|condition| {
            condition
                .conditions
                .iter()
                .map(move |predicate| (condition.page_id.as_str(), predicate.depends_on.as_str()))
        });
        let mut reported = HashSet::new();
        for (owner, depends_on) in field_rules.chain(page_rules).chain(button_rules) {
            if self.is_known_key(depends_on) || !reported.insert((owner, depends_on)) {
                continue;
            }
            warn!(owner, depends_on, "dangling dependency");
            errors.push(DependencyIssue::Dangling {
                owner: owner.to_string(),
                depends_on: depends_on.to_string(),
            });
        }

        DependencyReport {
            valid: !errors.iter().any(DependencyIssue::is_fatal),
            errors,
        }
    }

    fn is_known_key(&self, key: &str) -> bool {
        !key.is_empty() && (self.registry.is_known_field(key) || self.resolver.has_value(key))
    }

    /// Iterative depth-first walk from `start`; returns the chain when it leads back to `start`.
    fn cycle_through(&self, start: &str) -> Option<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::from([start]);
        let mut parent: HashMap<&str, &str> = HashMap::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            for dependency in self.registry.dependencies_of(node) {
                if dependency == start {
                    let mut chain = vec![node];
                    let mut cursor = node;
                    while let Some(&previous) = parent.get(cursor) {
                        chain.push(previous);
                        cursor = previous;
                    }
                    chain.reverse();
                    chain.push(start);
                    return Some(chain.into_iter().map(str::to_owned).collect());
                }
                if visited.insert(dependency) {
                    parent.insert(dependency, node);
                    stack.push(dependency);
                }
            }
        }
        None
    }

    pub fn export_conditions(&self) -> ConditionsConfig {
        self.registry.to_config()
    }

    /// Installs previously exported conditions and evaluates them against the live sources.
    pub fn import_conditions(&mut self, config: ConditionsConfig) -> EvaluationSummary {
        let known = self.registry.known_fields().clone();
        self.install(DependencyRegistry::from_config(config).with_known_fields(known));
        self.evaluate_all()
    }

    pub fn registry(&self) -> &DependencyRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ValueResolver {
        &self.resolver
    }
}
