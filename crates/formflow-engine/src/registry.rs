use std::collections::{BTreeSet, HashMap};

use formflow_spec::{
    ButtonCondition, ButtonKind, ConditionsConfig, FieldCondition, FormDefinition,
    PageConditionGroup,
};

/// Arena of condition records with reverse indexes from dependency key to dependents.
#[derive(Debug, Clone, Default)]
pub struct DependencyRegistry {
    fields: Vec<FieldCondition>,
    pages: Vec<PageConditionGroup>,
    buttons: Vec<ButtonCondition>,
    conditions_by_field: HashMap<String, Vec<usize>>,
    field_dependents: HashMap<String, Vec<usize>>,
    page_dependents: HashMap<String, Vec<usize>>,
    page_by_index: HashMap<usize, usize>,
    known_fields: BTreeSet<String>,
}

impl DependencyRegistry {
    pub fn from_form(form: &FormDefinition) -> Self {
        let mut registry = Self::from_config(ConditionsConfig::from_form(form));
        registry.known_fields = form.fields().map(|field| field.id.clone()).collect();
        registry
    }

    pub fn from_config(config: ConditionsConfig) -> Self {
        let mut registry = DependencyRegistry::default();
        for condition in config.field_conditions {
            registry.register_field(condition);
        }
        for group in config.page_conditions {
            registry.register_page(group);
        }
        registry.buttons = config.button_conditions;
        registry
    }

    fn register_field(&mut self, condition: FieldCondition) {
        let index = self.fields.len();
        self.conditions_by_field
            .entry(condition.field_id.clone())
            .or_default()
            .push(index);
        self.field_dependents
            .entry(condition.depends_on.clone())
            .or_default()
            .push(index);
        self.fields.push(condition);
    }

    fn register_page(&mut self, group: PageConditionGroup) {
        let index = self.pages.len();
        let keys: BTreeSet<&str> = group
            .conditions
            .iter()
            .map(|predicate| predicate.depends_on.as_str())
            .collect();
        for key in keys {
            self.page_dependents
                .entry(key.to_string())
                .or_default()
                .push(index);
        }
        self.page_by_index.insert(group.page_index, index);
        self.pages.push(group);
    }

    pub fn to_config(&self) -> ConditionsConfig {
        ConditionsConfig {
            field_conditions: self.fields.clone(),
            page_conditions: self.pages.clone(),
            button_conditions: self.buttons.clone(),
        }
    }

    pub fn field_conditions(&self) -> &[FieldCondition] {
        &self.fields
    }

    pub fn page_groups(&self) -> &[PageConditionGroup] {
        &self.pages
    }

    pub fn button_conditions(&self) -> &[ButtonCondition] {
        &self.buttons
    }

    /// Arena indexes of field conditions whose `depends_on` is `key`.
    pub fn fields_depending_on(&self, key: &str) -> &[usize] {
        self.field_dependents
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Arena indexes of page groups with at least one predicate on `key`.
    pub fn pages_depending_on(&self, key: &str) -> &[usize] {
        self.page_dependents
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Arena index of the group conditioning the page at `page_index`.
    pub fn page_group_index(&self, page_index: usize) -> Option<usize> {
        self.page_by_index.get(&page_index).copied()
    }

    pub fn page_group(&self, page_index: usize) -> Option<&PageConditionGroup> {
        self.page_group_index(page_index)
            .map(|index| &self.pages[index])
    }

    pub fn button_condition(
        &self,
        page_index: usize,
        button: ButtonKind,
    ) -> Option<&ButtonCondition> {
        self.buttons
            .iter()
            .find(|condition| condition.page_index == page_index && condition.button == button)
    }

    /// Keys that `field_id`'s own visibility depends on.
    pub fn dependencies_of<'a>(
        &'a self,
        field_id: &str,
    ) -> impl Iterator<Item = &'a str> + use<'a> {
        self.conditions_by_field
            .get(field_id)
            .into_iter()
            .flatten()
            .map(|&index| self.fields[index].depends_on.as_str())
    }

    /// Field ids carrying a condition, in registration order and without repeats.
    pub fn conditioned_fields(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.fields
            .iter()
            .map(|condition| condition.field_id.as_str())
            .filter(|field_id| seen.insert(*field_id))
            .collect()
    }

    /// Every distinct dependency key referenced by a field, page or button rule.
    pub fn dependency_keys(&self) -> BTreeSet<&str> {
        let fields = self.fields.iter().map(|condition| condition.depends_on.as_str());
        let pages = self
            .pages
            .iter()
            .flat_map(|group| group.conditions.iter())
            .map(|predicate| predicate.depends_on.as_str());
        let buttons = self
            .buttons
            .iter()
            .flat_map(|condition| condition.conditions.iter())
            .map(|predicate| predicate.depends_on.as_str());
        fields.chain(pages).chain(buttons).collect()
    }

    pub fn is_known_field(&self, field_id: &str) -> bool {
        self.known_fields.contains(field_id) || self.conditions_by_field.contains_key(field_id)
    }

    pub fn known_fields(&self) -> &BTreeSet<String> {
        &self.known_fields
    }

    pub fn with_known_fields(mut self, known_fields: BTreeSet<String>) -> Self {
        self.known_fields = known_fields;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.pages.is_empty() && self.buttons.is_empty()
    }
}
