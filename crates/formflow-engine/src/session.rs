//! Application root tying the store, the event bus, the engine and navigation together.
//!
//! Every topic feeds one dispatcher queue. Work raised while the session is already evaluating
//! or navigating (a sink writing back into the store, a page change published mid-transition)
//! is queued and drained afterwards in passes. Draining stops after `max_reentrant_passes`;
//! anything still queued at that point is dropped with a warning.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::{Rc, Weak};

use formflow_spec::{ConditionsConfig, FormDefinition};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::events::{EventBus, FieldValueChanged, PageChanged, Subscription};
use crate::flow_state::{FlowState, FlowStates};
use crate::navigation::{ButtonState, NavigationController, NavigationSurface, Progress, Transition};
use crate::recording::RecordingSurface;
use crate::resolve::PageScope;
use crate::store::{StoreEvent, VariableStore};
use crate::visibility::{DependencyReport, EvaluationSummary, VisibilityEngine, VisibilitySink};

#[derive(Debug)]
enum Work {
    Keys(Vec<String>),
    FieldInput { field_id: String, value: Value },
    PageShown(String),
}

struct SessionCore {
    engine: RefCell<VisibilityEngine>,
    navigation: RefCell<NavigationController>,
    store: VariableStore,
    variable_names: RefCell<BTreeMap<String, String>>,
    pending: RefCell<VecDeque<Work>>,
    running: Cell<bool>,
    max_passes: usize,
}

impl SessionCore {
    fn enqueue(&self, work: Work) {
        self.pending.borrow_mut().push_back(work);
        if !self.running.get() {
            self.run_exclusive(|_| ());
        }
    }

    /// Runs `f` with the dispatcher marked busy, then drains whatever it queued.
    fn run_exclusive<R>(&self, f: impl FnOnce(&SessionCore) -> R) -> R {
        let nested = self.running.replace(true);
        let result = f(self);
        if !nested {
            self.drain();
            self.running.set(false);
        }
        result
    }

    fn drain(&self) {
        let mut passes = 0;
        loop {
            let batch: Vec<Work> = self.pending.borrow_mut().drain(..).collect();
            if batch.is_empty() {
                return;
            }
            if passes == self.max_passes {
                warn!(
                    dropped = batch.len(),
                    passes, "re-entrant work exceeded the pass limit; dropping it"
                );
                return;
            }
            passes += 1;
            for work in batch {
                self.apply(work);
            }
        }
    }

    fn apply(&self, work: Work) {
        match work {
            Work::Keys(keys) => {
                let mut engine = self.engine.borrow_mut();
                engine.handle_changes(keys.iter().map(String::as_str));
                self.navigation.borrow_mut().refresh_buttons(&mut engine);
            }
            Work::FieldInput { field_id, value } => {
                self.engine
                    .borrow_mut()
                    .field_input(&field_id, value.clone());
                let variable = self.variable_names.borrow().get(&field_id).cloned();
                if let Some(name) = variable {
                    self.store.set(name, value);
                }
                let mut engine = self.engine.borrow_mut();
                self.navigation.borrow_mut().refresh_buttons(&mut engine);
            }
            Work::PageShown(page_id) => {
                self.engine.borrow_mut().on_page_shown(&page_id);
            }
        }
    }
}

/// Visibility of every field, page and navigation control at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibilitySnapshot {
    pub page_index: usize,
    pub fields: BTreeMap<String, bool>,
    pub pages: BTreeMap<String, bool>,
    pub buttons: ButtonState,
}

pub struct FormSession {
    core: Rc<SessionCore>,
    bus: EventBus,
    flows: FlowStates,
    page_scope: PageScope,
    _subscriptions: Vec<Subscription>,
}

impl FormSession {
    pub fn new(
        sink: Rc<dyn VisibilitySink>,
        surface: Rc<dyn NavigationSurface>,
        config: &EngineConfig,
    ) -> Self {
        let bus = EventBus::new();
        let store = VariableStore::attached(&bus);
        let flows = FlowStates::new();
        let page_scope = PageScope::new();

        let engine = VisibilityEngine::new(
            store.clone(),
            page_scope.clone(),
            flows.clone(),
            sink,
            config,
        );
        let navigation = NavigationController::new(surface, page_scope.clone(), bus.pages.clone());
        let core = Rc::new(SessionCore {
            engine: RefCell::new(engine),
            navigation: RefCell::new(navigation),
            store,
            variable_names: RefCell::new(BTreeMap::new()),
            pending: RefCell::new(VecDeque::new()),
            running: Cell::new(false),
            max_passes: config.max_reentrant_passes,
        });

        let subscriptions = vec![
            bus.variables.subscribe(dispatch(&core, |event: &StoreEvent| {
                Work::Keys(event.keys().into_iter().map(str::to_owned).collect())
            })),
            bus.fields.subscribe(dispatch(&core, |event: &FieldValueChanged| {
                Work::FieldInput {
                    field_id: event.field_id.clone(),
                    value: event.value.clone(),
                }
            })),
            bus.pages.subscribe(dispatch(&core, |event: &PageChanged| {
                Work::PageShown(event.page_id.clone())
            })),
        ];

        Self {
            core,
            bus,
            flows,
            page_scope,
            _subscriptions: subscriptions,
        }
    }

    /// Session rendering into a fresh [`RecordingSurface`].
    pub fn recording(config: &EngineConfig) -> (Self, Rc<RecordingSurface>) {
        let surface = Rc::new(RecordingSurface::new());
        let session = Self::new(surface.clone(), surface.clone(), config);
        (session, surface)
    }

    pub fn load(&self, form: &FormDefinition) -> EvaluationSummary {
        self.page_scope.clear();
        *self.core.variable_names.borrow_mut() = form
            .fields()
            .filter_map(|field| {
                field
                    .variable_name
                    .as_ref()
                    .map(|name| (field.id.clone(), name.clone()))
            })
            .collect();
        self.core.run_exclusive(|core| {
            let mut engine = core.engine.borrow_mut();
            let summary = engine.load(form);
            core.navigation.borrow_mut().load(form, &mut engine);
            summary
        })
    }

    pub fn store(&self) -> &VariableStore {
        &self.core.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn flows(&self) -> &FlowStates {
        &self.flows
    }

    pub fn page_scope(&self) -> &PageScope {
        &self.page_scope
    }

    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.core.store.set(name, value);
    }

    /// Merges a server-provided map into the store under a single notification.
    pub fn set_variables<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.core.store.set_multiple(entries);
    }

    /// Reports a raw input value observed on a rendered field.
    pub fn field_input(&self, field_id: impl Into<String>, value: impl Into<Value>) {
        self.bus.fields.publish(&FieldValueChanged {
            field_id: field_id.into(),
            value: value.into(),
        });
    }

    /// Records a flow state and re-evaluates every rule keyed under `field_id`.
    pub fn set_flow_state(&self, field_id: &str, state: FlowState) {
        debug!(field = field_id, state = ?state.state, "flow state updated");
        self.flows.set(field_id, state);
        let keys = self.core.engine.borrow().keys_scoped_to(field_id);
        if !keys.is_empty() {
            self.core.enqueue(Work::Keys(keys));
        }
    }

    pub fn next(&self) -> Transition {
        self.navigate(|navigation, engine| navigation.next(engine))
    }

    pub fn previous(&self) -> Transition {
        self.navigate(|navigation, engine| navigation.previous(engine))
    }

    pub fn go_to_page(&self, page_index: usize) -> Transition {
        self.navigate(|navigation, engine| navigation.go_to_page(page_index, engine))
    }

    pub fn restore(&self, page_index: usize, history: Vec<usize>) -> Transition {
        self.navigate(|navigation, engine| navigation.restore(page_index, history, engine))
    }

    fn navigate<F>(&self, step: F) -> Transition
    where
        F: FnOnce(&mut NavigationController, &mut VisibilityEngine) -> Transition,
    {
        let transition = self.core.run_exclusive(|core| {
            let mut engine = core.engine.borrow_mut();
            step(&mut core.navigation.borrow_mut(), &mut engine)
        });
        debug!(?transition, "navigation finished");
        transition
    }

    pub fn buttons(&self) -> ButtonState {
        self.core.navigation.borrow().buttons()
    }

    pub fn page_index(&self) -> usize {
        self.core.navigation.borrow().page_index()
    }

    pub fn history(&self) -> Vec<usize> {
        self.core.navigation.borrow().history().to_vec()
    }

    pub fn progress(&self) -> Progress {
        self.core.run_exclusive(|core| {
            core.navigation
                .borrow()
                .progress(&mut core.engine.borrow_mut())
        })
    }

    pub fn validate(&self) -> DependencyReport {
        self.core.engine.borrow().validate()
    }

    pub fn export_conditions(&self) -> ConditionsConfig {
        self.core.engine.borrow().export_conditions()
    }

    pub fn import_conditions(&self, config: ConditionsConfig) -> EvaluationSummary {
        self.core.run_exclusive(|core| {
            let mut engine = core.engine.borrow_mut();
            let summary = engine.import_conditions(config);
            core.navigation.borrow_mut().refresh_buttons(&mut engine);
            summary
        })
    }

    pub fn is_field_visible(&self, field_id: &str) -> bool {
        self.core.engine.borrow().is_field_visible(field_id)
    }

    pub fn is_page_visible(&self, page_index: usize) -> bool {
        self.core
            .run_exclusive(|core| core.engine.borrow_mut().is_page_visible(page_index))
    }

    pub fn visibility_snapshot(&self) -> VisibilitySnapshot {
        self.core.run_exclusive(|core| {
            let mut engine = core.engine.borrow_mut();
            let navigation = core.navigation.borrow();
            let fields = engine
                .registry()
                .known_fields()
                .iter()
                .map(|field_id| (field_id.clone(), engine.is_field_visible(field_id)))
                .collect();
            let pages = navigation
                .page_ids()
                .enumerate()
                .map(|(index, page_id)| (page_id.to_string(), engine.is_page_visible(index)))
                .collect();
            VisibilitySnapshot {
                page_index: navigation.page_index(),
                fields,
                pages,
                buttons: navigation.buttons(),
            }
        })
    }
}

fn dispatch<T, F>(core: &Rc<SessionCore>, to_work: F) -> impl Fn(&T) + 'static
where
    T: 'static,
    F: Fn(&T) -> Work + 'static,
{
    let core: Weak<SessionCore> = Rc::downgrade(core);
    move |event| {
        if let Some(core) = core.upgrade() {
            core.enqueue(to_work(event));
        }
    }
}
