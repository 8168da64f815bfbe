#![allow(missing_docs)]

pub mod config;
pub mod events;
pub mod flow_state;
pub mod navigation;
pub mod recording;
pub mod registry;
pub mod resolve;
pub mod session;
pub mod store;
pub mod visibility;

pub use config::{ConfigError, EngineConfig};
pub use events::{EventBus, FieldValueChanged, PageChanged, Subscription, Topic};
pub use flow_state::{FlowState, FlowStates, FlowTag};
pub use navigation::{
    ButtonState, FieldError, FieldErrorCode, NavigationController, NavigationSurface, Progress,
    Transition,
};
pub use recording::{RecordingSurface, SurfaceCall};
pub use registry::DependencyRegistry;
pub use resolve::{PageScope, ValueResolver, ValueSource};
pub use session::{FormSession, VisibilitySnapshot};
pub use store::{StoreEvent, VariableChange, VariableStore};
pub use visibility::{
    ArtifactState, DependencyIssue, DependencyReport, EvaluationSummary, VisibilityEngine,
    VisibilitySink,
};
