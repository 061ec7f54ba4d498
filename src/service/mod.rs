//! Service layer: session reconciliation, display, timers and the event
//! loop that serializes them.
//!
//! [`Dispatcher`] owns a [`CounterService`], which owns the
//! [`SessionManager`] and through it the
//! [`ContextRegistry`](crate::domain::ContextRegistry).

pub mod counter;
pub mod dispatcher;
pub mod display;
pub mod health;
pub mod long_press;
pub mod session_manager;

pub use counter::CounterService;
pub use dispatcher::{ControlEvent, ControlSender, Dispatcher};
pub use display::{DisplayNotifier, DisplayState};
pub use health::HealthMonitor;
pub use long_press::LongPressTimers;
pub use session_manager::{ReconcileOutcome, SessionManager};
