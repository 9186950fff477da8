//! Call throttling: admission windows, limiters and keyed registries.

mod gate;
mod limiter;
mod policy;
mod registry;
mod rules;
mod window;

pub use gate::{AdmissionGate, GateExt, Unlimited};
pub use limiter::Limiter;
pub use policy::{LimitPolicy, WaitPolicy, DEFAULT_LIMIT, DEFAULT_WINDOW_MS};
pub use registry::LimiterRegistry;
pub use rules::LimitRules;
pub use window::{Admission, AdmissionWindow, WindowSnapshot};
