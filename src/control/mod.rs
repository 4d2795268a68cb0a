//! Pending/calm smoothing and effective time, producing one `ControlFrame`
//! per render tick.

pub mod clock;
pub mod frame;
pub mod integrator;
pub mod pending;

pub use clock::EffectiveClock;
pub use frame::{ControlFrame, ControlUniforms, Resolution};
pub use integrator::{tick, Integrator, IntegratorParams, IntegratorState};
pub use pending::{PendingHandle, PendingState};
