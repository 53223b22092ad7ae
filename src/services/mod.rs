pub mod action_dispatcher;
pub mod capture;
pub mod control;
pub mod cooldown;
pub mod matcher;
pub mod reference_setup;
pub mod scheduler;
pub mod sound;
pub mod state_machine;
pub mod virtual_device;
pub mod window_tracker;

pub use action_dispatcher::{ActionDispatcher, ActionOutcome, KeyActionDispatcher};
pub use capture::{CaptureProvider, ScreenCapture, Snapshot};
pub use control::ControlSurface;
pub use cooldown::CooldownTimer;
pub use matcher::{MatchResult, ReferenceTemplate, TemplateMatcher, TemplateSet};
pub use scheduler::{Scheduler, Status, TickReport};
pub use sound::SoundPlayer;
pub use state_machine::{AppState, StateMachine, Transition};
pub use virtual_device::VirtualDevice;
pub use window_tracker::{create_window_tracker, WindowTracker};
