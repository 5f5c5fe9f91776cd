//! Widget screen state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! transition function decides the next screen and returns effects that the
//! runtime executes (persisting lead info, dispatching messages).

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{MenuItem, Screen, ScreenContext, HELP_TOPICS, QUICK_ACTION};
pub use transition::{transition, TransitionError, TransitionResult};
