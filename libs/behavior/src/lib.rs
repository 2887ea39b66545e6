//! Actor Message Matching and Behavior Switching
//!
//! Dispatch core for actor runtimes: declare how messages are handled as an
//! ordered match chain, freeze it into an immutable behavior, and swap the
//! active behavior at runtime through a become/unbecome stack.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌───────────────────────────┐
//! │   BehaviorBuilder    │ build  │      BehaviorStack        │
//! │                      │──────▶ │                           │
//! │  match_type          │        │  ┌─────────────────────┐  │
//! │  match_type_guarded  │        │  │ overlay  (top)      │◀─┼── receive()
//! │  match_instance_of   │        │  ├─────────────────────┤  │
//! │  match_equals        │        │  │ overlay             │  │  become / unbecome
//! │  match_any           │        │  ├─────────────────────┤  │
//! │                      │        │  │ floor (permanent)   │  │
//! └──────────────────────┘        │  └─────────────────────┘  │
//!                                 └───────────────────────────┘
//! ```
//!
//! Matching is a linear first-match-wins scan in insertion order. Only the
//! top behavior of the stack receives messages; handlers return a
//! [`Transition`] that takes effect for the next delivered message. The
//! delivery loop, mailbox, and supervision are external collaborators: this
//! crate is purely synchronous decision logic, driven one message at a time
//! by the actor that owns the stack.
//!
//! # Examples
//!
//! ```rust
//! use actor_behavior::{ActorId, BehaviorBuilder, BehaviorStack, DynMessage, Transition};
//!
//! struct Counter {
//!     total: u64,
//! }
//!
//! let counting = BehaviorBuilder::new()
//!     .match_type::<u64, _>(|state: &mut Counter, amount: &u64| {
//!         state.total += *amount;
//!         Transition::Same
//!     })
//!     .build();
//!
//! let mut stack = BehaviorStack::new(ActorId::new(), counting);
//! let mut state = Counter { total: 0 };
//!
//! let disposition = stack.receive(&mut state, &DynMessage::new(5u64)).unwrap();
//! assert!(disposition.is_handled());
//! assert_eq!(state.total, 5);
//!
//! // Untyped probes fall through to the unhandled escalation path.
//! let stray = stack.receive(&mut state, &DynMessage::new("hello")).unwrap();
//! assert!(stray.is_unhandled());
//! ```

pub mod behavior;
pub mod error;
pub mod message;
pub mod stack;

pub use behavior::{Behavior, BehaviorBuilder, Transition};
pub use error::{BehaviorError, BehaviorResult, GuardError};
pub use message::{erased_eq, ActorMessage, DynMessage};
pub use stack::{
    ActorId, BehaviorStack, DispatchMetrics, DispatchStats, Disposition, UnhandledMessage,
};
