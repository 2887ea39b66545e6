//! Behavior stack and the per-message dispatch step.
//!
//! Each actor owns one [`BehaviorStack`]. Only the top behavior receives
//! messages; `become` replaces or pushes, `unbecome` pops. The first
//! installed behavior is the stack floor: it can be replaced but never
//! popped, so the stack is never empty while the actor runs. Every mutation
//! goes through `&mut self`, which keeps the stack confined to the owning
//! actor's single-threaded processing turn.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::behavior::{Behavior, Transition};
use crate::error::{BehaviorError, BehaviorResult};
use crate::message::DynMessage;

/// Unique identifier of the actor owning a behavior stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorId {
    id: Uuid,
}

impl ActorId {
    /// Create a fresh random id.
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Create from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self { id }
    }

    /// Underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.id.simple())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one dispatch step, reported to the delivery mechanism.
#[derive(Debug, Clone)]
pub enum Disposition {
    /// The active behavior handled the message.
    Handled,
    /// No clause of the active behavior was defined at the message; the
    /// event is handed upward to the escalation path.
    Unhandled(UnhandledMessage),
}

impl Disposition {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled)
    }

    pub fn is_unhandled(&self) -> bool {
        matches!(self, Self::Unhandled(_))
    }
}

/// Event describing a message the active behavior was not defined at.
///
/// Not an error: the actor is alive and chose not to handle the message.
/// The escalation path (dead-letter publication, monitoring) consumes it.
#[derive(Debug, Clone)]
pub struct UnhandledMessage {
    actor: ActorId,
    message_type: &'static str,
    message: DynMessage,
}

impl UnhandledMessage {
    /// The actor that did not handle the message.
    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    /// Name of the unhandled message's concrete type.
    pub fn message_type(&self) -> &'static str {
        self.message_type
    }

    /// The unhandled message itself.
    pub fn message(&self) -> &DynMessage {
        &self.message
    }

    /// Consume the event, keeping only the message (dead-letter forwarding).
    pub fn into_message(self) -> DynMessage {
        self.message
    }
}

/// Dispatch counters, shared with the owning actor's monitoring.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    pub handled: AtomicU64,
    pub unhandled: AtomicU64,
    pub guard_failures: AtomicU64,
    pub becomes: AtomicU64,
    pub unbecomes: AtomicU64,
    pub peak_depth: AtomicUsize,
}

impl DispatchMetrics {
    fn note_depth(&self, depth: usize) {
        self.peak_depth.fetch_max(depth, Ordering::Relaxed);
    }

    /// Point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> DispatchStats {
        let handled = self.handled.load(Ordering::Relaxed);
        let unhandled = self.unhandled.load(Ordering::Relaxed);
        let delivered = handled + unhandled;
        let unhandled_percentage = if delivered > 0 {
            (unhandled as f64 / delivered as f64) * 100.0
        } else {
            0.0
        };

        DispatchStats {
            handled,
            unhandled,
            guard_failures: self.guard_failures.load(Ordering::Relaxed),
            becomes: self.becomes.load(Ordering::Relaxed),
            unbecomes: self.unbecomes.load(Ordering::Relaxed),
            peak_depth: self.peak_depth.load(Ordering::Relaxed),
            unhandled_percentage,
        }
    }
}

/// Plain-value dispatch statistics.
#[derive(Debug, Clone)]
pub struct DispatchStats {
    pub handled: u64,
    pub unhandled: u64,
    pub guard_failures: u64,
    pub becomes: u64,
    pub unbecomes: u64,
    pub peak_depth: usize,
    pub unhandled_percentage: f64,
}

/// LIFO stack of active behaviors for one actor.
///
/// The floor behavior lives in its own field: `unbecome` can only pop
/// overlays, so no call sequence empties the stack. The whole stack is
/// dropped when the owning actor stops.
pub struct BehaviorStack<S: 'static> {
    actor_id: ActorId,
    floor: Behavior<S>,
    overlays: Vec<Behavior<S>>,
    metrics: Arc<DispatchMetrics>,
}

impl<S: 'static> BehaviorStack<S> {
    /// Create a single-entry stack with `initial` as the permanent floor.
    pub fn new(actor_id: ActorId, initial: Behavior<S>) -> Self {
        debug!(actor_id = %actor_id, "installing initial behavior");
        let metrics = Arc::new(DispatchMetrics::default());
        metrics.note_depth(1);
        Self {
            actor_id,
            floor: initial,
            overlays: Vec::new(),
            metrics,
        }
    }

    /// The owning actor's id.
    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    /// Current stack depth; never below 1.
    pub fn depth(&self) -> usize {
        1 + self.overlays.len()
    }

    /// The behavior that receives the next message.
    pub fn current_behavior(&self) -> &Behavior<S> {
        self.overlays.last().unwrap_or(&self.floor)
    }

    /// Shared handle to the dispatch counters.
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Install `behavior` as the new top. With `discard_old` the top entry
    /// (the floor included) is replaced; otherwise the previous top stays
    /// beneath the new one. Takes effect for the next delivered message.
    pub fn r#become(&mut self, behavior: Behavior<S>, discard_old: bool) {
        if discard_old {
            match self.overlays.last_mut() {
                Some(top) => *top = behavior,
                None => self.floor = behavior,
            }
        } else {
            self.overlays.push(behavior);
        }
        self.metrics.becomes.fetch_add(1, Ordering::Relaxed);
        self.metrics.note_depth(self.depth());
        debug!(
            actor_id = %self.actor_id,
            depth = self.depth(),
            discard_old,
            "became new behavior"
        );
    }

    /// Remove the top overlay, revealing the previous behavior. At the
    /// floor this fails with [`BehaviorError::StackUnderflow`]; the floor is
    /// removable only by discarding the whole stack.
    pub fn unbecome(&mut self) -> BehaviorResult<()> {
        match self.overlays.pop() {
            Some(_) => {
                self.metrics.unbecomes.fetch_add(1, Ordering::Relaxed);
                debug!(
                    actor_id = %self.actor_id,
                    depth = self.depth(),
                    "reverted to previous behavior"
                );
                Ok(())
            }
            None => Err(BehaviorError::stack_underflow(self.actor_id.to_string())),
        }
    }

    /// Dispatch one delivered message against the top behavior.
    ///
    /// The handler's returned [`Transition`] is applied after the handler
    /// finishes, so the current message is always matched by the behavior
    /// that was on top when its turn began. Guard failures propagate as
    /// errors; an undefined message is reported as
    /// [`Disposition::Unhandled`].
    pub fn receive(&mut self, state: &mut S, message: &DynMessage) -> BehaviorResult<Disposition> {
        trace!(
            actor_id = %self.actor_id,
            message_type = message.type_name(),
            depth = self.depth(),
            "dispatching message"
        );

        let top = self.current_behavior();
        let defined = top
            .is_defined_at(message)
            .map_err(|error| self.note_selection_failure(error))?;

        if !defined {
            self.metrics.unhandled.fetch_add(1, Ordering::Relaxed);
            warn!(
                actor_id = %self.actor_id,
                message_type = message.type_name(),
                "message not handled by current behavior"
            );
            return Ok(Disposition::Unhandled(UnhandledMessage {
                actor: self.actor_id.clone(),
                message_type: message.type_name(),
                message: message.clone(),
            }));
        }

        let transition = top
            .apply(state, message)
            .map_err(|error| self.note_selection_failure(error))?;
        self.metrics.handled.fetch_add(1, Ordering::Relaxed);
        self.apply_transition(transition)?;
        Ok(Disposition::Handled)
    }

    fn apply_transition(&mut self, transition: Transition<S>) -> BehaviorResult<()> {
        match transition {
            Transition::Same => Ok(()),
            Transition::Become {
                behavior,
                discard_old,
            } => {
                self.r#become(behavior, discard_old);
                Ok(())
            }
            Transition::Unbecome => self.unbecome(),
        }
    }

    fn note_selection_failure(&self, error: BehaviorError) -> BehaviorError {
        if error.is_guard_failure() {
            self.metrics.guard_failures.fetch_add(1, Ordering::Relaxed);
        }
        error
    }
}

impl<S: 'static> fmt::Debug for BehaviorStack<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorStack")
            .field("actor_id", &self.actor_id)
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorBuilder;
    use crate::message::{erased_eq, ActorMessage};
    use proptest::prelude::*;
    use std::any::Any;

    #[derive(Debug, PartialEq)]
    struct Tick;

    #[derive(Debug, PartialEq)]
    struct Tock;

    impl ActorMessage for Tick {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn eq_erased(&self, other: &dyn ActorMessage) -> bool {
            erased_eq(self, other)
        }
    }

    impl ActorMessage for Tock {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn eq_erased(&self, other: &dyn ActorMessage) -> bool {
            erased_eq(self, other)
        }
    }

    #[derive(Default)]
    struct Probe {
        seen: Vec<String>,
    }

    fn labelled(label: &str) -> Behavior<Probe> {
        let label = label.to_string();
        BehaviorBuilder::new()
            .match_type::<Tick, _>(move |probe: &mut Probe, _: &Tick| {
                probe.seen.push(label.clone());
                Transition::Same
            })
            .build()
    }

    #[test]
    fn new_stack_has_a_single_floor_entry() {
        let mut stack = BehaviorStack::new(ActorId::new(), labelled("floor"));
        let mut probe = Probe::default();

        assert_eq!(stack.depth(), 1);
        let disposition = stack.receive(&mut probe, &DynMessage::new(Tick)).unwrap();
        assert!(disposition.is_handled());
        assert_eq!(probe.seen, ["floor"]);
    }

    #[test]
    fn become_replace_swaps_the_top_entry() {
        let mut stack = BehaviorStack::new(ActorId::new(), labelled("old"));
        let mut probe = Probe::default();

        stack.r#become(
            BehaviorBuilder::new()
                .match_type::<Tock, _>(|probe: &mut Probe, _: &Tock| {
                    probe.seen.push("new".to_string());
                    Transition::Same
                })
                .build(),
            true,
        );

        assert_eq!(stack.depth(), 1);
        // The replaced behavior's clauses no longer match what they used to.
        let tick = stack.receive(&mut probe, &DynMessage::new(Tick)).unwrap();
        assert!(tick.is_unhandled());
        let tock = stack.receive(&mut probe, &DynMessage::new(Tock)).unwrap();
        assert!(tock.is_handled());
        assert_eq!(probe.seen, ["new"]);
    }

    #[test]
    fn become_push_then_unbecome_round_trips() {
        let mut stack = BehaviorStack::new(ActorId::new(), labelled("floor"));
        let mut probe = Probe::default();

        stack.r#become(labelled("pushed"), false);
        assert_eq!(stack.depth(), 2);
        stack.receive(&mut probe, &DynMessage::new(Tick)).unwrap();

        stack.unbecome().unwrap();
        assert_eq!(stack.depth(), 1);
        stack.receive(&mut probe, &DynMessage::new(Tick)).unwrap();

        assert_eq!(probe.seen, ["pushed", "floor"]);
    }

    #[test]
    fn unbecome_at_the_floor_underflows() {
        let mut stack = BehaviorStack::new(ActorId::new(), labelled("floor"));
        let mut probe = Probe::default();

        let error = stack.unbecome().unwrap_err();
        assert!(matches!(error, BehaviorError::StackUnderflow { .. }));

        // The floor is intact and still dispatching.
        assert_eq!(stack.depth(), 1);
        let disposition = stack.receive(&mut probe, &DynMessage::new(Tick)).unwrap();
        assert!(disposition.is_handled());
    }

    #[test]
    fn handler_transitions_take_effect_for_the_next_message() {
        let initial = BehaviorBuilder::new()
            .match_type::<Tick, _>(|probe: &mut Probe, _: &Tick| {
                probe.seen.push("initial".to_string());
                Transition::r#become(
                    BehaviorBuilder::new()
                        .match_type::<Tock, _>(|probe: &mut Probe, _: &Tock| {
                            probe.seen.push("switched".to_string());
                            Transition::Same
                        })
                        .build(),
                    true,
                )
            })
            .build();
        let mut stack = BehaviorStack::new(ActorId::new(), initial);
        let mut probe = Probe::default();

        // The message that triggers the switch is still handled by the
        // behavior that was on top when its turn began.
        let first = stack.receive(&mut probe, &DynMessage::new(Tick)).unwrap();
        assert!(first.is_handled());

        let second = stack.receive(&mut probe, &DynMessage::new(Tick)).unwrap();
        assert!(second.is_unhandled());
        let third = stack.receive(&mut probe, &DynMessage::new(Tock)).unwrap();
        assert!(third.is_handled());
        assert_eq!(probe.seen, ["initial", "switched"]);
    }

    #[test]
    fn handler_unbecome_at_the_floor_surfaces_the_underflow() {
        let initial = BehaviorBuilder::new()
            .match_type::<Tick, _>(|_: &mut Probe, _: &Tick| Transition::Unbecome)
            .build();
        let mut stack = BehaviorStack::new(ActorId::new(), initial);
        let mut probe = Probe::default();

        let error = stack.receive(&mut probe, &DynMessage::new(Tick)).unwrap_err();
        assert!(matches!(error, BehaviorError::StackUnderflow { .. }));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn unhandled_disposition_reports_the_message() {
        let actor_id = ActorId::new();
        let mut stack = BehaviorStack::new(actor_id.clone(), Behavior::<Probe>::empty());
        let mut probe = Probe::default();

        let disposition = stack.receive(&mut probe, &DynMessage::new(Tock)).unwrap();
        match disposition {
            Disposition::Unhandled(event) => {
                assert_eq!(event.actor(), &actor_id);
                assert!(event.message_type().ends_with("Tock"));
                assert!(event.message().downcast_ref::<Tock>().is_some());
                assert_eq!(event.into_message(), DynMessage::new(Tock));
            }
            Disposition::Handled => panic!("expected an unhandled disposition"),
        }
    }

    #[test]
    fn metrics_count_dispatch_outcomes() {
        let mut stack = BehaviorStack::new(ActorId::new(), labelled("floor"));
        let mut probe = Probe::default();

        stack.receive(&mut probe, &DynMessage::new(Tick)).unwrap();
        stack.receive(&mut probe, &DynMessage::new(Tock)).unwrap();
        stack.r#become(labelled("pushed"), false);
        stack.unbecome().unwrap();

        let stats = stack.metrics().snapshot();
        assert_eq!(stats.handled, 1);
        assert_eq!(stats.unhandled, 1);
        assert_eq!(stats.becomes, 1);
        assert_eq!(stats.unbecomes, 1);
        assert_eq!(stats.peak_depth, 2);
        assert_eq!(stats.guard_failures, 0);
        assert!((stats.unhandled_percentage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn guard_failures_propagate_and_are_counted() {
        let guarded = BehaviorBuilder::new()
            .match_type_guarded::<Tick, _, _>(
                |_: &Tick| Err("probe offline".into()),
                |_: &mut Probe, _: &Tick| Transition::Same,
            )
            .build();
        let mut stack = BehaviorStack::new(ActorId::new(), guarded);
        let mut probe = Probe::default();

        let error = stack.receive(&mut probe, &DynMessage::new(Tick)).unwrap_err();
        assert!(error.is_guard_failure());
        assert_eq!(stack.metrics().snapshot().guard_failures, 1);
    }

    proptest! {
        // Model check: arbitrary become/unbecome sequences keep the floor.
        #[test]
        fn stack_depth_tracks_a_reference_model(ops in proptest::collection::vec(0u8..3, 0..64)) {
            let mut stack = BehaviorStack::<()>::new(ActorId::new(), Behavior::empty());
            let mut model_depth = 1usize;

            for op in ops {
                match op {
                    0 => stack.r#become(Behavior::empty(), true),
                    1 => {
                        stack.r#become(Behavior::empty(), false);
                        model_depth += 1;
                    }
                    _ => {
                        let result = stack.unbecome();
                        if model_depth == 1 {
                            prop_assert!(result.is_err());
                        } else {
                            prop_assert!(result.is_ok());
                            model_depth -= 1;
                        }
                    }
                }
                prop_assert_eq!(stack.depth(), model_depth);
            }
            prop_assert!(stack.depth() >= 1);
        }
    }
}
