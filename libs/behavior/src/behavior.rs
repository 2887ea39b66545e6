//! Match predicate chains: ordered clause lists frozen into behaviors.
//!
//! A [`BehaviorBuilder`] accumulates (test, action) clauses; `build()`
//! consumes it into an immutable [`Behavior`]. Matching is a linear scan in
//! insertion order with first-match-wins semantics, deliberately without
//! caching or type indexing: clause order and guard evaluation stay
//! observable, and guards may be stateful.
//!
//! `S` is the owning actor's state. Handlers receive `&mut S` and return a
//! [`Transition`] telling the stack what the next behavior is.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::error::{BehaviorError, BehaviorResult, GuardError};
use crate::message::{ActorMessage, DynMessage};

type ClauseTest = Box<dyn Fn(&DynMessage) -> Result<bool, GuardError> + Send + Sync>;
type ClauseAction<S> = Box<dyn Fn(&mut S, &DynMessage) -> Transition<S> + Send + Sync>;

/// One (test, action) entry of a chain. Its priority is its position in the
/// owning chain; it is owned exclusively by that chain and immutable once
/// added.
struct MatchClause<S: 'static> {
    test: ClauseTest,
    action: ClauseAction<S>,
}

/// Directive returned by every handler: what the actor's active behavior
/// should be for the *next* delivered message. The stack applies it after
/// the handler returns, so a transition can never affect how the current
/// message was matched.
pub enum Transition<S: 'static> {
    /// Keep the current behavior.
    Same,
    /// Replace the top behavior (`discard_old: true`) or push on top of it.
    Become {
        behavior: Behavior<S>,
        discard_old: bool,
    },
    /// Pop back to the previous behavior.
    Unbecome,
}

impl<S: 'static> Transition<S> {
    /// Keep the current behavior.
    pub fn same() -> Self {
        Self::Same
    }

    /// Switch to `behavior`, replacing the top entry when `discard_old`.
    pub fn r#become(behavior: Behavior<S>, discard_old: bool) -> Self {
        Self::Become {
            behavior,
            discard_old,
        }
    }

    /// Revert to the previous behavior.
    pub fn unbecome() -> Self {
        Self::Unbecome
    }
}

impl<S: 'static> fmt::Debug for Transition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Same => f.write_str("Same"),
            Self::Become { discard_old, .. } => f
                .debug_struct("Become")
                .field("discard_old", discard_old)
                .finish_non_exhaustive(),
            Self::Unbecome => f.write_str("Unbecome"),
        }
    }
}

/// Incremental builder for a match chain. Clauses are appended in call
/// order, which is their matching priority. `build()` consumes the builder,
/// so a frozen [`Behavior`] cannot gain clauses afterwards.
pub struct BehaviorBuilder<S: 'static> {
    clauses: Vec<MatchClause<S>>,
}

impl<S: 'static> BehaviorBuilder<S> {
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Append a clause matching any message whose concrete type is `M`.
    pub fn match_type<M, H>(mut self, handler: H) -> Self
    where
        M: ActorMessage,
        H: Fn(&mut S, &M) -> Transition<S> + Send + Sync + 'static,
    {
        self.clauses.push(MatchClause {
            test: Box::new(|message| Ok(message.downcast_ref::<M>().is_some())),
            action: typed_action(handler),
        });
        self
    }

    /// Append a clause matching messages of type `M` for which `guard`
    /// returns `Ok(true)`. A guard `Err` aborts matching for that message.
    pub fn match_type_guarded<M, G, H>(mut self, guard: G, handler: H) -> Self
    where
        M: ActorMessage,
        G: Fn(&M) -> Result<bool, GuardError> + Send + Sync + 'static,
        H: Fn(&mut S, &M) -> Transition<S> + Send + Sync + 'static,
    {
        self.clauses.push(MatchClause {
            test: Box::new(move |message| match message.downcast_ref::<M>() {
                Some(typed) => guard(typed),
                None => Ok(false),
            }),
            action: typed_action(handler),
        });
        self
    }

    /// Append a clause matching any message answering the tag
    /// `TypeId::of::<T>()`. With `T = dyn Marker` this is the covariant
    /// match: every type whose `is_instance_of` claims the marker is
    /// accepted, so a supertype tag matches all of its subtypes.
    pub fn match_instance_of<T, H>(mut self, handler: H) -> Self
    where
        T: ?Sized + 'static,
        H: Fn(&mut S, &DynMessage) -> Transition<S> + Send + Sync + 'static,
    {
        let tag = TypeId::of::<T>();
        self.clauses.push(MatchClause {
            test: Box::new(move |message| Ok(message.is_instance_of(tag))),
            action: Box::new(move |state, message| handler(state, message)),
        });
        self
    }

    /// Guarded variant of [`match_instance_of`](Self::match_instance_of);
    /// the guard sees the erased message.
    pub fn match_instance_of_guarded<T, G, H>(mut self, guard: G, handler: H) -> Self
    where
        T: ?Sized + 'static,
        G: Fn(&DynMessage) -> Result<bool, GuardError> + Send + Sync + 'static,
        H: Fn(&mut S, &DynMessage) -> Transition<S> + Send + Sync + 'static,
    {
        let tag = TypeId::of::<T>();
        self.clauses.push(MatchClause {
            test: Box::new(move |message| {
                if message.is_instance_of(tag) {
                    guard(message)
                } else {
                    Ok(false)
                }
            }),
            action: Box::new(move |state, message| handler(state, message)),
        });
        self
    }

    /// Append a clause matching messages structurally equal to `value`
    /// (value equality, never identity).
    pub fn match_equals<M, H>(mut self, value: M, handler: H) -> Self
    where
        M: ActorMessage,
        H: Fn(&mut S, &M) -> Transition<S> + Send + Sync + 'static,
    {
        self.clauses.push(MatchClause {
            test: Box::new(move |message| Ok(value.eq_erased(message.as_erased()))),
            action: typed_action(handler),
        });
        self
    }

    /// Append a clause matching every message. Clauses appended after this
    /// one are unreachable; keeping them well-ordered is the caller's
    /// responsibility.
    pub fn match_any<H>(mut self, handler: H) -> Self
    where
        H: Fn(&mut S, &DynMessage) -> Transition<S> + Send + Sync + 'static,
    {
        self.clauses.push(MatchClause {
            test: Box::new(|_| Ok(true)),
            action: Box::new(move |state, message| handler(state, message)),
        });
        self
    }

    /// Freeze the chain. The builder is consumed; the resulting behavior is
    /// immutable and cheaply clonable.
    pub fn build(self) -> Behavior<S> {
        Behavior {
            kind: BehaviorKind::Chain(self.clauses.into()),
        }
    }

    /// Number of clauses appended so far.
    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }
}

impl<S: 'static> Default for BehaviorBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn typed_action<S, M, H>(handler: H) -> ClauseAction<S>
where
    S: 'static,
    M: ActorMessage,
    H: Fn(&mut S, &M) -> Transition<S> + Send + Sync + 'static,
{
    Box::new(move |state, message| match message.downcast_ref::<M>() {
        Some(typed) => handler(state, typed),
        // The scan only runs an action whose own test accepted the message.
        None => Transition::Same,
    })
}

/// A frozen match chain: one "mode" of message handling.
///
/// Immutable once built; cloning shares the underlying clauses, so a built
/// behavior is safe to hand to several stacks or compose with `or_else`.
pub struct Behavior<S: 'static> {
    kind: BehaviorKind<S>,
}

enum BehaviorKind<S: 'static> {
    Chain(Arc<[MatchClause<S>]>),
    OrElse(Arc<Behavior<S>>, Arc<Behavior<S>>),
}

impl<S: 'static> Clone for Behavior<S> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            BehaviorKind::Chain(clauses) => BehaviorKind::Chain(Arc::clone(clauses)),
            BehaviorKind::OrElse(first, second) => {
                BehaviorKind::OrElse(Arc::clone(first), Arc::clone(second))
            }
        };
        Self { kind }
    }
}

impl<S: 'static> fmt::Debug for Behavior<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            BehaviorKind::Chain(clauses) => {
                write!(f, "Behavior(chain, {} clauses)", clauses.len())
            }
            BehaviorKind::OrElse(first, second) => {
                write!(f, "Behavior({:?} or_else {:?})", first, second)
            }
        }
    }
}

impl<S: 'static> Behavior<S> {
    /// The no-op behavior: defined at no message. A safe default.
    pub fn empty() -> Self {
        Self {
            kind: BehaviorKind::Chain(Vec::new().into()),
        }
    }

    /// True iff some clause's test accepts `message`, evaluated in
    /// insertion order and short-circuiting at the first success. A guard
    /// `Err` aborts the scan.
    pub fn is_defined_at(&self, message: &DynMessage) -> BehaviorResult<bool> {
        match &self.kind {
            BehaviorKind::Chain(clauses) => {
                for clause in clauses.iter() {
                    if (clause.test)(message).map_err(|source| {
                        BehaviorError::guard_failure(message.type_name(), source)
                    })? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            BehaviorKind::OrElse(first, second) => {
                Ok(first.is_defined_at(message)? || second.is_defined_at(message)?)
            }
        }
    }

    /// Re-evaluate clauses in order and run the first matching handler.
    ///
    /// Calling this for a message `is_defined_at` rejects is a precondition
    /// violation and fails with [`BehaviorError::UnmatchedMessage`].
    pub fn apply(&self, state: &mut S, message: &DynMessage) -> BehaviorResult<Transition<S>> {
        match self.run_first_match(state, message)? {
            Some(transition) => Ok(transition),
            None => Err(BehaviorError::unmatched(message.type_name())),
        }
    }

    /// Compose two behaviors: defined wherever either side is, applying the
    /// first side that matches. Neither operand is mutated, and the
    /// composition is associative. Within one `apply`, each side is scanned
    /// at most once, so guards never run twice per side.
    pub fn or_else(&self, other: &Behavior<S>) -> Behavior<S> {
        Behavior {
            kind: BehaviorKind::OrElse(Arc::new(self.clone()), Arc::new(other.clone())),
        }
    }

    /// Single in-order scan running the first matching action.
    fn run_first_match(
        &self,
        state: &mut S,
        message: &DynMessage,
    ) -> BehaviorResult<Option<Transition<S>>> {
        match &self.kind {
            BehaviorKind::Chain(clauses) => {
                for clause in clauses.iter() {
                    if (clause.test)(message).map_err(|source| {
                        BehaviorError::guard_failure(message.type_name(), source)
                    })? {
                        return Ok(Some((clause.action)(state, message)));
                    }
                }
                Ok(None)
            }
            BehaviorKind::OrElse(first, second) => {
                if let Some(transition) = first.run_first_match(state, message)? {
                    return Ok(Some(transition));
                }
                second.run_first_match(state, message)
            }
        }
    }
}
