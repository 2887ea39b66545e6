//! Dynamic message representation for behavior dispatch.
//!
//! Messages cross the dispatch layer type-erased so a single chain can hold
//! clauses for unrelated message types. [`DynMessage`] wraps the payload in an
//! `Arc`, making delivery a pointer bump, and [`ActorMessage`] carries the
//! three capabilities matching needs: downcasting, structural equality, and
//! runtime tag tests.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Payload trait for messages routed through a match chain.
///
/// Implementations are plain data types. `eq_erased` supplies value-equality
/// across the erasure boundary (use [`erased_eq`] for `PartialEq` types), and
/// `is_instance_of` answers runtime tag tests. The default recognizes only
/// the concrete type; types participating in a marker-trait hierarchy
/// override it to also answer for the marker's tag:
///
/// ```
/// use std::any::{Any, TypeId};
/// use actor_behavior::{erased_eq, ActorMessage};
///
/// trait Command: ActorMessage {}
///
/// #[derive(Debug, PartialEq)]
/// struct Shutdown;
///
/// impl Command for Shutdown {}
///
/// impl ActorMessage for Shutdown {
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
///
///     fn eq_erased(&self, other: &dyn ActorMessage) -> bool {
///         erased_eq(self, other)
///     }
///
///     fn is_instance_of(&self, tag: TypeId) -> bool {
///         tag == TypeId::of::<Shutdown>() || tag == TypeId::of::<dyn Command>()
///     }
/// }
/// ```
pub trait ActorMessage: Any + Send + Sync + fmt::Debug {
    /// Erased view used for downcasting in typed clauses.
    fn as_any(&self) -> &dyn Any;

    /// Structural equality against another erased message.
    fn eq_erased(&self, other: &dyn ActorMessage) -> bool;

    /// Runtime tag test used by instance-of clauses.
    fn is_instance_of(&self, tag: TypeId) -> bool {
        self.as_any().type_id() == tag
    }
}

/// Value-equality helper for `eq_erased` implementations: true iff `other`
/// holds the same concrete type and compares equal.
pub fn erased_eq<M>(message: &M, other: &dyn ActorMessage) -> bool
where
    M: PartialEq + 'static,
{
    other
        .as_any()
        .downcast_ref::<M>()
        .map_or(false, |o| message == o)
}

macro_rules! impl_plain_message {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ActorMessage for $ty {
                fn as_any(&self) -> &dyn Any {
                    self
                }

                fn eq_erased(&self, other: &dyn ActorMessage) -> bool {
                    erased_eq(self, other)
                }
            }
        )+
    };
}

impl_plain_message!(String, &'static str, bool, char, i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, usize, isize);

/// A type-erased message as handed to the dispatch layer.
///
/// Cloning is cheap (`Arc` bump); the payload itself is immutable. The
/// concrete type name is captured at construction for diagnostics and
/// unhandled-message reporting.
#[derive(Clone)]
pub struct DynMessage {
    inner: Arc<dyn ActorMessage>,
    type_name: &'static str,
}

impl DynMessage {
    /// Wrap a message payload for delivery.
    pub fn new<M: ActorMessage>(message: M) -> Self {
        Self {
            inner: Arc::new(message),
            type_name: std::any::type_name::<M>(),
        }
    }

    /// Borrow the payload as `M`, if that is its concrete type.
    pub fn downcast_ref<M: ActorMessage>(&self) -> Option<&M> {
        self.inner.as_any().downcast_ref::<M>()
    }

    /// Runtime tag test, delegating to the payload's `is_instance_of`.
    pub fn is_instance_of(&self, tag: TypeId) -> bool {
        self.inner.is_instance_of(tag)
    }

    /// `TypeId` of the concrete payload.
    pub fn message_type_id(&self) -> TypeId {
        self.inner.as_any().type_id()
    }

    /// Name of the concrete payload type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the erased payload.
    pub fn as_erased(&self) -> &dyn ActorMessage {
        self.inner.as_ref()
    }
}

impl fmt::Debug for DynMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DynMessage({:?})", self.inner)
    }
}

/// Structural equality: same concrete type, equal values. Never identity.
impl PartialEq for DynMessage {
    fn eq(&self, other: &Self) -> bool {
        self.inner.eq_erased(other.as_erased())
    }
}
