//! Identifier newtypes and the sequences that hand them out.
//!
//! Each component that assigns ids owns its own [`IdSequence`], so two
//! independent clinics (or two tests) never share a counter.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// An integer identifier that can be produced by an [`IdSequence`].
pub trait SequentialId: Copy + From<u32> {
    /// Raw integer value
    fn value(self) -> u32;
}

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Display, From, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl SequentialId for $name {
            fn value(self) -> u32 {
                self.0
            }
        }
    };
}

sequential_id!(
    /// Patient identifier, generated or supplied on import
    PatientId
);
sequential_id!(
    /// Consultation identifier, unique within a schedule
    ConsultationId
);
sequential_id!(
    /// Condition (medical history entry) identifier
    ConditionId
);
sequential_id!(
    /// Medical record identifier
    RecordId
);

/// Monotonic generator for one kind of identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdSequence<T> {
    next: u32,
    _kind: PhantomData<T>,
}

impl<T: SequentialId> IdSequence<T> {
    /// Sequence whose first issued id is `first`
    pub fn starting_at(first: u32) -> Self {
        IdSequence {
            next: first,
            _kind: PhantomData,
        }
    }

    /// Issue the next id
    pub fn next_id(&mut self) -> T {
        let id = T::from(self.next);
        self.next = self.next.saturating_add(1);
        id
    }

    /// Record an externally supplied id so it is never issued again.
    pub fn observe(&mut self, used: T) {
        if used.value() >= self.next {
            self.next = used.value().saturating_add(1);
        }
    }
}

impl<T: SequentialId> Default for IdSequence<T> {
    fn default() -> Self {
        Self::starting_at(1)
    }
}
