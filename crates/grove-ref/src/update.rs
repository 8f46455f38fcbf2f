use grove_hash::ObjectId;

use crate::name::RefName;

/// Precondition on a ref's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// No check.
    Any,
    /// The ref must not exist.
    Missing,
    /// The ref must currently hold this id.
    Value(ObjectId),
}

impl Expected {
    /// The value a stale rejection reports as expected.
    pub fn value(&self) -> Option<ObjectId> {
        match self {
            Expected::Value(id) => Some(*id),
            Expected::Any | Expected::Missing => None,
        }
    }

    pub(crate) fn admits(&self, current: Option<ObjectId>) -> bool {
        match self {
            Expected::Any => true,
            Expected::Missing => current.is_none(),
            Expected::Value(id) => current == Some(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub name: RefName,
    pub expected: Expected,
    pub new: ObjectId,
    /// Allow moving to a commit that does not descend from the old value.
    pub force: bool,
}

impl RefUpdate {
    pub fn new(name: RefName, new: ObjectId) -> Self {
        Self {
            name,
            expected: Expected::Any,
            new,
            force: false,
        }
    }

    pub fn expect(mut self, expected: Expected) -> Self {
        self.expected = expected;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The compare-and-swap precondition did not hold.
    Stale {
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },
    /// The new value does not descend from the old and `force` was off.
    NonFastForward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Created,
    FastForward,
    Forced,
    NoChange,
    Rejected(RejectReason),
}

impl UpdateOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, UpdateOutcome::Rejected(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Rejected(RejectReason),
}

/// Answers "is `ancestor` reachable from `descendant`" for fast-forward
/// checks. Commit-graph walkers implement this; closures do too.
pub trait Ancestry {
    fn is_ancestor(
        &self,
        ancestor: &ObjectId,
        descendant: &ObjectId,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

impl<F> Ancestry for F
where
    F: Fn(&ObjectId, &ObjectId) -> bool,
{
    fn is_ancestor(
        &self,
        ancestor: &ObjectId,
        descendant: &ObjectId,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self(ancestor, descendant))
    }
}
