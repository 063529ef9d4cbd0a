//! Strongly typed row identifiers.

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// Identifier of a pipeline definition.
    PipelineId
);
define_id!(
    /// Identifier of a state within a pipeline.
    StateId
);
define_id!(
    /// Identifier of a transition edge.
    TransitionId
);
define_id!(
    /// Identifier of a transition action.
    ActionId
);
define_id!(
    /// Identifier of an entity's runtime state record.
    EntityStateId
);
define_id!(
    /// Identifier of a timeline row.
    LogId
);
