use strum_macros::{Display, EnumIter, IntoStaticStr};

/// Phases of a collection drain run.
#[derive(Debug, Clone, PartialEq, Copy, EnumIter, Display, IntoStaticStr, Eq, Hash)]
pub enum DrainState {
    Querying,
    Committing,
    #[strum(serialize = "Paced Wait")]
    PacedWait,
    Done,
    Failed,
}
