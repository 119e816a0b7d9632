use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Configured name of an inverter unit, `leader` unless configured otherwise.
#[derive(
    Clone,
    Debug,
    Display,
    Eq,
    From,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct UnitId(String);

impl From<&str> for UnitId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitRole {
    #[display("leader")]
    Leader,

    #[display("follower")]
    Follower,
}
