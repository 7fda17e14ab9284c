use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::ModelError;
use crate::ids::{OperatorId, RiderId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Capability granted by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Role {
    Operator,
    Rider,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Operator => "operator",
            Role::Rider => "rider",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "operator" | "driver" => Ok(Role::Operator),
            "rider" | "passenger" => Ok(Role::Rider),
            _ => Err(ModelError::InvalidRole(raw.to_string())),
        }
    }
}

/// Authenticated caller of a coordinator operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn operator(id: OperatorId) -> Self {
        Self {
            id: id.to_uuid(),
            role: Role::Operator,
        }
    }

    pub fn rider(id: RiderId) -> Self {
        Self {
            id: id.to_uuid(),
            role: Role::Rider,
        }
    }

    /// Operator identity when this actor holds the operator role.
    pub fn as_operator(&self) -> Option<OperatorId> {
        (self.role == Role::Operator).then_some(OperatorId(self.id))
    }

    /// Rider identity when this actor holds the rider role.
    pub fn as_rider(&self) -> Option<RiderId> {
        (self.role == Role::Rider).then_some(RiderId(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_accepts_aliases() {
        assert_eq!("Driver".parse::<Role>().unwrap(), Role::Operator);
        assert_eq!(" rider ".parse::<Role>().unwrap(), Role::Rider);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn capabilities_follow_role() {
        let operator = Actor::operator(OperatorId::new());
        assert!(operator.as_operator().is_some());
        assert!(operator.as_rider().is_none());

        let rider = Actor::rider(RiderId::new());
        assert_eq!(rider.as_rider().map(|id| id.to_uuid()), Some(rider.id));
        assert!(rider.as_operator().is_none());
    }
}
