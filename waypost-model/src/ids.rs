use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::ModelError;

/// Declares a strongly typed UUID identifier.
///
/// All identifiers share the same surface: time-ordered construction,
/// `Display`/`FromStr` through the canonical hyphenated form, and cheap
/// access to the wrapped [`Uuid`].
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn to_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                if raw.trim().is_empty() {
                    return Err(ModelError::InvalidId {
                        kind: $label,
                        value: raw.to_string(),
                    });
                }
                Uuid::parse_str(raw.trim())
                    .map(Self)
                    .map_err(|_| ModelError::InvalidId {
                        kind: $label,
                        value: raw.to_string(),
                    })
            }
        }
    };
}

uuid_id!(
    /// Identity of a carrier (the vehicle/route entity running trips)
    CarrierId,
    "carrier"
);
uuid_id!(
    /// Identity of one journey instance
    TripId,
    "trip"
);
uuid_id!(
    /// Identity of a fixed waypoint on a carrier's route
    StopId,
    "stop"
);
uuid_id!(
    /// Identity of a party assigned to board at a stop
    RiderId,
    "rider"
);
uuid_id!(
    /// Identity of the person driving a trip
    OperatorId,
    "operator"
);
