//! Distinct integer-identifier domains: `NodeId`, `EdgeId`, `CustId`, `VehlId`, `TripId`.
//!
//! Plain `u32`s are convertible to each other with zero compiler complaint, which is
//! exactly how an index meant for vehicles ends up indexing customers. Newtypes close
//! that hole at the cost of a few `From`/`Display` impls.

use std::fmt;

macro_rules! id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub fn get(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                Self(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(NodeId, "Identifies a vertex in the road network.");
id_type!(EdgeId, "Identifies an edge in the road network.");
id_type!(CustId, "Identifies a customer trip.");
id_type!(VehlId, "Identifies a vehicle trip.");
id_type!(TripId, "Identifies either a customer or a vehicle trip (their union).");

impl From<CustId> for TripId {
    fn from(v: CustId) -> Self {
        TripId(v.0)
    }
}

impl From<VehlId> for TripId {
    fn from(v: VehlId) -> Self {
        TripId(v.0)
    }
}

/// Distance/cost unit used throughout the engine: integer meters.
///
/// A distinct alias (not a bare `i64`) so a route cost can't be silently added to a
/// tick count; see the original `DistInt`/`SimTime` split this is grounded on.
pub type Meters = i64;

/// Simulation time, in ticks. One tick is the engine's discrete time unit (see `clock.rs`).
pub type Tick = u64;

/// Negative `load` ⇒ vehicle with capacity `|load|`; positive ⇒ customer demand.
pub type Load = i32;
