use super::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a room in the hotel directory.
    RoomId(u32)
);
id_type!(HotelId(u32));
id_type!(
    /// Identifier of a registered user.
    UserId(u32)
);

/// A bookable room, as published by the hotel directory.
///
/// `is_available` is a coarse manual switch (maintenance, closures). It can only
/// take a room off the market; the date calendar decides everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub hotel: HotelId,
    pub price_per_night: Money,
    pub capacity: u32,
    pub is_available: bool,
}

impl Room {
    pub fn new(id: RoomId, hotel: HotelId, price_per_night: Money, capacity: u32) -> Self {
        Self {
            id,
            hotel,
            price_per_night,
            capacity,
            is_available: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
}

/// Who is asking for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Guest(UserId),
    Admin(UserId),
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin(_))
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Self::Guest(id) | Self::Admin(id) => *id,
        }
    }

    /// Admins see everything; guests only what they own.
    pub fn can_access(&self, owner: UserId) -> bool {
        self.is_admin() || self.user_id() == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_access() {
        let owner = UserId(7);
        assert!(Actor::Guest(owner).can_access(owner));
        assert!(!Actor::Guest(UserId(8)).can_access(owner));
        assert!(Actor::Admin(UserId(1)).can_access(owner));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(RoomId(12).to_string(), "12");
        assert_eq!(UserId(3).to_string(), "3");
    }
}
