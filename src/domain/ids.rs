use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Internal identifier of a registered user.
    UserId
);
uuid_id!(
    /// Internal identifier of an account. Distinct from the visible account number.
    AccountId
);
uuid_id!(LoanId);

impl UserId {
    /// The bank itself, used as the counterparty of opening balances.
    pub const SYSTEM: Self = Self(Uuid::nil());
}

uuid_id!(
    /// Identifier of a ledger entry.
    EntryId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_serialize_transparently() {
        let a = UserId::new();
        let b = UserId::new();
        assert_ne!(a, b);

        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"{}\"", a));
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
