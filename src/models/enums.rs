use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(UserRole {
    Donor => "donor",
    Patient => "patient",
    Hospital => "hospital",
    Admin => "admin",
});

str_enum!(BloodGroup {
    APositive => "A+",
    ANegative => "A-",
    BPositive => "B+",
    BNegative => "B-",
    AbPositive => "AB+",
    AbNegative => "AB-",
    OPositive => "O+",
    ONegative => "O-",
});

str_enum!(Urgency {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

impl Urgency {
    /// Domain severity rank: critical > high > medium > low.
    ///
    /// Active-request ordering must use this rank. The four words happen to
    /// sort the same way alphabetically, but that is a coincidence of
    /// vocabulary, not a contract.
    pub fn severity(self) -> u8 {
        match self {
            Self::Critical => 3,
            Self::High => 2,
            Self::Medium => 1,
            Self::Low => 0,
        }
    }
}

str_enum!(RequestStatus {
    Active => "active",
    Fulfilled => "fulfilled",
    Cancelled => "cancelled",
});

impl RequestStatus {
    /// Fulfilled and cancelled are terminal; no resurrection.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

str_enum!(ResponseChoice {
    Accepted => "accepted",
    Rejected => "rejected",
});

str_enum!(VerificationStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

str_enum!(NotificationKind {
    Request => "request",
    Response => "response",
    Donation => "donation",
    Verification => "verification",
    System => "system",
});
