//! Macro for implementing Display and FromStr for status enums
//!
//! Cloud status fields arrive in whatever casing the service picked, and a
//! few services spell the same state differently (`Succeeded` vs
//! `Completed`, `Canceled` vs `Cancelled`). The macro maps one canonical
//! wire name plus optional aliases onto each variant.
//!
//! # Example
//!
//! ```rust
//! use fabricflow_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum DeployState {
//!     Pending,
//!     Done,
//! }
//!
//! impl_domain_status_conversions!(DeployState {
//!     Pending => "Pending",
//!     Done => "Done" | "Finished",
//! });
//!
//! assert_eq!("finished".parse::<DeployState>().unwrap(), DeployState::Done);
//! assert_eq!(DeployState::Pending.to_string(), "Pending");
//! ```

/// Implements Display and FromStr traits for status enums
///
/// This macro generates:
/// - Display trait: writes the canonical wire name of the variant
/// - FromStr trait: parses the canonical name or any alias, ignoring ASCII
///   case
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($str) $(|| s.eq_ignore_ascii_case($alias))* {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestStatus {
        Running,
        Succeeded,
        Cancelled,
    }

    impl_domain_status_conversions!(TestStatus {
        Running => "Running",
        Succeeded => "Succeeded" | "Completed",
        Cancelled => "Cancelled" | "Canceled",
    });

    #[test]
    fn test_display_uses_canonical_name() {
        assert_eq!(TestStatus::Running.to_string(), "Running");
        assert_eq!(TestStatus::Succeeded.to_string(), "Succeeded");
    }

    #[test]
    fn test_fromstr_ignores_case() {
        assert_eq!(TestStatus::from_str("RUNNING").unwrap(), TestStatus::Running);
        assert_eq!(TestStatus::from_str("running").unwrap(), TestStatus::Running);
        assert_eq!(TestStatus::from_str(" Running ").unwrap(), TestStatus::Running);
    }

    #[test]
    fn test_fromstr_accepts_aliases() {
        assert_eq!(TestStatus::from_str("completed").unwrap(), TestStatus::Succeeded);
        assert_eq!(TestStatus::from_str("Canceled").unwrap(), TestStatus::Cancelled);
    }

    #[test]
    fn test_fromstr_rejects_unknown() {
        let err = TestStatus::from_str("Deduped").unwrap_err();
        assert_eq!(err, "Invalid TestStatus: Deduped");
    }
}
