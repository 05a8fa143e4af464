//! Property-based test generators using proptest.

use proptest::prelude::*;

/// Strategy for identity values the server may legitimately send.
pub fn valid_identity_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9]{1,24}")
        .expect("Invalid regex")
        .prop_filter("must not be the unknown sentinel", |s| {
            !s.eq_ignore_ascii_case("unknown")
        })
}

/// Strategy for identity values with at least one character outside `[A-Za-z0-9]`.
pub fn invalid_identity_strategy() -> impl Strategy<Value = String> {
    (
        prop::string::string_regex("[A-Za-z0-9]{0,8}").expect("Invalid regex"),
        prop::sample::select(vec![' ', ';', '&', '$', '-', '_', '/', '.', '=', '|', '\'']),
        prop::string::string_regex("[A-Za-z0-9]{0,8}").expect("Invalid regex"),
    )
        .prop_map(|(head, bad, tail)| format!("{head}{bad}{tail}"))
}

/// Strategy for parameter names in the feature-control namespace.
pub fn managed_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][A-Za-z]{1,12}\\.[A-Z][A-Za-z]{1,12}")
        .expect("Invalid regex")
        .prop_map(|tail| format!("Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.{tail}"))
}

/// Strategy for parameter names outside every special namespace.
pub fn plain_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][A-Za-z]{1,12}(\\.[A-Z][A-Za-z]{1,12}){0,2}")
        .expect("Invalid regex")
}

/// Strategy for override values.
pub fn override_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9:/._-]{1,32}").expect("Invalid regex")
}

/// Strategy for a map of distinct plain keys to values.
pub fn plain_overrides_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map(plain_key_strategy(), override_value_strategy(), 1..8)
        .prop_map(|m| m.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfc_sync_protocol::{is_valid_identity, keys};

    proptest! {
        #[test]
        fn valid_identities_pass(id in valid_identity_strategy()) {
            prop_assert!(is_valid_identity(&id));
        }

        #[test]
        fn invalid_identities_fail(id in invalid_identity_strategy()) {
            prop_assert!(!is_valid_identity(&id));
        }

        #[test]
        fn managed_keys_are_managed(key in managed_key_strategy()) {
            prop_assert!(keys::is_managed(&key));
        }

        #[test]
        fn plain_keys_are_not_managed(key in plain_key_strategy()) {
            prop_assert!(!keys::is_managed(&key));
        }
    }
}
