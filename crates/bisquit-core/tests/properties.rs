//! Property-Based Tests for Envelope and Token Invariants
//!
//! 1. Provenance is append-only
//! 2. Attenuation narrows, never widens
//! 3. Empty tenant scope admits every tenant
//! 4. Access checks fail closed without a token reference
//! 5. Expiry is monotonic in time
//! 6. Merge preserves chronology
//!
//! Uses proptest for property-based testing with arbitrary inputs.

use bisquit_core::{
    access, AttenuationRequest, Envelope, FixedClock, MintRequest, Token, TokenBuilder, MERGE_LABEL,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn builder() -> TokenBuilder {
    TokenBuilder::new().with_clock(FixedClock(t0()))
}

/// Root token in the unrestricted `system` namespace
fn system_token(perms: &BTreeSet<String>, tenants: &BTreeSet<String>, ttl_secs: Option<i64>) -> Token {
    let mut request = MintRequest::new("system")
        .permissions(perms.iter().cloned())
        .tenants(tenants.iter().cloned());
    if let Some(secs) = ttl_secs {
        request = request.ttl(Duration::seconds(secs));
    }
    builder().mint_root(request).expect("system mint should succeed")
}

fn label() -> impl Strategy<Value = String> {
    "[a-z]{1,8}:[a-z]{1,8}"
}

fn labels(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(label(), 1..max)
}

fn permissions(max: usize) -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-d]{1,2}:[a-d]{1,2}", 1..max)
}

// =============================================================================
// INVARIANT 1: PROVENANCE IS APPEND-ONLY
// =============================================================================

proptest! {
    #[test]
    fn prop_trace_appends_exactly_one(seed in labels(6), extra in label()) {
        let envelope = Envelope::new(json!(null), seed.clone()).unwrap();
        let traced = envelope.clone().trace(extra.clone()).unwrap();

        let mut expected = seed;
        expected.push(extra);
        prop_assert_eq!(traced.provenance(), expected.as_slice());
        prop_assert_eq!(traced.id(), envelope.id());
    }

    #[test]
    fn prop_trace_chain_keeps_order(seed in label(), steps in labels(12)) {
        let mut envelope = Envelope::new(json!({}), [seed.clone()]).unwrap();
        for step in &steps {
            envelope = envelope.trace(step.clone()).unwrap();
        }

        prop_assert_eq!(&envelope.provenance()[0], &seed);
        prop_assert_eq!(&envelope.provenance()[1..], steps.as_slice());
    }
}

// =============================================================================
// INVARIANT 2: ATTENUATION NARROWS, NEVER WIDENS
// =============================================================================

proptest! {
    #[test]
    fn prop_attenuation_is_subset(
        parent_perms in permissions(8),
        requested in permissions(8),
    ) {
        let parent = system_token(&parent_perms, &BTreeSet::new(), Some(3600));
        let result = builder().attenuate(&parent, AttenuationRequest::new(requested.iter().cloned()));

        match result {
            Ok(child) => {
                prop_assert!(child.permissions().is_subset(parent.permissions()));
                prop_assert!(child.permissions().is_subset(&requested));
                for perm in requested.difference(&parent_perms) {
                    prop_assert!(!child.has_permission(perm));
                }
                prop_assert!(child.expires_at() <= parent.expires_at());
            }
            Err(err) => {
                // Only a disjoint request may fail.
                prop_assert!(err.is_authorization());
                prop_assert!(requested.is_disjoint(&parent_perms));
            }
        }
    }

    #[test]
    fn prop_attenuation_chain_never_grows(
        parent_perms in permissions(8),
        rounds in prop::collection::vec(permissions(8), 1..6),
    ) {
        let builder = builder();
        let mut current = system_token(&parent_perms, &BTreeSet::new(), None);

        for requested in rounds {
            match builder.attenuate(&current, AttenuationRequest::new(requested)) {
                Ok(child) => {
                    prop_assert!(child.permissions().is_subset(current.permissions()));
                    prop_assert!(child.permissions().is_subset(&parent_perms));
                    prop_assert_eq!(child.depth(), current.depth() + 1);
                    current = child;
                }
                Err(_) => break,
            }
        }
    }

    #[test]
    fn prop_attenuation_ttl_never_extends(parent_ttl in 1i64..10_000, child_ttl in 1i64..20_000) {
        let perms: BTreeSet<String> = ["a:b".to_string()].into();
        let parent = system_token(&perms, &BTreeSet::new(), Some(parent_ttl));
        let child = builder()
            .attenuate(&parent, AttenuationRequest::new(["a:b"]).ttl(Duration::seconds(child_ttl)))
            .unwrap();

        prop_assert!(child.expires_at() <= parent.expires_at());
        prop_assert_eq!(
            child.expires_at(),
            Some(t0() + Duration::seconds(parent_ttl.min(child_ttl)))
        );
    }
}

// =============================================================================
// INVARIANT 3: ADMINISTRATIVE TENANT SCOPE
// =============================================================================

proptest! {
    #[test]
    fn prop_empty_tenants_admit_everyone(tenant in "\\PC{0,16}") {
        let perms: BTreeSet<String> = ["a:b".to_string()].into();
        let token = system_token(&perms, &BTreeSet::new(), None);
        prop_assert!(token.can_access_tenant(&tenant));
    }

    #[test]
    fn prop_scoped_tenants_admit_exact_members(
        tenants in prop::collection::btree_set("[a-e]{1,2}", 1..6),
        probe in "[a-e]{1,2}",
    ) {
        let perms: BTreeSet<String> = ["a:b".to_string()].into();
        let token = system_token(&perms, &tenants, None);
        prop_assert_eq!(token.can_access_tenant(&probe), tenants.contains(&probe));
    }
}

// =============================================================================
// INVARIANT 4: FAIL-CLOSED ACCESS CHECK
// =============================================================================

proptest! {
    #[test]
    fn prop_unsigned_envelope_denies(perms in permissions(6), probe in "[a-d]{1,2}:[a-d]{1,2}") {
        let token = system_token(&perms, &BTreeSet::new(), None);
        let envelope = Envelope::new(json!({}), ["connector:test"]).unwrap();

        prop_assert!(!access::check_access(&envelope, &token, &probe));
        for perm in &perms {
            prop_assert!(!access::check_access(&envelope, &token, perm));
        }
    }
}

// =============================================================================
// INVARIANT 5: EXPIRATION MONOTONICITY
// =============================================================================

proptest! {
    #[test]
    fn prop_expiry_is_monotonic(ttl in 1i64..100_000, t1 in 0i64..200_000, delta in 0i64..200_000) {
        let perms: BTreeSet<String> = ["a:b".to_string()].into();
        let token = system_token(&perms, &BTreeSet::new(), Some(ttl));

        let now1 = t0() + Duration::seconds(t1);
        let now2 = now1 + Duration::seconds(delta);
        if token.is_expired(now1) {
            prop_assert!(token.is_expired(now2));
        }
    }
}

// =============================================================================
// INVARIANT 6: MERGE PRESERVES CHRONOLOGY
// =============================================================================

proptest! {
    #[test]
    fn prop_merge_concatenates_trails(a in labels(6), b in labels(6)) {
        let primary = Envelope::new(json!({ "a": 1 }), a.clone()).unwrap();
        let secondary = Envelope::new(json!({ "b": 2 }), b.clone()).unwrap();

        let merged = Envelope::merge(primary, secondary);

        let mut expected = a;
        expected.extend(b);
        expected.push(MERGE_LABEL.to_string());
        prop_assert_eq!(merged.provenance(), expected.as_slice());
        prop_assert_eq!(merged.content(), &json!({ "a": 1, "b": 2 }));
    }
}
