//! End-to-end scenarios: a document travelling from a connector through
//! transformation stages while its token is narrowed hop by hop.

use bisquit_core::{
    access, AttenuationRequest, BisquitError, BuilderConfig, Envelope, ErrorClass, FixedClock,
    MemoryRevocationList, MintRequest, NamespaceProfile, Pipeline, ProfileSource, Stage,
    StageUpdate, StaticProfiles, TokenBuilder,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::collections::BTreeSet;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Builder whose `pro` tier only allows `brain:read`
fn read_only_pro() -> TokenBuilder {
    let profiles = StaticProfiles::new()
        .with("pro", NamespaceProfile::new(["brain:read"]))
        .with("admin", NamespaceProfile::new(["brain:*"]));
    TokenBuilder::with_profiles(profiles, BuilderConfig::default()).with_clock(FixedClock(t0()))
}

// =============================================================================
// Envelope construction and tracing
// =============================================================================

#[test]
fn construct_from_connector() {
    let envelope = Envelope::new(json!({ "text": "hello" }), ["connector:web"]).unwrap();
    assert_eq!(envelope.provenance(), ["connector:web"]);
    assert_eq!(envelope.content(), &json!({ "text": "hello" }));
}

#[test]
fn trace_through_transformer() {
    let envelope = Envelope::new(json!({ "text": "hello" }), ["connector:web"])
        .unwrap()
        .trace("transformer:ner")
        .unwrap();
    assert_eq!(envelope.provenance(), ["connector:web", "transformer:ner"]);
}

// =============================================================================
// Minting against a namespace profile
// =============================================================================

#[test]
fn mint_over_request_is_rejected_by_default() {
    let builder = read_only_pro();
    let result = builder.mint_root(
        MintRequest::new("pro")
            .permissions(["brain:read", "brain:write"])
            .ttl(Duration::hours(1)),
    );

    let err = result.expect_err("over-request must be rejected");
    assert!(matches!(err, BisquitError::ProfileExceeded { .. }));
    assert_eq!(err.class(), ErrorClass::PermissionDenied);
}

// =============================================================================
// Attenuation
// =============================================================================

#[test]
fn attenuate_keeps_unrestricted_tenants() {
    let builder = read_only_pro();
    let parent = builder
        .mint_root(MintRequest::new("admin").permissions(["brain:read", "brain:write"]))
        .unwrap();
    assert!(parent.allowed_tenants().is_empty());

    let child = builder
        .attenuate(&parent, AttenuationRequest::new(["brain:read"]))
        .unwrap();

    assert_eq!(child.permissions(), &set(&["brain:read"]));
    assert!(child.allowed_tenants().is_empty());
    assert!(child.can_access_tenant("anyone"));
}

#[test]
fn tenant_scope_membership() {
    let builder = read_only_pro();
    let scoped = builder
        .mint_root(MintRequest::new("pro").permissions(["brain:read"]).tenants(["a", "b"]))
        .unwrap();
    let admin = builder
        .mint_root(MintRequest::new("pro").permissions(["brain:read"]))
        .unwrap();

    assert!(!scoped.can_access_tenant("c"));
    assert!(admin.can_access_tenant("c"));
}

// =============================================================================
// Access checks
// =============================================================================

#[test]
fn check_access_requires_the_referenced_token() {
    let builder = read_only_pro();
    let request = || MintRequest::new("pro").permissions(["brain:read"]);
    let t1 = builder.mint_root(request()).unwrap();
    let t2 = builder.mint_root(request()).unwrap();
    assert_eq!(t1.permissions(), t2.permissions());

    let envelope = Envelope::new(json!({}), ["connector:web"]).unwrap().sign_with(&t1);

    assert!(access::check_access_at(&envelope, &t1, "brain:read", t0()));
    assert!(!access::check_access_at(&envelope, &t2, "brain:read", t0()));
}

#[test]
fn verify_is_loud_where_check_is_quiet() {
    let builder = read_only_pro();
    let token = builder
        .mint_root(MintRequest::new("pro").permissions(["brain:read"]).ttl(Duration::minutes(10)))
        .unwrap();

    assert!(builder.verify(&token, "brain:read").is_ok());

    let err = builder.verify(&token, "brain:write").unwrap_err();
    assert!(err.is_authorization());

    let later = t0() + Duration::minutes(10);
    let err = bisquit_core::access::verify(&token, "brain:read", later).unwrap_err();
    assert!(matches!(err, BisquitError::Expired { .. }));
}

// =============================================================================
// Full journey
// =============================================================================

struct Ner;

impl Stage for Ner {
    fn label(&self) -> &str {
        "transformer:ner"
    }

    fn apply(&self, envelope: &Envelope) -> bisquit_core::Result<StageUpdate> {
        let text = envelope.content()["text"].as_str().unwrap_or_default();
        let entities: Vec<&str> = text
            .split_whitespace()
            .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
            .collect();
        Ok(StageUpdate::none().with_metadata("entities", json!(entities)))
    }
}

#[test]
fn document_journey() {
    let builder = TokenBuilder::new().with_clock(FixedClock(t0()));
    let revocations = MemoryRevocationList::new();

    let gateway = builder
        .mint_root(
            MintRequest::new("pro")
                .permissions(["brain:read", "brain:write", "memory:write"])
                .tenants(["acme"])
                .user_id("alice")
                .revocation_id("session-1")
                .ttl(Duration::hours(1)),
        )
        .unwrap();

    let ingest = builder
        .attenuate(
            &gateway,
            AttenuationRequest::new(["memory:write"])
                .agent_id("ingest-worker")
                .ttl(Duration::minutes(5)),
        )
        .unwrap();

    let envelope = Envelope::new(json!({ "text": "Alice met Bob in Paris" }), ["connector:web"])
        .unwrap()
        .with_metadata("fetched_at", json!(t0().to_rfc3339()));
    let envelope = Pipeline::new()
        .with_stage(Ner)
        .run(envelope)
        .unwrap()
        .sign_with(&ingest);

    assert_eq!(envelope.provenance(), ["connector:web", "transformer:ner"]);
    assert_eq!(envelope.metadata_value("entities"), Some(&json!(["Alice", "Bob", "Paris"])));
    assert!(access::check_tenant_access_at(&envelope, &ingest, "memory:write", "acme", t0()));
    assert!(!access::check_access_at(&envelope, &ingest, "brain:write", t0()));
    assert!(builder.verify_with_revocation(&ingest, "memory:write", &revocations).is_ok());

    revocations.revoke("session-1", "user logged out");
    let err = builder
        .verify_with_revocation(&ingest, "memory:write", &revocations)
        .unwrap_err();
    assert!(matches!(err, BisquitError::Revoked { .. }));
}

// =============================================================================
// Collaborator errors pass through
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[error("policy service unavailable")]
struct PolicyDown;

struct FlakyProfiles;

impl ProfileSource for FlakyProfiles {
    type Error = PolicyDown;

    fn profile(&self, _namespace: &str) -> Result<Option<NamespaceProfile>, PolicyDown> {
        Err(PolicyDown)
    }
}

#[test]
fn profile_lookup_errors_pass_through() {
    let builder = TokenBuilder::with_profiles(FlakyProfiles, BuilderConfig::default());
    let err = builder
        .mint_root(MintRequest::new("pro").permissions(["brain:read"]))
        .unwrap_err();

    match err {
        BisquitError::Collaborator(inner) => assert!(inner.downcast_ref::<PolicyDown>().is_some()),
        other => panic!("expected collaborator error, got {other:?}"),
    }
}
