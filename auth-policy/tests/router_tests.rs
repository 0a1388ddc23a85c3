//! Scenario tests for destination resolution and cross-dashboard prevention

use auth_identity::{
    InMemoryIdentityStore, OrganizationType, Principal, PrincipalStatus, PrincipalType,
};
use auth_policy::{CrossAccessOutcome, DashboardRouter, Destination};
use uuid::Uuid;

fn manufacturer_admin() -> Principal {
    Principal {
        id: Uuid::new_v4(),
        principal_type: PrincipalType::OrgUser,
        role: "company_admin".to_string(),
        organization_type: Some(OrganizationType::Manufacturer),
        permissions: vec![],
        status: PrincipalStatus::Active,
    }
}

fn super_admin() -> Principal {
    Principal {
        id: Uuid::new_v4(),
        principal_type: PrincipalType::Admin,
        role: "super_admin".to_string(),
        organization_type: None,
        permissions: vec![],
        status: PrincipalStatus::Active,
    }
}

#[tokio::test]
async fn admin_family_roles_land_in_admin_area() {
    let router = DashboardRouter::new();
    let store = InMemoryIdentityStore::new();

    let destination = router
        .resolve_destination(&super_admin(), &store)
        .await
        .unwrap();
    assert_eq!(destination.path, "/admin/dashboard");
}

#[tokio::test]
async fn org_users_are_routed_by_organization_type() {
    let router = DashboardRouter::new();
    let store = InMemoryIdentityStore::new();

    let destination = router
        .resolve_destination(&manufacturer_admin(), &store)
        .await
        .unwrap();
    assert_eq!(destination.prefix, "manufacturer");
    assert_eq!(destination.path, "/manufacturer/dashboard");
}

#[tokio::test]
async fn missing_organization_type_is_refetched_from_the_store() {
    let router = DashboardRouter::new();
    let store = InMemoryIdentityStore::new();

    // Stored principal carries the organization type the stale claims lack.
    let mut stored = manufacturer_admin();
    stored.organization_type = Some(OrganizationType::Distributor);
    store.seed(stored.clone(), "d@b.com", "validpass").await.unwrap();

    let mut claims_principal = stored.clone();
    claims_principal.organization_type = None;

    let destination = router
        .resolve_destination(&claims_principal, &store)
        .await
        .unwrap();
    assert_eq!(destination.prefix, "distributor");
}

#[tokio::test]
async fn unroutable_principal_falls_back_to_routing_error() {
    let router = DashboardRouter::new();
    let store = InMemoryIdentityStore::new();

    // Unknown to the store and no organization type in claims.
    let mut p = manufacturer_admin();
    p.organization_type = None;

    let destination = router.resolve_destination(&p, &store).await.unwrap();
    assert_eq!(destination, Destination::routing_error());
}

#[tokio::test]
async fn cross_dashboard_access_redirects_home() {
    let router = DashboardRouter::new();
    let store = InMemoryIdentityStore::new();

    let outcome = router
        .guard_cross_access(&manufacturer_admin(), "distributor", &store)
        .await
        .unwrap();

    match outcome {
        CrossAccessOutcome::Redirect { destination, .. } => {
            assert_eq!(destination.path, "/manufacturer/dashboard");
        }
        CrossAccessOutcome::Granted => panic!("cross-dashboard access must not be granted"),
    }
}

#[tokio::test]
async fn own_dashboard_access_is_granted() {
    let router = DashboardRouter::new();
    let store = InMemoryIdentityStore::new();

    let outcome = router
        .guard_cross_access(&manufacturer_admin(), "manufacturer", &store)
        .await
        .unwrap();
    assert_eq!(outcome, CrossAccessOutcome::Granted);
}

#[tokio::test]
async fn override_role_may_enter_any_area() {
    let router = DashboardRouter::new();
    let store = InMemoryIdentityStore::new();

    for prefix in ["admin", "manufacturer", "distributor"] {
        let outcome = router
            .guard_cross_access(&super_admin(), prefix, &store)
            .await
            .unwrap();
        assert_eq!(outcome, CrossAccessOutcome::Granted, "prefix {prefix}");
    }
}
