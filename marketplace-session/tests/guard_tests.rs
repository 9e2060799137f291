//! RouteGuard integration tests — loading, redirects, re-evaluation

mod common;

use std::time::Duration;

use marketplace_session::medium::MemoryMedium;
use marketplace_session::policy::Redirect;
use marketplace_session::session::{Role, Session};
use marketplace_session::{schema, GuardOutcome, SessionError};

use common::*;

#[tokio::test]
async fn test_loading_while_restoring() {
    init_tracing();
    let medium = MemoryMedium::new();
    medium.write_raw(KEY, Some(&schema::encode(&Session::new("u1", Role::Admin, "tok")).unwrap()));
    let engine = engine_on(&medium);

    for path in ["/", "/login", "/dashboard", "/client/projects", "/admin/users", "/nowhere"] {
        assert_eq!(engine.guard().guard(path), GuardOutcome::Loading, "{path}");
    }
    assert!(engine.guard().resolve("/admin/users").unwrap().is_loading());
}

#[tokio::test]
async fn test_restored_session_renders_protected_route() {
    let medium = MemoryMedium::new();
    medium.write_raw(KEY, Some(&schema::encode(&Session::new("u1", Role::Admin, "tok")).unwrap()));
    let engine = engine_on(&medium);
    engine.restore().await.unwrap();

    assert_eq!(engine.guard().guard("/admin/users/"), GuardOutcome::Render("/admin/users".into()));
}

#[tokio::test]
async fn test_anonymous_redirected_with_return_target() {
    let engine = engine_on(&MemoryMedium::new());
    engine.restore().await.unwrap();

    let outcome = engine.guard().guard("/freelancer/proposals");
    let redirect = outcome.redirect().unwrap();
    assert_eq!(redirect, &Redirect::returning("/login", "/freelancer/proposals"));
    assert_eq!(
        engine.guard().policy().location(redirect),
        "/login?next=%2Ffreelancer%2Fproposals"
    );
}

#[tokio::test]
async fn test_resolve_follows_dashboard_to_landing() {
    let engine = engine_on(&MemoryMedium::new());
    engine.restore().await.unwrap();
    login_as(engine.session(), "u1", "client").await;

    assert_eq!(
        engine.guard().resolve("/dashboard").unwrap(),
        GuardOutcome::Render("/client/dashboard".into())
    );
    assert_eq!(
        engine.guard().resolve("/login").unwrap(),
        GuardOutcome::Render("/client/dashboard".into())
    );
}

#[tokio::test]
async fn test_resolve_anonymous_ends_on_login() {
    let engine = engine_on(&MemoryMedium::new());
    engine.restore().await.unwrap();

    assert_eq!(
        engine.guard().resolve("/admin/users").unwrap(),
        GuardOutcome::Render("/login".into())
    );
    assert_eq!(engine.guard().resolve("/nowhere").unwrap(), GuardOutcome::Render("/".into()));
}

#[tokio::test]
async fn test_resolve_reports_hop_limit() {
    let engine = engine_on(&MemoryMedium::new());
    engine.restore().await.unwrap();
    login_as(engine.session(), "u1", "freelancer").await;

    let guard = engine.guard().clone().with_max_redirect_hops(0);
    let result = guard.resolve("/dashboard");
    assert!(matches!(result, Err(SessionError::RedirectLoop { hops: 0, .. })));
    // Rendering directly needs no hops
    assert!(guard.resolve("/freelancer/dashboard").is_ok());
}

#[tokio::test]
async fn test_mounted_route_follows_session() {
    init_tracing();
    let engine = engine_on(&MemoryMedium::new());
    let mut route = engine.guard().mount("/client/projects");
    assert!(route.outcome().is_loading());

    engine.restore().await.unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(2), route.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.redirect().map(|r| r.path.as_str()), Some("/login"));

    login_as(engine.session(), "u1", "client").await;
    let outcome = tokio::time::timeout(Duration::from_secs(2), route.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, &GuardOutcome::Render("/client/projects".into()));

    engine.session().logout().await.unwrap();
    let outcome = route.changed().await.unwrap();
    assert_eq!(outcome.redirect().map(|r| r.path.as_str()), Some("/login"));
}

#[tokio::test]
async fn test_mounted_route_navigation() {
    let engine = engine_on(&MemoryMedium::new());
    engine.restore().await.unwrap();
    login_as(engine.session(), "u1", "admin").await;

    let mut route = engine.guard().mount("/admin/users");
    assert_eq!(route.outcome(), &GuardOutcome::Render("/admin/users".into()));

    let outcome = route.navigate("/client/projects").clone();
    assert_eq!(outcome, GuardOutcome::Redirect(Redirect::to("/admin/dashboard")));
    assert_eq!(route.path(), "/client/projects");
}

#[tokio::test]
async fn test_mounted_route_sees_other_context_logout() {
    let medium = MemoryMedium::new();
    let engine = engine_on(&medium);
    engine.restore().await.unwrap();
    login_as(engine.session(), "u1", "freelancer").await;
    let mut route = engine.guard().mount("/freelancer/dashboard");

    // Hand-deleted record, no context
    medium.write_raw(KEY, None);

    let outcome = tokio::time::timeout(Duration::from_secs(2), route.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.redirect().map(|r| r.path.as_str()), Some("/login"));
}
