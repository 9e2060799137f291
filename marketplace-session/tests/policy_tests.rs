//! RoutePolicy integration tests — marketplace route table

use marketplace_session::policy::{Decision, PolicyConfig, Redirect, RouteRule, Visibility};
use marketplace_session::session::{Role, Session, SessionSnapshot, SessionStatus};
use marketplace_session::{RoutePolicy, SessionError};

fn anonymous() -> SessionSnapshot {
    SessionSnapshot::unauthenticated()
}

fn signed_in(role: Role) -> SessionSnapshot {
    SessionSnapshot::authenticated(&Session::new("u1", role, "tok"))
}

const PATHS: &[&str] = &[
    "/",
    "/login",
    "/register",
    "/dashboard",
    "/client/dashboard",
    "/client/projects/42",
    "/freelancer/dashboard",
    "/freelancer/proposals",
    "/admin/dashboard",
    "/admin/users",
    "/this-does-not-exist",
];

#[test]
fn test_unauthenticated_sent_to_login() {
    let policy = RoutePolicy::marketplace();
    let decision = policy.decide(&anonymous(), "/client/projects");

    assert_eq!(decision.redirect_path(), Some("/login"));
    let Decision::RedirectTo(redirect) = decision else {
        panic!("expected redirect");
    };
    assert_eq!(redirect.return_to.as_deref(), Some("/client/projects"));
    assert_eq!(policy.location(&redirect), "/login?next=%2Fclient%2Fprojects");
}

#[test]
fn test_wrong_role_sent_to_own_landing() {
    let policy = RoutePolicy::marketplace();
    let decision = policy.decide(&signed_in(Role::Freelancer), "/client/dashboard");
    assert_eq!(decision, Decision::RedirectTo(Redirect::to("/freelancer/dashboard")));
}

#[test]
fn test_authenticated_bounced_off_login() {
    let policy = RoutePolicy::marketplace();
    assert_eq!(
        policy.decide(&signed_in(Role::Client), "/login").redirect_path(),
        Some("/client/dashboard")
    );
    assert_eq!(
        policy.decide(&signed_in(Role::Admin), "/register").redirect_path(),
        Some("/admin/dashboard")
    );
    assert!(policy.decide(&anonymous(), "/login").is_allow());
}

#[test]
fn test_unknown_path_falls_back_for_every_state() {
    let policy = RoutePolicy::marketplace();
    let mut snapshots = vec![anonymous()];
    snapshots.extend(Role::ALL.iter().map(|r| signed_in(*r)));

    for snapshot in &snapshots {
        assert_eq!(
            policy.decide(snapshot, "/this-does-not-exist"),
            Decision::RedirectTo(Redirect::to("/")),
            "status {}",
            snapshot.status
        );
    }
}

#[test]
fn test_landing_page_is_public() {
    let policy = RoutePolicy::marketplace();
    assert!(policy.decide(&anonymous(), "/").is_allow());
    assert!(policy.decide(&signed_in(Role::Client), "/").is_allow());
}

#[test]
fn test_dashboard_resolves_to_role_landing() {
    let policy = RoutePolicy::marketplace();
    for role in Role::ALL {
        assert_eq!(
            policy.decide(&signed_in(role), "/dashboard").redirect_path(),
            Some(policy.landing(role))
        );
    }
    assert_eq!(policy.decide(&anonymous(), "/dashboard").redirect_path(), Some("/login"));
}

#[test]
fn test_own_area_allowed() {
    let policy = RoutePolicy::marketplace();
    assert!(policy.decide(&signed_in(Role::Client), "/client/projects/42").is_allow());
    assert!(policy.decide(&signed_in(Role::Freelancer), "/freelancer/proposals").is_allow());
    assert!(policy.decide(&signed_in(Role::Admin), "/admin/users").is_allow());
    assert!(policy.decide(&signed_in(Role::Admin), "/admin").is_allow());
}

#[test]
fn test_decide_is_repeatable() {
    let policy = RoutePolicy::marketplace();
    let mut snapshots = vec![anonymous()];
    snapshots.extend(Role::ALL.iter().map(|r| signed_in(*r)));

    for snapshot in &snapshots {
        for path in PATHS {
            assert_eq!(policy.decide(snapshot, path), policy.decide(snapshot, path));
        }
    }
}

#[test]
fn test_restricted_rules_exclude_other_roles() {
    let policy = RoutePolicy::marketplace();
    for rule in policy.rules() {
        let Visibility::RoleRestricted { roles } = &rule.visibility else {
            continue;
        };
        let sample = rule.pattern.replace('*', "anything");
        for role in Role::ALL.iter().filter(|r| !roles.contains(*r)) {
            let decision = policy.decide(&signed_in(*role), &sample);
            assert!(!decision.is_allow(), "{role} allowed on {sample}");
            assert_eq!(decision.redirect_path(), Some(policy.landing(*role)));
        }
    }
}

#[test]
fn test_restoring_snapshot_is_not_authenticated() {
    // The guard never asks during restore, but the policy must still fail closed
    let policy = RoutePolicy::marketplace();
    let snapshot = SessionSnapshot {
        role: Some(Role::Admin),
        ..SessionSnapshot::restoring()
    };
    assert_eq!(snapshot.status, SessionStatus::Restoring);
    assert_eq!(policy.decide(&snapshot, "/admin/users").redirect_path(), Some("/login"));
}

#[test]
fn test_paths_are_normalized() {
    let policy = RoutePolicy::marketplace();
    let client = signed_in(Role::Client);
    assert!(policy.decide(&client, "/client//projects/").is_allow());
    assert!(policy.decide(&client, "/client/projects?tab=open#top").is_allow());
    assert_eq!(policy.decide(&client, "/login/").redirect_path(), Some("/client/dashboard"));
}

#[test]
fn test_return_target_keeps_query() {
    let policy = RoutePolicy::marketplace();
    let Decision::RedirectTo(redirect) = policy.decide(&anonymous(), "/admin/users?page=2") else {
        panic!("expected redirect");
    };
    assert_eq!(redirect.return_to.as_deref(), Some("/admin/users?page=2"));
    assert_eq!(policy.location(&redirect), "/login?next=%2Fadmin%2Fusers%3Fpage%3D2");
}

#[test]
fn test_custom_table_with_wildcard_fallback() {
    let mut landings = std::collections::BTreeMap::new();
    for role in Role::ALL {
        landings.insert(role, "/app".to_string());
    }
    let config = PolicyConfig {
        rules: vec![
            RouteRule::public("/signin"),
            RouteRule::authenticated("/app/*"),
            RouteRule::public("*"),
        ],
        public_entry: "/signin".into(),
        fallback: "/signin".into(),
        default_landings: landings,
        return_param: "returnTo".into(),
    };
    let policy = RoutePolicy::new(config).unwrap();

    // "*" matches everything, so nothing falls back
    assert!(policy.decide(&anonymous(), "/pricing").is_allow());
    let Decision::RedirectTo(redirect) = policy.decide(&anonymous(), "/app/settings") else {
        panic!("expected redirect");
    };
    assert_eq!(policy.location(&redirect), "/signin?returnTo=%2Fapp%2Fsettings");
}

#[test]
fn test_invalid_tables_rejected() {
    let base = || PolicyConfig {
        rules: RoutePolicy::marketplace().rules().to_vec(),
        public_entry: "/login".into(),
        fallback: "/".into(),
        default_landings: Role::ALL
            .iter()
            .map(|r| (*r, RoutePolicy::marketplace().landing(*r).to_string()))
            .collect(),
        return_param: "next".into(),
    };
    assert!(RoutePolicy::new(base()).is_ok());

    let mut empty = base();
    empty.rules.clear();
    assert!(matches!(RoutePolicy::new(empty), Err(SessionError::Config(_))));

    let mut no_roles = base();
    no_roles.rules.push(RouteRule::restricted("/ops/*", Vec::<Role>::new()));
    assert!(matches!(RoutePolicy::new(no_roles), Err(SessionError::Config(_))));

    let mut bad_redirect = base();
    bad_redirect.rules[1] = RouteRule::public("/login").with_public_only_redirect(Role::Client, "/admin/dashboard");
    assert!(matches!(RoutePolicy::new(bad_redirect), Err(SessionError::Config(_))));

    let mut no_param = base();
    no_param.return_param.clear();
    assert!(RoutePolicy::new(no_param).is_err());
}

#[test]
fn test_dot_segments_cannot_cross_areas() {
    let policy = RoutePolicy::marketplace();
    let restricted: Vec<_> = policy
        .rules()
        .iter()
        .filter_map(|rule| match &rule.visibility {
            Visibility::RoleRestricted { roles } => {
                Some((rule.pattern.trim_end_matches("/*").to_string(), roles.clone()))
            }
            _ => None,
        })
        .collect();

    for role in Role::ALL {
        let home = policy.landing(role).to_string();
        for (base, _) in restricted.iter().filter(|(_, roles)| !roles.contains(&role)) {
            for path in [
                format!("{home}/../..{base}/users"),
                format!("{home}/../../.{base}/users"),
                format!("{home}/%2e%2e/%2E%2E{base}/users"),
                format!("/{}/..{base}/users", role.as_str()),
            ] {
                let decision = policy.decide(&signed_in(role), &path);
                assert!(!decision.is_allow(), "{role} allowed on {path}");
                assert_eq!(decision.redirect_path(), Some(policy.landing(role)), "{path}");
            }
        }
    }
}

#[test]
fn test_return_target_is_normalized() {
    let policy = RoutePolicy::marketplace();
    let Decision::RedirectTo(redirect) = policy.decide(&anonymous(), "//client/x?tab=1#top") else {
        panic!("expected redirect");
    };
    assert_eq!(redirect.return_to.as_deref(), Some("/client/x?tab=1"));

    let Decision::RedirectTo(redirect) = policy.decide(&anonymous(), "/client/../admin/users") else {
        panic!("expected redirect");
    };
    assert_eq!(redirect.return_to.as_deref(), Some("/admin/users"));
}
