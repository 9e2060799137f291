//! RoutePolicy — pure route authorization
//!
//! `decide` maps a session snapshot and a requested path to `Allow` or a
//! redirect. It does no I/O and holds no mutable state; the rule table is
//! validated once at construction and never changes afterwards.
//!
//! Decision order:
//!
//! ```text
//! decide(snapshot, path)
//!     │
//!     ├── no rule matches            → RedirectTo(fallback)
//!     ├── Public                     → public-only redirect for the role, else Allow
//!     ├── AuthenticatedOnly          → Allow | RedirectTo(landing) | RedirectTo(entry)
//!     └── RoleRestricted(roles)
//!         ├── role ∈ roles           → Allow
//!         ├── other role             → RedirectTo(own landing)
//!         └── unauthenticated        → RedirectTo(entry, return_to = path)
//! ```

pub mod types;

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Result, SessionError};
use crate::session::{Role, SessionSnapshot};

pub use types::{Decision, PolicyConfig, Redirect, RouteRule, Visibility, DEFAULT_RETURN_PARAM};

/// Validated, immutable route table
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    rules: Vec<RouteRule>,
    public_entry: String,
    fallback: String,
    default_landings: BTreeMap<Role, String>,
    return_param: String,
}

impl RoutePolicy {
    /// Build and validate a policy
    pub fn new(config: PolicyConfig) -> Result<Self> {
        let policy = Self {
            rules: config.rules,
            public_entry: normalize_path(&config.public_entry),
            fallback: normalize_path(&config.fallback),
            default_landings: config
                .default_landings
                .into_iter()
                .map(|(role, path)| (role, normalize_path(&path)))
                .collect(),
            return_param: config.return_param,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Parse a JSON `PolicyConfig`
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: PolicyConfig = serde_json::from_str(raw)
            .map_err(|e| SessionError::Config(format!("route table: {e}")))?;
        Self::new(config)
    }

    /// The marketplace's route table
    pub fn marketplace() -> Self {
        let mut landings = BTreeMap::new();
        landings.insert(Role::Client, "/client/dashboard".to_string());
        landings.insert(Role::Freelancer, "/freelancer/dashboard".to_string());
        landings.insert(Role::Admin, "/admin/dashboard".to_string());

        let public_only = |pattern: &str| {
            landings
                .iter()
                .fold(RouteRule::public(pattern), |rule, (role, landing)| {
                    rule.with_public_only_redirect(*role, landing.clone())
                })
        };

        let rules = vec![
            RouteRule::public("/"),
            public_only("/login"),
            public_only("/register"),
            RouteRule::restricted("/client/*", [Role::Client]),
            RouteRule::restricted("/freelancer/*", [Role::Freelancer]),
            RouteRule::restricted("/admin/*", [Role::Admin]),
            RouteRule::authenticated("/dashboard").resolving_to_landing(),
        ];

        // Built from constants; validation is covered by tests
        Self {
            rules,
            public_entry: "/login".to_string(),
            fallback: "/".to_string(),
            default_landings: landings,
            return_param: DEFAULT_RETURN_PARAM.to_string(),
        }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn public_entry(&self) -> &str {
        &self.public_entry
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn return_param(&self) -> &str {
        &self.return_param
    }

    /// Default landing of a role
    pub fn landing(&self, role: Role) -> &str {
        self.default_landings
            .get(&role)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    /// Navigable location for a redirect, return target included
    pub fn location(&self, redirect: &Redirect) -> String {
        redirect.location(&self.return_param)
    }

    /// Most specific rule for a normalized path; first declared wins ties
    pub fn match_rule(&self, path: &str) -> Option<&RouteRule> {
        let mut best: Option<(usize, &RouteRule)> = None;
        for rule in &self.rules {
            if let Some(len) = rule.match_len(path) {
                if best.map_or(true, |(best_len, _)| len > best_len) {
                    best = Some((len, rule));
                }
            }
        }
        best.map(|(_, rule)| rule)
    }

    /// Authorize one navigation
    pub fn decide(&self, snapshot: &SessionSnapshot, requested_path: &str) -> Decision {
        let path = normalize_path(requested_path);
        let role = snapshot.authenticated_role();

        let Some(rule) = self.match_rule(&path) else {
            debug!(path = %path, "No route rule, using fallback");
            return Decision::RedirectTo(Redirect::to(self.fallback.clone()));
        };

        let decision = match &rule.visibility {
            Visibility::Public => match role.and_then(|r| rule.public_only_redirects.get(&r)) {
                Some(target) => Decision::RedirectTo(Redirect::to(target.clone())),
                None => Decision::Allow,
            },
            Visibility::AuthenticatedOnly => match role {
                Some(r) if rule.resolve_to_landing => {
                    Decision::RedirectTo(Redirect::to(self.landing(r)))
                }
                Some(_) => Decision::Allow,
                None => self.to_entry(requested_path, &path),
            },
            Visibility::RoleRestricted { roles } => match role {
                Some(r) if roles.contains(&r) => Decision::Allow,
                // Valid actor in the wrong area: home, never the login page
                Some(r) => Decision::RedirectTo(Redirect::to(self.landing(r))),
                None => self.to_entry(requested_path, &path),
            },
        };

        debug!(
            path = %path,
            rule = %rule.pattern,
            role = ?role,
            allowed = decision.is_allow(),
            "Route decided"
        );
        decision
    }

    /// Redirect to the public entry, returning to the normalized path (query kept)
    fn to_entry(&self, requested_path: &str, normalized: &str) -> Decision {
        let return_to = format!("{normalized}{}", query_of(requested_path));
        Decision::RedirectTo(Redirect::returning(self.public_entry.clone(), return_to))
    }

    // ─── Validation ───

    fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(SessionError::Config("route table has no rules".into()));
        }
        for rule in &self.rules {
            if rule.pattern != "*" && !rule.pattern.starts_with('/') {
                return Err(SessionError::Config(format!(
                    "pattern must start with '/': {}",
                    rule.pattern
                )));
            }
            if let Visibility::RoleRestricted { roles } = &rule.visibility {
                if roles.is_empty() {
                    return Err(SessionError::Config(format!(
                        "{} restricts to no roles",
                        rule.pattern
                    )));
                }
            }
        }
        if self.return_param.is_empty() {
            return Err(SessionError::Config("return parameter is empty".into()));
        }

        // Unauthenticated actors must be able to land on the entry and fallback
        let anonymous = SessionSnapshot::unauthenticated();
        for (name, path) in [("public entry", &self.public_entry), ("fallback", &self.fallback)] {
            if !self.decide(&anonymous, path).is_allow() {
                return Err(SessionError::Config(format!(
                    "{name} {path} is not reachable without a session"
                )));
            }
        }

        for role in Role::ALL {
            let Some(landing) = self.default_landings.get(&role) else {
                return Err(SessionError::Config(format!("no default landing for {role}")));
            };
            let snapshot = role_snapshot(role);
            if !self.decide(&snapshot, landing).is_allow() {
                return Err(SessionError::Config(format!(
                    "landing {landing} is not allowed for {role}"
                )));
            }
            for rule in &self.rules {
                if let Some(target) = rule.public_only_redirects.get(&role) {
                    if !self.decide(&snapshot, target).is_allow() {
                        return Err(SessionError::Config(format!(
                            "{} sends {role} to {target}, which {role} cannot open",
                            rule.pattern
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::marketplace()
    }
}

fn role_snapshot(role: Role) -> SessionSnapshot {
    SessionSnapshot {
        status: crate::session::SessionStatus::Authenticated,
        role: Some(role),
        subject_id: Some("policy-check".into()),
        ..SessionSnapshot::unauthenticated()
    }
}

/// Canonical form of a requested path.
///
/// Drops query and fragment, treats `\` as `/`, collapses repeated slashes,
/// resolves `.` and `..` segments (also percent-encoded ones) clamping at the
/// root, removes a trailing slash (except on the root) and guarantees a
/// leading slash. Rules are matched against this form, which is the path a
/// browser would actually open.
pub fn normalize_path(raw: &str) -> String {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let path = raw[..end].trim().replace('\\', "/");

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match dot_segment(segment) {
            Some(1) => {}
            Some(_) => {
                segments.pop();
            }
            None if segment.is_empty() => {}
            None => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

/// 1 for `.`, 2 for `..` (literal or `%2e`), None otherwise
fn dot_segment(segment: &str) -> Option<usize> {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    match decoded.as_str() {
        "." => Some(1),
        ".." => Some(2),
        _ => None,
    }
}

/// Query string of a requested path (with its `?`), fragment excluded
fn query_of(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.find(['?', '#']) {
        Some(start) if raw[start..].starts_with('?') => {
            let query = &raw[start..];
            query.find('#').map_or(query, |end| &query[..end])
        }
        _ => "",
    }
}
