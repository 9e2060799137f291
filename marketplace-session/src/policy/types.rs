//! Route policy types — Visibility, RouteRule, Decision, PolicyConfig

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::session::Role;

/// Default query parameter carrying the return target
pub const DEFAULT_RETURN_PARAM: &str = "next";

/// Who may see a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Visibility {
    Public,
    AuthenticatedOnly,
    RoleRestricted { roles: BTreeSet<Role> },
}

/// One declarative policy entry
///
/// `pattern` is either an exact path (`/login`) or a prefix pattern ending in
/// `/*` (`/client/*` covers `/client` and everything below it). A bare `*`
/// matches every path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRule {
    pub pattern: String,
    pub visibility: Visibility,
    /// Where to send an already authenticated actor instead of rendering
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub public_only_redirects: BTreeMap<Role, String>,
    /// Authenticated actors are sent on to their role's landing
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub resolve_to_landing: bool,
}

impl RouteRule {
    fn with_visibility(pattern: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            pattern: pattern.into(),
            visibility,
            public_only_redirects: BTreeMap::new(),
            resolve_to_landing: false,
        }
    }

    pub fn public(pattern: impl Into<String>) -> Self {
        Self::with_visibility(pattern, Visibility::Public)
    }

    pub fn authenticated(pattern: impl Into<String>) -> Self {
        Self::with_visibility(pattern, Visibility::AuthenticatedOnly)
    }

    pub fn restricted(pattern: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self::with_visibility(
            pattern,
            Visibility::RoleRestricted {
                roles: roles.into_iter().collect(),
            },
        )
    }

    pub fn with_public_only_redirect(mut self, role: Role, path: impl Into<String>) -> Self {
        self.public_only_redirects.insert(role, path.into());
        self
    }

    pub fn resolving_to_landing(mut self) -> Self {
        self.resolve_to_landing = true;
        self
    }

    /// Literal part of the pattern and whether it matches as a prefix
    fn matcher(&self) -> (&str, bool) {
        match self.pattern.strip_suffix("/*") {
            Some(base) => (base, true),
            None if self.pattern == "*" => ("", true),
            None => (self.pattern.as_str(), false),
        }
    }

    /// Specificity of the match (literal length), or None
    pub fn match_len(&self, path: &str) -> Option<usize> {
        let (base, prefix) = self.matcher();
        let hit = if prefix {
            base.is_empty()
                || path == base
                || path.strip_prefix(base).is_some_and(|rest| rest.starts_with('/'))
        } else {
            path == base
        };
        hit.then_some(base.len())
    }
}

/// Where a blocked navigation goes instead
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub path: String,
    /// Originally requested path, for a post-login return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,
}

impl Redirect {
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            return_to: None,
        }
    }

    pub fn returning(path: impl Into<String>, return_to: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            return_to: Some(return_to.into()),
        }
    }

    /// Navigable location, return target encoded into `param`
    pub fn location(&self, param: &str) -> String {
        match &self.return_to {
            Some(target) => {
                let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
                format!("{}?{}={}", self.path, param, encoded)
            }
            None => self.path.clone(),
        }
    }
}

/// Outcome of a policy check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectTo(Redirect),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn redirect_path(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::RedirectTo(r) => Some(r.path.as_str()),
        }
    }
}

/// Serializable route table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    pub rules: Vec<RouteRule>,
    /// Login route unauthenticated actors are sent to
    pub public_entry: String,
    /// Target for paths no rule covers
    pub fallback: String,
    pub default_landings: BTreeMap<Role, String>,
    #[serde(default = "default_return_param")]
    pub return_param: String,
}

fn default_return_param() -> String {
    DEFAULT_RETURN_PARAM.to_string()
}
