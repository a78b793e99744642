//! Username/password field inference.
//!
//! Both dictionaries are ordered: earlier terms are the likelier names. A
//! term matches a field name on token boundaries first (`user_id` matches
//! `user`, `superuser` does not); only when no candidate matches that way is a
//! raw substring accepted.

use regex::Regex;

/// Username field names seen on real portals, most common first.
pub const USER_FIELD_TERMS: &[&str] = &[
    "username",
    "user",
    "account",
    "uname",
    "loginname",
    "userid",
    "user_name",
    "userName",
    "loginName",
    "userId",
    "DDDDD",
];

/// Password field names seen on real portals, most common first.
pub const PASS_FIELD_TERMS: &[&str] = &[
    "password", "pass", "passwd", "pwd", "userPwd", "passWord", "Password", "upass",
];

/// Conventional field-name pairs tried when the page has no usable form.
pub const FALLBACK_FIELD_PAIRS: &[(&str, &str)] = &[
    ("username", "password"),
    ("userName", "userPwd"),
    ("loginName", "passWord"),
    ("DDDDD", "upass"),
    ("userId", "passwd"),
];

/// Which form fields carry the credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRoles {
    pub user_field: String,
    pub pass_field: String,
    /// True when both names came from the caller rather than inference.
    pub overridden: bool,
}

/// Pick the candidate that best matches `dictionary`.
///
/// Candidates are scanned in their original order; a boundary match on any
/// term beats every substring match.
pub fn infer_field<S: AsRef<str>>(candidates: &[S], dictionary: &[&str]) -> Option<String> {
    let boundary: Vec<Regex> = dictionary
        .iter()
        .filter_map(|term| {
            Regex::new(&format!(
                r"(^|[_.\-]){}($|[_.\-])",
                regex::escape(&term.to_lowercase())
            ))
            .ok()
        })
        .collect();

    let lowered: Vec<(String, &str)> = candidates
        .iter()
        .map(|c| (c.as_ref().to_lowercase(), c.as_ref()))
        .collect();

    for (low, original) in &lowered {
        if boundary.iter().any(|re| re.is_match(low)) {
            return Some(original.to_string());
        }
    }

    for (low, original) in &lowered {
        if dictionary
            .iter()
            .any(|term| low.contains(&term.to_lowercase()))
        {
            return Some(original.to_string());
        }
    }

    None
}

/// Resolve both roles. A caller override wins outright for its role;
/// otherwise the role is inferred from `candidates`.
pub fn resolve_roles<S: AsRef<str>>(
    candidates: &[S],
    user_override: Option<&str>,
    pass_override: Option<&str>,
) -> Option<FieldRoles> {
    let user_field = match user_override {
        Some(name) => name.to_string(),
        None => infer_field(candidates, USER_FIELD_TERMS)?,
    };
    let pass_field = match pass_override {
        Some(name) => name.to_string(),
        None => infer_field(candidates, PASS_FIELD_TERMS)?,
    };
    Some(FieldRoles {
        user_field,
        pass_field,
        overridden: user_override.is_some() && pass_override.is_some(),
    })
}
