//! Password encoding variants.
//!
//! Portals disagree on what the password field should contain: the raw
//! password, an MD5 digest, a digest salted with a server-issued token, and
//! so on. Without running the page's scripts the right transform is unknown,
//! so the orchestrator tries them all, likeliest first. The order here is
//! that priority and must stay a plain, enumerable sequence.

use crate::extraction::form::Payload;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Field some portals use to pick the login backend.
pub const LOGIN_TYPE_FIELD: &str = "loginType";

/// One way of transforming the password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Plain,
    Md5,
    Base64,
    /// md5(password + echostr)
    Md5PwdEchostr,
    /// md5(md5(password) + echostr)
    Md5Md5PwdEchostr,
    /// md5(password + distoken)
    Md5PwdDistoken,
    /// MD5(password) in upper-case hex
    Md5Upper,
}

impl Encoding {
    /// Every encoding, in the order they are tried.
    pub const ORDER: [Encoding; 7] = [
        Encoding::Plain,
        Encoding::Md5,
        Encoding::Base64,
        Encoding::Md5PwdEchostr,
        Encoding::Md5Md5PwdEchostr,
        Encoding::Md5PwdDistoken,
        Encoding::Md5Upper,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Encoding::Plain => "plain",
            Encoding::Md5 => "md5",
            Encoding::Base64 => "b64",
            Encoding::Md5PwdEchostr => "md5_pwd_echostr",
            Encoding::Md5Md5PwdEchostr => "md5_md5pwd_echostr",
            Encoding::Md5PwdDistoken => "md5_pwd_distoken",
            Encoding::Md5Upper => "md5_upper",
        }
    }

    /// Encode `password`, or `None` when the token this encoding needs is
    /// empty.
    pub fn apply(&self, password: &str, tokens: &ChallengeTokens) -> Option<String> {
        match self {
            Encoding::Plain => Some(password.to_string()),
            Encoding::Md5 => Some(md5_hex(password)),
            Encoding::Base64 => Some(BASE64.encode(password.as_bytes())),
            Encoding::Md5PwdEchostr if !tokens.echostr.is_empty() => {
                Some(md5_hex(&format!("{password}{}", tokens.echostr)))
            }
            Encoding::Md5Md5PwdEchostr if !tokens.echostr.is_empty() => {
                Some(md5_hex(&format!("{}{}", md5_hex(password), tokens.echostr)))
            }
            Encoding::Md5PwdDistoken if !tokens.distoken.is_empty() => {
                Some(md5_hex(&format!("{password}{}", tokens.distoken)))
            }
            Encoding::Md5Upper => Some(md5_hex(password).to_uppercase()),
            _ => None,
        }
    }
}

/// One-time tokens the portal embeds in its form for password salting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeTokens {
    pub echostr: String,
    pub distoken: String,
}

impl ChallengeTokens {
    /// Read `echostr` and `distoken` from the payload's values.
    pub fn from_payload(payload: &Payload) -> Self {
        let read = |name: &str| payload.get(name).cloned().unwrap_or_default();
        Self {
            echostr: read("echostr"),
            distoken: read("distoken"),
        }
    }
}

/// A candidate submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionVariant {
    pub label: &'static str,
    pub payload: Payload,
}

impl SubmissionVariant {
    pub fn login_type(&self) -> Option<&str> {
        self.payload.get(LOGIN_TYPE_FIELD).map(String::as_str)
    }
}

/// Lowercase hex MD5 digest.
pub fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// The four `loginType` bases: the form as-is, forced to `"1"`, forced to
/// `"0"`, and with the field removed.
pub fn login_type_bases(base: &Payload) -> Vec<Payload> {
    let forced = |value: &str| {
        let mut p = base.clone();
        p.insert(LOGIN_TYPE_FIELD, value.to_string());
        p
    };
    let mut omitted = base.clone();
    omitted.remove(LOGIN_TYPE_FIELD);

    vec![base.clone(), forced("1"), forced("0"), omitted]
}

/// Every (base, encoding) combination in priority order, before
/// deduplication.
pub fn enumerate_variants(
    base: &Payload,
    pass_field: &str,
    password: &str,
    tokens: &ChallengeTokens,
) -> Vec<SubmissionVariant> {
    let mut variants = Vec::new();
    for base in login_type_bases(base) {
        for encoding in Encoding::ORDER {
            let Some(encoded) = encoding.apply(password, tokens) else {
                continue;
            };
            let mut payload = base.clone();
            payload.insert(pass_field, encoded);
            variants.push(SubmissionVariant {
                label: encoding.label(),
                payload,
            });
        }
    }
    variants
}

/// Drop variants whose (label, sorted payload) was already seen, keeping the
/// first occurrence and the original order.
pub fn dedup_variants(variants: Vec<SubmissionVariant>) -> Vec<SubmissionVariant> {
    let mut seen = std::collections::HashSet::new();
    variants
        .into_iter()
        .filter(|v| seen.insert((v.label, v.payload.sorted_items())))
        .collect()
}

/// Ordered, deduplicated variants for one login attempt.
pub fn generate_variants(
    base: &Payload,
    pass_field: &str,
    password: &str,
) -> Vec<SubmissionVariant> {
    let tokens = ChallengeTokens::from_payload(base);
    dedup_variants(enumerate_variants(base, pass_field, password, &tokens))
}
