//! Registration form validation.
//!
//! Each field owns an ordered list of rules; the first failing rule of a
//! field produces that field's message, while every field is always checked
//! so the caller sees all problems at once. Username uniqueness is the only
//! rule that reads the identity store and runs last, after the cheap rules.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::accounts::dto::{
    ErrorSet, RegistrationInput, ValidatedRegistration, EMAIL, PASSWORD1, PASSWORD2, USERNAME,
};
use crate::accounts::errors::RegistrationError;
use crate::accounts::password::PasswordPolicy;
use crate::store::IdentityStore;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_USERNAME: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn\u{2019}t match.";

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    static ref EMAIL_USER_RE: Regex =
        Regex::new(r"(?i)^[-!#$%&'*+/=?^_`{}|~0-9a-z]+(\.[-!#$%&'*+/=?^_`{}|~0-9a-z]+)*$").unwrap();
    static ref EMAIL_DOMAIN_RE: Regex =
        Regex::new(r"(?i)^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9-]{2,63}$").unwrap();
}

/// A predicate over a field value and the message used when it fails.
struct Rule {
    passes: fn(&str) -> bool,
    message: fn(&str) -> String,
}

const USERNAME_RULES: &[Rule] = &[
    Rule {
        passes: |v| !v.is_empty(),
        message: |_| REQUIRED.to_string(),
    },
    Rule {
        passes: |v| v.chars().count() <= USERNAME_MAX_LENGTH,
        message: |v| max_length_message(USERNAME_MAX_LENGTH, v),
    },
    Rule {
        passes: |v| USERNAME_RE.is_match(v),
        message: |_| INVALID_USERNAME.to_string(),
    },
];

const EMAIL_RULES: &[Rule] = &[
    Rule {
        passes: |v| !v.is_empty(),
        message: |_| REQUIRED.to_string(),
    },
    Rule {
        passes: |v| v.chars().count() <= EMAIL_MAX_LENGTH,
        message: |v| max_length_message(EMAIL_MAX_LENGTH, v),
    },
    Rule {
        passes: is_valid_email,
        message: |_| INVALID_EMAIL.to_string(),
    },
];

const PASSWORD_RULES: &[Rule] = &[Rule {
    passes: |v| !v.is_empty(),
    message: |_| REQUIRED.to_string(),
}];

fn max_length_message(max: usize, value: &str) -> String {
    format!(
        "Ensure this value has at most {max} characters (it has {}).",
        value.chars().count()
    )
}

fn first_violation(value: &str, rules: &[Rule]) -> Option<String> {
    rules
        .iter()
        .find(|rule| !(rule.passes)(value))
        .map(|rule| (rule.message)(value))
}

pub fn is_valid_email(value: &str) -> bool {
    let Some((user, domain)) = value.rsplit_once('@') else {
        return false;
    };
    if !EMAIL_USER_RE.is_match(user) {
        return false;
    }
    domain.eq_ignore_ascii_case("localhost")
        || (EMAIL_DOMAIN_RE.is_match(domain) && !domain.ends_with('-'))
}

/// Trims and NFKC-normalizes a submitted username, so compatibility forms
/// such as fullwidth letters collapse onto the same account name.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().nfkc().collect()
}

/// Lower-cases the domain part; the local part is case-sensitive.
pub fn normalize_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((user, domain)) => format!("{user}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

pub struct RegistrationValidator {
    identity: Arc<dyn IdentityStore>,
    policy: PasswordPolicy,
}

impl RegistrationValidator {
    pub fn new(identity: Arc<dyn IdentityStore>, policy: PasswordPolicy) -> Self {
        Self { identity, policy }
    }

    /// Checks a submitted form. Performs no writes; the only side-channel is
    /// the read-only username lookup, so repeated calls on the same input
    /// yield the same result while the store is unchanged.
    pub async fn validate(
        &self,
        input: &RegistrationInput,
    ) -> Result<ValidatedRegistration, RegistrationError> {
        let username = normalize_username(&input.username);
        let username = username.as_str();
        let email = input.email.trim();
        let password1 = input.password1.as_str();
        let password2 = input.password2.as_str();

        let mut errors = ErrorSet::new();

        match first_violation(username, USERNAME_RULES) {
            Some(msg) => errors.add(USERNAME, msg),
            None => {
                if self.identity.username_taken(username).await? {
                    errors.add(USERNAME, DUPLICATE_USERNAME);
                }
            }
        }

        if let Some(msg) = first_violation(email, EMAIL_RULES) {
            errors.add(EMAIL, msg);
        }

        if let Some(msg) = first_violation(password1, PASSWORD_RULES) {
            errors.add(PASSWORD1, msg);
        }

        if let Some(msg) = self.password2_violation(password1, password2, username, email) {
            errors.add(PASSWORD2, msg);
        }

        if !errors.is_empty() {
            debug!(%errors, "registration rejected");
            return Err(RegistrationError::Invalid(errors));
        }

        Ok(ValidatedRegistration {
            username: username.to_string(),
            email: normalize_email(email),
            password: password1.to_string(),
        })
    }

    fn password2_violation(
        &self,
        password1: &str,
        password2: &str,
        username: &str,
        email: &str,
    ) -> Option<String> {
        if let Some(msg) = first_violation(password2, PASSWORD_RULES) {
            return Some(msg);
        }
        if !password1.is_empty() && password1 != password2 {
            return Some(PASSWORD_MISMATCH.to_string());
        }
        self.policy.violation(password2, username, email)
    }
}
