use std::collections::HashMap;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use tracing::error;

use crate::config::PasswordPolicyConfig;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

// Lower-cased; compared against the trimmed, lower-cased candidate.
const COMMON_PASSWORDS: &[&str] = &[
    "123456", "password", "12345678", "qwerty", "123456789", "12345", "1234", "111111",
    "1234567", "dragon", "123123", "baseball", "abc123", "football", "monkey", "letmein",
    "696969", "shadow", "master", "666666", "qwertyuiop", "123321", "mustang", "1234567890",
    "michael", "654321", "superman", "1qaz2wsx", "7777777", "121212", "000000", "qazwsx",
    "123qwe", "killer", "trustno1", "jordan", "jennifer", "zxcvbnm", "asdfgh", "hunter",
    "buster", "soccer", "harley", "batman", "andrew", "tigger", "sunshine", "iloveyou",
    "2000", "charlie", "robert", "thomas", "hockey", "ranger", "daniel", "starwars",
    "klaster", "112233", "george", "computer", "michelle", "jessica", "pepper", "1111",
    "zxcvbn", "555555", "11111111", "131313", "freedom", "777777", "pass", "maggie",
    "159753", "aaaaaa", "ginger", "princess", "joshua", "cheese", "amanda", "summer",
    "love", "ashley", "nicole", "chelsea", "biteme", "matthew", "access", "yankees",
    "987654321", "dallas", "austin", "thunder", "taylor", "matrix", "password1",
    "password123", "welcome", "welcome1", "admin", "admin123", "passw0rd", "p@ssw0rd",
    "qwerty123", "iloveyou1", "football1", "changeme", "secret", "letmein1", "abcd1234",
];

/// Ordered password strength checks. The first failing check wins.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    min_length: usize,
    max_similarity: f64,
}

type Check = fn(&PasswordPolicy, &Candidate<'_>) -> Option<String>;

struct Candidate<'a> {
    password: &'a str,
    username: &'a str,
    email: &'a str,
}

const CHECKS: &[Check] = &[
    PasswordPolicy::check_similarity,
    PasswordPolicy::check_length,
    PasswordPolicy::check_common,
    PasswordPolicy::check_numeric,
];

impl PasswordPolicy {
    pub fn new(config: &PasswordPolicyConfig) -> Self {
        Self {
            min_length: config.min_length,
            max_similarity: config.max_similarity,
        }
    }

    /// Returns the first violation for `password`, judged against the other
    /// submitted attributes.
    pub fn violation(&self, password: &str, username: &str, email: &str) -> Option<String> {
        let candidate = Candidate {
            password,
            username,
            email,
        };
        CHECKS.iter().find_map(|check| check(self, &candidate))
    }

    fn check_length(&self, c: &Candidate<'_>) -> Option<String> {
        if c.password.chars().count() >= self.min_length {
            return None;
        }
        let unit = if self.min_length == 1 { "character" } else { "characters" };
        Some(format!(
            "This password is too short. It must contain at least {} {unit}.",
            self.min_length
        ))
    }

    fn check_similarity(&self, c: &Candidate<'_>) -> Option<String> {
        let password = c.password.to_lowercase();
        for (value, verbose) in [(c.username, "username"), (c.email, "email address")] {
            if value.is_empty() {
                continue;
            }
            let value = value.to_lowercase();
            let mut parts: Vec<&str> = NON_WORD_RE.split(&value).collect();
            parts.push(&value);
            for part in parts {
                if exceeds_length_ratio(&password, self.max_similarity, part) {
                    continue;
                }
                if quick_ratio(&password, part) >= self.max_similarity {
                    return Some(format!("The password is too similar to the {verbose}."));
                }
            }
        }
        None
    }

    fn check_common(&self, c: &Candidate<'_>) -> Option<String> {
        let normalized = c.password.trim().to_lowercase();
        COMMON_PASSWORDS
            .contains(&normalized.as_str())
            .then(|| "This password is too common.".to_string())
    }

    fn check_numeric(&self, c: &Candidate<'_>) -> Option<String> {
        (!c.password.is_empty() && c.password.chars().all(char::is_numeric))
            .then(|| "This password is entirely numeric.".to_string())
    }
}

lazy_static! {
    static ref NON_WORD_RE: Regex = Regex::new(r"\W+").unwrap();
}

/// Skip comparisons where the attribute is tiny next to the password; such a
/// pair can never reach the similarity bound in a meaningful way.
fn exceeds_length_ratio(password: &str, max_similarity: f64, value: &str) -> bool {
    let pwd_len = password.chars().count() as f64;
    let value_len = value.chars().count() as f64;
    let bound = max_similarity / 2.0 * pwd_len;
    pwd_len >= 10.0 * value_len && value_len < bound
}

/// Upper bound on the matching-blocks ratio: shared character multiset
/// size relative to the combined length.
fn quick_ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let mut avail: HashMap<char, usize> = HashMap::new();
    for ch in b.chars() {
        *avail.entry(ch).or_default() += 1;
    }
    let mut matches = 0usize;
    for ch in a.chars() {
        if let Some(n) = avail.get_mut(&ch) {
            if *n > 0 {
                *n -= 1;
                matches += 1;
            }
        }
    }
    2.0 * matches as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PasswordPolicy {
        PasswordPolicy::new(&PasswordPolicyConfig::default())
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn strong_password_passes() {
        assert_eq!(policy().violation("Str0ngPass!23", "alice", "alice@example.com"), None);
    }

    #[test]
    fn short_password_reports_minimum() {
        let msg = policy().violation("Ab1!", "alice", "alice@example.com").unwrap();
        assert_eq!(
            msg,
            "This password is too short. It must contain at least 8 characters."
        );
    }

    #[test]
    fn password_similar_to_username_is_rejected() {
        let msg = policy()
            .violation("alicealice1", "alicealice", "a@example.com")
            .unwrap();
        assert_eq!(msg, "The password is too similar to the username.");
    }

    #[test]
    fn password_similar_to_email_part_is_rejected() {
        let msg = policy()
            .violation("wonderland9", "bob", "wonderland@example.com")
            .unwrap();
        assert_eq!(msg, "The password is too similar to the email address.");
    }

    #[test]
    fn common_password_is_rejected() {
        let msg = policy().violation(" Password123 ", "zed", "zed@example.com").unwrap();
        assert_eq!(msg, "This password is too common.");
    }

    #[test]
    fn numeric_password_is_rejected() {
        let msg = policy().violation("84736251940", "zed", "zed@example.com").unwrap();
        assert_eq!(msg, "This password is entirely numeric.");
    }

    #[test]
    fn checks_run_in_order() {
        // too short and numeric: length is reported first
        let msg = policy().violation("4821", "zed", "zed@example.com").unwrap();
        assert!(msg.starts_with("This password is too short."));

        // too short and similar: similarity is reported first
        let msg = policy().violation("alice1", "alice", "a@example.com").unwrap();
        assert_eq!(msg, "The password is too similar to the username.");
    }

    #[test]
    fn quick_ratio_bounds() {
        assert_eq!(quick_ratio("abc", "abc"), 1.0);
        assert_eq!(quick_ratio("abc", "xyz"), 0.0);
        assert_eq!(quick_ratio("", ""), 1.0);
    }
}
