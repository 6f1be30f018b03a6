use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const USERNAME: &str = "username";
pub const EMAIL: &str = "email";
pub const PASSWORD1: &str = "password1";
pub const PASSWORD2: &str = "password2";
pub const PASSWORD: &str = "password";

/// Raw registration form body. Missing fields decode as empty strings so the
/// validator can report them as required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

/// Output of a successful validation pass. The password is still plaintext;
/// hashing belongs to account creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Public part of the user, safe to render or serialize.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Field name -> ordered, non-empty list of messages. Insertion order of
/// fields is kept so errors render in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorSet {
    fields: Vec<(&'static str, Vec<String>)>,
    non_field: Vec<String>,
}

impl ErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        let message = message.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.fields.push((field, vec![message])),
        }
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &[String])> {
        self.fields.iter().map(|(name, m)| (*name, m.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }
}

impl std::fmt::Display for ErrorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in self.fields() {
            for m in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {m}")?;
                first = false;
            }
        }
        for m in &self.non_field {
            if !first {
                f.write_str("; ")?;
            }
            f.write_str(m)?;
            first = false;
        }
        Ok(())
    }
}

/// Display hints attached to a form field definition. Purely cosmetic.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub input_type: &'static str,
    pub css_class: &'static str,
    pub placeholder: &'static str,
    pub help_text: Option<&'static str>,
}

pub const REGISTRATION_FIELDS: [FieldSpec; 4] = [
    FieldSpec {
        name: USERNAME,
        label: "Username",
        input_type: "text",
        css_class: "form-control",
        placeholder: "Username",
        help_text: Some("Required. 150 characters or fewer. Letters, digits and @/./+/-/_ only."),
    },
    FieldSpec {
        name: EMAIL,
        label: "Email",
        input_type: "email",
        css_class: "form-control",
        placeholder: "Email address",
        help_text: Some("Required. Enter a valid email address."),
    },
    FieldSpec {
        name: PASSWORD1,
        label: "Password",
        input_type: "password",
        css_class: "form-control",
        placeholder: "Password",
        help_text: None,
    },
    FieldSpec {
        name: PASSWORD2,
        label: "Password confirmation",
        input_type: "password",
        css_class: "form-control",
        placeholder: "Confirm Password",
        help_text: Some("Enter the same password as before, for verification."),
    },
];

pub const LOGIN_FIELDS: [FieldSpec; 2] = [
    FieldSpec {
        name: USERNAME,
        label: "Username",
        input_type: "text",
        css_class: "form-control",
        placeholder: "Username",
        help_text: None,
    },
    FieldSpec {
        name: PASSWORD,
        label: "Password",
        input_type: "password",
        css_class: "form-control",
        placeholder: "Password",
        help_text: None,
    },
];
