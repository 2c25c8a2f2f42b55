use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::session::{Role, UserSession};

/// Demo account
#[derive(Debug, Clone, Copy)]
pub struct DemoAccount {
    pub email: &'static str,
    pub password: &'static str,
    pub role: Role,
}

/// Hard-coded demo accounts. These are not a security boundary.
pub const DEMO_ACCOUNTS: [DemoAccount; 2] = [
    DemoAccount {
        email: "admin@demo.com",
        password: "admin1234",
        role: Role::Admin,
    },
    DemoAccount {
        email: "user@demo.com",
        password: "user1234",
        role: Role::User,
    },
];

/// Role for a matching demo account
pub fn validate_credentials(email: &str, password: &str) -> Option<Role> {
    DEMO_ACCOUNTS
        .iter()
        .find(|account| account.email == email && account.password == password)
        .map(|account| account.role)
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"))
}

pub fn validate_email(email: &str) -> bool {
    email_regex().is_match(email)
}

pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= 8
}

pub fn validate_name(name: &str) -> bool {
    name.trim().chars().count() >= 2
}

/// Per-field validation messages, keyed by field name
pub type FormErrors = BTreeMap<&'static str, &'static str>;

fn email_error(email: &str) -> Option<&'static str> {
    if email.is_empty() {
        Some("Email is required")
    } else if !validate_email(email) {
        Some("Please enter a valid email address")
    } else {
        None
    }
}

fn password_error(password: &str) -> Option<&'static str> {
    if password.is_empty() {
        Some("Password is required")
    } else if !validate_password(password) {
        Some("Password must be at least 8 characters long")
    } else {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        if let Some(e) = email_error(&self.email) {
            errors.insert("email", e);
        }
        if let Some(e) = password_error(&self.password) {
            errors.insert("password", e);
        }
        errors
    }

    /// Validate the form, then check the demo accounts
    pub fn login(&self) -> Result<UserSession, LoginError> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(LoginError::Invalid(errors));
        }
        validate_credentials(&self.email, &self.password)
            .map(|role| UserSession::new(role, self.email.clone()))
            .ok_or(LoginError::UnknownCredentials)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::new();
        if !validate_name(&self.name) {
            errors.insert("name", "Name must be at least 2 characters long");
        }
        if let Some(e) = email_error(&self.email) {
            errors.insert("email", e);
        }
        if let Some(e) = password_error(&self.password) {
            errors.insert("password", e);
        }
        if self.confirm_password.is_empty() {
            errors.insert("confirmPassword", "Please confirm your password");
        } else if self.confirm_password != self.password {
            errors.insert("confirmPassword", "Passwords do not match");
        }
        errors
    }

    /// Accept a well-formed sign-up. Demo accounts are fixed, so nothing is
    /// stored and the new account cannot log in.
    pub fn signup(&self) -> Result<(), LoginError> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(LoginError::Invalid(errors));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoginError {
    #[error("Please fix the errors in the form")]
    Invalid(FormErrors),
    #[error("Invalid credentials! Try user@demo.com / user1234 or admin@demo.com / admin1234")]
    UnknownCredentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Auth,
    User,
    Admin,
}

/// Page shown at startup for the stored session
pub fn landing_page(session: Option<&UserSession>) -> Page {
    match session.map(|s| s.role) {
        None => Page::Auth,
        Some(Role::Admin) => Page::Admin,
        Some(Role::User) => Page::User,
    }
}

/// Resolve a navigation request. Without a session everything leads to the
/// login page; the admin page is refused to non-admins.
pub fn navigate(session: Option<&UserSession>, target: Page) -> Option<Page> {
    match (session.map(|s| s.role), target) {
        (None, _) => Some(Page::Auth),
        (Some(_), Page::Auth) => None,
        (Some(_), Page::User) => Some(Page::User),
        (Some(Role::Admin), Page::Admin) => Some(Page::Admin),
        (Some(Role::User), Page::Admin) => None,
    }
}
