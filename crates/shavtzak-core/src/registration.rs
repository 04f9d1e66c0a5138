//! Self-registration with personal-number pre-verification.
//!
//! A soldier enters a personal number and an email. The number must be on
//! the roster and not yet linked to an account. A six-digit code is issued
//! (the caller delivers it by email) and must be confirmed before the
//! Firebase account is created. New users start inactive with the
//! `Soldier` role until an admin approves them.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{is_valid_personal_number, Soldier, User, UserRole};
use crate::utils::is_valid_email;

/// Verification codes expire after 10 minutes.
const CODE_TTL_MINUTES: i64 = 10;

/// Wrong guesses allowed per issued code.
pub const MAX_CODE_ATTEMPTS: u32 = 5;

const CODE_DIGITS: usize = 6;

#[derive(Error, Debug, PartialEq)]
pub enum RegistrationError {
    #[error("Personal number must be 7 digits")]
    InvalidPersonalNumber,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Personal number {0} is not on the roster")]
    NotOnRoster(String),

    #[error("Personal number {0} is already registered")]
    AlreadyRegistered(String),

    #[error("Email {0} is already in use")]
    EmailTaken(String),

    #[error("Verification code expired - request a new one")]
    CodeExpired,

    #[error("Too many wrong codes - request a new one")]
    TooManyAttempts,

    #[error("Wrong verification code ({remaining} attempts left)")]
    WrongCode { remaining: u32 },

    #[error("Registration is not at the {0} step")]
    WrongStep(&'static str),

    #[error("Failed to hash verification code: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStep {
    PersonalNumber,
    VerifyCode,
    Account,
    Complete,
}

impl RegistrationStep {
    pub fn title(&self) -> &'static str {
        match self {
            RegistrationStep::PersonalNumber => "personal number",
            RegistrationStep::VerifyCode => "verification",
            RegistrationStep::Account => "account",
            RegistrationStep::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone)]
struct PendingCode {
    hash: String,
    expires_at: DateTime<Utc>,
    attempts: u32,
}

#[derive(Debug, Clone)]
pub struct RegistrationFlow {
    step: RegistrationStep,
    email: String,
    soldier: Option<Soldier>,
    pending: Option<PendingCode>,
}

impl Default for RegistrationFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..10u32.pow(CODE_DIGITS as u32));
    format!("{:0width$}", n, width = CODE_DIGITS)
}

fn hash_code(code: &str) -> Result<String, RegistrationError> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| RegistrationError::Hashing(e.to_string()))?;
    Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| RegistrationError::Hashing(e.to_string()))
}

fn code_matches(code: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(code.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Stored verification hash is invalid");
            false
        }
    }
}

impl RegistrationFlow {
    pub fn new() -> Self {
        Self {
            step: RegistrationStep::PersonalNumber,
            email: String::new(),
            soldier: None,
            pending: None,
        }
    }

    pub fn step(&self) -> RegistrationStep {
        self.step
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Roster record the registration is linked to.
    pub fn soldier(&self) -> Option<&Soldier> {
        self.soldier.as_ref()
    }

    fn expect_step(&self, step: RegistrationStep) -> Result<(), RegistrationError> {
        if self.step == step {
            Ok(())
        } else {
            Err(RegistrationError::WrongStep(step.title()))
        }
    }

    fn issue_code(&mut self, now: DateTime<Utc>) -> Result<String, RegistrationError> {
        let code = generate_code();
        self.pending = Some(PendingCode {
            hash: hash_code(&code)?,
            expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
            attempts: 0,
        });
        self.step = RegistrationStep::VerifyCode;
        Ok(code)
    }

    /// Check the personal number and email and issue a verification code.
    /// Returns the plain code for delivery.
    pub fn start(
        &mut self,
        personal_number: &str,
        email: &str,
        roster: &[Soldier],
        users: &[User],
    ) -> Result<String, RegistrationError> {
        self.start_at(personal_number, email, roster, users, Utc::now())
    }

    pub fn start_at(
        &mut self,
        personal_number: &str,
        email: &str,
        roster: &[Soldier],
        users: &[User],
        now: DateTime<Utc>,
    ) -> Result<String, RegistrationError> {
        self.expect_step(RegistrationStep::PersonalNumber)?;

        let personal_number = personal_number.trim();
        let email = email.trim().to_lowercase();

        if !is_valid_personal_number(personal_number) {
            return Err(RegistrationError::InvalidPersonalNumber);
        }
        if !is_valid_email(&email) {
            return Err(RegistrationError::InvalidEmail);
        }

        let soldier = roster
            .iter()
            .find(|s| s.id == personal_number)
            .ok_or_else(|| RegistrationError::NotOnRoster(personal_number.to_string()))?;

        if users.iter().any(|u| u.personal_number == personal_number) {
            return Err(RegistrationError::AlreadyRegistered(personal_number.to_string()));
        }
        if users.iter().any(|u| u.email.to_lowercase() == email) {
            return Err(RegistrationError::EmailTaken(email));
        }

        self.soldier = Some(soldier.clone());
        self.email = email;
        let code = self.issue_code(now)?;
        info!(personal_number, "Verification code issued");
        Ok(code)
    }

    /// Issue a fresh code, resetting the attempt counter.
    pub fn resend(&mut self) -> Result<String, RegistrationError> {
        self.expect_step(RegistrationStep::VerifyCode)?;
        self.issue_code(Utc::now())
    }

    pub fn verify(&mut self, code: &str) -> Result<(), RegistrationError> {
        self.verify_at(code, Utc::now())
    }

    pub fn verify_at(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), RegistrationError> {
        self.expect_step(RegistrationStep::VerifyCode)?;
        let pending = self
            .pending
            .as_mut()
            .ok_or(RegistrationError::WrongStep("verification"))?;

        if now > pending.expires_at {
            return Err(RegistrationError::CodeExpired);
        }
        if pending.attempts >= MAX_CODE_ATTEMPTS {
            return Err(RegistrationError::TooManyAttempts);
        }

        if code_matches(code.trim(), &pending.hash) {
            debug!("Verification code accepted");
            self.pending = None;
            self.step = RegistrationStep::Account;
            return Ok(());
        }

        pending.attempts += 1;
        let remaining = MAX_CODE_ATTEMPTS - pending.attempts;
        if remaining == 0 {
            Err(RegistrationError::TooManyAttempts)
        } else {
            Err(RegistrationError::WrongCode { remaining })
        }
    }

    /// Finish registration for the account created with `uid`.
    pub fn complete(&mut self, uid: &str, phone: Option<String>) -> Result<User, RegistrationError> {
        self.expect_step(RegistrationStep::Account)?;
        let soldier = self
            .soldier
            .as_ref()
            .ok_or(RegistrationError::WrongStep("account"))?;

        let user = User {
            uid: uid.to_string(),
            email: self.email.clone(),
            personal_number: soldier.id.clone(),
            first_name: soldier.first_name.clone(),
            last_name: soldier.last_name.clone(),
            phone: phone.filter(|p| !p.trim().is_empty()),
            platoon: Some(soldier.platoon.clone()).filter(|p| !p.is_empty()),
            role: UserRole::Soldier,
            is_active: false,
            created_at: Utc::now(),
        };
        self.step = RegistrationStep::Complete;
        info!(uid, personal_number = %user.personal_number, "Registration complete");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::map_raw_status_to_structured;

    fn roster() -> Vec<Soldier> {
        vec![Soldier::new("1234567", "Dana", "Levi", "2", map_raw_status_to_structured("בית"))]
    }

    fn existing_user(pn: &str, email: &str) -> User {
        User {
            uid: "u0".to_string(),
            email: email.to_string(),
            personal_number: pn.to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            phone: None,
            platoon: None,
            role: UserRole::Soldier,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..20 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_full_flow() {
        let mut flow = RegistrationFlow::new();
        let code = flow.start("1234567", " Dana@Unit.IL ", &roster(), &[]).unwrap();
        assert_eq!(flow.step(), RegistrationStep::VerifyCode);
        assert_eq!(flow.email(), "dana@unit.il");

        flow.verify(&code).unwrap();
        assert_eq!(flow.step(), RegistrationStep::Account);

        let user = flow.complete("firebase-uid", Some("0521234567".to_string())).unwrap();
        assert_eq!(user.personal_number, "1234567");
        assert_eq!(user.first_name, "Dana");
        assert_eq!(user.platoon.as_deref(), Some("2"));
        assert_eq!(user.role, UserRole::Soldier);
        assert!(!user.is_active);
        assert_eq!(flow.step(), RegistrationStep::Complete);
    }

    #[test]
    fn test_start_validation() {
        let mut flow = RegistrationFlow::new();
        assert_eq!(
            flow.start("12345", "a@b.il", &roster(), &[]).unwrap_err(),
            RegistrationError::InvalidPersonalNumber
        );
        assert_eq!(
            flow.start("1234567", "nope", &roster(), &[]).unwrap_err(),
            RegistrationError::InvalidEmail
        );
        assert_eq!(
            flow.start("7654321", "a@b.il", &roster(), &[]).unwrap_err(),
            RegistrationError::NotOnRoster("7654321".to_string())
        );
        assert_eq!(
            flow.start("1234567", "a@b.il", &roster(), &[existing_user("1234567", "x@y.il")])
                .unwrap_err(),
            RegistrationError::AlreadyRegistered("1234567".to_string())
        );
        assert_eq!(
            flow.start("1234567", "A@b.il", &roster(), &[existing_user("7777777", "a@b.il")])
                .unwrap_err(),
            RegistrationError::EmailTaken("a@b.il".to_string())
        );
        assert_eq!(flow.step(), RegistrationStep::PersonalNumber);
    }

    #[test]
    fn test_wrong_codes_exhaust_attempts() {
        let mut flow = RegistrationFlow::new();
        let code = flow.start("1234567", "a@b.il", &roster(), &[]).unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        for remaining in (1..MAX_CODE_ATTEMPTS).rev() {
            assert_eq!(
                flow.verify(wrong).unwrap_err(),
                RegistrationError::WrongCode { remaining }
            );
        }
        assert_eq!(flow.verify(wrong).unwrap_err(), RegistrationError::TooManyAttempts);
        // Even the right code is refused now
        assert_eq!(flow.verify(&code).unwrap_err(), RegistrationError::TooManyAttempts);

        let fresh = flow.resend().unwrap();
        flow.verify(&fresh).unwrap();
    }

    #[test]
    fn test_expired_code() {
        let mut flow = RegistrationFlow::new();
        let now = Utc::now();
        let code = flow.start_at("1234567", "a@b.il", &roster(), &[], now).unwrap();
        let later = now + Duration::minutes(CODE_TTL_MINUTES) + Duration::seconds(1);
        assert_eq!(flow.verify_at(&code, later).unwrap_err(), RegistrationError::CodeExpired);
    }

    #[test]
    fn test_steps_are_enforced() {
        let mut flow = RegistrationFlow::new();
        assert_eq!(
            flow.verify("123456").unwrap_err(),
            RegistrationError::WrongStep("verification")
        );
        assert_eq!(
            flow.complete("uid", None).unwrap_err(),
            RegistrationError::WrongStep("account")
        );
        assert!(flow.resend().is_err());
    }

    #[test]
    fn test_code_is_not_stored_in_plain_text() {
        let mut flow = RegistrationFlow::new();
        let code = flow.start("1234567", "a@b.il", &roster(), &[]).unwrap();
        let stored = &flow.pending.as_ref().unwrap().hash;
        assert!(!stored.contains(&code));
        assert!(stored.starts_with("$argon2"));
    }
}
