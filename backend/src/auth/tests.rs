use super::passwords::{hash_password, verify_password};
use super::tokens::{
    TwoFactorClaims, generate_session_token, issue_two_factor_challenge,
    validate_two_factor_challenge,
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

const SECRET: &str = "supersecretauthsecretforunittesting123";

#[test]
fn test_two_factor_challenge_round_trip() {
    let user_id = Uuid::new_v4();
    let token = issue_two_factor_challenge(user_id, SECRET, Utc::now()).unwrap();

    let resolved = validate_two_factor_challenge(&token, SECRET).expect("valid challenge should pass");
    assert_eq!(resolved, user_id);
}

#[test]
fn test_two_factor_challenge_expired() {
    let my_claims = TwoFactorClaims {
        sub: Uuid::new_v4().to_string(),
        purpose: "two_factor".to_string(),
        iat: 0,
        exp: 1, // past
    };

    let token = encode(
        &Header::default(),
        &my_claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    assert!(validate_two_factor_challenge(&token, SECRET).is_err());
}

#[test]
fn test_two_factor_challenge_invalid_signature() {
    let token = issue_two_factor_challenge(Uuid::new_v4(), "wrongsecret", Utc::now()).unwrap();

    assert!(validate_two_factor_challenge(&token, SECRET).is_err());
}

#[test]
fn test_two_factor_challenge_wrong_purpose() {
    let my_claims = TwoFactorClaims {
        sub: Uuid::new_v4().to_string(),
        purpose: "session".to_string(),
        iat: 0,
        exp: 9999999999, // far future
    };

    let token = encode(
        &Header::default(),
        &my_claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    assert!(validate_two_factor_challenge(&token, SECRET).is_err());
}

#[test]
fn test_password_hash_and_verify() {
    let hash = hash_password("Secret1!").unwrap();

    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("Secret1!", &hash).unwrap());
    assert!(!verify_password("Secret2!", &hash).unwrap());
    assert!(verify_password("Secret1!", "not-a-hash").is_err());
}

#[test]
fn test_session_tokens_are_random_alphanumeric() {
    let first = generate_session_token();
    let second = generate_session_token();

    assert_eq!(first.len(), 32);
    assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(first, second);
}
