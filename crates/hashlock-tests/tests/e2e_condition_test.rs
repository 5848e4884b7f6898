//! End-to-end tests for the condition workflow
//!
//! These tests walk the full path an external workflow takes: choose a secret
//! mode, build the condition and fulfillment, publish the condition hex, and
//! later verify or regenerate the secret.

use hashlock_core::{
    build, fee_drops, secret, verify, verify_hex, BuildRequest, Condition, ConditionType, HashlockError,
    Fulfillment, SaltSource,
};

/// Low cost factor keeps bcrypt fast in tests
const TEST_ROUNDS: u32 = 4;

#[test]
fn test_random_secret_lifecycle() {
    // ==========================================
    // STEP 1: Build with a random secret
    // ==========================================
    let bundle = build(&BuildRequest::random()).unwrap();
    assert!(bundle.is_random);
    assert!(bundle.salt.is_none());

    // ==========================================
    // STEP 2: The published condition commits to the preimage
    // ==========================================
    let condition = Condition::from_hex(&bundle.condition_hex).unwrap();
    assert_eq!(condition.condition_type, ConditionType::PreimageSha256);
    assert_eq!(condition.cost, 32);
    assert!(condition.subtypes.is_empty());

    // ==========================================
    // STEP 3: The fulfillment releases it
    // ==========================================
    let fulfillment = Fulfillment::from_hex(&bundle.fulfillment_hex).unwrap();
    let Fulfillment::PreimageSha256 { preimage } = fulfillment else {
        panic!("expected a preimage fulfillment");
    };
    assert_eq!(hex::encode(&preimage), bundle.preimage_hex);
    assert!(verify(&preimage, &bundle.condition_hex));
    assert_eq!(bundle.fee_drops, fee_drops(preimage.len()));
}

#[test]
fn test_password_secret_is_reproducible() {
    let request = BuildRequest::password("correct horse battery staple", "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh", SaltSource::Permanent)
        .with_rounds(TEST_ROUNDS);

    let first = build(&request).unwrap();
    let second = build(&request).unwrap();

    // Permanent-salt mode: identical inputs regenerate identical artifacts
    assert_eq!(first.preimage_hex, second.preimage_hex);
    assert_eq!(first.condition_hex, second.condition_hex);
    assert_eq!(first.fulfillment_hex, second.fulfillment_hex);
    assert_eq!(first.salt, second.salt);
    assert!(!first.is_random);
}

#[test]
fn test_pepper_separates_subjects() {
    let one = build(
        &BuildRequest::password("shared password", "rSubjectOne", SaltSource::Permanent)
            .with_rounds(TEST_ROUNDS),
    )
    .unwrap();
    let two = build(
        &BuildRequest::password("shared password", "rSubjectTwo", SaltSource::Permanent)
            .with_rounds(TEST_ROUNDS),
    )
    .unwrap();

    assert_ne!(one.preimage_hex, two.preimage_hex);
    assert_ne!(one.condition_hex, two.condition_hex);
}

#[test]
fn test_written_down_salt_recovers_the_secret() {
    // A user generates with a random salt and writes down password + salt
    let original = build(
        &BuildRequest::password("pw", "rAccount", SaltSource::Random).with_rounds(TEST_ROUNDS),
    )
    .unwrap();
    let salt = original.salt.clone().unwrap();
    assert!(salt.is_random);

    // Later, the same password and recorded salt rebuild the same condition
    let recovered = build(
        &BuildRequest::password("pw", "rAccount", SaltSource::Existing(salt.value))
            .with_rounds(TEST_ROUNDS),
    )
    .unwrap();
    assert_eq!(original.condition_hex, recovered.condition_hex);
    assert_eq!(original.preimage_hex, recovered.preimage_hex);
    assert!(!recovered.salt.unwrap().is_random);
}

#[test]
fn test_wrong_password_fails_verification() {
    let original = build(
        &BuildRequest::password("right password", "rAccount", SaltSource::Random)
            .with_rounds(TEST_ROUNDS),
    )
    .unwrap();
    let salt = original.salt.unwrap();

    let wrong = build(
        &BuildRequest::password("wrong password", "rAccount", SaltSource::Existing(salt.value))
            .with_rounds(TEST_ROUNDS),
    )
    .unwrap();

    assert_ne!(original.condition_hex, wrong.condition_hex);
    assert!(!verify_hex(&wrong.preimage_hex, &original.condition_hex).unwrap());
    assert!(verify_hex(&original.preimage_hex, &original.condition_hex).unwrap());
}

#[test]
fn test_bit_flipped_preimage_is_rejected() {
    let bundle = build(&BuildRequest::random()).unwrap();
    let mut preimage = hex::decode(&bundle.preimage_hex).unwrap();

    for byte in 0..preimage.len() {
        preimage[byte] ^= 0x80;
        assert!(
            !verify(&preimage, &bundle.condition_hex),
            "flip in byte {byte} went unnoticed"
        );
        preimage[byte] ^= 0x80;
    }
    assert!(verify(&preimage, &bundle.condition_hex));
}

#[test]
fn test_empty_password_is_a_caller_error() {
    let err = build(
        &BuildRequest::password("", "rAccount", SaltSource::Permanent).with_rounds(TEST_ROUNDS),
    )
    .unwrap_err();
    assert!(matches!(err, HashlockError::MissingField(_)));
}

#[test]
fn test_corrupted_recorded_salt_is_rejected() {
    let bundle = build(
        &BuildRequest::password("pw", "rAccount", SaltSource::Random).with_rounds(TEST_ROUNDS),
    )
    .unwrap();
    let mut salt = bundle.salt.unwrap().value;
    salt.truncate(20);

    let err = build(
        &BuildRequest::password("pw", "rAccount", SaltSource::Existing(salt))
            .with_rounds(TEST_ROUNDS),
    )
    .unwrap_err();
    assert!(matches!(err, HashlockError::InvalidSalt(_)));
}

#[test]
fn test_direct_engine_call_matches_builder() {
    let secret = secret::derive(
        "pw",
        "rAccount",
        &SaltSource::Permanent,
        TEST_ROUNDS,
    )
    .unwrap();
    let bundle = build(
        &BuildRequest::password("pw", "rAccount", SaltSource::Permanent).with_rounds(TEST_ROUNDS),
    )
    .unwrap();
    assert_eq!(secret.preimage_hex(), bundle.preimage_hex);
}

#[test]
fn test_bundle_json_shape() {
    let bundle = build(
        &BuildRequest::password("pw", "rAccount", SaltSource::Permanent).with_rounds(TEST_ROUNDS),
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&bundle).unwrap()).unwrap();
    assert!(json["condition_hex"].is_string());
    assert!(json["salt"]["value"].is_string());
    assert_eq!(json["salt"]["rounds"], TEST_ROUNDS);
    assert_eq!(json["is_random"], false);
}
