use super::*;

#[test]
fn test_generate_and_validate_token() {
    let store = AuthStore::new(true);
    let (token, hash) = store.generate_token("alice", "laptop").unwrap();

    assert!(token.starts_with(TOKEN_PREFIX));
    assert_eq!(hash, AuthStore::token_digest(&token));

    let identity = store.validate_token(&token).unwrap();
    assert_eq!(identity.username, "alice");
}

#[test]
fn test_register_hashed_token() {
    let store = AuthStore::new(true);
    let digest = AuthStore::token_digest("s3cret");
    store.register_hashed("bob", &digest.to_uppercase(), "config").unwrap();

    assert_eq!(store.validate_token("s3cret").unwrap().username, "bob");
    assert_eq!(store.active_token_count(), 1);
}

#[test]
fn test_register_rejects_malformed_hash() {
    let store = AuthStore::new(true);
    assert!(matches!(
        store.register_hashed("bob", "abc", "short"),
        Err(AuthError::InvalidHash(_))
    ));
    assert!(matches!(
        store.register_hashed("bob", &"zz".repeat(32), "not hex"),
        Err(AuthError::InvalidHash(_))
    ));
}

#[test]
fn test_invalid_token() {
    let store = AuthStore::new(true);
    assert!(matches!(
        store.validate_token("invalid_token"),
        Err(AuthError::InvalidCredentials)
    ));
}

#[test]
fn test_empty_token() {
    let store = AuthStore::new(true);
    assert!(matches!(
        store.validate_token("  "),
        Err(AuthError::MissingCredentials)
    ));
}

#[test]
fn test_revoke_token() {
    let store = AuthStore::new(true);
    let (token, hash) = store.generate_token("alice", "test").unwrap();

    // Should work before revocation
    assert!(store.validate_token(&token).is_ok());

    store.revoke(&hash).unwrap();

    assert!(matches!(
        store.validate_token(&token),
        Err(AuthError::TokenRevoked)
    ));
    assert_eq!(store.active_token_count(), 0);
    assert!(store.revoke(&"0".repeat(64)).is_err());
}

#[test]
fn test_disabled_auth_is_anonymous() {
    let store = AuthStore::new(false);
    assert_eq!(store.validate_token("anything").unwrap(), Identity::anonymous());
    assert_eq!(store.verify(None).unwrap().username, ANONYMOUS_USER);
}

#[test]
fn test_verify_requires_credential() {
    let store = AuthStore::new(true);
    assert!(matches!(
        store.verify(None),
        Err(AuthError::MissingCredentials)
    ));

    let (token, _) = store.generate_token("carol", "cli").unwrap();
    assert_eq!(store.verify(Some(&token)).unwrap().username, "carol");
}

#[test]
fn test_list_tokens_hides_raw_values() {
    let store = AuthStore::new(true);
    let (token, hash) = store.generate_token("alice", "laptop").unwrap();

    let listed = store.list_tokens().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].token_hash, hash);
    assert_eq!(listed[0].label, "laptop");
    assert_ne!(listed[0].token_hash, token);
}
