use super::*;

#[test]
fn test_forbidden_family_shares_4403() {
    let errors = [
        SessionError::FeatureDisabled,
        SessionError::PlatformUnsupported,
        SessionError::OriginRejected { origin: None },
        SessionError::IdentityNotPermitted {
            username: "mallory".to_string(),
        },
    ];
    for error in errors {
        assert_eq!(error.close_code(), 4403, "{error}");
        assert!(error.is_pre_acceptance());
    }
}

#[test]
fn test_close_codes() {
    assert_eq!(SessionError::Unauthenticated.close_code(), 4401);
    assert_eq!(
        SessionError::ProjectNotFound {
            project_id: "abc".to_string()
        }
        .close_code(),
        4404
    );
    assert_eq!(SessionError::ShellResolutionFailed.close_code(), 1011);
    assert_eq!(
        SessionError::SpawnFailed(PtyError::Unsupported).close_code(),
        1011
    );
    assert_eq!(
        SessionError::AdmissionRejected {
            username: "alice".to_string()
        }
        .close_code(),
        4429
    );
    assert_eq!(SessionError::IdleTimeout.close_code(), 4408);
}

#[test]
fn test_spawn_failure_is_post_acceptance() {
    let error = SessionError::from(PtyError::Spawn {
        command: "/bin/nope".to_string(),
        message: "not found".to_string(),
    });
    assert!(!error.is_pre_acceptance());
    assert!(error.to_string().contains("/bin/nope"));
}

#[test]
fn test_origin_rejected_display() {
    let error = SessionError::OriginRejected {
        origin: Some("https://evil.example".to_string()),
    };
    assert!(error.to_string().contains("evil.example"));
    assert_eq!(error.close_reason(), "origin not allowed");
}
