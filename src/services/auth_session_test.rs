use super::*;

#[test]
fn hex_encoding_pads_each_byte() {
    assert_eq!(bytes_to_hex(&[]), "");
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
    assert_eq!(bytes_to_hex(&[0xca, 0xfe, 0x00, 0x01]), "cafe0001");
}

#[test]
fn token_is_64_lowercase_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
}

#[test]
fn tokens_do_not_repeat() {
    let tokens = (0..100).map(|_| generate_token()).collect::<std::collections::HashSet<_>>();
    assert_eq!(tokens.len(), 100);
}

#[test]
fn session_rider_serializes_public_fields() {
    let rider = SessionRider {
        id: Uuid::nil(),
        email: "marco@example.com".into(),
        name: "Marco".into(),
        avatar_url: None,
    };
    let json = serde_json::to_value(&rider).unwrap();
    assert_eq!(json["email"], "marco@example.com");
    assert_eq!(json["name"], "Marco");
    assert!(json["avatar_url"].is_null());
}

// =============================================================================
// SessionCache
// =============================================================================

fn valid_session(rider_id: Uuid, expires_at: OffsetDateTime) -> ValidSession {
    ValidSession {
        rider: SessionRider { id: rider_id, email: "marco@example.com".into(), name: "Marco".into(), avatar_url: None },
        expires_at,
    }
}

#[test]
fn cache_returns_remembered_rider_until_expiry() {
    let cache = SessionCache::new();
    let now = OffsetDateTime::now_utc();
    let rider_id = Uuid::new_v4();
    cache.remember("tok", valid_session(rider_id, now + time::Duration::hours(1)));

    assert_eq!(cache.lookup("tok", now).map(|r| r.id), Some(rider_id));
    assert!(cache.lookup("tok", now + time::Duration::hours(2)).is_none());
    // Expired entries are dropped, not just hidden.
    assert!(cache.lookup("tok", now).is_none());
}

#[test]
fn cache_misses_unknown_and_forgotten_tokens() {
    let cache = SessionCache::new();
    let now = OffsetDateTime::now_utc();
    assert!(cache.lookup("tok", now).is_none());

    cache.remember("tok", valid_session(Uuid::new_v4(), now + time::Duration::hours(1)));
    cache.forget("tok");
    assert!(cache.lookup("tok", now).is_none());
}
