use furnistore::{error::AppError, middleware::auth::decode_token, services::auth_service};
use uuid::Uuid;

fn set_secret() {
    // SAFETY: tests in this binary only ever write the same value.
    unsafe { std::env::set_var("JWT_SECRET", "test-secret") };
}

#[test]
fn token_round_trip_resolves_the_same_user() {
    set_secret();
    let user_id = Uuid::new_v4();
    let token = auth_service::issue_token(user_id).expect("issue token");
    let decoded = decode_token(&token).expect("decode token");
    assert_eq!(decoded, user_id);
}

#[test]
fn garbage_token_is_unauthorized() {
    set_secret();
    let err = decode_token("not-a-token").expect_err("must fail");
    assert!(matches!(err, AppError::Unauthorized(_)));
}
