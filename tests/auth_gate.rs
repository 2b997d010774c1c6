use std::cell::Cell;

use spin_sdk::http::{Method, Request, Response};

use warble::auth::{self, AuthMode};
use warble::config::{user_key, Config};
use warble::core::db;
use warble::core::errors::ApiError;
use warble::core::store::{KvStore, MemoryStore};
use warble::models::models::User;
use warble::router;
use warble::token::TokenService;
use warble::AppContext;

fn context() -> (AppContext, MemoryStore) {
    let store = MemoryStore::new();
    (AppContext::new(Config::default(), store.clone()), store)
}

fn create_user(ctx: &AppContext, name: &str) -> User {
    let user = User::new(name.to_string(), format!("{name}@example.com"), "hash".to_string());
    db::insert_user(ctx.store(), &user).unwrap();
    user
}

fn request(method: Method, uri: &str, authorization: Option<&str>) -> Request {
    let mut builder = Request::builder();
    builder.method(method).uri(uri);
    if let Some(value) = authorization {
        builder.header("authorization", value);
    }
    builder.body(Vec::new()).build()
}

fn ok() -> Result<Response, ApiError> {
    Ok(Response::builder().status(200).build())
}

#[test]
fn tokens_are_deterministic_and_verifiable() {
    let tokens = TokenService::new("secret");
    let user = User::new("alice".into(), "alice@example.com".into(), "hash".into());

    let token = tokens.issue(&user).unwrap();
    assert_eq!(token, tokens.issue(&user).unwrap());

    let claims = tokens.verify(&token).unwrap();
    assert_eq!(claims.user_id, user.id);
    assert_eq!(claims.email, "alice@example.com");
}

#[test]
fn tampered_and_foreign_tokens_are_rejected() {
    let tokens = TokenService::new("secret");
    let user = User::new("alice".into(), "alice@example.com".into(), "hash".into());
    let token = tokens.issue(&user).unwrap();

    let mut tampered = token.clone();
    tampered.push('x');
    assert!(tokens.verify(&tampered).is_err());
    assert!(tokens.verify("not.a.token").is_err());

    let other = TokenService::new("another secret");
    assert!(other.verify(&token).is_err());
}

#[test]
fn required_without_header_never_runs_handler() {
    let (ctx, _store) = context();
    let called = Cell::new(false);

    let req = request(Method::Post, "/tweets", None);
    let result = auth::required(&ctx, &req, |_| {
        called.set(true);
        ok()
    });

    assert!(matches!(result, Err(ApiError::Forbidden(_))));
    assert!(!called.get());
}

#[test]
fn public_without_header_is_anonymous() {
    let (ctx, _store) = context();
    let req = request(Method::Get, "/tweets/abc", None);

    let seen = Cell::new(None);
    auth::public(&ctx, &req, |viewer| {
        seen.set(Some(viewer.is_none()));
        ok()
    })
    .unwrap();
    assert_eq!(seen.get(), Some(true));
}

#[test]
fn valid_token_resolves_user_in_both_modes() {
    let (ctx, _store) = context();
    let alice = create_user(&ctx, "alice");
    let header = format!("Bearer {}", ctx.tokens.issue(&alice).unwrap());
    let req = request(Method::Get, "/tweets", Some(header.as_str()));

    let user = auth::authenticate(&ctx, &req, AuthMode::Required).unwrap().unwrap();
    assert_eq!(user.id, alice.id);
    let user = auth::authenticate(&ctx, &req, AuthMode::Public).unwrap().unwrap();
    assert_eq!(user.username, "alice");
}

#[test]
fn any_scheme_word_is_accepted_before_the_token() {
    let (ctx, _store) = context();
    let alice = create_user(&ctx, "alice");
    let token = ctx.tokens.issue(&alice).unwrap();

    for header in [format!("Token {token}"), format!("Basic {token}"), format!("bearer  {token}")] {
        let req = request(Method::Get, "/tweets", Some(header.as_str()));
        let user = auth::authenticate(&ctx, &req, AuthMode::Required).unwrap().unwrap();
        assert_eq!(user.id, alice.id, "{header:?} should resolve alice");
    }
}

#[test]
fn bad_headers_are_forbidden_in_both_modes() {
    let (ctx, _store) = context();
    let alice = create_user(&ctx, "alice");
    let token = ctx.tokens.issue(&alice).unwrap();
    let foreign = TokenService::new("another secret").issue(&alice).unwrap();

    let headers = [
        "Bearer garbage".to_string(),
        "Bearer".to_string(),
        token.clone(),
        format!("Bearer {foreign}"),
    ];
    for header in &headers {
        for mode in [AuthMode::Required, AuthMode::Public] {
            let req = request(Method::Get, "/tweets", Some(header.as_str()));
            let result = auth::authenticate(&ctx, &req, mode);
            assert!(
                matches!(result, Err(ApiError::Forbidden(_))),
                "{header:?} in {mode:?} should be forbidden"
            );
        }
    }
}

#[test]
fn token_for_deleted_user_is_forbidden() {
    let (ctx, store) = context();
    let alice = create_user(&ctx, "alice");
    let header = format!("Bearer {}", ctx.tokens.issue(&alice).unwrap());
    store.delete(&user_key(&alice.id)).unwrap();

    let req = request(Method::Get, "/tweets", Some(header.as_str()));
    match auth::authenticate(&ctx, &req, AuthMode::Required) {
        Err(ApiError::Forbidden(msg)) => assert_eq!(msg, "Could not find user provided by Authorization"),
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[test]
fn router_rejects_unauthenticated_writes() {
    let (ctx, store) = context();
    let alice = create_user(&ctx, "alice");
    let entries = store.len();

    let resp = router::route(&ctx, request(Method::Post, "/tweets", None));
    assert_eq!(*resp.status(), 403);
    let resp = router::route(&ctx, request(Method::Put, &format!("/users/{}/follow", alice.id), None));
    assert_eq!(*resp.status(), 403);

    assert_eq!(store.len(), entries);
}
