/// Integration tests for sessions: login, logout, password flows,
/// invitations and token revocation on role change

mod common;

use axum::http::StatusCode;
use common::{TestContext, PASSWORD};
use serde_json::json;
use triage_shared::auth::password::hash_password;
use triage_shared::models::user::{CreateUser, UserStatus};
use triage_shared::realtime::ChangeOp;
use triage_shared::store::Store;

async fn login(ctx: &TestContext, email: &str, password: &str) -> common::TestResponse {
    ctx.post(
        "/api/auth/login",
        None,
        json!({ "email": email, "password": password }),
    )
    .await
}

fn access_token(res: &common::TestResponse) -> String {
    res.body["data"]["access_token"]
        .as_str()
        .expect("session token in response")
        .to_string()
}

#[tokio::test]
async fn test_login_and_post_login_redirect() {
    let ctx = TestContext::new().await;

    let res = login(&ctx, "admin@acme.test", PASSWORD).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["token_type"], "Bearer");
    assert_eq!(res.body["data"]["user"]["email"], "admin@acme.test");
    assert!(res.body["data"]["user"].get("password_hash").is_none());

    let token = access_token(&res);
    let landing = ctx.get("/api/auth/post-login", Some(&token)).await;
    assert_eq!(landing.status, StatusCode::OK);
    assert_eq!(landing.body["data"]["redirect_to"], "/dashboard");

    let manager = login(&ctx, "billing.lead@acme.test", PASSWORD).await;
    let landing = ctx
        .get("/api/auth/post-login", Some(&access_token(&manager)))
        .await;
    assert_eq!(landing.body["data"]["redirect_to"], "/escalations");

    let agent = login(&ctx, "agent@acme.test", PASSWORD).await;
    let landing = ctx
        .get("/api/auth/post-login", Some(&access_token(&agent)))
        .await;
    assert_eq!(landing.body["data"]["redirect_to"], "/emails");
}

#[tokio::test]
async fn test_unknown_role_lands_on_unauthorized() {
    let ctx = TestContext::new().await;
    let odd = common::create_user(&ctx.store, ctx.tenant.id, None, "odd@acme.test", "superuser").await;

    let res = ctx
        .get("/api/auth/post-login", Some(&ctx.token_for(&odd)))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["redirect_to"], "/unauthorized");
}

#[tokio::test]
async fn test_login_failures() {
    let ctx = TestContext::new().await;

    let wrong = login(&ctx, "admin@acme.test", "not-the-password1").await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let unknown = login(&ctx, "nobody@acme.test", PASSWORD).await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["message"], unknown.body["message"]);

    let malformed = login(&ctx, "not-an-email", PASSWORD).await;
    assert_eq!(malformed.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(malformed.body["details"][0]["field"], "email");
}

#[tokio::test]
async fn test_login_is_case_insensitive_on_email() {
    let ctx = TestContext::new().await;

    let res = login(&ctx, "Admin@Acme.TEST", PASSWORD).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let ctx = TestContext::new().await;

    let missing = ctx.get("/api/emails", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let garbage = ctx.get("/api/emails", Some("not.a.jwt")).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_change_revokes_existing_token() {
    let ctx = TestContext::new().await;
    let old_token = ctx.token_for(&ctx.agent);

    let before = ctx.get("/api/emails", Some(&old_token)).await;
    assert_eq!(before.status, StatusCode::OK);

    let res = ctx
        .patch(
            &format!("/api/users/{}", ctx.agent.id),
            Some(&ctx.token_for(&ctx.admin)),
            json!({ "role": "manager" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["role"], "manager");

    let after = ctx.get("/api/emails", Some(&old_token)).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
    assert_eq!(after.body["error"], "role_changed");

    // A fresh session carries the new role and the manager's scope
    let relogin = login(&ctx, "agent@acme.test", PASSWORD).await;
    let escalations = ctx
        .get("/api/escalations", Some(&access_token(&relogin)))
        .await;
    assert_eq!(escalations.status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_sessions() {
    let ctx = TestContext::new().await;

    let session = login(&ctx, "agent@acme.test", PASSWORD).await;
    let token = access_token(&session);

    let res = ctx.post("/api/auth/logout", Some(&token), json!({})).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["signed_out"], true);

    let after = ctx.get("/api/emails", Some(&token)).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);

    let again = login(&ctx, "agent@acme.test", PASSWORD).await;
    let fresh = ctx.get("/api/emails", Some(&access_token(&again))).await;
    assert_eq!(fresh.status, StatusCode::OK);
}

#[tokio::test]
async fn test_deactivated_user_is_rejected() {
    let ctx = TestContext::new().await;

    let gone = ctx
        .store
        .create_user(CreateUser {
            tenant_id: ctx.tenant.id,
            department_id: Some(ctx.billing.id),
            email: "gone@acme.test".to_string(),
            name: Some("Gone".to_string()),
            role: "agent".to_string(),
            status: UserStatus::Deactivated,
            password_hash: Some(hash_password(PASSWORD).unwrap()),
        })
        .await
        .unwrap();

    let res = ctx.get("/api/emails", Some(&ctx.token_for(&gone))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let login_res = login(&ctx, "gone@acme.test", PASSWORD).await;
    assert_eq!(login_res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forgot_and_reset_password() {
    let ctx = TestContext::new().await;

    let unknown = ctx
        .post(
            "/api/auth/forgot-password",
            None,
            json!({ "email": "nobody@acme.test" }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::OK);
    assert!(unknown.body["data"].get("reset_token").is_none());

    let known = ctx
        .post(
            "/api/auth/forgot-password",
            None,
            json!({ "email": "agent@acme.test" }),
        )
        .await;
    assert_eq!(known.status, StatusCode::OK);
    assert_eq!(known.body["data"]["message"], unknown.body["data"]["message"]);
    let reset_token = known.body["data"]["reset_token"].as_str().unwrap().to_string();

    let weak = ctx
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "token": reset_token, "password": "short" }),
        )
        .await;
    assert_eq!(weak.status, StatusCode::UNPROCESSABLE_ENTITY);

    let reset = ctx
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "token": reset_token, "password": "brand-new-pass-9" }),
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK, "{}", reset.body);

    assert_eq!(
        login(&ctx, "agent@acme.test", PASSWORD).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&ctx, "agent@acme.test", "brand-new-pass-9").await.status,
        StatusCode::OK
    );

    let reused = ctx
        .post(
            "/api/auth/reset-password",
            None,
            json!({ "token": reset_token, "password": "another-pass-10" }),
        )
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_token_hidden_in_production() {
    let ctx = TestContext::with_env(&[("ENVIRONMENT", "production")]).await;

    let res = ctx
        .post(
            "/api/auth/forgot-password",
            None,
            json!({ "email": "agent@acme.test" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["data"].get("reset_token").is_none());
}

#[tokio::test]
async fn test_update_password_rotates_session() {
    let ctx = TestContext::new().await;
    let old_token = ctx.token_for(&ctx.billing_manager);

    let wrong = ctx
        .post(
            "/api/auth/update-password",
            Some(&old_token),
            json!({ "current_password": "nope-nope-1", "new_password": "rotated-pass-22" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);

    let res = ctx
        .post(
            "/api/auth/update-password",
            Some(&old_token),
            json!({ "current_password": PASSWORD, "new_password": "rotated-pass-22" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    let new_token = access_token(&res);

    assert_eq!(
        ctx.get("/api/escalations", Some(&old_token)).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        ctx.get("/api/escalations", Some(&new_token)).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_manager_invite_and_accept() {
    let ctx = TestContext::new().await;
    let token = ctx.token_for(&ctx.billing_manager);

    let res = ctx
        .post(
            "/api/users/invite",
            Some(&token),
            json!({ "email": "new.agent@acme.test", "role": "agent", "departmentId": ctx.billing.id }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.body["data"]["user"]["status"], "invited");
    assert_eq!(res.body["data"]["user"]["department_id"], ctx.billing.id.to_string());
    let invite_token = res.body["data"]["invite_token"].as_str().unwrap().to_string();

    let published = ctx.changes.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].table, "users");
    assert_eq!(published[0].op, ChangeOp::Insert);

    // Invited accounts cannot sign in yet
    assert_eq!(
        login(&ctx, "new.agent@acme.test", "welcome-aboard-1").await.status,
        StatusCode::UNAUTHORIZED
    );

    let accepted = ctx
        .post(
            "/api/auth/accept-invite",
            None,
            json!({ "token": invite_token, "password": "welcome-aboard-1", "name": "New Agent" }),
        )
        .await;
    assert_eq!(accepted.status, StatusCode::OK, "{}", accepted.body);
    assert_eq!(accepted.body["data"]["user"]["status"], "active");
    assert_eq!(accepted.body["data"]["user"]["name"], "New Agent");

    let emails = ctx
        .get("/api/emails", Some(&access_token(&accepted)))
        .await;
    assert_eq!(emails.status, StatusCode::OK);

    let replay = ctx
        .post(
            "/api/auth/accept-invite",
            None,
            json!({ "token": invite_token, "password": "welcome-aboard-1" }),
        )
        .await;
    assert_eq!(replay.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invite_permissions() {
    let ctx = TestContext::new().await;
    let manager = ctx.token_for(&ctx.billing_manager);

    let admin_invite = ctx
        .post(
            "/api/users/invite",
            Some(&manager),
            json!({ "email": "boss@acme.test", "role": "admin" }),
        )
        .await;
    assert_eq!(admin_invite.status, StatusCode::FORBIDDEN);

    let other_department = ctx
        .post(
            "/api/users/invite",
            Some(&manager),
            json!({ "email": "s@acme.test", "role": "agent", "departmentId": ctx.sales.id }),
        )
        .await;
    assert_eq!(other_department.status, StatusCode::FORBIDDEN);

    let agent = ctx
        .post(
            "/api/users/invite",
            Some(&ctx.token_for(&ctx.agent)),
            json!({ "email": "x@acme.test", "role": "agent", "departmentId": ctx.billing.id }),
        )
        .await;
    assert_eq!(agent.status, StatusCode::FORBIDDEN);

    let admin = ctx.token_for(&ctx.admin);

    let duplicate = ctx
        .post(
            "/api/users/invite",
            Some(&admin),
            json!({ "email": "AGENT@acme.test", "role": "agent", "departmentId": ctx.billing.id }),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let headless_manager = ctx
        .post(
            "/api/users/invite",
            Some(&admin),
            json!({ "email": "lead@acme.test", "role": "manager" }),
        )
        .await;
    assert_eq!(headless_manager.status, StatusCode::BAD_REQUEST);

    let new_admin = ctx
        .post(
            "/api/users/invite",
            Some(&admin),
            json!({ "email": "second.admin@acme.test", "role": "admin" }),
        )
        .await;
    assert_eq!(new_admin.status, StatusCode::CREATED);
}
