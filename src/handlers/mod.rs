pub mod assignments;
pub mod cards;
pub mod customers;

use axum::{Router, routing::post};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Assignment protocol
        .route("/api/cards/validate", post(cards::validate_card))
        .route("/api/customers/verify", post(customers::verify_customer))
        .route("/api/assignments/initiate", post(assignments::initiate_assignment))
        .route("/api/assignments/verify-otp", post(assignments::verify_assignment_otp))
        .route("/api/assignments/resend-otp", post(assignments::resend_assignment_otp))
        // Out-of-band provisioning
        .route("/api/cards", post(cards::provision_card))
        .route("/api/customers", post(customers::register_customer))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::{
        config::ServerConfig,
        crypto::AesKey,
        db::{memory_pool, queries},
        otp::RecordingOtpSender,
    };

    pub(crate) fn test_config(resend_cooldown_secs: i64) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            code_key: None,
            otp_ttl_secs: 300,
            resend_cooldown_secs,
        }
    }

    /// Seeds TR001 (available), TR002 (assigned), TR003 (delivered) and three customers
    pub(crate) async fn seeded_state(
        resend_cooldown_secs: i64,
    ) -> (AppState, Arc<RecordingOtpSender>) {
        let pool = memory_pool().await;
        for serial in ["TR001", "TR002", "TR003"] {
            queries::insert_card(&pool, serial).await.unwrap();
        }
        sqlx::query("UPDATE cards SET status = 'assigned' WHERE serial_number = 'TR002'")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE cards SET status = 'delivered' WHERE serial_number = 'TR003'")
            .execute(&pool)
            .await
            .unwrap();
        for (mobile, name, is_registered, is_active) in [
            ("+15550102030", "Ada", true, true),
            ("+15550100001", "Bob", false, true),
            ("+15550100002", "Cy", true, false),
        ] {
            queries::upsert_customer(&pool, mobile, name, is_registered, is_active)
                .await
                .unwrap();
        }

        let sender = Arc::new(RecordingOtpSender::default());
        let state = AppState {
            pool,
            config: Arc::new(test_config(resend_cooldown_secs)),
            code_key: AesKey::generate(),
            otp_sender: sender.clone(),
        };
        (state, sender)
    }

    const VALIDATE: &str = "/api/cards/validate";
    const VERIFY_CUSTOMER: &str = "/api/customers/verify";
    const INITIATE: &str = "/api/assignments/initiate";
    const VERIFY_OTP: &str = "/api/assignments/verify-otp";
    const RESEND: &str = "/api/assignments/resend-otp";

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn pair(card_serial: &str, customer_mobile: &str) -> Value {
        json!({"card_serial": card_serial, "customer_mobile": customer_mobile})
    }

    fn otp_for_tr001(otp: &str) -> Value {
        json!({"card_serial": "TR001", "customer_mobile": "+15550102030", "otp": otp})
    }

    fn wrong_otp(otp: &str) -> &'static str {
        if otp == "000000" { "111111" } else { "000000" }
    }

    #[tokio::test]
    async fn test_validate_card_outcomes() {
        let (state, _) = seeded_state(20).await;
        let app = build_router(state);

        let (status, body) = post_json(&app, VALIDATE, json!({"serial_number": " tr001 "})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"valid": true}));

        let (_, body) = post_json(&app, VALIDATE, json!({"serial_number": "TR404"})).await;
        assert_eq!(body["valid"], false);
        assert_eq!(body["error"]["code"], "CARD_NOT_FOUND");

        let (_, body) = post_json(&app, VALIDATE, json!({"serial_number": "tr002"})).await;
        assert_eq!(body["error"]["code"], "CARD_ALREADY_ASSIGNED");

        let (_, body) = post_json(&app, VALIDATE, json!({"serial_number": "TR003"})).await;
        assert_eq!(body["error"]["code"], "CARD_DELIVERED");

        let (status, body) = post_json(&app, VALIDATE, json!({"serial_number": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_verify_customer() {
        let (state, _) = seeded_state(20).await;
        let app = build_router(state);

        let (status, body) =
            post_json(&app, VERIFY_CUSTOMER, json!({"mobile_number": "+1 555 010 2030"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ada");
        assert_eq!(body["is_registered"], true);
        assert_eq!(body["can_assign_card"], true);

        let (_, body) =
            post_json(&app, VERIFY_CUSTOMER, json!({"mobile_number": "+15550100002"})).await;
        assert_eq!(body["is_registered"], true);
        assert_eq!(body["can_assign_card"], false);

        let (status, body) =
            post_json(&app, VERIFY_CUSTOMER, json!({"mobile_number": "+19999999999"})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "CUSTOMER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_initiate_rejects_before_dispatch() {
        let (state, sender) = seeded_state(20).await;
        let app = build_router(state);

        let (status, body) = post_json(&app, INITIATE, pair("TR002", "+15550102030")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CARD_ALREADY_ASSIGNED");

        let (status, body) = post_json(&app, INITIATE, pair("TR001", "+15550100001")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "CUSTOMER_NOT_REGISTERED");

        let (_, body) = post_json(&app, INITIATE, pair("TR001", "+15550100002")).await;
        assert_eq!(body["code"], "CUSTOMER_INACTIVE");

        assert_eq!(sender.count(), 0);
    }

    #[tokio::test]
    async fn test_full_assignment_with_wrong_otp_first() {
        let (state, sender) = seeded_state(20).await;
        let pool = state.pool.clone();
        let app = build_router(state);

        let (status, body) = post_json(&app, INITIATE, pair("tr001", "+15550102030")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OTP sent to ***2030");
        let otp = sender.last_otp().unwrap();

        let (status, body) = post_json(&app, VERIFY_OTP, otp_for_tr001(wrong_otp(&otp))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_OTP");

        let (status, body) = post_json(&app, VERIFY_OTP, otp_for_tr001(&otp)).await;
        assert_eq!(status, StatusCode::OK);
        let hashed_code = body["hashed_code"].as_str().unwrap().to_string();
        assert_eq!(hashed_code.len(), 32);

        let card = queries::get_card(&pool, "TR001").await.unwrap().unwrap();
        assert_eq!(card.status, "assigned");
        assert_eq!(card.hashed_code.as_deref(), Some(hashed_code.as_str()));

        // The pending assignment is consumed
        let (status, body) = post_json(&app, VERIFY_OTP, otp_for_tr001(&otp)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NO_PENDING_ASSIGNMENT");
    }

    #[tokio::test]
    async fn test_expired_otp() {
        let (state, sender) = seeded_state(20).await;
        let pool = state.pool.clone();
        let app = build_router(state);

        post_json(&app, INITIATE, pair("TR001", "+15550102030")).await;
        let otp = sender.last_otp().unwrap();

        sqlx::query("UPDATE pending_assignments SET otp_expires_at = '2000-01-01 00:00:00'")
            .execute(&pool)
            .await
            .unwrap();

        let (status, body) = post_json(&app, VERIFY_OTP, otp_for_tr001(&otp)).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["code"], "OTP_EXPIRED");
    }

    #[tokio::test]
    async fn test_repeated_wrong_otps_drop_pending() {
        let (state, sender) = seeded_state(20).await;
        let pool = state.pool.clone();
        let app = build_router(state);

        post_json(&app, INITIATE, pair("TR001", "+15550102030")).await;
        let otp = sender.last_otp().unwrap();
        let wrong = wrong_otp(&otp);

        for _ in 1..assignments::MAX_OTP_ATTEMPTS {
            let (status, body) = post_json(&app, VERIFY_OTP, otp_for_tr001(wrong)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["code"], "INVALID_OTP");
        }

        let (status, body) = post_json(&app, VERIFY_OTP, otp_for_tr001(wrong)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "OTP_ATTEMPTS_EXCEEDED");

        // Even the right OTP is useless now; the card stays available
        let (status, body) = post_json(&app, VERIFY_OTP, otp_for_tr001(&otp)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NO_PENDING_ASSIGNMENT");
        let card = queries::get_card(&pool, "TR001").await.unwrap().unwrap();
        assert_eq!(card.status, "available");

        // A fresh dispatch starts a fresh count
        post_json(&app, INITIATE, pair("TR001", "+15550102030")).await;
        let otp = sender.last_otp().unwrap();
        let (status, _) = post_json(&app, VERIFY_OTP, otp_for_tr001(wrong_otp(&otp))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = post_json(&app, VERIFY_OTP, otp_for_tr001(&otp)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_resend_respects_cooldown() {
        let (state, sender) = seeded_state(20).await;
        let app = build_router(state);

        let (status, body) = post_json(&app, RESEND, pair("TR001", "+15550102030")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NO_PENDING_ASSIGNMENT");

        post_json(&app, INITIATE, pair("TR001", "+15550102030")).await;
        let (status, body) = post_json(&app, RESEND, pair("TR001", "+15550102030")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "OTP_RESEND_TOO_SOON");
        assert_eq!(sender.count(), 1);
    }

    #[tokio::test]
    async fn test_resend_replaces_otp() {
        let (state, sender) = seeded_state(0).await;
        let app = build_router(state);

        post_json(&app, INITIATE, pair("TR001", "+15550102030")).await;
        let (status, _) = post_json(&app, RESEND, pair("TR001", "+15550102030")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sender.count(), 2);

        let otp = sender.last_otp().unwrap();
        let (status, _) = post_json(&app, VERIFY_OTP, otp_for_tr001(&otp)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_provisioning_routes() {
        let (state, _) = seeded_state(20).await;
        let app = build_router(state);

        let (status, body) = post_json(&app, "/api/cards", json!({"serial_number": " new01 "})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["serial_number"], "NEW01");
        assert_eq!(body["status"], "available");

        let (status, _) = post_json(&app, "/api/cards", json!({"serial_number": "NEW01"})).await;
        assert_eq!(status, StatusCode::OK);

        let customer = json!({"mobile_number": "+1 555 777 0000", "name": "Dee"});
        let (status, body) = post_json(&app, "/api/customers", customer).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["can_assign_card"], true);
    }
}
