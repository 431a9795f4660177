#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::config::SecurityConfig;
    use crate::state::AppState;
    use crate::tests::support::*;

    #[tokio::test]
    async fn test_root_banner() {
        let app = setup().await;
        let res = app.send(get("/", None)).await;
        assert_eq!(res.status, StatusCode::OK);
        let body = res.json();
        assert_eq!(body["message"], "PixelBrain API is up");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let app = setup().await;
        let res = app.send(get("/healthz", None)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(&res.body[..], b"ok");
    }

    #[tokio::test]
    async fn test_readyz_endpoint() {
        let app = setup().await;
        let res = app.send(get("/readyz", None)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(&res.body[..], b"ready");

        app.state.db.close().await;
        let res = app.send(get("/readyz", None)).await;
        assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = setup().await;
        app.send(
            crate::tests::support::json(
                "POST",
                "/users",
                None,
                serde_json::json!({"username": "m", "age": 1, "email": "m@example.com", "password": "pw"}),
            ),
        )
        .await;

        let res = app.send(get("/metrics", None)).await;
        assert_eq!(res.status, StatusCode::OK);
        let body = res.json();
        assert_eq!(body["users_created"], 1);
        assert_eq!(body["images_uploaded"], 0);
        assert!(body["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let app = setup().await;
        let res = app.send(get("/version", None)).await;
        assert_eq!(res.status, StatusCode::OK);
        let body = res.json();
        assert_eq!(body["name"], "pixelbrain");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["build"]["profile"].is_string());
    }

    #[tokio::test]
    async fn test_security_headers() {
        let app = setup().await;
        let res = app.send(get("/", None)).await;
        assert_eq!(res.headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(res.headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(res.headers.get("referrer-policy").unwrap(), "no-referrer");
        assert_eq!(res.headers.get("cache-control").unwrap(), "no-store");
        assert!(res.headers.get("strict-transport-security").is_none());

        // Plain-text answers stay cacheable
        let res = app.send(get("/healthz", None)).await;
        assert!(res.headers.get("cache-control").is_none());
    }

    #[tokio::test]
    async fn test_hsts_and_csp_from_config() {
        let app = setup().await;
        let mut cfg = (*app.state.config).clone();
        cfg.security = Some(SecurityConfig {
            enable_hsts: Some(true),
            hsts_max_age: Some(600),
            hsts_include_subdomains: Some(true),
            csp: Some("default-src 'none'".to_string()),
        });
        let state = AppState::with_services(app.state.db.clone(), cfg, app.classifier.clone(), app.store.clone());
        let router = crate::app::build_router(state);

        use tower::ServiceExt;
        let res = router.oneshot(get("/healthz", None)).await.unwrap();
        assert_eq!(res.headers().get("strict-transport-security").unwrap(), "max-age=600; includeSubDomains");
        assert_eq!(res.headers().get("content-security-policy").unwrap(), "default-src 'none'");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = setup().await;
        let res = app.send(get("/nope", None)).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }
}
