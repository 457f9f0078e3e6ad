#![cfg(feature = "api")]
#![allow(
    clippy::unwrap_used,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]

//! Integration tests for the REST client.
//!
//! Tests are organized by flow:
//! - `sign_in`: challenge, signature exchange and token checks
//! - `authenticated`: bearer requests and sign-out
//! - `gate`: the REST client as the session gate's profile fetcher

pub mod common;

mod sign_in {
    use std::str::FromStr as _;

    use httpmock::{Method::GET, Method::POST, MockServer};
    use payverge_client::api::{Client, Config};
    use payverge_client::auth::{ExposeSecret as _, LocalSigner, Signer as _};
    use payverge_client::error::{Kind, SessionError, Status};
    use payverge_client::session::{MemoryCookieStore, SessionRecord};
    use payverge_client::types::Utc;
    use reqwest::StatusCode;
    use serde_json::json;

    use crate::common::{CHAIN_ID, OTHER_WALLET, PRIVATE_KEY, WALLET, session_token};

    #[tokio::test]
    async fn sign_in_should_succeed() -> anyhow::Result<()> {
        let server = MockServer::start();
        let signer = LocalSigner::from_str(PRIVATE_KEY)?.with_chain_id(Some(CHAIN_ID));
        let token = session_token(WALLET, Utc::now().timestamp() + 3600);

        let challenge = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/auth/challenge")
                .query_param_exists("address");
            then.status(StatusCode::OK)
                .json_body(json!({ "nonce": "k2J9sd0a" }));
        });
        let sign_in = server.mock(|when, then| {
            when.method(POST).path("/api/v1/auth/signin");
            then.status(StatusCode::OK)
                .json_body(json!({ "token": token.expose_secret() }));
        });

        let client = Client::new(&server.base_url(), Config::default())?
            .sign_in(&signer)
            .await?;

        challenge.assert();
        sign_in.assert();
        assert_eq!(client.address(), WALLET);
        assert_eq!(client.token().expose_secret(), token.expose_secret());

        Ok(())
    }

    #[tokio::test]
    async fn sign_in_with_record_should_store_token() -> anyhow::Result<()> {
        let server = MockServer::start();
        let signer = LocalSigner::from_str(PRIVATE_KEY)?.with_chain_id(Some(CHAIN_ID));
        let token = session_token(WALLET, Utc::now().timestamp() + 3600);
        let record = SessionRecord::new(MemoryCookieStore::new());

        server.mock(|when, then| {
            when.method(GET).path("/api/v1/auth/challenge");
            then.status(StatusCode::OK).json_body(json!({ "nonce": "n" }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/auth/signin");
            then.status(StatusCode::OK)
                .json_body(json!({ "token": token.expose_secret() }));
        });

        Client::new(&server.base_url(), Config::default())?
            .sign_in_with_record(&signer, &record)
            .await?;

        let stored = record.get().unwrap();
        assert_eq!(stored.token.expose_secret(), token.expose_secret());
        assert!(stored.persist);

        Ok(())
    }

    #[tokio::test]
    async fn sign_in_without_chain_id_should_fail() -> anyhow::Result<()> {
        let server = MockServer::start();
        let signer = LocalSigner::from_str(PRIVATE_KEY)?;

        let challenge = server.mock(|when, then| {
            when.method(GET).path("/api/v1/auth/challenge");
            then.status(StatusCode::OK).json_body(json!({ "nonce": "n" }));
        });

        let err = Client::new(&server.base_url(), Config::default())?
            .sign_in(&signer)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Kind::Validation);
        challenge.assert_calls(0);

        Ok(())
    }

    #[tokio::test]
    async fn chain_id_from_config_should_succeed() -> anyhow::Result<()> {
        let server = MockServer::start();
        let signer = LocalSigner::from_str(PRIVATE_KEY)?;
        let token = session_token(WALLET, Utc::now().timestamp() + 3600);

        server.mock(|when, then| {
            when.method(GET).path("/api/v1/auth/challenge");
            then.status(StatusCode::OK).json_body(json!({ "nonce": "n" }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/auth/signin");
            then.status(StatusCode::OK)
                .json_body(json!({ "token": token.expose_secret() }));
        });

        let config = Config::builder()
            .chain_id(CHAIN_ID)
            .siwe_domain("pay.example.com")
            .build();
        let client = Client::new(&server.base_url(), config)?
            .sign_in(&signer)
            .await?;

        assert_eq!(client.address(), WALLET);

        Ok(())
    }

    #[tokio::test]
    async fn token_for_another_wallet_should_fail() -> anyhow::Result<()> {
        let server = MockServer::start();
        let signer = LocalSigner::from_str(PRIVATE_KEY)?.with_chain_id(Some(CHAIN_ID));
        let foreign = session_token(OTHER_WALLET, Utc::now().timestamp() + 3600);

        server.mock(|when, then| {
            when.method(GET).path("/api/v1/auth/challenge");
            then.status(StatusCode::OK).json_body(json!({ "nonce": "n" }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/auth/signin");
            then.status(StatusCode::OK)
                .json_body(json!({ "token": foreign.expose_secret() }));
        });

        let err = Client::new(&server.base_url(), Config::default())?
            .sign_in(&signer)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Kind::Session);
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::AddressMismatch { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn rejected_signature_should_fail() -> anyhow::Result<()> {
        let server = MockServer::start();
        let signer = LocalSigner::from_str(PRIVATE_KEY)?.with_chain_id(Some(CHAIN_ID));

        server.mock(|when, then| {
            when.method(GET).path("/api/v1/auth/challenge");
            then.status(StatusCode::OK).json_body(json!({ "nonce": "n" }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/auth/signin");
            then.status(StatusCode::UNAUTHORIZED)
                .json_body(json!({ "error": "invalid signature" }));
        });

        let err = Client::new(&server.base_url(), Config::default())?
            .sign_in(&signer)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), Kind::Status);
        let status = err.downcast_ref::<Status>().unwrap();
        assert_eq!(status.status_code, StatusCode::UNAUTHORIZED);
        assert_eq!(status.path, "/api/v1/auth/signin");

        Ok(())
    }
}

mod authenticated {
    use httpmock::{Method::GET, Method::POST, MockServer};
    use payverge_client::api::{Client, Config};
    use payverge_client::auth::ExposeSecret as _;
    use payverge_client::error::Kind;
    use payverge_client::session::{MemoryCookieStore, SessionRecord};
    use payverge_client::types::Utc;
    use reqwest::StatusCode;
    use serde_json::json;

    use crate::common::{WALLET, session_token};

    #[tokio::test]
    async fn profile_should_send_bearer_token() -> anyhow::Result<()> {
        let server = MockServer::start();
        let token = session_token(WALLET, Utc::now().timestamp() + 3600);
        let client = Client::new(&server.base_url(), Config::default())?
            .with_token(WALLET, token.clone());

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/users/address/0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
                .header(
                    "authorization",
                    format!("Bearer {}", token.expose_secret()),
                );
            then.status(StatusCode::OK).json_body(json!({
                "id": 11,
                "wallet_address": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
                "username": "alice",
                "role": "customer"
            }));
        });

        let profile = client.profile().await?;

        mock.assert();
        assert_eq!(profile.id, 11);
        assert_eq!(profile.address, WALLET);
        assert_eq!(profile.username.as_deref(), Some("alice"));

        Ok(())
    }

    #[tokio::test]
    async fn unauthenticated_lookup_should_omit_bearer() -> anyhow::Result<()> {
        let server = MockServer::start();
        let client = Client::new(&server.base_url(), Config::default())?;

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/users/address/0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
                .header_missing("authorization");
            then.status(StatusCode::OK).json_body(json!({
                "id": 11,
                "address": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
            }));
        });

        let profile = client.user_by_address(WALLET).await?;

        mock.assert();
        assert_eq!(profile.username, None);

        Ok(())
    }

    #[tokio::test]
    async fn sign_out_should_succeed() -> anyhow::Result<()> {
        let server = MockServer::start();
        let token = session_token(WALLET, Utc::now().timestamp() + 3600);
        let client = Client::new(&server.base_url(), Config::default())?
            .with_token(WALLET, token.clone());

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/auth/signout")
                .header(
                    "authorization",
                    format!("Bearer {}", token.expose_secret()),
                );
            then.status(StatusCode::NO_CONTENT);
        });

        let client = client.sign_out().await?;

        mock.assert();
        assert_eq!(client.host().as_str(), format!("{}/", server.base_url()));

        Ok(())
    }

    #[tokio::test]
    async fn sign_out_with_record_should_clear_even_on_failure() -> anyhow::Result<()> {
        let server = MockServer::start();
        let token = session_token(WALLET, Utc::now().timestamp() + 3600);
        let record = SessionRecord::new(MemoryCookieStore::new());
        record.set(&token);
        let client =
            Client::new(&server.base_url(), Config::default())?.with_token(WALLET, token);

        server.mock(|when, then| {
            when.method(POST).path("/api/v1/auth/signout");
            then.status(StatusCode::INTERNAL_SERVER_ERROR);
        });

        let err = client.sign_out_with_record(&record).await.unwrap_err();

        assert_eq!(err.kind(), Kind::Status);
        assert!(record.get().is_none());

        Ok(())
    }
}

mod gate {
    use httpmock::{Method::GET, MockServer};
    use payverge_client::api::{Client, Config};
    use payverge_client::session::{
        AuthState, CookieStore as _, MemoryCookieStore, SessionGate, SessionRecord,
    };
    use payverge_client::types::Utc;
    use reqwest::StatusCode;
    use serde_json::json;

    use crate::common::{OTHER_WALLET, WALLET, session_token};

    fn gate(server: &MockServer) -> (SessionGate<MemoryCookieStore, Client>, MemoryCookieStore) {
        let store = MemoryCookieStore::new();
        let client = Client::new(&server.base_url(), Config::default()).unwrap();
        (
            SessionGate::new(SessionRecord::new(store.clone()), client),
            store,
        )
    }

    #[tokio::test]
    async fn valid_session_should_resolve_profile() {
        let server = MockServer::start();
        let (gate, _store) = gate(&server);
        gate.store(&session_token(WALLET, Utc::now().timestamp() + 3600));

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/users/address/0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
                .header_exists("authorization");
            then.status(StatusCode::OK).json_body(json!({
                "id": 1,
                "address": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
                "username": "alice"
            }));
        });

        let state = gate.resolve(WALLET).await;

        mock.assert();
        assert_eq!(state.profile().unwrap().username.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn mismatched_wallet_should_clear_without_fetching() {
        let server = MockServer::start();
        let (gate, store) = gate(&server);
        gate.store(&session_token(OTHER_WALLET, Utc::now().timestamp() + 3600));

        let mock = server.mock(|when, then| {
            when.method(GET);
            then.status(StatusCode::OK);
        });

        let state = gate.resolve(WALLET).await;

        mock.assert_calls(0);
        assert_eq!(state, AuthState::Anonymous);
        assert!(store.get("session_token").is_none());
        assert!(store.get("persist-web3-login").is_none());
    }

    #[tokio::test]
    async fn backend_failure_should_keep_cookies() {
        let server = MockServer::start();
        let (gate, store) = gate(&server);
        gate.store(&session_token(WALLET, Utc::now().timestamp() + 3600));

        server.mock(|when, then| {
            when.method(GET);
            then.status(StatusCode::INTERNAL_SERVER_ERROR);
        });

        let state = gate.resolve(WALLET).await;

        assert_eq!(state, AuthState::Anonymous);
        assert!(store.get("token").is_some());
        assert!(store.get("session_token").is_some());
    }
}
