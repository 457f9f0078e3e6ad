use async_trait::async_trait;
use bon::Builder;
use reqwest::{
    Client as ReqwestClient, Method,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use secrecy::{ExposeSecret as _, SecretString};
use url::Url;

use super::types::request::{ChallengeRequest, SignInRequest};
use super::types::response::{ChallengeResponse, SignInResponse, UserProfile};
use crate::Result;
use crate::auth::state::{Authenticated, State, Unauthenticated};
use crate::auth::{Signer, SiweMessage};
use crate::error::{Error, SessionError};
use crate::session::{CookieStore, ProfileFetcher, SessionRecord, decode_jwt};
use crate::types::{Address, ChainId};

const DEFAULT_STATEMENT: &str = "Sign in to Payverge";

/// Configuration for [`Client`]
#[derive(Clone, Debug, Default, Builder)]
pub struct Config {
    /// `domain` of the sign-in message. Defaults to the host's authority.
    #[builder(into)]
    siwe_domain: Option<String>,
    /// Statement shown by the wallet. Defaults to "Sign in to Payverge".
    #[builder(into)]
    statement: Option<String>,
    /// Chain the sign-in is bound to. Defaults to the signer's chain id.
    chain_id: Option<ChainId>,
}

/// HTTP client for the Payverge REST API.
///
/// Starts [`Unauthenticated`]; [`Client::sign_in`] exchanges a wallet signature for a session
/// token and returns a [`Client<Authenticated>`] whose requests carry that token.
///
/// ```no_run
/// use std::str::FromStr as _;
///
/// use payverge_client::api::{Client, Config};
/// use payverge_client::auth::{LocalSigner, Signer as _};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let signer = LocalSigner::from_str("0x...")?.with_chain_id(Some(8453));
/// let client = Client::new("http://localhost:8080", Config::default())?
///     .sign_in(&signer)
///     .await?;
///
/// let me = client.profile().await?;
/// println!("signed in as {:?}", me.username);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client<S: State = Unauthenticated> {
    config: Config,
    state: S,
    host: Url,
    client: ReqwestClient,
}

impl<S: State> Client<S> {
    #[must_use]
    pub fn host(&self) -> &Url {
        &self.host
    }

    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Look up a user by wallet address. Sent with the bearer token when authenticated.
    pub async fn user_by_address(&self, address: Address) -> Result<UserProfile> {
        self.fetch_user(address, self.state.bearer()).await
    }

    async fn fetch_user(
        &self,
        address: Address,
        bearer: Option<&SecretString>,
    ) -> Result<UserProfile> {
        let request = self
            .client
            .request(
                Method::GET,
                format!(
                    "{}api/v1/users/address/{}",
                    self.host,
                    address.to_checksum(None)
                ),
            )
            .build()?;

        crate::request(&self.client, request, bearer_headers(bearer)?).await
    }
}

impl Client<Unauthenticated> {
    /// Creates a new unauthenticated client for `host`, e.g. `https://api.payverge.io`.
    pub fn new(host: &str, config: Config) -> Result<Client<Unauthenticated>> {
        let mut headers = HeaderMap::new();

        headers.insert("User-Agent", HeaderValue::from_static("payverge_client"));
        headers.insert("Accept", HeaderValue::from_static("*/*"));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = ReqwestClient::builder().default_headers(headers).build()?;

        Ok(Self {
            config,
            state: Unauthenticated,
            host: Url::parse(host)?,
            client,
        })
    }

    /// Fetch a sign-in nonce for `address`.
    pub async fn challenge(&self, address: Address) -> Result<ChallengeResponse> {
        let request = self
            .client
            .request(Method::GET, format!("{}api/v1/auth/challenge", self.host))
            .query(&ChallengeRequest::builder().address(address).build())
            .build()?;

        crate::request(&self.client, request, None).await
    }

    /// Sign in with `signer` and return the authenticated client.
    ///
    /// Fetches a nonce, signs a Sign-In-With-Ethereum message over it and exchanges the
    /// signature for a session token. A token bound to another wallet is rejected.
    pub async fn sign_in<S: Signer + Sync>(self, signer: &S) -> Result<Client<Authenticated>> {
        let address = signer.address();
        let chain_id = self.config.chain_id.or(signer.chain_id()).ok_or_else(|| {
            Error::validation("Chain id not set, be sure to provide one on the signer or in Config")
        })?;

        let ChallengeResponse { nonce } = self.challenge(address).await?;

        let message = SiweMessage::builder()
            .domain(self.siwe_domain())
            .address(address)
            .statement(
                self.config
                    .statement
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STATEMENT.to_owned()),
            )
            .uri(self.host.clone())
            .chain_id(chain_id)
            .nonce(nonce)
            .build();
        let signature = message.sign(signer).await?;

        let body = SignInRequest::builder()
            .message(message.to_string())
            .signature(signature.to_string())
            .address(address)
            .build();
        let request = self
            .client
            .request(Method::POST, format!("{}api/v1/auth/signin", self.host))
            .json(&body)
            .build()?;
        let response: SignInResponse = crate::request(&self.client, request, None).await?;

        let claims = decode_jwt(response.token.expose_secret());
        if let Some(bound) = claims.address
            && bound != address
        {
            return Err(SessionError::AddressMismatch {
                token: Some(bound),
                wallet: address,
            }
            .into());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(%address, chain_id, "Signed in");

        Ok(self.into_authenticated(address, response.token))
    }

    /// [`Client::sign_in`], then persist the issued token in `record`.
    pub async fn sign_in_with_record<S: Signer + Sync, C: CookieStore>(
        self,
        signer: &S,
        record: &SessionRecord<C>,
    ) -> Result<Client<Authenticated>> {
        let client = self.sign_in(signer).await?;
        record.set(&client.state.token);
        Ok(client)
    }

    /// Resume a session from a previously stored token, e.g. one read from the session cookies.
    #[must_use]
    pub fn with_token(self, address: Address, token: SecretString) -> Client<Authenticated> {
        self.into_authenticated(address, token)
    }

    fn into_authenticated(self, address: Address, token: SecretString) -> Client<Authenticated> {
        Client {
            config: self.config,
            state: Authenticated { address, token },
            host: self.host,
            client: self.client,
        }
    }

    fn siwe_domain(&self) -> String {
        self.config
            .siwe_domain
            .clone()
            .unwrap_or_else(|| self.host.authority().to_owned())
    }
}

impl Client<Authenticated> {
    #[must_use]
    pub fn address(&self) -> Address {
        self.state.address
    }

    #[must_use]
    pub fn token(&self) -> &SecretString {
        &self.state.token
    }

    /// Profile of the signed in wallet.
    pub async fn profile(&self) -> Result<UserProfile> {
        self.user_by_address(self.state.address).await
    }

    /// Revoke the session server side and demote to an unauthenticated client.
    pub async fn sign_out(self) -> Result<Client<Unauthenticated>> {
        let request = self
            .client
            .request(Method::POST, format!("{}api/v1/auth/signout", self.host))
            .build()?;

        crate::request::<()>(
            &self.client,
            request,
            bearer_headers(Some(&self.state.token))?,
        )
        .await?;

        Ok(Client {
            config: self.config,
            state: Unauthenticated,
            host: self.host,
            client: self.client,
        })
    }

    /// [`Client::sign_out`], then clear `record`.
    ///
    /// The record is cleared even when the server rejects the sign-out.
    pub async fn sign_out_with_record<C: CookieStore>(
        self,
        record: &SessionRecord<C>,
    ) -> Result<Client<Unauthenticated>> {
        let result = self.sign_out().await;
        record.clear();
        result
    }
}

#[async_trait]
impl<S: State + Send + Sync> ProfileFetcher for Client<S> {
    type Profile = UserProfile;

    async fn fetch_profile(&self, address: Address, token: &SecretString) -> Result<UserProfile> {
        self.fetch_user(address, Some(token)).await
    }
}

fn bearer_headers(token: Option<&SecretString>) -> Result<Option<HeaderMap>> {
    let Some(token) = token else {
        return Ok(None);
    };

    let mut value: HeaderValue = format!("Bearer {}", token.expose_secret()).parse()?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(Some(headers))
}
