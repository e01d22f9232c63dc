use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::instrument;

use shopiform_core::ShopDomain;

use super::mutations::{
    COMPANY_CREATE, CUSTOMER_CREATE, CUSTOMER_UPDATE, CompanyCreateInput, CustomerInput,
};
use super::{AdminShopifyError, CompanyCreatePayload, CustomerPayload, GraphQLError};

/// Builds per-shop [`AdminClient`]s that share one HTTP connection pool.
#[derive(Clone)]
pub struct AdminConnector {
    http: reqwest::Client,
    api_version: String,
    base_url: Option<String>,
}

impl AdminConnector {
    /// `http` should already carry the outbound request timeout.
    #[must_use]
    pub fn new(http: reqwest::Client, api_version: impl Into<String>) -> Self {
        Self {
            http,
            api_version: api_version.into(),
            base_url: None,
        }
    }

    /// Send every request to `base_url` instead of `https://{shop}`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Client for one shop using that shop's access token.
    #[must_use]
    pub fn connect(&self, shop: &ShopDomain, access_token: SecretString) -> AdminClient {
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{shop}"));
        AdminClient {
            http: self.http.clone(),
            endpoint: format!("{base}/admin/api/{}/graphql.json", self.api_version),
            shop: shop.clone(),
            access_token,
        }
    }
}

/// Admin API client bound to one shop.
pub struct AdminClient {
    http: reqwest::Client,
    endpoint: String,
    shop: ShopDomain,
    access_token: SecretString,
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("endpoint", &self.endpoint)
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct GraphQLRequest<'a, V: Serialize> {
    query: &'a str,
    variables: V,
}

#[derive(Serialize)]
struct InputVariables<I: Serialize> {
    input: I,
}

#[derive(Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQLError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerCreateData {
    customer_create: Option<CustomerPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerUpdateData {
    customer_update: Option<CustomerPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompanyCreateData {
    company_create: Option<CompanyCreatePayload>,
}

impl AdminClient {
    /// The shop this client acts for.
    #[must_use]
    pub const fn shop(&self) -> &ShopDomain {
        &self.shop
    }

    /// Run `customerCreate`.
    ///
    /// # Errors
    ///
    /// Returns `AdminShopifyError::GraphQL` for top-level GraphQL errors and
    /// a transport variant when the request itself fails. `userErrors` are
    /// returned in the payload.
    #[instrument(skip(self, input), fields(shop = %self.shop))]
    pub async fn customer_create(
        &self,
        input: &CustomerInput,
    ) -> Result<CustomerPayload, AdminShopifyError> {
        let data: CustomerCreateData = self.execute(CUSTOMER_CREATE, input).await?;
        data.customer_create
            .ok_or(AdminShopifyError::MissingPayload("customerCreate"))
    }

    /// Run `customerUpdate`; `input.id` must be set.
    ///
    /// # Errors
    ///
    /// Same as [`Self::customer_create`].
    #[instrument(skip(self, input), fields(shop = %self.shop, customer_id = ?input.id))]
    pub async fn customer_update(
        &self,
        input: &CustomerInput,
    ) -> Result<CustomerPayload, AdminShopifyError> {
        let data: CustomerUpdateData = self.execute(CUSTOMER_UPDATE, input).await?;
        data.customer_update
            .ok_or(AdminShopifyError::MissingPayload("customerUpdate"))
    }

    /// Run `companyCreate` with its location and main contact.
    ///
    /// # Errors
    ///
    /// Same as [`Self::customer_create`].
    #[instrument(skip(self, input), fields(shop = %self.shop, company = %input.company.name))]
    pub async fn company_create(
        &self,
        input: &CompanyCreateInput,
    ) -> Result<CompanyCreatePayload, AdminShopifyError> {
        let data: CompanyCreateData = self.execute(COMPANY_CREATE, input).await?;
        data.company_create
            .ok_or(AdminShopifyError::MissingPayload("companyCreate"))
    }

    async fn execute<I: Serialize + Sync, T: DeserializeOwned>(
        &self,
        query: &str,
        input: &I,
    ) -> Result<T, AdminShopifyError> {
        let body = GraphQLRequest {
            query,
            variables: InputVariables { input },
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Shopify-Access-Token", self.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(AdminShopifyError::RateLimited(retry_after));
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(AdminShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Shopify Admin API returned an error status");
            return Err(AdminShopifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: GraphQLResponse<T> = serde_json::from_slice(&bytes)?;

        if !parsed.errors.is_empty() {
            tracing::warn!(
                errors = parsed.errors.len(),
                first = parsed.errors.first().map(|e| e.message.as_str()),
                "GraphQL errors from Shopify"
            );
            return Err(AdminShopifyError::GraphQL(parsed.errors));
        }

        parsed
            .data
            .ok_or_else(|| AdminShopifyError::GraphQL(vec![GraphQLError::message("No data in response")]))
    }
}
