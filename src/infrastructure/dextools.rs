//! # DexTools Client
//!
//! Read-only access to the DexTools public API (v2). The API allows one request
//! every two seconds per key, so every call goes through the shared `RequestGateway`.

use anyhow::{Context as _, Result, anyhow};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::time::Duration;

use crate::application::gateway::RequestGateway;
use crate::domain::config::DexToolsConfig;
use crate::domain::error::GatewayError;
use crate::domain::traits::MarketDataProvider;
use crate::domain::types::{Network, TrendingToken};

const TRENDING_LIMIT: usize = 10;
/// Pools created before this are ignored when looking up a token's main pool.
const POOLS_FROM: &str = "2022-10-01T00:00:00.000Z";

/// Everything needed to render a token report.
#[derive(Debug, Clone)]
pub struct TokenAnalysis {
    pub network: Network,
    pub pool: Value,
    pub info: Value,
    pub score: Value,
    pub audit: Value,
    pub price: Value,
    pub liquidity: Value,
}

pub struct DexToolsClient {
    http: reqwest::Client,
    base_url: String,
    gateway: RequestGateway,
}

impl DexToolsClient {
    pub fn new(config: &DexToolsConfig, gateway: RequestGateway) -> Result<Self> {
        let api_key = config.resolve_api_key()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(&api_key).context("Invalid DexTools API key")?,
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .context("Failed to build DexTools HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            gateway,
        })
    }

    /// GET `endpoint` with `params`, throttled and retried by the gateway.
    pub async fn make_request(
        &self,
        endpoint: &str,
        params: Vec<(String, String)>,
    ) -> Result<Value, GatewayError> {
        let http = self.http.clone();
        let url = format!("{}{}", self.base_url, endpoint);

        self.gateway
            .submit(endpoint, move || {
                let request = http.get(&url).query(&params);
                async move {
                    let response = request.send().await?.error_for_status()?;
                    response.json::<Value>().await
                }
            })
            .await
    }

    pub async fn hot_pools(&self, network: Network) -> Result<Vec<TrendingToken>> {
        let endpoint = format!("/ranking/{}/hotpools", network.dextools_segment());
        let body = self.make_request(&endpoint, Vec::new()).await?;
        let entries = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("Invalid response from DexTools API"))?;
        Ok(parse_hot_pools(entries))
    }

    pub async fn token_info(&self, network: Network, address: &str) -> Result<Value> {
        let endpoint = format!("/token/{}/{}", network.dextools_segment(), address);
        Ok(data_of(self.make_request(&endpoint, Vec::new()).await?))
    }

    /// Pools of a token, oldest first.
    pub async fn token_pools(&self, network: Network, address: &str) -> Result<Vec<Value>> {
        let endpoint = format!("/token/{}/{}/pools", network.dextools_segment(), address);
        let body = self.make_request(&endpoint, pools_params(Utc::now())).await?;
        Ok(body
            .pointer("/data/results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn pool_price(&self, network: Network, pool: &str) -> Result<Value> {
        let endpoint = format!("/pool/{}/{}/price", network.dextools_segment(), pool);
        Ok(data_of(self.make_request(&endpoint, Vec::new()).await?))
    }

    pub async fn price(&self, network: Network, address: &str) -> Result<f64> {
        let pools = self.token_pools(network, address).await?;
        let pool = first_pool_address(&pools).ok_or_else(|| anyhow!("No liquidity pools found"))?;
        let price = self.pool_price(network, &pool).await?;
        Ok(price.get("price").and_then(Value::as_f64).unwrap_or(0.0))
    }

    /// Collects pool, info, score, audit, price and liquidity. `None` without pools.
    pub async fn token_analysis(&self, network: Network, address: &str) -> Result<Option<TokenAnalysis>> {
        let segment = network.dextools_segment();
        let pools = self.token_pools(network, address).await?;
        let Some(pool_address) = first_pool_address(&pools) else {
            return Ok(None);
        };

        let info = self.token_info(network, address).await?;
        let score = data_of(
            self.make_request(&format!("/token/{segment}/{address}/score"), Vec::new())
                .await?,
        );
        let audit = data_of(
            self.make_request(&format!("/token/{segment}/{address}/audit"), Vec::new())
                .await?,
        );
        let price = self.pool_price(network, &pool_address).await?;
        let liquidity = data_of(
            self.make_request(&format!("/pool/{segment}/{pool_address}/liquidity"), Vec::new())
                .await?,
        );

        Ok(Some(TokenAnalysis {
            network,
            pool: pools[0].clone(),
            info,
            score,
            audit,
            price,
            liquidity,
        }))
    }
}

#[async_trait]
impl MarketDataProvider for DexToolsClient {
    async fn trending(&self, network: Network) -> Result<Vec<TrendingToken>> {
        self.hot_pools(network).await
    }

    async fn token_price(&self, network: Network, address: &str) -> Result<f64> {
        self.price(network, address).await
    }

    async fn token_report(&self, network: Network, address: &str) -> Result<String> {
        Ok(match self.token_analysis(network, address).await? {
            Some(analysis) => crate::strings::messages::token_analysis(&analysis),
            None => crate::strings::messages::NO_POOLS.to_string(),
        })
    }
}

fn data_of(mut body: Value) -> Value {
    body.get_mut("data").map(Value::take).unwrap_or(Value::Null)
}

fn pools_params(now: chrono::DateTime<Utc>) -> Vec<(String, String)> {
    vec![
        ("sort".to_string(), "creationTime".to_string()),
        ("order".to_string(), "asc".to_string()),
        ("from".to_string(), POOLS_FROM.to_string()),
        ("to".to_string(), now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    ]
}

fn first_pool_address(pools: &[Value]) -> Option<String> {
    pools
        .first()?
        .get("address")?
        .as_str()
        .map(str::to_string)
}

fn parse_hot_pools(entries: &[Value]) -> Vec<TrendingToken> {
    entries
        .iter()
        .filter_map(|entry| {
            let token = entry.get("mainToken")?;
            let address = token.get("address")?.as_str()?.to_string();
            let text = |key: &str| {
                token
                    .get(key)
                    .and_then(Value::as_str)
                    .unwrap_or("?")
                    .to_string()
            };
            Some((entry, text("name"), text("symbol"), address))
        })
        .take(TRENDING_LIMIT)
        .enumerate()
        .map(|(i, (entry, name, symbol, address))| TrendingToken {
            rank: entry
                .get("rank")
                .and_then(Value::as_u64)
                .map_or(i as u32 + 1, |r| r as u32),
            name,
            symbol,
            address,
        })
        .collect()
}
