use super::config;
use super::models::{ChainSnapshot, ExpirySlice, OptionChainResponse, OptionChainResult, OptionContract, OptionQuote, OptionSide};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use rand::{seq::SliceRandom, thread_rng};
use reqwest::{Client, StatusCode, header};
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_retry::Retry;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, info, warn};

/// Anything that can produce today's filtered option chain for an underlying
pub trait OptionChainSource {
    fn fetch_chain(&self, symbol: &str) -> impl Future<Output = Result<ChainSnapshot>> + Send;
}

// -----------------------------------------------
// CLIENT WRAPPER WITH SESSION STATE AND CRUMB CACHE
// -----------------------------------------------
pub struct YahooClient {
    client: Client,
    crumb: RwLock<Option<String>>,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Ok(Self { client: build_client()?, crumb: RwLock::new(None) })
    }

    /// Cookie warm-up plus crumb, fetched once per client
    async fn crumb(&self) -> Result<String> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }

        let mut cached = self.crumb.write().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // the cookie endpoint answers 404 but still sets the session cookie
        let _ = self.client
            .get(config::FEED_COOKIE_URL)
            .send()
            .await
            .context("Failed to warm up feed session")?;
        tokio::time::sleep(Duration::from_millis(config::WARMUP_DELAY_MS)).await;

        let crumb = self.client
            .get(config::FEED_CRUMB_URL)
            .send()
            .await
            .context("Failed to request crumb")?
            .error_for_status()
            .context("Crumb request rejected")?
            .text()
            .await
            .context("Failed to read crumb")?
            .trim()
            .to_string();

        if crumb.is_empty() || crumb.starts_with('<') {
            anyhow::bail!("Feed returned no usable crumb");
        }

        debug!("feed session warmed up");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    /// Retrying fetch; 429 and 5xx are retried with exponential backoff
    async fn fetch_json(&self, url: &str) -> Result<String> {
        let backoff = ExponentialBackoff::from_millis(config::RETRY_BASE_DELAY_MS)
            .factor(config::RETRY_FACTOR)
            .max_delay(Duration::from_secs(config::RETRY_MAX_DELAY_SECS))
            .take(config::RETRY_MAX_ATTEMPTS);

        Retry::start(backoff, || async {
            let res = self.client
                .get(url)
                .send()
                .await
                .context("Request send failed")?;

            let status = res.status();
            debug!(url, status = status.as_u16(), "feed response");

            if status.is_success() {
                let text = res.text().await.context("Failed to read body")?;
                let trimmed = text.trim();
                if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
                    let preview: String = text.chars().take(200).collect();
                    anyhow::bail!("Non-JSON response: {}", preview);
                }
                Ok(text)
            } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!(url, status = status.as_u16(), "retryable feed error");
                anyhow::bail!("Retryable error: {}", status)
            } else {
                let body = res.text().await.unwrap_or_default();
                let preview: String = body.chars().take(200).collect();
                anyhow::bail!("Client error {}: {}", status, preview)
            }
        })
        .await
    }

    async fn fetch_result(&self, symbol: &str, expiration: Option<i64>) -> Result<OptionChainResult> {
        let crumb = self.crumb().await?;
        let url = config::option_chain_url(symbol, &crumb, expiration);
        let text = self.fetch_json(&url).await?;
        let response: OptionChainResponse = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse option chain for {}", symbol))?;

        if let Some(err) = response.option_chain.error.filter(|e| !e.is_null()) {
            anyhow::bail!("Feed error for {}: {}", symbol, err);
        }
        response
            .option_chain
            .result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty option chain result for {}", symbol))
    }

    /// Spot plus every contract expiring within the next 30 days
    pub async fn fetch_option_chain(&self, symbol: &str) -> Result<ChainSnapshot> {
        let today = Utc::now().date_naive();
        let first = self.fetch_result(symbol, None).await?;

        let spot = first
            .quote
            .as_ref()
            .and_then(|q| q.regular_market_price)
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| anyhow!("No spot price for {}", symbol))?;

        let expirations: Vec<i64> = first
            .expiration_dates
            .iter()
            .copied()
            .filter(|epoch| epoch_date(*epoch).is_some_and(|d| in_window(days_between(today, d))))
            .collect();

        let mut contracts = Vec::new();
        let mut dropped = 0;
        for epoch in expirations {
            let preloaded = first.options.iter().find(|s| s.expiration_date == Some(epoch));
            let slice = match preloaded {
                Some(slice) => slice.clone(),
                None => match self.fetch_result(symbol, Some(epoch)).await {
                    Ok(result) => match result.options.into_iter().next() {
                        Some(slice) => slice,
                        None => continue,
                    },
                    Err(e) => {
                        warn!(symbol, expiration = epoch, error = %e, "expiry fetch failed, skipped");
                        continue;
                    }
                },
            };
            let (kept, lost) = contracts_from_slice(&slice, today);
            contracts.extend(kept);
            dropped += lost;
        }

        if dropped > 0 {
            debug!(symbol, dropped, "quotes dropped by contract filter");
        }
        info!(symbol, spot, contracts = contracts.len(), dropped, "option chain loaded");

        Ok(ChainSnapshot { symbol: symbol.to_string(), date: today, spot, contracts, dropped })
    }
}

impl OptionChainSource for YahooClient {
    fn fetch_chain(&self, symbol: &str) -> impl Future<Output = Result<ChainSnapshot>> + Send {
        self.fetch_option_chain(symbol)
    }
}

// -----------------------------------------------
// QUOTE CONVERSION
// -----------------------------------------------

fn epoch_date(epoch: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(epoch, 0).map(|dt| dt.date_naive())
}

fn days_between(today: NaiveDate, expiry: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

fn in_window(days_to_expiry: i64) -> bool {
    days_to_expiry > 0 && days_to_expiry <= config::MAX_DAYS_TO_EXPIRY
}

/// Contract from one feed quote, `None` for a gap (missing strike, OI <= 0, IV <= 0, expiry out of window)
pub fn contract_from_quote(quote: &OptionQuote, side: OptionSide, fallback_expiry: Option<i64>, today: NaiveDate) -> Option<OptionContract> {
    let strike = quote.strike.filter(|s| s.is_finite() && *s > 0.0)?;
    let open_interest = quote.open_interest.filter(|oi| oi.is_finite() && *oi > 0.0)?;
    let iv = quote.implied_volatility.filter(|iv| iv.is_finite() && *iv > 0.0)?;
    let expiry = epoch_date(quote.expiration.or(fallback_expiry)?)?;

    let dte = days_between(today, expiry);
    if !in_window(dte) {
        return None;
    }
    Some(OptionContract::new(side, strike, open_interest.round() as u64, iv, dte))
}

/// (kept contracts, dropped quote count) for one expiry
pub fn contracts_from_slice(slice: &ExpirySlice, today: NaiveDate) -> (Vec<OptionContract>, usize) {
    let quotes = slice
        .calls
        .iter()
        .map(|q| (q, OptionSide::Call))
        .chain(slice.puts.iter().map(|q| (q, OptionSide::Put)));

    let mut kept = Vec::new();
    let mut dropped = 0;
    for (quote, side) in quotes {
        match contract_from_quote(quote, side, slice.expiration_date, today) {
            Some(contract) => kept.push(contract),
            None => dropped += 1,
        }
    }
    (kept, dropped)
}

// -----------------------------------------------
// HTTP CLIENT BUILDER
// -----------------------------------------------
fn build_client() -> Result<Client> {
    let mut headers = header::HeaderMap::new();

    let lang = config::ACCEPT_LANGUAGES
        .choose(&mut thread_rng())
        .copied()
        .unwrap_or("en-US,en;q=0.9");
    headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_str(lang)?);
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));

    Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .user_agent(config::USER_AGENT)
        .timeout(config::HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn epoch(date: NaiveDate) -> i64 {
        date.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp()
    }

    fn quote(strike: Option<f64>, oi: Option<f64>, iv: Option<f64>) -> OptionQuote {
        OptionQuote { strike, open_interest: oi, implied_volatility: iv, expiration: None }
    }

    #[test]
    fn test_contract_from_quote_filters_gaps() {
        let expiry = Some(epoch(NaiveDate::from_ymd_opt(2025, 1, 17).unwrap()));

        let c = contract_from_quote(&quote(Some(500.0), Some(1200.0), Some(0.18)), OptionSide::Call, expiry, today()).unwrap();
        assert_eq!(c.days_to_expiry, 2);
        assert_eq!(c.open_interest, 1200);

        assert!(contract_from_quote(&quote(None, Some(1.0), Some(0.2)), OptionSide::Put, expiry, today()).is_none());
        assert!(contract_from_quote(&quote(Some(500.0), Some(0.0), Some(0.2)), OptionSide::Put, expiry, today()).is_none());
        assert!(contract_from_quote(&quote(Some(500.0), Some(10.0), Some(0.0)), OptionSide::Put, expiry, today()).is_none());
        assert!(contract_from_quote(&quote(Some(500.0), Some(10.0), Some(0.2)), OptionSide::Put, None, today()).is_none());
    }

    #[test]
    fn test_expiry_window() {
        let q = quote(Some(500.0), Some(10.0), Some(0.2));
        let same_day = Some(epoch(today()));
        let day_30 = Some(epoch(NaiveDate::from_ymd_opt(2025, 2, 14).unwrap()));
        let day_31 = Some(epoch(NaiveDate::from_ymd_opt(2025, 2, 15).unwrap()));

        assert!(contract_from_quote(&q, OptionSide::Call, same_day, today()).is_none());
        assert!(contract_from_quote(&q, OptionSide::Call, day_30, today()).is_some());
        assert!(contract_from_quote(&q, OptionSide::Call, day_31, today()).is_none());
    }

    #[test]
    fn test_slice_conversion_counts_drops() {
        let slice = ExpirySlice {
            expiration_date: Some(epoch(NaiveDate::from_ymd_opt(2025, 1, 24).unwrap())),
            calls: vec![quote(Some(510.0), Some(100.0), Some(0.2)), quote(Some(520.0), None, Some(0.2))],
            puts: vec![quote(Some(490.0), Some(50.0), Some(0.25))],
        };
        let (kept, dropped) = contracts_from_slice(&slice, today());
        assert_eq!(kept.len(), 2);
        assert_eq!(dropped, 1);
        assert_eq!(kept[1].side, OptionSide::Put);
        assert_eq!(kept[0].days_to_expiry, 9);
    }

    #[test]
    fn test_parse_feed_payload() {
        let payload = r#"{"optionChain":{"result":[{"underlyingSymbol":"SPY","expirationDates":[1737072000],
            "quote":{"regularMarketPrice":590.5},
            "options":[{"expirationDate":1737072000,"calls":[{"strike":590.0,"openInterest":1500,"impliedVolatility":0.14}],"puts":[]}]}],
            "error":null}}"#;
        let response: OptionChainResponse = serde_json::from_str(payload).unwrap();
        let result = &response.option_chain.result[0];
        assert_eq!(result.quote.as_ref().unwrap().regular_market_price, Some(590.5));
        assert_eq!(result.options[0].calls[0].open_interest, Some(1500.0));
    }
}
