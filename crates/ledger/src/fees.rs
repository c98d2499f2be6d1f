//! Fee calculation for a submission.
//!
//! The storage fee is `pricePerSector * sectors`, read fresh from the market
//! contract on every call. Gas is simulated against the flow contract with the
//! storage fee attached; when simulation fails a fixed limit is used instead
//! and the quote is marked as degraded.

use crate::abi;
use crate::client::{CallRequest, LedgerClient};
use crate::error::{LedgerError, LedgerResult};
use alloy_primitives::utils::format_ether;
use alloy_primitives::{Address, U256};
use serde::Serialize;
use tracing::{instrument, warn};
use vellum_core::{NetworkProfile, SubmissionDescriptor};

/// Gas limit used when simulation fails.
pub const DEFAULT_FALLBACK_GAS_LIMIT: u64 = 500_000;

/// Where the gas limit of a quote came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum GasEstimate {
    Simulated,
    Fallback { reason: String },
}

/// Fee breakdown for one submission on one profile. All amounts in wei.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    pub price_per_sector: U256,
    pub sectors: u64,
    pub storage_fee: U256,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub gas_fee: U256,
    pub total_fee: U256,
    pub gas_estimate: GasEstimate,
}

/// Human readable amounts in whole tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormattedFees {
    pub storage_fee: String,
    pub gas_fee: String,
    pub total_fee: String,
}

impl FeeQuote {
    pub fn formatted(&self) -> FormattedFees {
        FormattedFees {
            storage_fee: format_ether(self.storage_fee),
            gas_fee: format_ether(self.gas_fee),
            total_fee: format_ether(self.total_fee),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.gas_estimate, GasEstimate::Fallback { .. })
    }
}

/// Computes fees against the market and flow contracts of a profile.
#[derive(Clone, Debug)]
pub struct FeeCalculator {
    fallback_gas_limit: u64,
}

impl Default for FeeCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_GAS_LIMIT)
    }
}

impl FeeCalculator {
    pub fn new(fallback_gas_limit: u64) -> Self {
        Self { fallback_gas_limit }
    }

    /// Resolve the market contract, from the profile or from `flow.market()`.
    pub async fn market_address(
        &self,
        profile: &NetworkProfile,
        client: &dyn LedgerClient,
    ) -> LedgerResult<Address> {
        if let Some(market) = profile.market_address {
            return Ok(market);
        }
        let data = client
            .call(
                &CallRequest::new(profile.contract_address, abi::encode_market()),
                None,
            )
            .await
            .map_err(into_ambiguous_read)?;
        abi::decode_address(&data).ok_or_else(|| {
            LedgerError::ambiguous(format!(
                "flow.market() returned malformed data ({} bytes)",
                data.len()
            ))
        })
    }

    /// Current `pricePerSector` of the market contract.
    pub async fn price_per_sector(
        &self,
        market: Address,
        client: &dyn LedgerClient,
    ) -> LedgerResult<U256> {
        let data = client
            .call(&CallRequest::new(market, abi::encode_price_per_sector()), None)
            .await
            .map_err(into_ambiguous_read)?;
        abi::decode_u256(&data).ok_or_else(|| {
            LedgerError::ambiguous(format!(
                "market.pricePerSector() returned malformed data ({} bytes)",
                data.len()
            ))
        })
    }

    #[instrument(skip_all, fields(profile = %profile.name, length = submission.length()))]
    pub async fn calculate(
        &self,
        submission: &SubmissionDescriptor,
        profile: &NetworkProfile,
        client: &dyn LedgerClient,
        from: Option<Address>,
    ) -> LedgerResult<FeeQuote> {
        let market = self.market_address(profile, client).await?;
        let price_per_sector = self.price_per_sector(market, client).await?;
        let sectors = submission.sectors();
        let storage_fee = price_per_sector
            .checked_mul(U256::from(sectors))
            .ok_or_else(|| LedgerError::ambiguous("storage fee overflows uint256"))?;

        let gas_price = client.gas_price().await?;

        let simulation = CallRequest {
            from,
            to: profile.contract_address,
            value: Some(storage_fee),
            data: abi::encode_submit(submission),
        };
        let (gas_limit, gas_estimate) = match client.estimate_gas(&simulation).await {
            Ok(limit) => (limit, GasEstimate::Simulated),
            Err(LedgerError::ProviderUnavailable { endpoint, reason }) => {
                return Err(LedgerError::ProviderUnavailable { endpoint, reason });
            }
            Err(e) => {
                let degraded = LedgerError::FeeEstimationDegraded(e.to_string());
                warn!(
                    error = %degraded,
                    fallback_gas_limit = self.fallback_gas_limit,
                    "gas simulation failed, using fallback limit"
                );
                (
                    self.fallback_gas_limit,
                    GasEstimate::Fallback {
                        reason: e.to_string(),
                    },
                )
            }
        };

        let gas_fee = gas_price
            .checked_mul(U256::from(gas_limit))
            .ok_or_else(|| LedgerError::ambiguous("gas fee overflows uint256"))?;
        let total_fee = storage_fee
            .checked_add(gas_fee)
            .ok_or_else(|| LedgerError::ambiguous("total fee overflows uint256"))?;

        tracing::debug!(
            %price_per_sector,
            sectors,
            %storage_fee,
            gas_limit,
            %gas_price,
            %total_fee,
            "fee quote computed"
        );

        Ok(FeeQuote {
            price_per_sector,
            sectors,
            storage_fee,
            gas_limit,
            gas_price,
            gas_fee,
            total_fee,
            gas_estimate,
        })
    }
}

/// A contract read that errors at the RPC level cannot be priced.
fn into_ambiguous_read(err: LedgerError) -> LedgerError {
    match err {
        LedgerError::Rpc {
            method,
            code,
            message,
            ..
        } => LedgerError::ambiguous(format!("{method} failed ({code}): {message}")),
        other => other,
    }
}
