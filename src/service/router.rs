//! Route Optimization Service
//!
//! Enumerates every affordable (execute-on, pay-from) pair for an intent, prices each
//! one with the gas estimator and the bridge oracle, and returns them best-first with a
//! recommendation.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use crate::error::OmnigasError;
use crate::registry::ChainRegistry;
use crate::service::balance::BalanceAggregator;
use crate::service::bridge_oracle::BridgeOracle;
use crate::service::gas::{GasEstimate, GasEstimator};
use crate::types::{
    Amount, ChainId, ExecuteOn, PayFrom, Recommendation, RouteAnalysis, RouteOption, TransactionIntent,
    UnifiedBalance, Urgency,
};

/// Savings must exceed 1/SWITCH_THRESHOLD_DIVISOR (20%) of the preferred route to recommend a switch.
const SWITCH_THRESHOLD_DIVISOR: u64 = 5;

/// Route optimizer.
#[derive(Debug, Clone)]
pub struct RouteOptimizer {
    registry: Arc<ChainRegistry>,
    balances: BalanceAggregator,
    gas: GasEstimator,
    oracle: BridgeOracle,
    min_bridge_amount: Amount,
}

impl RouteOptimizer {
    pub fn new(
        registry: Arc<ChainRegistry>,
        balances: BalanceAggregator,
        gas: GasEstimator,
        oracle: BridgeOracle,
        min_bridge_amount: Amount,
    ) -> Self {
        Self {
            registry,
            balances,
            gas,
            oracle,
            min_bridge_amount,
        }
    }

    /// Analyzes all viable routes for `intent` paid by `account`.
    ///
    /// # Returns
    ///
    /// * `Ok(RouteAnalysis)` - Routes sorted by (total cost, time), best first
    /// * `Err(NoViableRoute)` - No chain holds enough to pay for any candidate
    /// * `Err(UnsupportedChain | InvalidIntent)` - Bad request
    pub async fn analyze_optimal_route(
        &self,
        intent: &TransactionIntent,
        account: &str,
        urgency: Urgency,
    ) -> Result<RouteAnalysis, OmnigasError> {
        intent.validate()?;
        if let PayFrom::Chain(payer) = intent.pay_from {
            self.registry.get(payer)?;
        }

        // Resolve the target chain and the execution chains to consider
        let (target, estimates) = match intent.execute_on {
            ExecuteOn::Chain(chain_id) => {
                let estimate = self.gas.estimate(intent, chain_id, urgency).await?;
                (chain_id, vec![estimate])
            }
            ExecuteOn::Optimal => {
                let estimates = self.gas.estimate_all(intent, urgency).await;
                let cheapest = estimates
                    .iter()
                    .min_by_key(|e| e.stablecoin_cost)
                    .map(|e| e.chain_id)
                    .ok_or_else(|| OmnigasError::NoViableRoute("no supported chain could be estimated".to_string()))?;
                (cheapest, estimates)
            }
        };
        debug!("Route target chain {} ({} execution candidates)", target, estimates.len());

        let balance = self.balances.get_unified_balance(account).await;

        let candidate_sets = join_all(
            estimates
                .iter()
                .map(|estimate| self.candidates_for(intent, estimate, &balance)),
        )
        .await;
        let mut routes: Vec<RouteOption> = candidate_sets.into_iter().flatten().collect();

        if routes.is_empty() {
            return Err(OmnigasError::NoViableRoute(format!(
                "balance of {} across {} chain(s) covers no route for target chain {}",
                balance.total_amount,
                balance.per_chain.len(),
                target
            )));
        }

        sort_routes(&mut routes);
        let recommendation = self.recommend(&routes, target);
        info!(
            "Route analysis: {} route(s), best {} -> {} total {}",
            routes.len(),
            routes[0].pay_from_chain,
            routes[0].execute_on_chain,
            routes[0].total_cost
        );

        Ok(RouteAnalysis {
            best_route: routes[0].clone(),
            all_routes: routes,
            recommendation,
        })
    }

    /// Prices a caller-pinned (execute-on, pay-from) pair without checking balances.
    pub async fn pinned_route(
        &self,
        intent: &TransactionIntent,
        execute_on: ChainId,
        pay_from: ChainId,
        urgency: Urgency,
    ) -> Result<RouteOption, OmnigasError> {
        self.registry.get(pay_from)?;
        let estimate = self.gas.estimate(intent, execute_on, urgency).await?;
        if execute_on == pay_from {
            return Ok(RouteOption::direct(
                execute_on,
                estimate.stablecoin_cost,
                estimate.estimated_time_seconds,
            ));
        }
        let quote = self
            .oracle
            .quote_for_delivery(estimate.stablecoin_cost, pay_from, execute_on, intent.transfer_mode())
            .await;
        Ok(RouteOption::cross_chain(
            execute_on,
            pay_from,
            estimate.stablecoin_cost,
            quote.fee,
            quote.estimated_time_seconds + estimate.estimated_time_seconds,
            quote.mode,
        ))
    }

    /// Direct and cross-chain candidates executing on `estimate.chain_id`.
    async fn candidates_for(
        &self,
        intent: &TransactionIntent,
        estimate: &GasEstimate,
        balance: &UnifiedBalance,
    ) -> Vec<RouteOption> {
        let execute_on = estimate.chain_id;
        let gas_cost = estimate.stablecoin_cost;
        let payer_allowed = |chain_id: ChainId| match intent.pay_from {
            PayFrom::Auto => true,
            PayFrom::Chain(pinned) => pinned == chain_id,
        };

        let mut routes = Vec::new();
        if payer_allowed(execute_on) && balance.balance_on(execute_on) >= gas_cost {
            routes.push(RouteOption::direct(execute_on, gas_cost, estimate.estimated_time_seconds));
        }

        if !self.registry.supports_bridge(execute_on) || gas_cost < self.min_bridge_amount {
            return routes;
        }

        let payers: Vec<ChainId> = balance
            .per_chain
            .iter()
            .filter(|c| c.chain_id != execute_on)
            .filter(|c| payer_allowed(c.chain_id))
            .filter(|c| self.registry.supports_bridge(c.chain_id))
            // cheap pre-filter before asking the oracle
            .filter(|c| c.balance >= gas_cost)
            .map(|c| c.chain_id)
            .collect();

        let quotes = join_all(payers.iter().map(|&payer| {
            self.oracle
                .quote_for_delivery(gas_cost, payer, execute_on, intent.transfer_mode())
        }))
        .await;

        for (payer, quote) in payers.into_iter().zip(quotes) {
            let required = gas_cost.saturating_add(quote.fee);
            if balance.balance_on(payer) < required {
                continue;
            }
            routes.push(RouteOption::cross_chain(
                execute_on,
                payer,
                gas_cost,
                quote.fee,
                quote.estimated_time_seconds + estimate.estimated_time_seconds,
                quote.mode,
            ));
        }
        routes
    }

    /// Recommendation relative to the preferred (target) chain.
    ///
    /// Savings are measured against the preferred chain's own best route.
    fn recommend(&self, routes: &[RouteOption], preferred: ChainId) -> Recommendation {
        let best = &routes[0];
        let preferred_name = self.chain_name(preferred);
        let best_name = self.chain_name(best.execute_on_chain);

        if best.execute_on_chain == preferred {
            let reason = if best.requires_bridge() {
                format!(
                    "Execute on {} paying from {} via bridge",
                    preferred_name,
                    self.chain_name(best.pay_from_chain)
                )
            } else {
                format!("Execute directly on {}", preferred_name)
            };
            return Recommendation {
                chain_id: preferred,
                reason,
                estimated_savings: None,
            };
        }

        match routes.iter().find(|r| r.execute_on_chain == preferred) {
            Some(preferred_best) => {
                let savings = preferred_best.total_cost.saturating_sub(best.total_cost);
                let threshold_met = savings.as_u256().saturating_mul(SWITCH_THRESHOLD_DIVISOR.into())
                    > preferred_best.total_cost.as_u256();
                if threshold_met {
                    Recommendation {
                        chain_id: best.execute_on_chain,
                        reason: format!(
                            "Switch to {}: saves {} versus the best route on {}",
                            best_name, savings, preferred_name
                        ),
                        estimated_savings: Some(savings),
                    }
                } else {
                    Recommendation {
                        chain_id: best.execute_on_chain,
                        reason: format!(
                            "Cheapest route executes on {}; savings versus {} are below 20%",
                            best_name, preferred_name
                        ),
                        estimated_savings: None,
                    }
                }
            }
            None => Recommendation {
                chain_id: best.execute_on_chain,
                reason: format!(
                    "No affordable route on {}; cheapest route executes on {}",
                    preferred_name, best_name
                ),
                estimated_savings: None,
            },
        }
    }

    fn chain_name(&self, chain_id: ChainId) -> String {
        self.registry
            .get(chain_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|_| chain_id.to_string())
    }
}

/// Sorts by total cost, then time, then chain ids for a stable order.
pub fn sort_routes(routes: &mut [RouteOption]) {
    routes.sort_by(|a, b| {
        a.total_cost
            .cmp(&b.total_cost)
            .then(a.estimated_time_seconds.cmp(&b.estimated_time_seconds))
            .then(a.execute_on_chain.cmp(&b.execute_on_chain))
            .then(a.pay_from_chain.cmp(&b.pay_from_chain))
    });
}
