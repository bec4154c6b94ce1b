use std::collections::HashMap;

use theme_core::{round2, scoring, InvestorFlowProvider, Theme};

use crate::batch::{batched, BatchConfig};

/// Attach the mean per-stock supply/demand adjustment to each theme.
///
/// Stocks without a code or without flow data are skipped; a theme with no
/// data at all keeps `supply_adjustment = None`. `score` is left untouched.
pub async fn apply_supply_adjustments(
    provider: &dyn InvestorFlowProvider,
    themes: &mut [Theme],
    batch: &BatchConfig,
) {
    let mut codes: Vec<String> = Vec::new();
    for stock in themes.iter().flat_map(|t| t.stocks.iter()) {
        if let Some(code) = &stock.code {
            if !codes.contains(code) {
                codes.push(code.clone());
            }
        }
    }
    if codes.is_empty() {
        return;
    }

    let flows = batched(&codes, batch, |code| provider.get_flow(code)).await;
    let adjustments: HashMap<String, f64> = flows
        .iter()
        .map(|f| (f.code.clone(), scoring::supply_adjustment(f)))
        .collect();

    for theme in themes.iter_mut() {
        let values: Vec<f64> = theme
            .stocks
            .iter()
            .filter_map(|s| s.code.as_ref().and_then(|c| adjustments.get(c)))
            .copied()
            .collect();
        theme.supply_adjustment = if values.is_empty() {
            None
        } else {
            Some(round2(values.iter().sum::<f64>() / values.len() as f64))
        };
    }

    tracing::debug!("Supply data for {}/{} codes", adjustments.len(), codes.len());
}
