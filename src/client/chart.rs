use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::types::BalanceSeriesResponse;
use crate::config::ClientConfig;
use crate::domain::{cents_to_units, AccountId};

use super::ApiClient;

/// Dataset bound to the balance line chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineChart {
    pub labels: Vec<String>,
    /// Balances in currency units, aligned with `labels`
    pub figures: Vec<f64>,
    pub total_balance: f64,
}

impl From<BalanceSeriesResponse> for LineChart {
    fn from(series: BalanceSeriesResponse) -> Self {
        let (labels, figures) = series
            .points
            .into_iter()
            .map(|p| (p.label, cents_to_units(p.balance)))
            .unzip();

        Self {
            labels,
            figures,
            total_balance: cents_to_units(series.total_balance),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartState {
    Pending,
    Loaded,
    /// The request failed; the error was logged and the chart stays empty.
    Failed,
}

/// Balance chart for one fixed account. Loads its data once, on initialization.
pub struct BalanceChart {
    account_id: AccountId,
    months: u32,
    state: ChartState,
    data: LineChart,
}

impl BalanceChart {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            account_id: config.account_id,
            months: config.months,
            state: ChartState::Pending,
            data: LineChart::default(),
        }
    }

    pub fn state(&self) -> ChartState {
        self.state
    }

    pub fn data(&self) -> &LineChart {
        &self.data
    }

    /// Issue the single request for this view. On success the dataset is
    /// replaced; on failure the error is logged and the chart stays empty.
    /// Calls after the first are no-ops.
    pub async fn init(&mut self, client: &ApiClient) {
        if self.state != ChartState::Pending {
            return;
        }

        match client.get_month_balances(self.account_id, self.months).await {
            Ok(series) => {
                self.data = LineChart::from(series);
                self.state = ChartState::Loaded;
                info!(
                    account_id = %self.account_id,
                    points = self.data.labels.len(),
                    "balance chart loaded"
                );
            }
            Err(err) => {
                error!(account_id = %self.account_id, error = %err, "failed to load balance chart");
                self.state = ChartState::Failed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::BalancePointResponse;

    #[test]
    fn test_line_chart_from_series() {
        let series = BalanceSeriesResponse {
            account_id: AccountId::new_v4(),
            currency: "USD".into(),
            total_balance: 150_050,
            points: vec![
                BalancePointResponse {
                    label: "May 2024".into(),
                    balance: 100_000,
                },
                BalancePointResponse {
                    label: "Jun 2024".into(),
                    balance: 150_050,
                },
            ],
        };

        let chart = LineChart::from(series);

        assert_eq!(chart.labels, vec!["May 2024", "Jun 2024"]);
        assert_eq!(chart.figures, vec![1000.0, 1500.5]);
        assert_eq!(chart.total_balance, 1500.5);
    }

    #[test]
    fn test_new_chart_is_pending_and_empty() {
        let chart = BalanceChart::new(&ClientConfig::new("http://localhost:5070/api/"));
        assert_eq!(chart.state(), ChartState::Pending);
        assert!(chart.data().labels.is_empty());
    }
}
