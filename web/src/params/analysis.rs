use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct StreamParams {
    /// Comma-separated agent names to dispatch. Omit to run every agent.
    pub(crate) agents: Option<String>,
}

impl StreamParams {
    /// The requested agents, blanks dropped. Empty means no filter.
    pub(crate) fn agent_filter(&self) -> Vec<String> {
        self.agents
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|agent| !agent.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_agents_means_no_filter() {
        assert!(StreamParams::default().agent_filter().is_empty());
    }

    #[test]
    fn test_agents_split_on_commas_and_trim() {
        let params = StreamParams {
            agents: Some("thermal, flow,,vibration ".to_string()),
        };

        assert_eq!(params.agent_filter(), vec!["thermal", "flow", "vibration"]);
    }
}
