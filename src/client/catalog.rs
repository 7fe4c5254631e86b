use super::transport::ApiClient;
use crate::billing::Plan;

/// Reads the public plan list.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    api: ApiClient,
}

impl PlanCatalog {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Plans in server order; empty when the catalog cannot be loaded.
    pub async fn load(&self) -> Vec<Plan> {
        match self.api.get("/plans/").await {
            Ok(plans) => plans,
            Err(err) => {
                tracing::warn!(error = %err, "plan catalog unavailable");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_catalog_is_empty() {
        let catalog = PlanCatalog::new(ApiClient::new("http://127.0.0.1:1/api"));
        assert!(catalog.load().await.is_empty());
    }
}
