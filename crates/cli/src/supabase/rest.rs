//! `PostgREST` tables.

use elvora_core::backend::{BackendError, Direction, Query, Tables};
use reqwest::Method;
use serde_json::Value;
use tracing::instrument;

use super::{SupabaseClient, check, transport};

/// `PostgREST` query-string parameters for `query`.
///
/// Filters use the `column=eq.value` form; values are sent as text and
/// compared by the server after casting to the column type.
pub(super) fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), query.columns().to_string())];
    params.extend(
        query
            .filters()
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{value}"))),
    );
    params.extend(
        query
            .non_null_columns()
            .iter()
            .map(|column| (column.clone(), "not.is.null".to_string())),
    );
    if let Some((column, direction)) = query.ordering() {
        let dir = match direction {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        params.push(("order".to_string(), format!("{column}.{dir}")));
    }
    if let Some(limit) = query.row_limit() {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

impl SupabaseClient {
    fn table_url(&self, table: &str) -> Result<url::Url, BackendError> {
        self.endpoint(&format!("/rest/v1/{table}"))
    }
}

impl Tables for SupabaseClient {
    #[instrument(skip(self), fields(table = query.table_name()))]
    async fn select(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(query.table_name())?;
        let response = self
            .request(Method::GET, url)
            .await
            .query(&query_params(query))
            .send()
            .await
            .map_err(transport)?;
        let rows: Vec<Value> = check(response).await?.json().await.map_err(transport)?;
        tracing::debug!(rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    #[instrument(skip(self, row))]
    async fn insert(&self, table: &str, row: Value) -> Result<(), BackendError> {
        let url = self.table_url(table)?;
        let response = self
            .request(Method::POST, url)
            .await
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self, patch))]
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<(), BackendError> {
        let url = self.table_url(table)?;
        let response = self
            .request(Method::PATCH, url)
            .await
            .header("Prefer", "return=minimal")
            .query(&[("id", format!("eq.{id}"))])
            .json(&patch)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, table: &str, id: &str) -> Result<(), BackendError> {
        let url = self.table_url(table)?;
        let response = self
            .request(Method::DELETE, url)
            .await
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(params: &[(String, String)]) -> Vec<(&str, &str)> {
        params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_latest_order_number_query() {
        let query = Query::table("orders")
            .select("order_number")
            .not_null("order_number")
            .order_by("order_number", Direction::Descending)
            .limit(1);
        assert_eq!(
            pairs(&query_params(&query)),
            vec![
                ("select", "order_number"),
                ("order_number", "not.is.null"),
                ("order", "order_number.desc"),
                ("limit", "1")
            ]
        );
    }

    #[test]
    fn test_device_filter_query() {
        let query = Query::table("orders")
            .eq("deviceId", "dev_abc_1")
            .order_by("date", Direction::Ascending);
        assert_eq!(
            pairs(&query_params(&query)),
            vec![
                ("select", "*"),
                ("deviceId", "eq.dev_abc_1"),
                ("order", "date.asc")
            ]
        );
    }

    #[test]
    fn test_table_url() {
        let client = crate::supabase::tests::client();
        assert_eq!(
            client.table_url("products").unwrap().as_str(),
            "https://abcd.supabase.co/rest/v1/products"
        );
    }
}
