//! Row queries against `/rest/v1/{table}`.
//!
//! A small builder in the shape of the hosted SDK:
//! `client.from("profiles").select("role").eq("id", id).single()`.
//! Filters are encoded as PostgREST query parameters (`id=eq.<value>`).

use std::fmt;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::types::SupabaseError;
use super::{SupabaseClient, read_json, request_error};

const OBJECT_ACCEPT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";

impl SupabaseClient {
    /// Start a query against `table`.
    #[must_use]
    pub fn from(&self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder { client: self, table: table.to_owned(), params: Vec::new() }
    }
}

pub struct QueryBuilder<'a> {
    client: &'a SupabaseClient,
    table: String,
    params: Vec<(String, String)>,
}

impl QueryBuilder<'_> {
    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".into(), columns.into()));
        self
    }

    #[must_use]
    pub fn eq(mut self, column: &str, value: impl fmt::Display) -> Self {
        self.params.push((column.into(), format!("eq.{value}")));
        self
    }

    #[must_use]
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params.push(("order".into(), format!("{column}.{direction}")));
        self
    }

    #[must_use]
    pub fn limit(mut self, count: usize) -> Self {
        self.params.push(("limit".into(), count.to_string()));
        self
    }

    /// Fully encoded request URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the project URL does not parse.
    pub fn url(&self) -> Result<String, SupabaseError> {
        build_url(&self.client.endpoint(&format!("/rest/v1/{}", self.table)), &self.params)
    }

    /// All matching rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or rows do not deserialize.
    pub async fn execute<T: DeserializeOwned>(self) -> Result<Vec<T>, SupabaseError> {
        self.send(Method::GET, None, false).await
    }

    /// Exactly one row; zero or several rows are a remote error (406).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the row count is not one.
    pub async fn single<T: DeserializeOwned>(self) -> Result<T, SupabaseError> {
        self.send(Method::GET, None, true).await
    }

    /// Insert `rows` (one object or an array) and return what was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not serialize or the insert fails.
    pub async fn insert<T, B>(self, rows: &B) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_body(rows)?;
        self.send(Method::POST, Some(body), false).await
    }

    /// Patch every row matching the filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not serialize or the update fails.
    pub async fn update<T, B>(self, changes: &B) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_body(changes)?;
        self.send(Method::PATCH, Some(body), false).await
    }

    /// Delete every row matching the filters, returning the deleted rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete<T: DeserializeOwned>(self) -> Result<Vec<T>, SupabaseError> {
        self.send(Method::DELETE, None, false).await
    }

    async fn send<T: DeserializeOwned>(
        self,
        method: Method,
        body: Option<serde_json::Value>,
        single: bool,
    ) -> Result<T, SupabaseError> {
        let url = self.url()?;
        let mut request = self
            .client
            .http
            .request(method.clone(), url)
            .header("apikey", &self.client.anon_key)
            .bearer_auth(self.client.bearer().await);
        if single {
            request = request.header("Accept", OBJECT_ACCEPT);
        }
        if method != Method::GET {
            request = request.header("Prefer", RETURN_REPRESENTATION);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(request_error)?;
        read_json(response).await
    }
}

fn to_body<B: Serialize + ?Sized>(value: &B) -> Result<serde_json::Value, SupabaseError> {
    serde_json::to_value(value).map_err(|e| SupabaseError::ApiParse(e.to_string()))
}

pub(crate) fn build_url(base: &str, params: &[(String, String)]) -> Result<String, SupabaseError> {
    let mut url = reqwest::Url::parse(base).map_err(|e| SupabaseError::InvalidUrl(e.to_string()))?;
    if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            query.append_pair(key, value);
        }
    }
    Ok(url.into())
}

#[cfg(test)]
#[path = "rest_test.rs"]
mod tests;
