use chiacchiera_core::{AuthResponse, Filter, ListResult, PasswordAuthRequest};
use reqwest::{multipart::Form, Method};
use serde::{de::DeserializeOwned, Serialize};

use super::{send_json, PocketBase};
use crate::error::ClientError;

/// Dimensione delle pagine usate da [`RecordService::get_full_list`].
const FULL_LIST_BATCH: u32 = 500;

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Es. `-created`
    pub sort: Option<String>,
    pub filter: Option<Filter>,
}

impl ListOptions {
    pub fn sorted(sort: impl Into<String>) -> Self {
        Self {
            sort: Some(sort.into()),
            filter: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Operazioni sui record di una collection.
pub struct RecordService<'a> {
    client: &'a PocketBase,
    collection: &'a str,
}

impl<'a> RecordService<'a> {
    pub(crate) fn new(client: &'a PocketBase, collection: &'a str) -> Self {
        Self { client, collection }
    }

    fn records(&self, method: Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, &["api", "collections", self.collection, "records"])
    }

    fn record(&self, method: Method, id: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, &["api", "collections", self.collection, "records", id])
    }

    pub async fn get_one<T: DeserializeOwned>(&self, id: &str) -> Result<T, ClientError> {
        send_json(self.record(Method::GET, id)).await
    }

    pub async fn get_list<T: DeserializeOwned>(
        &self,
        page: u32,
        per_page: u32,
        options: &ListOptions,
    ) -> Result<ListResult<T>, ClientError> {
        let mut query = vec![
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
            ("skipTotal", "1".to_string()),
        ];
        if let Some(sort) = &options.sort {
            query.push(("sort", sort.clone()));
        }
        if let Some(filter) = &options.filter {
            query.push(("filter", filter.to_string()));
        }

        send_json(self.records(Method::GET).query(&query)).await
    }

    /// Scarica tutte le pagine finché il backend non ne restituisce una incompleta.
    pub async fn get_full_list<T: DeserializeOwned>(
        &self,
        options: &ListOptions,
    ) -> Result<Vec<T>, ClientError> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let result: ListResult<T> = self.get_list(page, FULL_LIST_BATCH, options).await?;
            let last = (result.items.len() as u32) < FULL_LIST_BATCH;
            items.extend(result.items);
            if last {
                return Ok(items);
            }
            page += 1;
        }
    }

    pub async fn create<T, B>(&self, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        send_json(self.records(Method::POST).json(body)).await
    }

    pub async fn update<T, B>(&self, id: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        send_json(self.record(Method::PATCH, id).json(body)).await
    }

    /// PATCH multipart, per caricare file.
    pub async fn update_multipart<T: DeserializeOwned>(
        &self,
        id: &str,
        form: Form,
    ) -> Result<T, ClientError> {
        send_json(self.record(Method::PATCH, id).multipart(form)).await
    }

    /// Login con password su una collection auth; in caso di successo salva token e record.
    pub async fn auth_with_password(
        &self,
        identity: &str,
        password: &str,
    ) -> Result<AuthResponse, ClientError> {
        let body = PasswordAuthRequest {
            identity: identity.to_string(),
            password: password.to_string(),
        };
        let request = self
            .client
            .request(Method::POST, &["api", "collections", self.collection, "auth-with-password"])
            .json(&body);
        let auth: AuthResponse = send_json(request).await?;
        self.client
            .auth_store()
            .save(auth.token.clone(), auth.record.clone());
        Ok(auth)
    }

    /// Rinnova il token corrente e aggiorna il record salvato.
    pub async fn auth_refresh(&self) -> Result<AuthResponse, ClientError> {
        let request = self
            .client
            .request(Method::POST, &["api", "collections", self.collection, "auth-refresh"]);
        let auth: AuthResponse = send_json(request).await?;
        self.client
            .auth_store()
            .save(auth.token.clone(), auth.record.clone());
        Ok(auth)
    }
}
