//! reqwest-backed implementation of [`RentalApi`].

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::{Error, Resource, Result};
use crate::model::{Booking, NewBooking, Property, User};

use super::RentalApi;

/// HTTP client for a rental collection server.
///
/// The server is any generic JSON REST store exposing `properties`,
/// `bookings`, and `users` collections with standard status-code
/// semantics.
#[derive(Debug, Clone)]
pub struct RestApi {
  http: Client,
  base_url: Url,
}

impl RestApi {
  /// Builds a client against `base_url`, e.g. `http://localhost:3000`.
  pub fn new(base_url: &str) -> Result<Self> {
    let base_url = Url::parse(base_url)
      .map_err(|e| Error::Config(format!("invalid base url {base_url}: {e}")))?;
    let http = Client::builder()
      .build()
      .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;

    Ok(Self { http, base_url })
  }

  fn endpoint(&self, segments: &[&str]) -> Result<Url> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|()| Error::Config(format!("base url {} cannot carry paths", self.base_url)))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
    debug!(%url, "GET");
    let response = self
      .http
      .get(url.clone())
      .send()
      .await
      .map_err(|e| Error::remote(format!("GET {url}: {e}")))?;
    Self::read_json(url, response).await
  }

  async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T>
  where
    B: Serialize + Sync,
    T: DeserializeOwned,
  {
    debug!(%url, "POST");
    let response = self
      .http
      .post(url.clone())
      .json(body)
      .send()
      .await
      .map_err(|e| Error::remote(format!("POST {url}: {e}")))?;
    Self::read_json(url, response).await
  }

  async fn read_json<T: DeserializeOwned>(url: Url, response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      let body = body.trim();
      let message = if body.is_empty() {
        format!("{url} returned {status}")
      } else {
        format!("{url} returned {status}: {body}")
      };
      return Err(Error::remote_status(status.as_u16(), message));
    }

    response
      .json()
      .await
      .map_err(|e| Error::remote(format!("invalid response from {url}: {e}")))
  }
}

#[async_trait]
impl RentalApi for RestApi {
  async fn list_properties(&self, search: Option<&str>) -> Result<Vec<Property>> {
    let mut url = self.endpoint(&[Resource::Properties.as_str()])?;
    if let Some(q) = search {
      url.query_pairs_mut().append_pair("q", q);
    }
    self.get_json(url).await
  }

  async fn get_property(&self, id: &str) -> Result<Property> {
    let url = self.endpoint(&[Resource::Properties.as_str(), id])?;
    self
      .get_json(url)
      .await
      .map_err(|e| e.or_not_found(Resource::Properties, id))
  }

  async fn bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>> {
    let mut url = self.endpoint(&[Resource::Bookings.as_str()])?;
    url.query_pairs_mut().append_pair("userId", user_id);
    self.get_json(url).await
  }

  async fn create_booking(&self, booking: &NewBooking) -> Result<Booking> {
    let url = self.endpoint(&[Resource::Bookings.as_str()])?;
    self.post_json(url, booking).await
  }

  async fn get_user(&self, id: &str) -> Result<User> {
    let url = self.endpoint(&[Resource::Users.as_str(), id])?;
    self
      .get_json(url)
      .await
      .map_err(|e| e.or_not_found(Resource::Users, id))
  }
}
