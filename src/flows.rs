//! Load / submit / reload state for each editable collection.
//!
//! After every successful mutation the list is fetched again; the server's
//! answer replaces whatever was held before and nothing is merged locally.

use std::marker::PhantomData;
use thiserror::Error;
use tracing::{debug, info};

use crate::api_connection::connection::{ApiClient, ApiConnectionError};
use crate::api_connection::endpoints::{Editable, Preferences, Resource, User};
use crate::forms::{FormErrors, PreferenceForm, ProfileForm};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{0}")]
    Invalid(#[from] FormErrors),
    #[error("no {kind} with id '{id}'")]
    NotFound { kind: &'static str, id: String },
    #[error("nothing loaded yet")]
    NotLoaded,
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Api(#[from] ApiConnectionError),
}

impl FlowError {
    pub fn user_message(&self) -> String {
        match self {
            FlowError::Api(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

pub struct ListFlow<R: Resource> {
    client: ApiClient,
    listing: Option<R::Listing>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> ListFlow<R> {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            listing: None,
            _resource: PhantomData,
        }
    }

    /// Fetches the list the first time, then serves the held copy.
    pub async fn load(&mut self) -> Result<&R::Listing, FlowError> {
        if self.listing.is_none() {
            self.reload().await?;
        }
        self.listing.as_ref().ok_or(FlowError::NotLoaded)
    }

    pub async fn reload(&mut self) -> Result<&R::Listing, FlowError> {
        let listing = self.client.list::<R>().await?;
        debug!(
            resource = R::NAME,
            count = R::records(&listing).len(),
            "list loaded"
        );
        Ok(self.listing.insert(listing))
    }

    pub fn listing(&self) -> Option<&R::Listing> {
        self.listing.as_ref()
    }

    pub fn records(&self) -> &[R::Record] {
        self.listing.as_ref().map(R::records).unwrap_or(&[])
    }

    pub fn find(&self, id: &str) -> Option<&R::Record> {
        self.records().iter().find(|r| R::record_id(r) == id)
    }

    pub async fn create(&mut self, payload: &R::Payload) -> Result<&R::Listing, FlowError> {
        self.client.create::<R>(payload).await?;
        info!(resource = R::NAME, "created");
        self.reload().await
    }

    /// Deletes `id` once `confirm` agrees. A refusal sends nothing and yields
    /// [`FlowError::Cancelled`].
    pub async fn delete(
        &mut self,
        id: &str,
        confirm: impl FnOnce(&R::Record) -> bool,
    ) -> Result<&R::Listing, FlowError> {
        self.load().await?;
        let record = self.find(id).ok_or_else(|| FlowError::NotFound {
            kind: R::NAME,
            id: id.to_string(),
        })?;
        if !confirm(record) {
            debug!(resource = R::NAME, id, "delete declined");
            return Err(FlowError::Cancelled);
        }

        self.client.delete::<R>(id).await?;
        info!(resource = R::NAME, id, "deleted");
        self.reload().await
    }
}

impl<R: Editable> ListFlow<R> {
    pub async fn update(
        &mut self,
        id: &str,
        payload: &R::Payload,
    ) -> Result<&R::Listing, FlowError> {
        self.client.update::<R>(id, payload).await?;
        info!(resource = R::NAME, id, "updated");
        self.reload().await
    }
}

/// Saved preferences plus an optional draft being edited.
pub struct PreferenceFlow {
    client: ApiClient,
    saved: Option<Preferences>,
    draft: Option<PreferenceForm>,
}

impl PreferenceFlow {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            saved: None,
            draft: None,
        }
    }

    pub async fn load(&mut self) -> Result<&Preferences, FlowError> {
        let preferences = self.client.preferences().await?;
        self.draft = None;
        Ok(self.saved.insert(preferences))
    }

    pub fn saved(&self) -> Option<&Preferences> {
        self.saved.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    /// Opens a draft pre-filled from the saved record.
    pub fn begin_edit(&mut self) -> Result<&mut PreferenceForm, FlowError> {
        let saved = self.saved.as_ref().ok_or(FlowError::NotLoaded)?;
        Ok(self
            .draft
            .insert(PreferenceForm::from_preferences(saved)))
    }

    pub fn draft_mut(&mut self) -> Option<&mut PreferenceForm> {
        self.draft.as_mut()
    }

    /// Throws the draft away; the saved record is what remains.
    pub fn cancel(&mut self) -> Option<&Preferences> {
        self.draft = None;
        self.saved.as_ref()
    }

    /// Sends the draft and adopts the server's echo. On failure the draft is
    /// kept so it can be corrected.
    pub async fn save(&mut self) -> Result<&Preferences, FlowError> {
        let draft = self.draft.as_ref().ok_or(FlowError::NotLoaded)?;
        let preferences = draft.validate()?;
        let echoed = self.client.update_preferences(&preferences).await?;
        info!("preferences saved");
        self.draft = None;
        Ok(self.saved.insert(echoed))
    }
}

pub struct ProfileFlow {
    client: ApiClient,
    user: Option<User>,
}

impl ProfileFlow {
    pub fn new(client: ApiClient) -> Self {
        Self { client, user: None }
    }

    pub async fn load(&mut self) -> Result<&User, FlowError> {
        let user = self.client.current_user().await?;
        Ok(self.user.insert(user))
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub async fn update(&mut self, form: &ProfileForm) -> Result<&User, FlowError> {
        let user_id = self.user.as_ref().ok_or(FlowError::NotLoaded)?.id;
        let update = form.validate_update()?;
        let user = self.client.update_user(user_id, &update).await?;
        info!(user_id, "profile updated");
        Ok(self.user.insert(user))
    }
}
