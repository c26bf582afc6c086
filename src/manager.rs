//! In-memory list of portfolios kept in step with the backend.
//!
//! Local state is only changed after the backend confirmed a mutation, so a
//! failed request never needs rolling back.

use crate::api::PortfolioApi;
use crate::error::{ApiError, MutationError, ValidationError};
use crate::portfolio::{Portfolio, PortfolioDraft, PortfolioId};

#[derive(Debug, Clone, PartialEq)]
pub enum ListState {
    Idle,
    Loading,
    Submitting,
    /// A load failed; the message is suitable for a banner with retry.
    Failed(String),
}

pub struct PortfolioList<A: PortfolioApi> {
    api: A,
    portfolios: Vec<Portfolio>,
    state: ListState,
    pending_delete: Option<PortfolioId>,
    last_error: Option<String>,
}

impl<A: PortfolioApi> PortfolioList<A> {
    pub fn new(api: A) -> Self {
        PortfolioList {
            api,
            portfolios: Vec::new(),
            state: ListState::Idle,
            pending_delete: None,
            last_error: None,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn portfolios(&self) -> &[Portfolio] {
        &self.portfolios
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn get(&self, id: &PortfolioId) -> Option<&Portfolio> {
        self.portfolios.iter().find(|p| &p.id == id)
    }

    pub fn pending_delete(&self) -> Option<&Portfolio> {
        self.pending_delete.as_ref().and_then(|id| self.get(id))
    }

    /// Message of the most recent failed mutation.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Replaces the held list with the backend's. On failure the old list
    /// is kept and the state turns into `Failed`.
    pub async fn load(&mut self) -> Result<(), ApiError> {
        self.state = ListState::Loading;
        match self.api.list_portfolios().await {
            Ok(portfolios) => {
                tracing::debug!(count = portfolios.len(), "loaded portfolios");
                self.portfolios = portfolios;
                self.state = ListState::Idle;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load portfolios");
                self.state = ListState::Failed(e.user_message().to_string());
                Err(e)
            }
        }
    }

    /// Creates a portfolio and appends the record the backend returned.
    pub async fn create(&mut self, draft: PortfolioDraft) -> Result<&Portfolio, MutationError> {
        self.validate(&draft)?;
        self.state = ListState::Submitting;
        let result = self.api.create_portfolio(&draft).await;
        self.state = ListState::Idle;

        let created = self.settle("Create", result)?;
        tracing::info!(id = %created.id, name = %created.name, "created portfolio");
        self.portfolios.push(created);
        let last = self.portfolios.len() - 1;
        Ok(&self.portfolios[last])
    }

    /// Updates a portfolio and replaces it in place.
    pub async fn update(
        &mut self,
        id: &PortfolioId,
        draft: PortfolioDraft,
    ) -> Result<&Portfolio, MutationError> {
        self.validate(&draft)?;
        let index = self.index_of(id)?;
        self.state = ListState::Submitting;
        let result = self.api.update_portfolio(id, &draft).await;
        self.state = ListState::Idle;

        let updated = self.settle("Update", result)?;
        tracing::info!(%id, "updated portfolio");
        self.portfolios[index] = updated;
        Ok(&self.portfolios[index])
    }

    /// First step of a delete: remember what the user wants to remove.
    pub fn request_delete(&mut self, id: &PortfolioId) -> Result<(), ValidationError> {
        if self.get(id).is_none() {
            return Err(ValidationError::UnknownPortfolio(id.to_string()));
        }
        self.pending_delete = Some(id.clone());
        Ok(())
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Second step of a delete. Does nothing without a pending request.
    pub async fn confirm_delete(&mut self) -> Result<Option<Portfolio>, MutationError> {
        let Some(id) = self.pending_delete.take() else {
            return Ok(None);
        };
        self.state = ListState::Submitting;
        let result = self.api.delete_portfolio(&id).await;
        self.state = ListState::Idle;

        self.settle("Delete", result)?;
        tracing::info!(%id, "deleted portfolio");
        let index = self.portfolios.iter().position(|p| p.id == id);
        Ok(index.map(|i| self.portfolios.remove(i)))
    }

    pub async fn archive(&mut self, id: &PortfolioId) -> Result<(), MutationError> {
        self.set_archived(id, true).await
    }

    pub async fn unarchive(&mut self, id: &PortfolioId) -> Result<(), MutationError> {
        self.set_archived(id, false).await
    }

    /// Archives an active portfolio or unarchives an archived one.
    pub async fn toggle_archived(&mut self, id: &PortfolioId) -> Result<(), MutationError> {
        let index = self.index_of(id)?;
        let archived = self.portfolios[index].is_archived;
        self.set_archived(id, !archived).await
    }

    async fn set_archived(&mut self, id: &PortfolioId, archive: bool) -> Result<(), MutationError> {
        let (action, result) = if archive {
            ("Archive", self.api.archive_portfolio(id).await)
        } else {
            ("Unarchive", self.api.unarchive_portfolio(id).await)
        };
        self.settle(action, result)?;
        tracing::info!(%id, archive, "changed archived state");

        // The backend owns the archived flag; show its view.
        if let Err(e) = self.load().await {
            self.last_error = Some(format!("{action} succeeded but reload failed: {e}"));
        }
        Ok(())
    }

    fn validate(&mut self, draft: &PortfolioDraft) -> Result<(), MutationError> {
        draft.validate().map_err(|e| {
            self.last_error = Some(e.to_string());
            MutationError::from(e)
        })
    }

    fn index_of(&mut self, id: &PortfolioId) -> Result<usize, MutationError> {
        match self.portfolios.iter().position(|p| &p.id == id) {
            Some(index) => Ok(index),
            None => {
                let err = ValidationError::UnknownPortfolio(id.to_string());
                self.last_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    fn settle<T>(
        &mut self,
        action: &'static str,
        result: Result<T, ApiError>,
    ) -> Result<T, MutationError> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Ok(value)
            }
            Err(source) => {
                tracing::error!(action, error = %source, "portfolio mutation failed");
                let err = MutationError::Request { action, source };
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }
}
