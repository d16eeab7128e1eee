//! Mock live status API.

use super::lock;
use herald_core::model::{StreamStatus, SubjectProfile};
use herald_core::providers::StatusApi;
use herald_core::{HeraldError, Result};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    online: HashMap<String, StreamStatus>,
    profiles: HashMap<String, SubjectProfile>,
    art: HashMap<String, String>,
    /// Subjects whose batch times out.
    failing: HashSet<String>,
    calls: Vec<Vec<String>>,
}

/// Mock status API.
///
/// A batch containing any subject marked with [`MockStatusApi::fail_subject`]
/// fails as a whole with a timeout, like a real request would.
#[derive(Debug, Clone, Default)]
pub struct MockStatusApi {
    state: Arc<Mutex<State>>,
}

impl MockStatusApi {
    /// Create an API where everyone is offline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `stream` as online.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn set_online(&self, stream: StreamStatus) -> Result<()> {
        lock(&self.state)?.online.insert(stream.subject(), stream);
        Ok(())
    }

    /// Report `subject` as offline.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn set_offline(&self, subject: &str) -> Result<()> {
        lock(&self.state)?.online.remove(&subject.to_lowercase());
        Ok(())
    }

    /// Register profile data.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn set_profile(&self, profile: SubjectProfile) -> Result<()> {
        lock(&self.state)?
            .profiles
            .insert(profile.login.to_lowercase(), profile);
        Ok(())
    }

    /// Register box art for a category.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn set_category_art(&self, category_id: &str, url: &str) -> Result<()> {
        lock(&self.state)?
            .art
            .insert(category_id.to_string(), url.to_string());
        Ok(())
    }

    /// Make every batch containing `subject` time out (or stop doing so).
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn fail_subject(&self, subject: &str, failing: bool) -> Result<()> {
        let mut state = lock(&self.state)?;
        if failing {
            state.failing.insert(subject.to_lowercase());
        } else {
            state.failing.remove(&subject.to_lowercase());
        }
        Ok(())
    }

    /// Every batch passed to `streams`, in call order.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn calls(&self) -> Result<Vec<Vec<String>>> {
        Ok(lock(&self.state)?.calls.clone())
    }
}

impl StatusApi for MockStatusApi {
    fn streams(&self, subjects: &[String]) -> impl Future<Output = Result<Vec<StreamStatus>>> + Send {
        let state = Arc::clone(&self.state);
        let subjects = subjects.to_vec();

        async move {
            tokio::task::yield_now().await;
            let mut state = lock(&state)?;
            state.calls.push(subjects.clone());

            if subjects
                .iter()
                .any(|subject| state.failing.contains(&subject.to_lowercase()))
            {
                return Err(HeraldError::Timeout {
                    operation: "streams".to_string(),
                });
            }

            Ok(subjects
                .iter()
                .filter_map(|subject| state.online.get(&subject.to_lowercase()).cloned())
                .collect())
        }
    }

    fn profile(&self, login: &str) -> impl Future<Output = Result<Option<SubjectProfile>>> + Send {
        let state = Arc::clone(&self.state);
        let login = login.to_lowercase();

        async move { Ok(lock(&state)?.profiles.get(&login).cloned()) }
    }

    fn category_art(&self, category_id: &str) -> impl Future<Output = Result<Option<String>>> + Send {
        let state = Arc::clone(&self.state);
        let category_id = category_id.to_string();

        async move { Ok(lock(&state)?.art.get(&category_id).cloned()) }
    }
}
