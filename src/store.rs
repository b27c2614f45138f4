use tracing::debug;

use crate::error::StoreError;
use crate::models::{Application, ApplicationPatch};

/// One owner's records as returned by the store.
///
/// `ordered` is false when the store could not sort by `created_at` (its index
/// is not provisioned yet); callers must then sort themselves.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub applications: Vec<Application>,
    pub ordered: bool,
}

/// The persistence collaborator both engines sit on top of.
pub trait ApplicationStore {
    fn list_applications(&self, owner_id: &str) -> Result<Listing, StoreError>;

    fn get_application(&self, id: &str) -> Result<Option<Application>, StoreError>;

    /// Fails with [`StoreError::NotFound`] when `id` is unknown.
    fn patch_application(&self, id: &str, patch: &ApplicationPatch) -> Result<(), StoreError>;
}

impl<T: ApplicationStore + ?Sized> ApplicationStore for &T {
    fn list_applications(&self, owner_id: &str) -> Result<Listing, StoreError> {
        (**self).list_applications(owner_id)
    }

    fn get_application(&self, id: &str) -> Result<Option<Application>, StoreError> {
        (**self).get_application(id)
    }

    fn patch_application(&self, id: &str, patch: &ApplicationPatch) -> Result<(), StoreError> {
        (**self).patch_application(id, patch)
    }
}

/// Lists an owner's applications newest first, sorting client-side when the
/// store could not.
pub fn load_applications<S: ApplicationStore + ?Sized>(
    store: &S,
    owner_id: &str,
) -> Result<Vec<Application>, StoreError> {
    let listing = store.list_applications(owner_id)?;
    let mut applications = listing.applications;
    if !listing.ordered {
        debug!(owner_id, count = applications.len(), "listing unordered, sorting client-side");
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
    Ok(applications)
}
