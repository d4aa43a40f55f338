use tracing::{info, warn};

use crate::client::PasteService;
use crate::draft::PasteDraft;
use crate::error::SubmitError;
use crate::estimate::ViewEstimates;
use crate::{PasteHandle, ViewerRoute};

/// Validates and creates a paste, returning a local viewer link for it.
///
/// Validation failures never reach the service. Creation is sent exactly once;
/// it is not safe to retry because each attempt creates a new paste. When the
/// author set a view limit, the estimate for the new identifier is seeded
/// with it.
///
/// # Errors
///
/// See [`SubmitError`].
pub async fn submit<S: PasteService + ?Sized>(
    service: &S,
    route: &ViewerRoute,
    estimates: &mut ViewEstimates,
    draft: &PasteDraft,
) -> Result<PasteHandle, SubmitError> {
    let request = draft.validate()?;

    let created = service.create(&request).await.map_err(|e| {
        warn!("Failed to create paste: {}", e);
        SubmitError::from(e)
    })?;

    let id = created.identifier().ok_or(SubmitError::MissingIdentifier)?;
    let url = route.link(&id);

    if let Some(max_views) = request.max_views.and_then(|n| u64::try_from(n).ok()) {
        estimates.seed(&id, max_views);
    }

    info!(%id, %url, "Created paste");
    Ok(PasteHandle { id, url })
}
