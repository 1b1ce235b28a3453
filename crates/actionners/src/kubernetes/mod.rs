//! Built-in actionners acting on the pod named by the alert.

mod labelize;
mod terminate;

pub use labelize::{Labelize, LabelizeParams};
pub use terminate::{Terminate, TerminateParams};

use warden_core::Event;

use crate::traits::ActionError;

/// `(namespace, pod)` of the alert; both must be present.
fn pod_subject(event: &Event) -> Result<(String, String), ActionError> {
    let pod = event.pod_name().ok_or(ActionError::MissingSubject("pod"))?;
    let namespace = event
        .namespace_name()
        .ok_or(ActionError::MissingSubject("namespace"))?;
    Ok((namespace, pod))
}
