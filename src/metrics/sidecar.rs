use crate::types::Pod;

/// Annotation written by the mesh injector on pods that carry a sidecar.
pub const ISTIO_SIDECAR_ANNOTATION: &str = "sidecar.istio.io/status";

/// Whether `pod` carries the injection annotation with a usable value.
pub fn has_sidecar(pod: &Pod, annotation: &str) -> bool {
    match pod.annotations.get(annotation) {
        Some(v) => !v.trim().is_empty() && v.trim() != "false",
        None => false,
    }
}

/// A pod set is meshed as soon as one of its pods is.
pub fn any_has_sidecar<'a, I>(pods: I, annotation: &str) -> bool
where
    I: IntoIterator<Item = &'a Pod>,
{
    pods.into_iter().any(|p| has_sidecar(p, annotation))
}
