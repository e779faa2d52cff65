use serde::Serialize;

/// Which user actions are currently valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub can_add_class: bool,
    pub can_upload: bool,
    pub can_remove: bool,
    pub can_train: bool,
    pub can_predict: bool,
    pub can_reset: bool,
}

impl Readiness {
    pub fn evaluate(is_training: bool, is_trained: bool, class_count: usize, extractor_available: bool) -> Self {
        Self {
            can_add_class: !is_training,
            can_upload: !is_training && extractor_available,
            can_remove: !is_training,
            can_train: !is_training && extractor_available && class_count >= 2,
            can_predict: is_trained && class_count >= 2,
            can_reset: !is_training,
        }
    }
}
