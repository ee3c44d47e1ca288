use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const LABEL_MAX_CHARS: usize = 20;

pub fn truncate_label(label: &str) -> String {
    if label.chars().count() > LABEL_MAX_CHARS {
        let head = label.chars().take(LABEL_MAX_CHARS).collect::<String>();
        format!("{head}...")
    } else {
        label.to_owned()
    }
}

/// Hash-derived value in `[0, 1)`, stable for a given id within one build.
pub fn stable_unit(id: &str) -> f32 {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();

    ((hash >> 40) as f64 / (1u64 << 24) as f64) as f32
}
