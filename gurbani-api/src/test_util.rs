//! Test helpers shared by this crate's tests and downstream crates.
//!
//! [`StaticShabads`] is an in-memory [`ShabadSource`] that never touches the network.
//! It counts fetches and can be told to fail specific ids, which is enough to
//! exercise partial-failure paths of code built on `ShabadSource`.

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;

use crate::{
    Result,
    error::GurbaniError,
    shabad::{Line, Shabad, ShabadInfo, SourceInfo},
    source::ShabadSource,
};

/// Builds a shabad with the given id and line texts.
/// Verse ids are `"{shabad_id}-{index}"`.
pub fn sample_shabad(shabad_id: u32, lines: &[&str]) -> Shabad {
    Shabad {
        info: ShabadInfo {
            shabad_id,
            page_no: 1,
            source: SourceInfo {
                id: "G".to_string(),
                english: "Sri Guru Granth Sahib Ji".to_string(),
                unicode: String::new(),
            },
            ..Default::default()
        },
        lines: lines
            .iter()
            .enumerate()
            .map(|(index, text)| Line {
                verse_id: format!("{shabad_id}-{index}"),
                line_no: u32::try_from(index + 1).unwrap_or(u32::MAX),
                gurmukhi: (*text).to_string(),
                ..Default::default()
            })
            .collect(),
    }
}

/// In-memory shabad source
#[derive(Debug, Default)]
pub struct StaticShabads {
    shabads: HashMap<u32, Shabad>,
    failing: Mutex<HashSet<u32>>,
    fetches: AtomicUsize,
}

impl StaticShabads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a shabad (replacing any with the same id)
    pub fn with(mut self, shabad: Shabad) -> Self {
        self.shabads.insert(shabad.id(), shabad);
        self
    }

    /// Makes fetches of `shabad_id` fail with a server error
    pub fn fail(&self, shabad_id: u32) {
        self.failing.lock().insert(shabad_id);
    }

    /// Number of fetch calls made so far, including failed ones
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ShabadSource for StaticShabads {
    async fn fetch_shabad(&self, shabad_id: u32) -> Result<Shabad> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(&shabad_id) {
            return Err(GurbaniError::ApiError {
                code: 500,
                method: "GET".to_string(),
                url: format!("/shabad/{shabad_id}"),
                message: "injected failure".to_string(),
            });
        }
        self.shabads
            .get(&shabad_id)
            .cloned()
            .ok_or_else(|| GurbaniError::NotFound {
                obj_type: "Shabad".to_string(),
                key: shabad_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_shabads() {
        let source = StaticShabads::new().with(sample_shabad(3, &["a b", "c d"]));
        let shabad = source.fetch_shabad(3).await.expect("fetch");
        assert_eq!(shabad.lines[1].verse_id, "3-1");

        assert!(matches!(
            source.fetch_shabad(4).await,
            Err(GurbaniError::NotFound { .. })
        ));

        source.fail(3);
        assert!(matches!(
            source.fetch_shabad(3).await,
            Err(GurbaniError::ApiError { code: 500, .. })
        ));
        assert_eq!(source.fetch_count(), 3);
    }
}
